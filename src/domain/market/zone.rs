//! Support/resistance zone detection: clustering, touch counting, merging.
//!
//! No direct teacher analog; grounded on `market_regime`'s style of
//! rolling-window metric structs and enriched from
//! `alvinyakatoribot-boop-ict-trading-bot-rs/src/core/liquidity.rs`'s
//! touch/bounce counting idiom.

use super::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceZone {
    pub top: Decimal,
    pub bottom: Decimal,
    pub touch_count: u32,
    pub strength: ZoneStrength,
    pub first_index: usize,
    pub last_touch_index: usize,
}

impl SupportResistanceZone {
    pub fn mid(&self) -> Decimal {
        (self.top + self.bottom) / dec!(2)
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.bottom && price <= self.top
    }
}

fn classify_strength(touch_count: u32) -> ZoneStrength {
    match touch_count {
        0..=1 => ZoneStrength::Weak,
        2..=3 => ZoneStrength::Moderate,
        _ => ZoneStrength::Strong,
    }
}

/// Cluster swing-extreme prices (highs and lows from `find_swing_points`)
/// within `tolerance_pct` of each other into zones, counting every
/// subsequent candle that wicks into the band as a touch.
pub fn detect_zones(
    candles: &[Candle],
    swing_prices: &[(usize, Decimal)],
    tolerance_pct: Decimal,
) -> Vec<SupportResistanceZone> {
    let mut sorted: Vec<(usize, Decimal)> = swing_prices.to_vec();
    sorted.sort_by(|a, b| a.1.cmp(&b.1));

    let mut clusters: Vec<Vec<(usize, Decimal)>> = Vec::new();
    for point in sorted {
        if let Some(last) = clusters.last_mut() {
            let cluster_mid = last.iter().map(|p| p.1).sum::<Decimal>() / Decimal::from(last.len());
            if cluster_mid.is_zero() {
                clusters.push(vec![point]);
                continue;
            }
            if ((point.1 - cluster_mid) / cluster_mid).abs() <= tolerance_pct {
                last.push(point);
                continue;
            }
        }
        clusters.push(vec![point]);
    }

    clusters
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|cluster| {
            let top = cluster.iter().map(|p| p.1).fold(Decimal::MIN, Decimal::max);
            let bottom = cluster.iter().map(|p| p.1).fold(Decimal::MAX, Decimal::min);
            let first_index = cluster.iter().map(|p| p.0).min().unwrap();

            let mut touch_count = cluster.len() as u32;
            let mut last_touch_index = cluster.iter().map(|p| p.0).max().unwrap();
            for (i, candle) in candles.iter().enumerate().skip(first_index + 1) {
                if candle.low <= top && candle.high >= bottom {
                    touch_count += 1;
                    last_touch_index = i;
                }
            }

            SupportResistanceZone {
                top,
                bottom,
                touch_count,
                strength: classify_strength(touch_count),
                first_index,
                last_touch_index,
            }
        })
        .collect()
}

/// The zone whose band is closest to `price`, if any.
pub fn find_nearest<'a>(
    zones: &'a [SupportResistanceZone],
    price: Decimal,
) -> Option<&'a SupportResistanceZone> {
    zones.iter().min_by_key(|z| {
        if z.contains(price) {
            Decimal::ZERO
        } else if price > z.top {
            price - z.top
        } else {
            z.bottom - price
        }
    })
}

/// Zones touched within the last `recency_window` candles, sorted nearest
/// first to `price`.
pub fn active_zones(
    zones: &[SupportResistanceZone],
    current_index: usize,
    recency_window: usize,
    price: Decimal,
) -> Vec<&SupportResistanceZone> {
    let mut active: Vec<&SupportResistanceZone> = zones
        .iter()
        .filter(|z| current_index.saturating_sub(z.last_touch_index) <= recency_window)
        .collect();
    active.sort_by_key(|z| (z.mid() - price).abs());
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;

    fn c(h: i64, l: i64) -> Candle {
        Candle::new(
            "BTC-USD",
            Timeframe::OneHour,
            0,
            Decimal::from(l),
            Decimal::from(h),
            Decimal::from(l),
            Decimal::from(h),
            dec!(1),
            "hyperliquid",
        )
        .unwrap()
    }

    #[test]
    fn clusters_nearby_swing_prices_into_one_zone() {
        let swings = vec![(0, dec!(100)), (10, dec!(101)), (20, dec!(99))];
        let candles = vec![c(105, 95); 25];
        let zones = detect_zones(&candles, &swings, dec!(0.02));
        assert_eq!(zones.len(), 1);
        assert!(zones[0].touch_count >= 3);
    }

    #[test]
    fn distant_prices_form_separate_zones() {
        let swings = vec![(0, dec!(100)), (10, dec!(200))];
        let candles = vec![c(250, 50); 15];
        let zones = detect_zones(&candles, &swings, dec!(0.01));
        assert_eq!(zones.len(), 2);
    }

    #[test]
    fn find_nearest_picks_closest_zone() {
        let zones = vec![
            SupportResistanceZone {
                top: dec!(105),
                bottom: dec!(100),
                touch_count: 1,
                strength: ZoneStrength::Weak,
                first_index: 0,
                last_touch_index: 0,
            },
            SupportResistanceZone {
                top: dec!(205),
                bottom: dec!(200),
                touch_count: 1,
                strength: ZoneStrength::Weak,
                first_index: 0,
                last_touch_index: 0,
            },
        ];
        let nearest = find_nearest(&zones, dec!(110)).unwrap();
        assert_eq!(nearest.bottom, dec!(100));
    }
}
