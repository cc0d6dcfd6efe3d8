//! Market structure: swing points, break-of-structure / change-of-character,
//! order blocks and fair value gaps.
//!
//! Grounded on `smc.rs`'s `is_swing_high`/`is_swing_low` fractal window scan,
//! `detect_mss` trend-tracked break detection, `find_last_ob` volume-gated
//! order block search and `detect_fvg` three-candle gap check. Generalized
//! here to emit the full set of structures found in a slice rather than
//! just the most recent instance, and to track order-block `tested_count`,
//! FVG fill percentage and break `significance`.

use super::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub kind: SwingKind,
    pub index: usize,
    pub price: Decimal,
    /// How many candles on each side confirm this swing (the fractal window).
    pub strength: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    /// Price breaks a swing in the direction of the prevailing trend.
    BreakOfStructure,
    /// Price breaks a swing against the prevailing trend, flipping it.
    ChangeOfCharacter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub kind: BreakKind,
    pub new_trend: Trend,
    /// Index of the candle whose close broke the swing.
    pub index: usize,
    pub broken_swing_price: Decimal,
    /// Distance the close pushed past the swing, relative to the swing's
    /// own recent range — a rough measure of conviction.
    pub significance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub side: Side,
    pub index: usize,
    pub high: Decimal,
    pub low: Decimal,
    pub tested_count: u32,
    pub mitigated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub side: Side,
    /// Index of the middle (impulse) candle of the three-candle pattern.
    pub index: usize,
    pub top: Decimal,
    pub bottom: Decimal,
    pub fill_pct: Decimal,
    pub filled: bool,
}

const MIN_OB_VOLUME_MULTIPLE: Decimal = dec!(1.3);
const DEFAULT_BODY_THRESHOLD: Decimal = dec!(0.3);
const DOJI_BODY_RATIO: Decimal = dec!(0.10);

/// Find swing highs/lows using a symmetric fractal window: candle `i` is a
/// swing high if its high is the strict max over `[i-window, i+window]`.
/// A candidate must additionally clear `θ_body` (or be a doji) on its own
/// body/range ratio, so thin, noisy candles don't register as swings.
pub fn find_swing_points(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    find_swing_points_with_threshold(candles, window, DEFAULT_BODY_THRESHOLD)
}

pub fn find_swing_points_with_threshold(candles: &[Candle], window: usize, theta_body: Decimal) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if candles.len() < 2 * window + 1 {
        return swings;
    }
    for i in window..candles.len() - window {
        let candle = &candles[i];
        let body_ratio = candle.body_ratio();
        if body_ratio < theta_body && body_ratio >= DOJI_BODY_RATIO {
            continue;
        }
        if is_swing_high(candles, i, window) {
            swings.push(SwingPoint {
                kind: SwingKind::High,
                index: i,
                price: candle.high,
                strength: window as u32,
            });
        }
        if is_swing_low(candles, i, window) {
            swings.push(SwingPoint {
                kind: SwingKind::Low,
                index: i,
                price: candle.low,
                strength: window as u32,
            });
        }
    }
    swings
}

fn is_swing_high(candles: &[Candle], i: usize, window: usize) -> bool {
    let pivot = candles[i].high;
    ((i - window)..=(i + window))
        .filter(|&j| j != i)
        .all(|j| candles[j].high < pivot)
}

fn is_swing_low(candles: &[Candle], i: usize, window: usize) -> bool {
    let pivot = candles[i].low;
    ((i - window)..=(i + window))
        .filter(|&j| j != i)
        .all(|j| candles[j].low > pivot)
}

/// Walk candles chronologically, tracking the last unbroken swing high/low
/// and emitting a `StructureBreak` every time a close pushes through one.
/// The running trend starts `Bullish`; a break through the opposite-side
/// swing is a CHoCH and flips it, a break through the same-side swing is a
/// BOS.
pub fn detect_breaks(candles: &[Candle], swings: &[SwingPoint]) -> Vec<StructureBreak> {
    let mut breaks = Vec::new();
    let mut trend = Trend::Bullish;
    let mut last_high: Option<&SwingPoint> = None;
    let mut last_low: Option<&SwingPoint> = None;

    let mut swing_iter = swings.iter().peekable();

    for (i, candle) in candles.iter().enumerate() {
        while let Some(s) = swing_iter.peek() {
            if s.index > i {
                break;
            }
            let s = swing_iter.next().unwrap();
            match s.kind {
                SwingKind::High => last_high = Some(s),
                SwingKind::Low => last_low = Some(s),
            }
        }

        if let Some(high) = last_high {
            if candle.close > high.price {
                let kind = match trend {
                    Trend::Bullish => BreakKind::BreakOfStructure,
                    Trend::Bearish => BreakKind::ChangeOfCharacter,
                };
                trend = Trend::Bullish;
                breaks.push(StructureBreak {
                    kind,
                    new_trend: trend,
                    index: i,
                    broken_swing_price: high.price,
                    significance: significance(candle.close, high.price),
                });
                last_high = None;
            }
        }
        if let Some(low) = last_low {
            if candle.close < low.price {
                let kind = match trend {
                    Trend::Bearish => BreakKind::BreakOfStructure,
                    Trend::Bullish => BreakKind::ChangeOfCharacter,
                };
                trend = Trend::Bearish;
                breaks.push(StructureBreak {
                    kind,
                    new_trend: trend,
                    index: i,
                    broken_swing_price: low.price,
                    significance: significance(low.price, candle.close),
                });
                last_low = None;
            }
        }
    }
    breaks
}

fn significance(breaker: Decimal, broken: Decimal) -> Decimal {
    if broken.is_zero() {
        Decimal::ZERO
    } else {
        ((breaker - broken) / broken).abs()
    }
}

/// The last opposite-colored candle before an impulsive move, gated on
/// volume being at least `MIN_OB_VOLUME_MULTIPLE` times the trailing
/// average, per `smc.rs`'s `find_last_ob`.
pub fn find_order_blocks(candles: &[Candle], lookback: usize) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    if candles.len() < lookback + 2 {
        return blocks;
    }
    for i in lookback..candles.len() - 1 {
        let window = &candles[i - lookback..i];
        let avg_volume: Decimal =
            window.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(window.len());
        if avg_volume.is_zero() {
            continue;
        }
        let candle = &candles[i];
        let next = &candles[i + 1];
        if candle.volume < avg_volume * MIN_OB_VOLUME_MULTIPLE {
            continue;
        }
        if candle.is_bearish() && next.is_bullish() && next.close > candle.high {
            blocks.push(OrderBlock {
                side: Side::Bullish,
                index: i,
                high: candle.high,
                low: candle.low,
                tested_count: 0,
                mitigated: false,
            });
        }
        if candle.is_bullish() && next.is_bearish() && next.close < candle.low {
            blocks.push(OrderBlock {
                side: Side::Bearish,
                index: i,
                high: candle.high,
                low: candle.low,
                tested_count: 0,
                mitigated: false,
            });
        }
    }
    blocks
}

/// Mark `tested_count`/`mitigated` for each order block against candles
/// after its formation.
pub fn update_order_block_state(blocks: &mut [OrderBlock], candles: &[Candle]) {
    for block in blocks.iter_mut() {
        for candle in candles.iter().skip(block.index + 1) {
            let touched = candle.low <= block.high && candle.high >= block.low;
            if !touched {
                continue;
            }
            block.tested_count += 1;
            match block.side {
                Side::Bullish if candle.close < block.low => block.mitigated = true,
                Side::Bearish if candle.close > block.high => block.mitigated = true,
                _ => {}
            }
        }
    }
}

/// A three-candle fair value gap: candle[i-1].high/low leaves a price range
/// untouched by candle[i+1], per `smc.rs`'s `detect_fvg`.
pub fn find_fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }
    for i in 1..candles.len() - 1 {
        let prev = &candles[i - 1];
        let next = &candles[i + 1];
        if next.low > prev.high {
            gaps.push(FairValueGap {
                side: Side::Bullish,
                index: i,
                top: next.low,
                bottom: prev.high,
                fill_pct: Decimal::ZERO,
                filled: false,
            });
        }
        if next.high < prev.low {
            gaps.push(FairValueGap {
                side: Side::Bearish,
                index: i,
                top: prev.low,
                bottom: next.high,
                fill_pct: Decimal::ZERO,
                filled: false,
            });
        }
    }
    gaps
}

/// Update `fill_pct`/`filled` for each gap against candles after it formed.
pub fn update_fvg_state(gaps: &mut [FairValueGap], candles: &[Candle]) {
    for gap in gaps.iter_mut() {
        let span = (gap.top - gap.bottom).max(Decimal::new(1, 8));
        for candle in candles.iter().skip(gap.index + 1) {
            let overlap_top = candle.high.min(gap.top);
            let overlap_bottom = candle.low.max(gap.bottom);
            if overlap_top <= overlap_bottom {
                continue;
            }
            let filled_span = match gap.side {
                Side::Bullish => (gap.top - candle.low.max(gap.bottom)).max(Decimal::ZERO),
                Side::Bearish => (candle.high.min(gap.top) - gap.bottom).max(Decimal::ZERO),
            };
            let pct = (filled_span / span).min(Decimal::ONE);
            if pct > gap.fill_pct {
                gap.fill_pct = pct;
            }
            if gap.fill_pct >= Decimal::ONE {
                gap.filled = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;

    fn c(h: i64, l: i64, o: i64, cl: i64, v: i64) -> Candle {
        Candle::new(
            "BTC-USD",
            Timeframe::OneHour,
            0,
            Decimal::from(o),
            Decimal::from(h),
            Decimal::from(l),
            Decimal::from(cl),
            Decimal::from(v),
            "hyperliquid",
        )
        .unwrap()
    }

    #[test]
    fn finds_swing_high() {
        let candles = vec![
            c(100, 90, 95, 96, 10),
            c(105, 95, 96, 100, 10),
            c(120, 100, 100, 110, 10),
            c(105, 95, 110, 100, 10),
            c(100, 90, 100, 95, 10),
        ];
        let swings = find_swing_points(&candles, 2);
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].kind, SwingKind::High);
        assert_eq!(swings[0].index, 2);
    }

    #[test]
    fn thin_bodied_pivot_is_filtered_out_unless_a_doji() {
        // Pivot at index 2 has the highest high but a thin, non-doji body
        // (body/range = 5/20 = 0.25 < θ_body 0.3, and not a doji either),
        // so it should not register as a swing.
        let candles = vec![
            c(100, 90, 95, 96, 10),
            c(105, 95, 96, 100, 10),
            c(120, 100, 105, 110, 10),
            c(105, 95, 110, 100, 10),
            c(100, 90, 100, 95, 10),
        ];
        let swings = find_swing_points(&candles, 2);
        assert!(swings.is_empty());
    }

    #[test]
    fn bullish_fvg_requires_gap_between_outer_candles() {
        let candles = vec![
            c(100, 90, 95, 98, 10),
            c(115, 105, 106, 112, 10),
            c(130, 120, 121, 128, 10),
        ];
        let gaps = find_fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].side, Side::Bullish);
        assert_eq!(gaps[0].bottom, dec!(100));
        assert_eq!(gaps[0].top, dec!(120));
    }

    #[test]
    fn no_fvg_when_candles_overlap() {
        let candles = vec![
            c(100, 90, 95, 98, 10),
            c(105, 95, 96, 100, 10),
            c(110, 98, 99, 105, 10),
        ];
        assert!(find_fair_value_gaps(&candles).is_empty());
    }

    #[test]
    fn order_block_requires_elevated_volume() {
        let mut candles = vec![c(100, 90, 95, 92, 10); 5];
        for (i, candle) in candles.iter_mut().enumerate() {
            candle.timestamp = i as i64;
        }
        candles.push(Candle::new(
            "BTC-USD",
            Timeframe::OneHour,
            5,
            dec!(95),
            dec!(96),
            dec!(88),
            dec!(89),
            dec!(1),
            "hyperliquid",
        )
        .unwrap());
        candles.push(Candle::new(
            "BTC-USD",
            Timeframe::OneHour,
            6,
            dec!(89),
            dec!(110),
            dec!(89),
            dec!(108),
            dec!(1),
            "hyperliquid",
        )
        .unwrap());
        let blocks = find_order_blocks(&candles, 5);
        assert!(blocks.is_empty(), "low volume bearish candle should not form an OB");
    }
}
