//! Ties the standalone candle detectors (pattern/structure/zone/cycle)
//! together with the confluence scorer into a single "is there a signal on
//! this bar" decision.
//!
//! No direct teacher analog: the teacher's `application/strategies/*`
//! modules each decide on their own indicator set. Grounded on
//! `domain::market::confluence::ConfluenceScorer`'s composition idiom (C7)
//! and `domain::trading::signal::Signal`'s builder (C8), generalized into
//! the coordinator a strategy rule and a candle window actually need.

use crate::config::{ConfluenceWeightsConfig, DetectorConfig, SignalConfig};
use crate::domain::market::candle::Candle;
use crate::domain::market::confluence::{ConfluenceScorer, ConfluenceWeights};
use crate::domain::market::cycle::CycleClassifier;
use crate::domain::market::structure::{self, BreakKind, Trend};
use crate::domain::market::zone;
use crate::domain::market::{cycle::CyclePhase, pattern};
use crate::domain::trading::signal::Signal;
use crate::domain::trading::types::OrderSide;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub struct SignalPipeline {
    scorer: ConfluenceScorer,
    cycle_classifier: CycleClassifier,
    signal: SignalConfig,
    detector: DetectorConfig,
}

impl SignalPipeline {
    pub fn new(signal: SignalConfig, confluence: ConfluenceWeightsConfig, detector: DetectorConfig) -> Self {
        let weights = ConfluenceWeights {
            pattern: decimal_from_f64(confluence.pattern),
            structure: decimal_from_f64(confluence.structure),
            cycle: decimal_from_f64(confluence.cycle),
            zone: decimal_from_f64(confluence.zone),
            timeframe_alignment: decimal_from_f64(confluence.timeframe),
        };
        Self {
            scorer: ConfluenceScorer::new(weights),
            cycle_classifier: CycleClassifier::new(detector.lookback),
            signal,
            detector,
        }
    }

    /// Evaluate the window ending at `index`, returning a `Signal` when the
    /// combined evidence clears `min_confluence_score`. Only ever proposes
    /// an entry in the direction of the most recent structure break; with
    /// no break yet (too little history) there is nothing to trade.
    pub fn evaluate(&self, candles: &[Candle], index: usize) -> Option<Signal> {
        if index < self.detector.lookback {
            return None;
        }
        let window = &candles[..=index];
        let candle = &candles[index];

        let swings = structure::find_swing_points(window, 2);
        let breaks = structure::detect_breaks(window, &swings);
        let latest_break = breaks.last();
        let order_blocks = structure::find_order_blocks(window, self.detector.lookback);
        let patterns = pattern::detect_all(window);
        let cycle = self.cycle_classifier.classify(window, index);

        let swing_prices: Vec<(usize, Decimal)> = swings.iter().map(|s| (s.index, s.price)).collect();
        let zones = zone::detect_zones(window, &swing_prices, decimal_from_f64(self.detector.zone_merge_threshold));
        let nearest_zone = zone::find_nearest(&zones, candle.close);

        let score = self.scorer.score(
            &patterns,
            latest_break,
            &order_blocks,
            &cycle,
            nearest_zone,
            0,
            0,
            candle.timeframe,
            None,
        );

        if score.total.to_f64().unwrap_or(0.0) < self.signal.min_confluence_score {
            return None;
        }
        if cycle.phase == CyclePhase::Range {
            return None;
        }

        let latest_break = latest_break?;
        let side = match latest_break.new_trend {
            Trend::Bullish => OrderSide::Buy,
            Trend::Bearish => OrderSide::Sell,
        };
        let reason = match latest_break.kind {
            BreakKind::BreakOfStructure => "break of structure",
            BreakKind::ChangeOfCharacter => "change of character",
        };

        let atr = average_true_range(window, self.detector.lookback.min(14));
        let stop_distance = if self.signal.use_atr_stops {
            atr * decimal_from_f64(self.signal.atr_multiplier)
        } else {
            candle.close * decimal_from_f64(self.signal.max_stop_loss_percent)
        };
        if stop_distance.is_zero() {
            return None;
        }

        let (stop_loss, tp1, tp2, tp3) = match side {
            OrderSide::Buy => (
                candle.close - stop_distance,
                candle.close + stop_distance * decimal_from_f64(self.signal.min_risk_reward),
                candle.close + stop_distance * decimal_from_f64(self.signal.min_risk_reward) * dec!(2),
                candle.close + stop_distance * decimal_from_f64(self.signal.min_risk_reward) * dec!(3),
            ),
            OrderSide::Sell => (
                candle.close + stop_distance,
                candle.close - stop_distance * decimal_from_f64(self.signal.min_risk_reward),
                candle.close - stop_distance * decimal_from_f64(self.signal.min_risk_reward) * dec!(2),
                candle.close - stop_distance * decimal_from_f64(self.signal.min_risk_reward) * dec!(3),
            ),
        };

        Some(
            Signal::new(candle.symbol.clone(), side, reason, candle.close, candle.timestamp)
                .with_confidence(score.total)
                .with_stop_loss(stop_loss)
                .with_take_profits(tp1, tp2, tp3)
                .with_confluence(score),
        )
    }
}

fn average_true_range(candles: &[Candle], period: usize) -> Decimal {
    let start = candles.len().saturating_sub(period);
    let window = &candles[start..];
    if window.len() < 2 {
        return Decimal::ZERO;
    }
    let mut sum = Decimal::ZERO;
    for pair in window.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let tr = (curr.high - curr.low)
            .max((curr.high - prev.close).abs())
            .max((curr.low - prev.close).abs());
        sum += tr;
    }
    sum / Decimal::from(window.len() as u64 - 1)
}

fn decimal_from_f64(v: f64) -> Decimal {
    Decimal::try_from(v).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::candle::Candle;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(i: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle::new("BTC-USD".to_string(), Timeframe::OneHour, i, open, high, low, close, dec!(100), "test").unwrap()
    }

    #[test]
    fn too_little_history_returns_none() {
        let pipeline = SignalPipeline::new(SignalConfig::default(), ConfluenceWeightsConfig::default(), DetectorConfig::default());
        let candles = vec![candle(0, dec!(100), dec!(101), dec!(99), dec!(100))];
        assert!(pipeline.evaluate(&candles, 0).is_none());
    }

    #[test]
    fn flat_market_produces_no_signal() {
        let detector = DetectorConfig { lookback: 5, ..DetectorConfig::default() };
        let pipeline = SignalPipeline::new(SignalConfig::default(), ConfluenceWeightsConfig::default(), detector);
        let candles: Vec<Candle> = (0..20).map(|i| candle(i, dec!(100), dec!(100.5), dec!(99.5), dec!(100))).collect();
        assert!(pipeline.evaluate(&candles, 19).is_none());
    }
}
