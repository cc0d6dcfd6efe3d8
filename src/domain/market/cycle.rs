//! Market cycle classification: drive / range / liquidity-sweep phases over
//! a trailing window of candles.
//!
//! Grounded directly on `market_regime`'s `MarketRegimeDetector` (a
//! window-sized classifier turning rolling statistical features into a
//! confidence-scored regime); re-fielded to the drive/range/liquidity
//! vocabulary and thresholds used by the rest of this crate's detectors and
//! given a rolling `ClassificationHistory` and `get_recommendation`.

use super::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Drive,
    Range,
    LiquiditySweep,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub net_move_pct: Decimal,
    pub avg_true_range_pct: Decimal,
    pub directional_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCycle {
    pub phase: CyclePhase,
    pub confidence: Decimal,
    pub metrics: CycleMetrics,
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationHistory {
    pub cycles: Vec<MarketCycle>,
}

impl ClassificationHistory {
    pub fn push(&mut self, cycle: MarketCycle) {
        self.cycles.push(cycle);
    }

    pub fn latest(&self) -> Option<&MarketCycle> {
        self.cycles.last()
    }

    /// True if the last `n` classifications agree on phase.
    pub fn is_stable(&self, n: usize) -> bool {
        if self.cycles.len() < n || n == 0 {
            return false;
        }
        let tail = &self.cycles[self.cycles.len() - n..];
        let first = tail[0].phase;
        tail.iter().all(|c| c.phase == first)
    }
}

pub struct CycleClassifier {
    window: usize,
    drive_directional_ratio: Decimal,
    sweep_range_multiple: Decimal,
}

impl CycleClassifier {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            drive_directional_ratio: dec!(0.65),
            sweep_range_multiple: dec!(2.0),
        }
    }

    /// Classify the cycle phase of `candles[..=index]`'s trailing window.
    pub fn classify(&self, candles: &[Candle], index: usize) -> MarketCycle {
        if index + 1 < self.window {
            return MarketCycle {
                phase: CyclePhase::Unknown,
                confidence: Decimal::ZERO,
                metrics: CycleMetrics {
                    net_move_pct: Decimal::ZERO,
                    avg_true_range_pct: Decimal::ZERO,
                    directional_ratio: Decimal::ZERO,
                },
                index,
            };
        }
        let start = index + 1 - self.window;
        let window = &candles[start..=index];
        let metrics = compute_metrics(window);

        let (phase, confidence) = if metrics.avg_true_range_pct.is_zero() {
            (CyclePhase::Unknown, Decimal::ZERO)
        } else if window
            .last()
            .map(|c| {
                let range = c.range();
                range > Decimal::ZERO
                    && range
                        > window_avg_range(window) * self.sweep_range_multiple
            })
            .unwrap_or(false)
        {
            (CyclePhase::LiquiditySweep, dec!(0.7))
        } else if metrics.directional_ratio >= self.drive_directional_ratio {
            (CyclePhase::Drive, metrics.directional_ratio)
        } else {
            (
                CyclePhase::Range,
                Decimal::ONE - metrics.directional_ratio,
            )
        };

        MarketCycle {
            phase,
            confidence: confidence.clamp(Decimal::ZERO, Decimal::ONE),
            metrics,
            index,
        }
    }

    /// Suggested posture given the classified phase, used by signal
    /// generation to bias toward breakout vs. mean-reversion setups.
    pub fn get_recommendation(&self, cycle: &MarketCycle) -> &'static str {
        match cycle.phase {
            CyclePhase::Drive => "favor trend-continuation entries",
            CyclePhase::Range => "favor mean-reversion entries at zone edges",
            CyclePhase::LiquiditySweep => "wait for structure confirmation before entering",
            CyclePhase::Unknown => "insufficient data, stand aside",
        }
    }
}

fn window_avg_range(window: &[Candle]) -> Decimal {
    if window.is_empty() {
        return Decimal::ZERO;
    }
    window.iter().map(|c| c.range()).sum::<Decimal>() / Decimal::from(window.len())
}

fn compute_metrics(window: &[Candle]) -> CycleMetrics {
    let first = &window[0];
    let last = &window[window.len() - 1];
    let net_move = last.close - first.open;
    let net_move_pct = if first.open.is_zero() {
        Decimal::ZERO
    } else {
        (net_move / first.open).abs()
    };

    let avg_range = window_avg_range(window);
    let avg_true_range_pct = if first.open.is_zero() {
        Decimal::ZERO
    } else {
        avg_range / first.open
    };

    let sum_range: Decimal = window.iter().map(|c| c.range()).sum();
    let directional_ratio = if sum_range.is_zero() {
        Decimal::ZERO
    } else {
        (net_move.abs() / sum_range).min(Decimal::ONE)
    };

    CycleMetrics {
        net_move_pct,
        avg_true_range_pct,
        directional_ratio,
    }
}
