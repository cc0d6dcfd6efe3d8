//! Single- and multi-candle price-action patterns.
//!
//! Grounded on `smc.rs`'s ratio-based candle analysis (body/range/wick
//! ratios against `Decimal` thresholds), generalized from "detect FVG/OB
//! only" to the full single/two-candle pattern table.

use super::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    LeCandle,
    SmallWick,
    SteeperWick,
    Celery,
    Doji,
    Hammer,
    ShootingStar,
    InvertedHammer,
    PinBar,
    Strong,
    Engulfing,
    InsideBar,
    OutsideBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSignal {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub signal: PatternSignal,
    /// How cleanly the candle(s) fit the shape, in (0, 1].
    pub strength: Decimal,
    /// Index of the defining (for single-candle patterns) or last (for
    /// two-candle patterns) candle.
    pub candle_index: usize,
    pub description: String,
    pub metadata: HashMap<String, Decimal>,
}

const LE_BODY_MIN: Decimal = dec!(0.80);
const LE_WICK_MAX: Decimal = dec!(0.10);
const SMALL_WICK_MAX: Decimal = dec!(0.02);
const SMALL_WICK_BODY_MIN: Decimal = dec!(0.70);
const STEEPER_WICK_MIN: Decimal = dec!(0.60);
const STEEPER_OPPOSITE_MAX: Decimal = dec!(0.20);
const CELERY_BODY_MAX: Decimal = dec!(0.20);
const CELERY_WICK_MIN: Decimal = dec!(0.30);
const DOJI_BODY_MAX: Decimal = dec!(0.10);
const HAMMER_WICK_MIN: Decimal = dec!(0.55);
const HAMMER_BODY_MAX: Decimal = dec!(0.40);
const SHOOTING_STAR_WICK_MIN: Decimal = dec!(0.60);
const INVERTED_HAMMER_WICK_MIN: Decimal = dec!(0.50);
const INVERTED_HAMMER_WICK_MAX: Decimal = dec!(0.60);
const PIN_BAR_WICK_MIN: Decimal = dec!(0.65);
const STRONG_BODY_MIN: Decimal = dec!(0.70);

/// Scan `candles` for every pattern this module knows about, returning
/// matches in the order their defining candle appears. Within a candle,
/// pin-bar is emitted ahead of hammer/shooting-star so callers that only
/// want the strictest classification can take the first match.
pub fn detect_all(candles: &[Candle]) -> Vec<DetectedPattern> {
    let mut matches = Vec::new();
    for i in 0..candles.len() {
        matches.extend(detect_single(candles, i));
        if i >= 1 {
            matches.extend(detect_two(candles, i));
        }
    }
    matches
}

fn metadata(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn body_direction(c: &Candle) -> PatternSignal {
    if c.close > c.open {
        PatternSignal::Bullish
    } else if c.close < c.open {
        PatternSignal::Bearish
    } else {
        PatternSignal::Neutral
    }
}

fn detect_single(candles: &[Candle], i: usize) -> Vec<DetectedPattern> {
    let c = &candles[i];
    let range = c.range();
    if range.is_zero() {
        return Vec::new();
    }
    let body_ratio = c.body_ratio();
    let upper = c.upper_wick() / range;
    let lower = c.lower_wick() / range;
    let meta = metadata(&[("body_ratio", body_ratio), ("upper_wick_ratio", upper), ("lower_wick_ratio", lower)]);

    let mut out = Vec::new();

    // Pin bar is the strict form of hammer/shooting-star, so it is checked
    // (and pushed) before them to honor the precedence tests expect.
    let long_wick = lower.max(upper);
    if long_wick >= PIN_BAR_WICK_MIN && body_ratio <= HAMMER_BODY_MAX {
        let signal = if lower > upper { PatternSignal::Bullish } else { PatternSignal::Bearish };
        out.push(DetectedPattern {
            kind: PatternKind::PinBar,
            signal,
            strength: long_wick.min(Decimal::ONE),
            candle_index: i,
            description: "stricter hammer/shooting-star with a dominant wick".into(),
            metadata: meta.clone(),
        });
    }

    if lower >= HAMMER_WICK_MIN && body_ratio <= HAMMER_BODY_MAX {
        out.push(DetectedPattern {
            kind: PatternKind::Hammer,
            signal: PatternSignal::Bullish,
            strength: lower.min(Decimal::ONE),
            candle_index: i,
            description: "long lower wick rejects lower prices".into(),
            metadata: meta.clone(),
        });
    }
    if upper >= SHOOTING_STAR_WICK_MIN && body_ratio <= HAMMER_BODY_MAX {
        out.push(DetectedPattern {
            kind: PatternKind::ShootingStar,
            signal: PatternSignal::Bearish,
            strength: upper.min(Decimal::ONE),
            candle_index: i,
            description: "long upper wick rejects higher prices".into(),
            metadata: meta.clone(),
        });
    }
    if (INVERTED_HAMMER_WICK_MIN..=INVERTED_HAMMER_WICK_MAX).contains(&upper) && lower <= SMALL_WICK_MAX {
        out.push(DetectedPattern {
            kind: PatternKind::InvertedHammer,
            signal: PatternSignal::Bullish,
            strength: upper.min(Decimal::ONE),
            candle_index: i,
            description: "upper wick in the inverted-hammer band with a small lower wick".into(),
            metadata: meta.clone(),
        });
    }

    if body_ratio >= LE_BODY_MIN && upper <= LE_WICK_MAX && lower <= LE_WICK_MAX {
        out.push(DetectedPattern {
            kind: PatternKind::LeCandle,
            signal: body_direction(c),
            strength: body_ratio.min(Decimal::ONE),
            candle_index: i,
            description: "large body, negligible wicks on either side".into(),
            metadata: meta.clone(),
        });
    }
    if body_ratio > STRONG_BODY_MIN {
        out.push(DetectedPattern {
            kind: PatternKind::Strong,
            signal: body_direction(c),
            strength: body_ratio.min(Decimal::ONE),
            candle_index: i,
            description: "body dominates the candle's range".into(),
            metadata: meta.clone(),
        });
    }
    if lower.min(upper) <= SMALL_WICK_MAX && body_ratio >= SMALL_WICK_BODY_MIN {
        out.push(DetectedPattern {
            kind: PatternKind::SmallWick,
            signal: body_direction(c),
            strength: body_ratio.min(Decimal::ONE),
            candle_index: i,
            description: "one wick is negligible and the body dominates".into(),
            metadata: meta.clone(),
        });
    }
    if long_wick >= STEEPER_WICK_MIN && lower.min(upper) <= STEEPER_OPPOSITE_MAX {
        let signal = if lower > upper { PatternSignal::Bullish } else { PatternSignal::Bearish };
        out.push(DetectedPattern {
            kind: PatternKind::SteeperWick,
            signal,
            strength: long_wick.min(Decimal::ONE),
            candle_index: i,
            description: "one wick clearly dominates the other".into(),
            metadata: meta.clone(),
        });
    }
    if body_ratio < CELERY_BODY_MAX && lower >= CELERY_WICK_MIN && upper >= CELERY_WICK_MIN {
        out.push(DetectedPattern {
            kind: PatternKind::Celery,
            signal: PatternSignal::Neutral,
            strength: (Decimal::ONE - body_ratio).min(Decimal::ONE),
            candle_index: i,
            description: "tiny body with wicks on both sides".into(),
            metadata: meta.clone(),
        });
    }
    if body_ratio < DOJI_BODY_MAX {
        out.push(DetectedPattern {
            kind: PatternKind::Doji,
            signal: PatternSignal::Neutral,
            strength: (Decimal::ONE - body_ratio).min(Decimal::ONE),
            candle_index: i,
            description: "open and close are nearly identical".into(),
            metadata: meta,
        });
    }

    out
}

fn detect_two(candles: &[Candle], i: usize) -> Vec<DetectedPattern> {
    let prev = &candles[i - 1];
    let cur = &candles[i];
    let mut out = Vec::new();

    if prev.is_bearish() && cur.is_bullish() && body_encloses(cur, prev) {
        out.push(DetectedPattern {
            kind: PatternKind::Engulfing,
            signal: PatternSignal::Bullish,
            strength: engulf_strength(prev, cur),
            candle_index: i,
            description: "bullish body strictly encloses the prior bearish body".into(),
            metadata: HashMap::new(),
        });
    }
    if prev.is_bullish() && cur.is_bearish() && body_encloses(cur, prev) {
        out.push(DetectedPattern {
            kind: PatternKind::Engulfing,
            signal: PatternSignal::Bearish,
            strength: engulf_strength(prev, cur),
            candle_index: i,
            description: "bearish body strictly encloses the prior bullish body".into(),
            metadata: HashMap::new(),
        });
    }

    if cur.high <= prev.high && cur.low >= prev.low {
        out.push(DetectedPattern {
            kind: PatternKind::InsideBar,
            signal: PatternSignal::Neutral,
            strength: containment_strength(cur, prev),
            candle_index: i,
            description: "range is fully contained within the prior candle's range".into(),
            metadata: HashMap::new(),
        });
    }
    if cur.high > prev.high && cur.low < prev.low {
        out.push(DetectedPattern {
            kind: PatternKind::OutsideBar,
            signal: body_direction(cur),
            strength: containment_strength(prev, cur),
            candle_index: i,
            description: "range fully contains the prior candle's range".into(),
            metadata: HashMap::new(),
        });
    }

    out
}

fn body_encloses(cur: &Candle, prev: &Candle) -> bool {
    let cur_min = cur.open.min(cur.close);
    let cur_max = cur.open.max(cur.close);
    let prev_min = prev.open.min(prev.close);
    let prev_max = prev.open.max(prev.close);
    cur_min < prev_min && cur_max > prev_max
}

fn engulf_strength(prev: &Candle, cur: &Candle) -> Decimal {
    let prev_body = prev.body().max(Decimal::new(1, 8));
    (cur.body() / prev_body).min(Decimal::ONE)
}

/// How much smaller `inner`'s range is than `outer`'s, as a [0, 1] measure
/// of how cleanly one contains the other.
fn containment_strength(inner: &Candle, outer: &Candle) -> Decimal {
    let outer_range = outer.range().max(Decimal::new(1, 8));
    (Decimal::ONE - inner.range() / outer_range).clamp(Decimal::ZERO, Decimal::ONE)
}
