//! Confluence scoring: combine pattern/structure/cycle/zone evidence into a
//! single bounded score with a quality bucket.
//!
//! New composition struct; grounded on the teacher's "coordinator composes
//! named sub-services and combines their outputs" idiom, as seen in
//! `application/risk_management/risk_manager.rs`.

use super::cycle::{CyclePhase, MarketCycle};
use super::pattern::DetectedPattern;
use super::structure::{BreakKind, OrderBlock, StructureBreak, Trend};
use super::timeframe::Timeframe;
use super::zone::SupportResistanceZone;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfluenceQuality {
    Low,
    Medium,
    Strong,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryBias {
    Long,
    Short,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceScore {
    pub pattern_score: Decimal,
    pub structure_score: Decimal,
    pub cycle_score: Decimal,
    pub zone_score: Decimal,
    pub timeframe_alignment_score: Decimal,
    pub total: Decimal,
    pub quality: ConfluenceQuality,
    pub entry_bias: EntryBias,
    /// Human-readable reasons that contributed to `total`.
    pub factors: Vec<String>,
    /// Conflicts or low-data conditions the caller should weigh before
    /// acting on the score.
    pub warnings: Vec<String>,
    pub htf_timeframe: Option<Timeframe>,
    pub entry_timeframe: Timeframe,
}

/// Weights sum to 1; each sub-score is normalized to [0, 1] before being
/// combined so `total` is itself bounded to [0, 1].
pub struct ConfluenceWeights {
    pub pattern: Decimal,
    pub structure: Decimal,
    pub cycle: Decimal,
    pub zone: Decimal,
    pub timeframe_alignment: Decimal,
}

impl Default for ConfluenceWeights {
    fn default() -> Self {
        Self {
            pattern: dec!(0.30),
            structure: dec!(0.25),
            cycle: dec!(0.15),
            zone: dec!(0.10),
            timeframe_alignment: dec!(0.20),
        }
    }
}

pub struct ConfluenceScorer {
    weights: ConfluenceWeights,
}

impl ConfluenceScorer {
    pub fn new(weights: ConfluenceWeights) -> Self {
        Self { weights }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn score(
        &self,
        patterns: &[DetectedPattern],
        latest_break: Option<&StructureBreak>,
        order_blocks: &[OrderBlock],
        cycle: &MarketCycle,
        nearest_zone: Option<&SupportResistanceZone>,
        aligned_timeframe_count: u32,
        total_timeframe_count: u32,
        entry_timeframe: Timeframe,
        htf_timeframe: Option<Timeframe>,
    ) -> ConfluenceScore {
        let mut factors = Vec::new();
        let mut warnings = Vec::new();

        let pattern_score = patterns
            .iter()
            .map(|p| p.strength)
            .fold(Decimal::ZERO, Decimal::max)
            .min(Decimal::ONE);
        if pattern_score > Decimal::ZERO {
            factors.push(format!("pattern evidence (best strength {pattern_score})"));
        }

        let structure_score = latest_break
            .map(|b| {
                let base = b.significance.min(Decimal::ONE);
                match b.kind {
                    BreakKind::BreakOfStructure => base,
                    BreakKind::ChangeOfCharacter => (base * dec!(1.2)).min(Decimal::ONE),
                }
            })
            .unwrap_or(Decimal::ZERO)
            .max(unmitigated_ob_score(order_blocks));
        if let Some(b) = latest_break {
            factors.push(format!("{:?} toward {:?}", b.kind, b.new_trend));
        }
        if order_blocks.iter().any(|ob| !ob.mitigated) {
            factors.push("unmitigated order block nearby".to_string());
        }

        let cycle_score = match cycle.phase {
            CyclePhase::Drive => cycle.confidence,
            CyclePhase::LiquiditySweep => cycle.confidence * dec!(0.8),
            CyclePhase::Range => cycle.confidence * dec!(0.4),
            CyclePhase::Unknown => Decimal::ZERO,
        };
        if cycle.phase == CyclePhase::Range {
            warnings.push("market cycle is ranging".to_string());
        }

        let zone_score = nearest_zone
            .map(|z| match z.touch_count {
                0..=1 => dec!(0.3),
                2..=3 => dec!(0.6),
                _ => dec!(0.9),
            })
            .unwrap_or(Decimal::ZERO);
        if let Some(z) = nearest_zone {
            factors.push(format!("{:?} zone tested {} time(s)", z.strength, z.touch_count));
        }

        let timeframe_alignment_score = if total_timeframe_count == 0 {
            warnings.push("no timeframe alignment data supplied".to_string());
            Decimal::ZERO
        } else {
            Decimal::from(aligned_timeframe_count) / Decimal::from(total_timeframe_count)
        };
        if total_timeframe_count > 0 && aligned_timeframe_count < total_timeframe_count {
            warnings.push(format!(
                "only {aligned_timeframe_count}/{total_timeframe_count} timeframes aligned"
            ));
        }

        let total = pattern_score * self.weights.pattern
            + structure_score * self.weights.structure
            + cycle_score * self.weights.cycle
            + zone_score * self.weights.zone
            + timeframe_alignment_score * self.weights.timeframe_alignment;

        let entry_bias = match latest_break.map(|b| b.new_trend) {
            Some(Trend::Bullish) => EntryBias::Long,
            Some(Trend::Bearish) => EntryBias::Short,
            None => EntryBias::None,
        };

        ConfluenceScore {
            pattern_score,
            structure_score,
            cycle_score,
            zone_score,
            timeframe_alignment_score,
            total,
            quality: classify(total),
            entry_bias,
            factors,
            warnings,
            htf_timeframe,
            entry_timeframe,
        }
    }
}

fn unmitigated_ob_score(order_blocks: &[OrderBlock]) -> Decimal {
    if order_blocks.iter().any(|ob| !ob.mitigated) {
        dec!(0.5)
    } else {
        Decimal::ZERO
    }
}

/// Buckets `[0.65, 0.75)` strong, `[0.75, 1.0]` excellent (the top tier
/// collapses two spec-named bands — see DESIGN.md's quality-variant note).
fn classify(total: Decimal) -> ConfluenceQuality {
    if total >= dec!(0.75) {
        ConfluenceQuality::Excellent
    } else if total >= dec!(0.65) {
        ConfluenceQuality::Strong
    } else if total >= dec!(0.35) {
        ConfluenceQuality::Medium
    } else {
        ConfluenceQuality::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::cycle::CycleMetrics;

    fn cycle(phase: CyclePhase, confidence: Decimal) -> MarketCycle {
        MarketCycle {
            phase,
            confidence,
            metrics: CycleMetrics {
                net_move_pct: Decimal::ZERO,
                avg_true_range_pct: Decimal::ZERO,
                directional_ratio: Decimal::ZERO,
            },
            index: 0,
        }
    }

    #[test]
    fn full_alignment_and_drive_scores_high() {
        let scorer = ConfluenceScorer::new(ConfluenceWeights::default());
        let score = scorer.score(
            &[],
            None,
            &[],
            &cycle(CyclePhase::Drive, dec!(1)),
            None,
            3,
            3,
            Timeframe::OneHour,
            None,
        );
        assert_eq!(score.quality, ConfluenceQuality::Medium);
        assert!(score.total > Decimal::ZERO);
        assert_eq!(score.entry_bias, EntryBias::None);
    }

    #[test]
    fn no_evidence_scores_low() {
        let scorer = ConfluenceScorer::new(ConfluenceWeights::default());
        let score = scorer.score(
            &[],
            None,
            &[],
            &cycle(CyclePhase::Unknown, Decimal::ZERO),
            None,
            0,
            3,
            Timeframe::OneHour,
            None,
        );
        assert_eq!(score.total, Decimal::ZERO);
        assert_eq!(score.quality, ConfluenceQuality::Low);
        assert!(score.warnings.iter().any(|w| w.contains("no timeframe alignment data")));
    }

    #[test]
    fn total_never_exceeds_one() {
        let scorer = ConfluenceScorer::new(ConfluenceWeights::default());
        let score = scorer.score(
            &[DetectedPattern {
                kind: crate::domain::market::pattern::PatternKind::Strong,
                signal: crate::domain::market::pattern::PatternSignal::Bullish,
                strength: dec!(1),
                candle_index: 0,
                description: String::new(),
                metadata: std::collections::HashMap::new(),
            }],
            None,
            &[],
            &cycle(CyclePhase::Drive, dec!(1)),
            None,
            5,
            5,
            Timeframe::OneHour,
            None,
        );
        assert!(score.total <= Decimal::ONE);
    }

    #[test]
    fn bullish_break_sets_long_entry_bias() {
        use crate::domain::market::structure::{BreakKind, Trend};

        let scorer = ConfluenceScorer::new(ConfluenceWeights::default());
        let brk = StructureBreak {
            kind: BreakKind::BreakOfStructure,
            new_trend: Trend::Bullish,
            index: 0,
            broken_swing_price: dec!(100),
            significance: dec!(0.5),
        };
        let score = scorer.score(
            &[],
            Some(&brk),
            &[],
            &cycle(CyclePhase::Drive, dec!(1)),
            None,
            1,
            1,
            Timeframe::OneHour,
            None,
        );
        assert_eq!(score.entry_bias, EntryBias::Long);
        assert!(score.factors.iter().any(|f| f.contains("BreakOfStructure")));
    }
}
