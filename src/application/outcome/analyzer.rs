//! Outcome analysis and the confidence feedback loop.
//!
//! Grounded on `domain/performance/performance_evaluator.rs`'s threshold-
//! triggered evaluation and on `strategy_refiner.rs`'s bucket-stats/edge
//! adjustment loop (`alvinyakatoribot-boop-ict-trading-bot-rs`), adapted
//! from that crate's scale/session buckets to grouping by strategy rule
//! name and confluence quality bucket.

use crate::domain::learning::{BucketStats, LearningInsight, OutcomeAnalysis, SetupValidity};
use crate::domain::market::confluence::ConfluenceQuality;
use crate::domain::trading::strategy_rule::StrategyRule;
use crate::domain::trading::trade::{ExitReason, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

const MIN_SAMPLE_SIZE: usize = 10;
const CONFIDENCE_STEP: f64 = 0.05;
const CONFIDENCE_FLOOR: f64 = 0.3;
const CONFIDENCE_CEILING: f64 = 0.95;
const SMOOTHED_CONFIDENCE_FLOOR: Decimal = dec!(0.1);
const SMOOTHED_CONFIDENCE_CEILING: Decimal = dec!(0.95);
const MAX_TRADES_FOR_FULL_WEIGHT: Decimal = dec!(20);
const MAX_SMOOTHING_WEIGHT: Decimal = dec!(0.9);

pub struct OutcomeAnalyzer {
    min_sample: usize,
}

impl Default for OutcomeAnalyzer {
    fn default() -> Self {
        Self {
            min_sample: MIN_SAMPLE_SIZE,
        }
    }
}

impl OutcomeAnalyzer {
    pub fn new(min_sample: usize) -> Self {
        Self { min_sample }
    }

    /// Bucket closed trades by `(strategy_name, confluence quality)` and
    /// compute win/edge stats per bucket. `qualities` must align 1:1 with
    /// `trades` (the confluence bucket the entry signal scored into).
    pub fn bucket_stats(&self, trades: &[Trade], qualities: &[ConfluenceQuality]) -> HashMap<(String, ConfluenceQuality), BucketStats> {
        let mut buckets: HashMap<(String, ConfluenceQuality), Vec<&Trade>> = HashMap::new();
        for (trade, quality) in trades.iter().zip(qualities.iter()) {
            buckets
                .entry((trade.strategy_name.clone(), *quality))
                .or_default()
                .push(trade);
        }

        buckets
            .into_iter()
            .map(|(key, group)| {
                let total = group.len();
                let wins = group.iter().filter(|t| t.realized_pnl > Decimal::ZERO).count();
                let r_sum: f64 = group
                    .iter()
                    .filter_map(|t| t.r_multiple())
                    .filter_map(|r| r.to_f64())
                    .sum();
                let edge = if total == 0 { 0.0 } else { r_sum / total as f64 };
                (
                    key,
                    BucketStats {
                        total,
                        wins,
                        edge,
                        sample_sufficient: total >= self.min_sample,
                    },
                )
            })
            .collect()
    }

    /// Turn bucket stats into confidence-adjustment recommendations: a
    /// bucket with a negative edge recommends raising the confidence bar
    /// (trade it less often), a strongly positive edge recommends lowering
    /// it (trade it more often). Buckets without enough samples are
    /// skipped rather than acted on.
    pub fn analyze(&self, trades: &[Trade], qualities: &[ConfluenceQuality]) -> Vec<LearningInsight> {
        let stats = self.bucket_stats(trades, qualities);
        let mut insights = Vec::new();

        for ((rule_name, quality), bucket) in stats {
            if !bucket.sample_sufficient {
                continue;
            }
            let delta = if bucket.edge < 0.0 {
                CONFIDENCE_STEP
            } else if bucket.edge > 0.5 {
                -CONFIDENCE_STEP
            } else {
                continue;
            };
            let reason = format!(
                "{rule_name} at {quality:?} quality: edge={:+.3} over {} trades",
                bucket.edge, bucket.total
            );
            insights.push(LearningInsight {
                rule_name,
                quality,
                stats: bucket,
                recommended_confidence_delta: delta,
                reason,
            });
        }

        insights
    }

    /// Apply a recommended delta to a current confidence value, clamped to
    /// `[CONFIDENCE_FLOOR, CONFIDENCE_CEILING]`.
    pub fn apply_confidence_delta(&self, current: f64, delta: f64) -> f64 {
        (current + delta).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
    }

    /// Run the per-terminal-trade feedback step: produce an `OutcomeAnalysis`
    /// for the trade, fold it into the strategy rule's running statistics,
    /// and update the rule's smoothed confidence in place. Called once per
    /// trade as it closes.
    pub fn analyze_trade(&self, trade: &Trade, rule: &mut StrategyRule) -> OutcomeAnalysis {
        let analysis = Self::classify_outcome(trade);

        let prev_count = Decimal::from(rule.trade_count);
        let won = trade.realized_pnl > Decimal::ZERO;
        let prev_win_rate = rule.win_rate.unwrap_or(Decimal::ZERO);
        let won_value = if won { Decimal::ONE } else { Decimal::ZERO };
        let new_win_rate = incremental_mean(prev_win_rate, prev_count, won_value);

        let r = trade.r_multiple().unwrap_or(Decimal::ZERO);
        let prev_avg_r = rule.avg_r_multiple.unwrap_or(Decimal::ZERO);
        let new_avg_r = incremental_mean(prev_avg_r, prev_count, r);

        rule.trade_count += 1;
        rule.win_rate = Some(new_win_rate);
        rule.avg_r_multiple = Some(new_avg_r);

        let validity_factor = analysis.setup_validity.factor();
        let perf_factor = Decimal::from(analysis.performance_rating) / dec!(5);
        let new_eff = dec!(0.6) * new_win_rate * validity_factor + dec!(0.4) * perf_factor;
        let weight = (Decimal::from(rule.trade_count) / MAX_TRADES_FOR_FULL_WEIGHT).min(MAX_SMOOTHING_WEIGHT);
        let updated_confidence = weight * rule.confidence + (Decimal::ONE - weight) * new_eff;
        rule.confidence = updated_confidence.clamp(SMOOTHED_CONFIDENCE_FLOOR, SMOOTHED_CONFIDENCE_CEILING);

        analysis
    }

    /// Rule-based heuristic standing in for the optional LLM-assisted
    /// variant: rating is driven by R-multiple, validity by how the trade
    /// actually exited.
    fn classify_outcome(trade: &Trade) -> OutcomeAnalysis {
        let r = trade.r_multiple().unwrap_or(Decimal::ZERO);
        let performance_rating = if r >= dec!(2) {
            5
        } else if r >= dec!(1) {
            4
        } else if r >= dec!(0) {
            3
        } else if r >= dec!(-1) {
            2
        } else {
            1
        };

        let stopped_out_hard = trade.partial_exits.iter().any(|e| e.reason == ExitReason::StopLoss) && r < dec!(-1);
        let setup_validity = if stopped_out_hard {
            SetupValidity::Invalid
        } else if performance_rating <= 2 {
            SetupValidity::EdgeCase
        } else {
            SetupValidity::Valid
        };

        let mut what_worked = Vec::new();
        let mut what_didnt = Vec::new();
        let mut lessons = Vec::new();

        if trade.partial_exits.iter().any(|e| e.reason == ExitReason::TakeProfit1) {
            what_worked.push("price reached the first target".to_string());
        }
        if trade.partial_exits.iter().any(|e| e.reason == ExitReason::TakeProfit3) {
            what_worked.push("the full target run played out".to_string());
        }
        if trade.partial_exits.iter().any(|e| e.reason == ExitReason::StopLoss) {
            what_didnt.push("the stop was hit before a target".to_string());
            if r < dec!(-1) {
                lessons.push("the stop sat further from entry than intended for this setup".to_string());
            }
        }
        if what_worked.is_empty() && setup_validity != SetupValidity::Invalid {
            what_worked.push("trade closed without breaching the stop".to_string());
        }
        if lessons.is_empty() {
            lessons.push(format!("observed R-multiple {r:.2} at {setup_validity:?} validity"));
        }

        OutcomeAnalysis {
            setup_validity,
            performance_rating,
            what_worked,
            what_didnt,
            lessons,
        }
    }
}

fn incremental_mean(prev_mean: Decimal, prev_count: Decimal, new_value: Decimal) -> Decimal {
    if prev_count.is_zero() {
        return new_value;
    }
    (prev_mean * prev_count + new_value) / (prev_count + Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::trade::ExitReason;
    use crate::domain::trading::types::OrderSide;
    use rust_decimal_macros::dec;

    fn trade(strategy: &str, pnl: Decimal) -> Trade {
        let mut t = Trade::open("1", "BTC-USD", OrderSide::Buy, strategy, dec!(100), dec!(1), 0, "entry");
        t.stop_loss = Some(dec!(90));
        t.apply_exit(ExitReason::TakeProfit1, dec!(100) + pnl, dec!(1), 1);
        t
    }

    #[test]
    fn negative_edge_bucket_recommends_raising_confidence_bar() {
        let analyzer = OutcomeAnalyzer::new(3);
        let trades: Vec<Trade> = (0..5).map(|_| trade("smc-breakout", dec!(-5))).collect();
        let qualities = vec![ConfluenceQuality::Medium; 5];
        let insights = analyzer.analyze(&trades, &qualities);
        assert_eq!(insights.len(), 1);
        assert!(insights[0].recommended_confidence_delta > 0.0);
    }

    #[test]
    fn insufficient_sample_produces_no_insight() {
        let analyzer = OutcomeAnalyzer::new(10);
        let trades: Vec<Trade> = (0..3).map(|_| trade("smc-breakout", dec!(-5))).collect();
        let qualities = vec![ConfluenceQuality::Medium; 3];
        assert!(analyzer.analyze(&trades, &qualities).is_empty());
    }

    #[test]
    fn confidence_delta_clamps_to_floor_and_ceiling() {
        let analyzer = OutcomeAnalyzer::default();
        assert_eq!(analyzer.apply_confidence_delta(0.32, -0.1), CONFIDENCE_FLOOR);
        assert_eq!(analyzer.apply_confidence_delta(0.93, 0.1), CONFIDENCE_CEILING);
    }

    fn rule() -> StrategyRule {
        StrategyRule::new("rule-1", "smc-breakout", "breakout", Vec::new())
    }

    #[test]
    fn analyze_trade_updates_strategy_statistics() {
        let analyzer = OutcomeAnalyzer::default();
        let mut r = rule();
        let t = trade("smc-breakout", dec!(20));
        analyzer.analyze_trade(&t, &mut r);
        assert_eq!(r.trade_count, 1);
        assert_eq!(r.win_rate, Some(Decimal::ONE));
        assert!(r.avg_r_multiple.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn analyze_trade_rates_a_strong_winner_highly_and_marks_it_valid() {
        let analyzer = OutcomeAnalyzer::default();
        let mut r = rule();
        // entry 100, stop 90 => risk 10/unit; exit at +20 => R = 2.0.
        let t = trade("smc-breakout", dec!(20));
        let analysis = analyzer.analyze_trade(&t, &mut r);
        assert_eq!(analysis.performance_rating, 5);
        assert_eq!(analysis.setup_validity, SetupValidity::Valid);
        assert!(!analysis.what_worked.is_empty());
    }

    #[test]
    fn analyze_trade_marks_a_deep_stop_out_invalid() {
        let analyzer = OutcomeAnalyzer::default();
        let mut r = rule();
        let mut t = Trade::open("1", "BTC-USD", OrderSide::Buy, "smc-breakout", dec!(100), dec!(1), 0, "entry");
        t.stop_loss = Some(dec!(90));
        t.apply_exit(ExitReason::StopLoss, dec!(80), dec!(1), 1);
        let analysis = analyzer.analyze_trade(&t, &mut r);
        assert_eq!(analysis.setup_validity, SetupValidity::Invalid);
        assert_eq!(analysis.performance_rating, 1);
        assert!(!analysis.what_didnt.is_empty());
    }

    #[test]
    fn smoothed_confidence_stays_within_bounds_and_trends_with_performance() {
        let analyzer = OutcomeAnalyzer::default();
        let mut r = rule();
        r.confidence = dec!(0.5);
        for _ in 0..25 {
            let t = trade("smc-breakout", dec!(20));
            analyzer.analyze_trade(&t, &mut r);
        }
        assert!(r.confidence >= dec!(0.1) && r.confidence <= dec!(0.95));
        assert!(r.confidence > dec!(0.5));
        assert_eq!(r.trade_count, 25);
    }
}
