//! Entities produced by the outcome-analysis feedback loop.
//!
//! Kept in the domain layer (rather than alongside the analyzer that
//! produces them) so the persistence trait in `repositories.rs` can
//! reference them without an application → domain layering violation.

use crate::domain::market::confluence::ConfluenceQuality;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How closely a closed trade's setup held up against the strategy rule
/// that proposed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupValidity {
    Valid,
    EdgeCase,
    Invalid,
}

impl SetupValidity {
    pub fn factor(self) -> Decimal {
        match self {
            SetupValidity::Valid => dec!(1.0),
            SetupValidity::EdgeCase => dec!(0.9),
            SetupValidity::Invalid => dec!(0.7),
        }
    }
}

/// Per-trade post-mortem produced immediately after a trade closes, feeding
/// both the strategy's running statistics and its smoothed confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeAnalysis {
    pub setup_validity: SetupValidity,
    /// 1..=5.
    pub performance_rating: u8,
    pub what_worked: Vec<String>,
    pub what_didnt: Vec<String>,
    pub lessons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: usize,
    pub wins: usize,
    pub edge: f64,
    pub sample_sufficient: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningInsight {
    pub rule_name: String,
    pub quality: ConfluenceQuality,
    pub stats: BucketStats,
    pub recommended_confidence_delta: f64,
    pub reason: String,
}
