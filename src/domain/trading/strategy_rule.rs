//! Strategy rules: a named, versioned set of tagged `Condition`s that must
//! all hold for a signal to fire.
//!
//! Re-architected per the spec's explicit call to replace a dynamic
//! parameter dictionary with a closed, tagged-variant condition model —
//! `Condition{field, op, value}` instead of a `HashMap<String, Value>` the
//! original source used for strategy parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    ConfluenceTotal,
    PatternScore,
    StructureScore,
    CycleScore,
    ZoneScore,
    TimeframeAlignmentScore,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}

/// The value a `Condition` compares an observation against. `In` takes a
/// list of decimals; `Contains` only ever applies to strings, so a
/// `Decimal` condition using it never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(Decimal),
    Text(String),
    List(Vec<Decimal>),
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Number(value)
    }
}

/// What a condition is evaluated against: either a decimal reading off the
/// signal context, or a string (for `contains`/`eq` on text fields like
/// setup names).
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Number(Decimal),
    Text(String),
}

impl From<Decimal> for Observation {
    fn from(value: Decimal) -> Self {
        Observation::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub op: Op,
    pub value: Scalar,
}

impl Condition {
    pub fn new(field: Field, op: Op, value: impl Into<Scalar>) -> Self {
        Self { field, op, value: value.into() }
    }

    /// Evaluation is total and typed: a mismatched op/value/observation
    /// combination (e.g. `Contains` against a `Number`) simply fails to
    /// match rather than panicking.
    pub fn evaluate(&self, observed: &Observation) -> bool {
        match (&self.op, observed, &self.value) {
            (Op::Eq, Observation::Number(o), Scalar::Number(v)) => o == v,
            (Op::Eq, Observation::Text(o), Scalar::Text(v)) => o == v,
            (Op::Ne, Observation::Number(o), Scalar::Number(v)) => o != v,
            (Op::Ne, Observation::Text(o), Scalar::Text(v)) => o != v,
            (Op::Gt, Observation::Number(o), Scalar::Number(v)) => o > v,
            (Op::Gte, Observation::Number(o), Scalar::Number(v)) => o >= v,
            (Op::Lt, Observation::Number(o), Scalar::Number(v)) => o < v,
            (Op::Lte, Observation::Number(o), Scalar::Number(v)) => o <= v,
            (Op::In, Observation::Number(o), Scalar::List(values)) => values.contains(o),
            (Op::Contains, Observation::Text(o), Scalar::Text(v)) => o.contains(v.as_str()),
            _ => false,
        }
    }
}

/// Risk parameters a matched rule supplies to the trade reasoner: caps and
/// defaults it can override from the global signal config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub max_stop_loss_percent: Decimal,
    pub min_risk_reward: Decimal,
    pub position_size_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRule {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub entry_type: String,
    pub conditions: Vec<Condition>,
    pub confluence_required: Vec<String>,
    pub risk_params: RiskParams,
    /// Running confidence, mutated only by the outcome analyzer after a
    /// trade closes.
    pub confidence: Decimal,
    pub trade_count: u64,
    pub win_rate: Option<Decimal>,
    pub avg_r_multiple: Option<Decimal>,
    pub enabled: bool,
}

impl StrategyRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, entry_type: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: 1,
            entry_type: entry_type.into(),
            conditions,
            confluence_required: Vec::new(),
            risk_params: RiskParams {
                max_stop_loss_percent: Decimal::new(3, 2),
                min_risk_reward: Decimal::new(15, 1),
                position_size_percent: Decimal::new(1, 2),
            },
            confidence: Decimal::new(5, 1),
            trade_count: 0,
            win_rate: None,
            avg_r_multiple: None,
            enabled: true,
        }
    }

    /// A rule fires only if it's enabled and every condition holds against
    /// the matching observed value in `observations`.
    pub fn matches<F>(&self, observe: F) -> bool
    where
        F: Fn(Field) -> Option<Observation>,
    {
        self.enabled
            && self
                .conditions
                .iter()
                .all(|c| observe(c.field).map(|o| c.evaluate(&o)).unwrap_or(false))
    }
}
