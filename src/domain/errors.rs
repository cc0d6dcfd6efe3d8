use thiserror::Error;
use rust_decimal::Decimal;

/// Errors related to trading operations and portfolio management
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Insufficient funds: need ${need}, available ${available}")]
    InsufficientFunds { need: Decimal, available: Decimal },
    
    #[error("Position not found: {symbol}")]
    PositionNotFound { symbol: String },
    
    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },
    
    #[error("Order execution failed: {reason}")]
    ExecutionFailed { reason: String },
}

/// Errors related to risk management violations
#[derive(Debug, Error)]
pub enum RiskViolation {
    #[error("Position size limit exceeded for {symbol}: {current_pct:.2}% > {max_pct:.2}%")]
    PositionSizeLimit {
        symbol: String,
        current_pct: f64,
        max_pct: f64,
    },
    
    #[error("Daily loss limit breached: {loss_pct:.2}% > {limit_pct:.2}%")]
    DailyLossLimit { loss_pct: f64, limit_pct: f64 },
    
    #[error("Maximum drawdown exceeded: {drawdown_pct:.2}% > {max_pct:.2}%")]
    MaxDrawdown { drawdown_pct: f64, max_pct: f64 },
    
    #[error("Sector exposure limit for {sector}: {current_pct:.2}% > {max_pct:.2}%")]
    SectorExposureLimit {
        sector: String,
        current_pct: f64,
        max_pct: f64,
    },
    
    #[error("PDT protection: {day_trades} day trades with equity ${equity} < $25,000")]
    PdtProtection { day_trades: u64, equity: Decimal },
    
    #[error("Consecutive loss limit reached: {count} losses")]
    ConsecutiveLossLimit { count: usize },
}

/// Errors related to market data and connectivity
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },
    
    #[error("Invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },
    
    #[error("Service timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    
    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
}

/// Errors related to portfolio state management
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("Portfolio snapshot is stale: age {age_ms}ms > limit {limit_ms}ms")]
    StaleSnapshot { age_ms: u64, limit_ms: u64 },
    
    #[error("Version conflict: expected v{expected}, got v{actual}")]
    VersionConflict { expected: u64, actual: u64 },
    
    #[error("Exposure reservation failed for {symbol}: {reason}")]
    ReservationFailed { symbol: String, reason: String },
    
    #[error("Failed to refresh portfolio state: {reason}")]
    RefreshFailed { reason: String },
}

/// Unified error taxonomy for the confluence engine's own modules
/// (market analysis, signal generation, risk, backtest, outcome feedback).
/// Grouped by kind rather than by subsystem, matching how callers actually
/// branch: a caller cares whether an error is retryable, not which struct
/// raised it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transient failure, retry may succeed: {0}")]
    Transient(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("rejected by risk manager: {0}")]
    RiskRejected(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("concurrent modification conflict: {0}")]
    Concurrency(String),

    #[error("LLM unavailable, falling back to rule-based path: {0}")]
    LlmFallback(String),
}

impl CoreError {
    /// Transient and rate-limited errors are safe for a caller to retry
    /// (after backing off); everything else requires operator attention
    /// or a code change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::RateLimited { .. })
    }
}

#[cfg(test)]
mod core_error_tests {
    use super::*;

    #[test]
    fn transient_and_rate_limited_are_retryable() {
        assert!(CoreError::Transient("timeout".into()).is_retryable());
        assert!(CoreError::RateLimited { retry_after_secs: 5 }.is_retryable());
    }

    #[test]
    fn validation_and_permanent_are_not_retryable() {
        assert!(!CoreError::Validation("bad input".into()).is_retryable());
        assert!(!CoreError::Permanent("disk full".into()).is_retryable());
    }
}
