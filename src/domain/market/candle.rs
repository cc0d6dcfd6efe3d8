//! The OHLCV candle: the base unit every higher-level module operates on.

use super::timeframe::Timeframe;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandleError {
    #[error("high {high} is below low {low}")]
    HighBelowLow { high: Decimal, low: Decimal },
    #[error("open {open} outside [low, high] = [{low}, {high}]")]
    OpenOutOfRange {
        open: Decimal,
        low: Decimal,
        high: Decimal,
    },
    #[error("close {close} outside [low, high] = [{low}, {high}]")]
    CloseOutOfRange {
        close: Decimal,
        low: Decimal,
        high: Decimal,
    },
    #[error("negative volume: {0}")]
    NegativeVolume(Decimal),
    #[error("non-positive price: {0}")]
    NonPositivePrice(Decimal),
    #[error("timestamp {timestamp} is in the future (now={now})")]
    FutureTimestamp { timestamp: i64, now: i64 },
}

/// A single OHLCV bar for one symbol, timeframe and timestamp.
///
/// `source` distinguishes the provenance of a candle (`"hyperliquid"`,
/// `"csv"`, ...) so the same symbol/timeframe/timestamp key can carry
/// independently-ingested data without clobbering another source's candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub source: String,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        source: impl Into<String>,
    ) -> Result<Self, CandleError> {
        let candle = Self {
            symbol: symbol.into(),
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            source: source.into(),
        };
        candle.validate()?;
        Ok(candle)
    }

    pub fn validate(&self) -> Result<(), CandleError> {
        if self.high < self.low {
            return Err(CandleError::HighBelowLow {
                high: self.high,
                low: self.low,
            });
        }
        if self.open < self.low || self.open > self.high {
            return Err(CandleError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }
        if self.close < self.low || self.close > self.high {
            return Err(CandleError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(CandleError::NegativeVolume(self.volume));
        }
        for price in [self.open, self.high, self.low, self.close] {
            if price <= Decimal::ZERO {
                return Err(CandleError::NonPositivePrice(price));
            }
        }
        let now = Utc::now().timestamp();
        if self.timestamp > now {
            return Err(CandleError::FutureTimestamp {
                timestamp: self.timestamp,
                now,
            });
        }
        Ok(())
    }

    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn end_timestamp(&self) -> i64 {
        self.timestamp + self.timeframe.duration_secs()
    }

    /// Ratio of body size to full range, in [0, 1]. Doji-like candles with
    /// zero range report 0.
    pub fn body_ratio(&self) -> Decimal {
        let range = self.range();
        if range.is_zero() {
            Decimal::ZERO
        } else {
            self.body() / range
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ok_candle() -> Candle {
        Candle::new(
            "BTC-USD",
            Timeframe::OneMin,
            0,
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(105),
            dec!(10),
            "hyperliquid",
        )
        .unwrap()
    }

    #[test]
    fn rejects_high_below_low() {
        let err = Candle::new(
            "BTC-USD",
            Timeframe::OneMin,
            0,
            dec!(100),
            dec!(90),
            dec!(95),
            dec!(92),
            dec!(1),
            "hyperliquid",
        )
        .unwrap_err();
        assert_eq!(
            err,
            CandleError::HighBelowLow {
                high: dec!(90),
                low: dec!(95)
            }
        );
    }

    #[test]
    fn rejects_negative_volume() {
        let err = Candle::new(
            "BTC-USD",
            Timeframe::OneMin,
            0,
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(105),
            dec!(-1),
            "hyperliquid",
        )
        .unwrap_err();
        assert_eq!(err, CandleError::NegativeVolume(dec!(-1)));
    }

    #[test]
    fn body_and_wicks() {
        let c = ok_candle();
        assert_eq!(c.body(), dec!(5));
        assert_eq!(c.range(), dec!(15));
        assert_eq!(c.upper_wick(), dec!(5));
        assert_eq!(c.lower_wick(), dec!(5));
        assert!(c.is_bullish());
    }

    #[test]
    fn end_timestamp_uses_timeframe_duration() {
        let c = ok_candle();
        assert_eq!(c.end_timestamp(), 60);
    }
}
