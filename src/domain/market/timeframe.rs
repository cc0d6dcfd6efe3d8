//! Candle timeframes and their relationships.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("unrecognized timeframe: {0}")]
    Unrecognized(String),
}

/// A candle period, from one minute up to one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    TwoHour,
    FourHour,
    EightHour,
    TwelveHour,
    OneDay,
    ThreeDay,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::OneMin,
        Timeframe::ThreeMin,
        Timeframe::FiveMin,
        Timeframe::FifteenMin,
        Timeframe::ThirtyMin,
        Timeframe::OneHour,
        Timeframe::TwoHour,
        Timeframe::FourHour,
        Timeframe::EightHour,
        Timeframe::TwelveHour,
        Timeframe::OneDay,
        Timeframe::ThreeDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Duration of one candle of this timeframe, in seconds. `OneMonth` uses
    /// the calendar convention of 30 days; callers needing exact month
    /// boundaries should align on day boundaries separately.
    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::OneMin => 60,
            Timeframe::ThreeMin => 3 * 60,
            Timeframe::FiveMin => 5 * 60,
            Timeframe::FifteenMin => 15 * 60,
            Timeframe::ThirtyMin => 30 * 60,
            Timeframe::OneHour => 60 * 60,
            Timeframe::TwoHour => 2 * 60 * 60,
            Timeframe::FourHour => 4 * 60 * 60,
            Timeframe::EightHour => 8 * 60 * 60,
            Timeframe::TwelveHour => 12 * 60 * 60,
            Timeframe::OneDay => 24 * 60 * 60,
            Timeframe::ThreeDay => 3 * 24 * 60 * 60,
            Timeframe::OneWeek => 7 * 24 * 60 * 60,
            Timeframe::OneMonth => 30 * 24 * 60 * 60,
        }
    }

    /// The next larger timeframe this one rolls up into, if any base
    /// timeframe evenly divides into it. Used to pick a resample target.
    pub fn parent_of(&self) -> Option<Timeframe> {
        match self {
            Timeframe::OneMin => Some(Timeframe::ThreeMin),
            Timeframe::ThreeMin => Some(Timeframe::FifteenMin),
            Timeframe::FiveMin => Some(Timeframe::FifteenMin),
            Timeframe::FifteenMin => Some(Timeframe::ThirtyMin),
            Timeframe::ThirtyMin => Some(Timeframe::OneHour),
            Timeframe::OneHour => Some(Timeframe::TwoHour),
            Timeframe::TwoHour => Some(Timeframe::FourHour),
            Timeframe::FourHour => Some(Timeframe::EightHour),
            Timeframe::EightHour => Some(Timeframe::TwelveHour),
            Timeframe::TwelveHour => Some(Timeframe::OneDay),
            Timeframe::OneDay => Some(Timeframe::ThreeDay),
            Timeframe::ThreeDay => Some(Timeframe::OneWeek),
            Timeframe::OneWeek => Some(Timeframe::OneMonth),
            Timeframe::OneMonth => None,
        }
    }

    /// True if `self` candles aggregate evenly into `other` without a
    /// remainder (e.g. FiveMin into OneHour: 12 candles).
    pub fn divides_into(&self, other: Timeframe) -> bool {
        other.duration_secs() > self.duration_secs()
            && other.duration_secs() % self.duration_secs() == 0
    }

    /// Number of `self`-sized candles in one `other`-sized candle.
    pub fn candles_per(&self, other: Timeframe) -> Option<i64> {
        if self.divides_into(other) {
            Some(other.duration_secs() / self.duration_secs())
        } else {
            None
        }
    }

    /// The exchange interval string Hyperliquid's `candleSnapshot` endpoint
    /// expects (e.g. "1m", "4h", "1d").
    pub fn exchange_interval(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::ThreeMin => "3m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHour => "2h",
            Timeframe::FourHour => "4h",
            Timeframe::EightHour => "8h",
            Timeframe::TwelveHour => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDay => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }

    /// Floor a unix timestamp (seconds) to the start of its candle bucket.
    pub fn align(&self, unix_secs: i64) -> i64 {
        let d = self.duration_secs();
        unix_secs - unix_secs.rem_euclid(d)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exchange_interval())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for tf in Timeframe::ALL {
            if tf.exchange_interval() == s {
                return Ok(tf);
            }
        }
        Err(TimeframeError::Unrecognized(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_min_divides_into_one_hour() {
        assert_eq!(
            Timeframe::FiveMin.candles_per(Timeframe::OneHour),
            Some(12)
        );
    }

    #[test]
    fn one_hour_does_not_divide_into_five_min() {
        assert!(!Timeframe::OneHour.divides_into(Timeframe::FiveMin));
    }

    #[test]
    fn round_trips_through_exchange_interval() {
        for tf in Timeframe::ALL {
            let s = tf.exchange_interval();
            assert_eq!(Timeframe::from_str(s).unwrap(), tf);
        }
    }

    #[test]
    fn align_floors_to_bucket_start() {
        assert_eq!(Timeframe::FiveMin.align(301), 300);
        assert_eq!(Timeframe::FiveMin.align(299), 0);
    }

    #[test]
    fn unrecognized_string_errors() {
        assert!(Timeframe::from_str("7q").is_err());
    }
}
