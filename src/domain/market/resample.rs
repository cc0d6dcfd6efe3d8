//! Aggregates base-timeframe candles up into a coarser timeframe.
//!
//! Grounded on `TimeframeCandle::update`'s open-stays/high-max/low-min/
//! volume-sum aggregation idiom, generalized to operate over a whole slice
//! rather than one candle at a time.

use super::candle::{Candle, CandleError};
use super::timeframe::Timeframe;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResampleError {
    #[error("source timeframe {from} does not evenly divide into {to}")]
    IncompatibleTimeframes { from: Timeframe, to: Timeframe },
    #[error(transparent)]
    Candle(#[from] CandleError),
}

/// Merge candles from `candles` (assumed single symbol/source, all on
/// `from`) into bars of `to`. Input need not be perfectly sorted; each
/// candle is grouped into the `to`-bucket its timestamp falls in and
/// buckets are emitted oldest-first, sorting members within a bucket by
/// timestamp before reading the bucket's open/close.
///
/// Gaps inside a bucket are tolerated: a bucket missing a base candle
/// mid-stream is still aggregated over whatever members are present.
/// Only the most recent (trailing) bucket is dropped when it is short of
/// `from.candles_per(to)` members, since that one may simply not have
/// closed yet (the caller re-requests it once more data has arrived).
pub fn resample(
    candles: &[Candle],
    from: Timeframe,
    to: Timeframe,
) -> Result<Vec<Candle>, ResampleError> {
    let expected = from
        .candles_per(to)
        .ok_or(ResampleError::IncompatibleTimeframes { from, to })?;

    let mut buckets: BTreeMap<i64, Vec<&Candle>> = BTreeMap::new();
    for c in candles {
        buckets.entry(to.align(c.timestamp)).or_default().push(c);
    }

    let last_bucket_start = buckets.keys().next_back().copied();
    let mut out = Vec::with_capacity(buckets.len());
    for (bucket_start, mut members) in buckets {
        if Some(bucket_start) == last_bucket_start && (members.len() as i64) < expected {
            continue;
        }
        members.sort_by_key(|c| c.timestamp);
        out.push(merge(members, bucket_start, to)?);
    }

    Ok(out)
}

fn merge(members: Vec<&Candle>, bucket_start: i64, to: Timeframe) -> Result<Candle, CandleError> {
    let first = members[0];
    let last = members[members.len() - 1];
    let high = members.iter().map(|c| c.high).max().unwrap();
    let low = members.iter().map(|c| c.low).min().unwrap();
    let volume = members.iter().map(|c| c.volume).sum();

    Candle::new(
        first.symbol.clone(),
        to,
        bucket_start,
        first.open,
        high,
        low,
        last.close,
        volume,
        first.source.clone(),
    )
}

/// True if exactly one complete bucket of `from` candles exists at the
/// front of `candles` for target timeframe `to`.
pub fn get_candle_at(candles: &[Candle], from: Timeframe, to: Timeframe) -> Option<Candle> {
    resample(candles, from, to).ok().and_then(|mut v| {
        if v.is_empty() {
            None
        } else {
            Some(v.remove(0))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn c(ts: i64, o: i64, h: i64, l: i64, cl: i64, v: i64) -> Candle {
        Candle::new(
            "BTC-USD",
            Timeframe::FiveMin,
            ts,
            rust_decimal::Decimal::from(o),
            rust_decimal::Decimal::from(h),
            rust_decimal::Decimal::from(l),
            rust_decimal::Decimal::from(cl),
            rust_decimal::Decimal::from(v),
            "hyperliquid",
        )
        .unwrap()
    }

    #[test]
    fn twelve_five_min_candles_fold_into_one_hour() {
        let candles: Vec<Candle> = (0..12).map(|i| c(i * 300, 100, 110, 90, 105, 10)).collect();
        let hourly = resample(&candles, Timeframe::FiveMin, Timeframe::OneHour).unwrap();
        assert_eq!(hourly.len(), 1);
        let bar = &hourly[0];
        assert_eq!(bar.timeframe, Timeframe::OneHour);
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.close, dec!(105));
        assert_eq!(bar.high, dec!(110));
        assert_eq!(bar.low, dec!(90));
        assert_eq!(bar.volume, dec!(120));
        assert_eq!(bar.timestamp, 0);
    }

    #[test]
    fn incomplete_trailing_bucket_is_dropped() {
        let candles: Vec<Candle> = (0..10).map(|i| c(i * 300, 100, 110, 90, 105, 10)).collect();
        let hourly = resample(&candles, Timeframe::FiveMin, Timeframe::OneHour).unwrap();
        assert!(hourly.is_empty());
    }

    #[test]
    fn a_gap_mid_stream_is_aggregated_over_present_members_only() {
        let mut candles: Vec<Candle> = (0..24).map(|i| c(i * 300, 100, 110, 90, 105, 10)).collect();
        candles.remove(5); // drop one candle from the first hourly bucket
        let hourly = resample(&candles, Timeframe::FiveMin, Timeframe::OneHour).unwrap();
        // first bucket is short one member but is not trailing, so it's still emitted
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].volume, dec!(110));
        assert_eq!(hourly[1].volume, dec!(120));
    }

    #[test]
    fn out_of_order_candles_are_sorted_within_their_bucket() {
        let mut candles: Vec<Candle> = (0..12).map(|i| c(i * 300, 100, 110, 90, 105, 10)).collect();
        candles.swap(0, 11);
        let hourly = resample(&candles, Timeframe::FiveMin, Timeframe::OneHour).unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].timestamp, 0);
    }

    #[test]
    fn incompatible_timeframes_error() {
        let candles = vec![c(0, 100, 110, 90, 105, 10)];
        let err = resample(&candles, Timeframe::OneHour, Timeframe::FiveMin).unwrap_err();
        assert_eq!(
            err,
            ResampleError::IncompatibleTimeframes {
                from: Timeframe::OneHour,
                to: Timeframe::FiveMin
            }
        );
    }
}
