//! Exchange client abstraction.
//!
//! Generalizes the teacher's per-venue modules (`infrastructure::alpaca`,
//! `infrastructure::binance`, each exposing their own place/cancel/query
//! methods) into one `ExchangeClient` trait with a single concrete
//! implementation for this crate's target venue.

pub mod hyperliquid;

use crate::domain::errors::CoreError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use async_trait::async_trait;

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch historical candles for `symbol`/`timeframe` in `[start_ms, end_ms)`,
    /// paging internally if the venue caps the batch size.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, CoreError>;
}
