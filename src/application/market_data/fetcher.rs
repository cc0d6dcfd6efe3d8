//! Drives an `ExchangeClient` to backfill candles up to "now", advancing
//! the sync cursor as pages complete.
//!
//! Grounded on the retry/backoff idiom in `infrastructure/binance/execution.rs`
//! and the paginated historical-bars calls in `application/benchmarking/engine.rs`.

use crate::application::market_data::sync_state::{SyncGuard, SyncKey, SyncStateError, SyncStateRepository};
use crate::domain::errors::CoreError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::infrastructure::exchange::ExchangeClient;
use std::sync::Arc;
use tracing::info;

pub struct MarketDataFetcher {
    exchange: Arc<dyn ExchangeClient>,
    sync_state: Arc<dyn SyncStateRepository>,
    sync_guard: Arc<SyncGuard>,
}

#[derive(Debug)]
pub enum FetchError {
    AlreadySyncing(SyncStateError),
    Exchange(CoreError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::AlreadySyncing(e) => write!(f, "{e}"),
            FetchError::Exchange(e) => write!(f, "{e}"),
        }
    }
}

impl MarketDataFetcher {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        sync_state: Arc<dyn SyncStateRepository>,
        sync_guard: Arc<SyncGuard>,
    ) -> Self {
        Self {
            exchange,
            sync_state,
            sync_guard,
        }
    }

    /// Fetch every candle between the last-recorded cursor (or `default_start_ms`
    /// if none exists yet) and `now_ms`, advancing the cursor on success.
    pub async fn sync(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        default_start_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        let key = SyncKey {
            symbol: symbol.to_string(),
            timeframe,
            source: "hyperliquid".to_string(),
        };
        let lease = self
            .sync_guard
            .begin(key.clone())
            .map_err(FetchError::AlreadySyncing)?;

        let start_ms = self
            .sync_state
            .get_cursor(&key)
            .await
            .unwrap_or(default_start_ms);

        info!(symbol, %timeframe, start_ms, now_ms, "syncing candles");
        let candles = self
            .exchange
            .fetch_candles(symbol, timeframe, start_ms, now_ms)
            .await
            .map_err(FetchError::Exchange)?;

        if let Some(last) = candles.last() {
            self.sync_state.set_cursor(&key, last.end_timestamp() * 1000).await;
        }
        drop(lease);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::market_data::sync_state::InMemorySyncStateRepository;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubExchange {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn fetch_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            start_ms: i64,
            _end_ms: i64,
        ) -> Result<Vec<Candle>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Candle::new(
                symbol,
                timeframe,
                start_ms / 1000,
                dec!(100),
                dec!(101),
                dec!(99),
                dec!(100),
                dec!(1),
                "hyperliquid",
            )
            .unwrap()])
        }
    }

    #[tokio::test]
    async fn sync_advances_cursor_for_next_call() {
        let exchange = Arc::new(StubExchange {
            calls: AtomicUsize::new(0),
        });
        let sync_state = Arc::new(InMemorySyncStateRepository::new());
        let guard = Arc::new(SyncGuard::new());
        let fetcher = MarketDataFetcher::new(exchange, sync_state.clone(), guard);

        let candles = fetcher.sync("BTC-USD", Timeframe::OneMin, 0, 60_000).await.unwrap();
        assert_eq!(candles.len(), 1);

        let key = SyncKey {
            symbol: "BTC-USD".to_string(),
            timeframe: Timeframe::OneMin,
            source: "hyperliquid".to_string(),
        };
        assert_eq!(sync_state.get_cursor(&key).await, Some(60_000));
    }
}
