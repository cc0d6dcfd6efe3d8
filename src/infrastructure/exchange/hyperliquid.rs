//! Hyperliquid `candleSnapshot` client: historical-candle fetch with
//! pagination, 429 backoff and sliding-window rate limiting.
//!
//! Grounded on `infrastructure::binance::execution`'s retry/backoff idiom
//! (`HttpClientFactory`-built client, `tracing` around each request) and
//! confirmed against `original_source/.../hyperliquid/rate_limiter.py` for
//! the wire shape (`startMs`/`endMs`, string-encoded OHLCV, 500-candle
//! page cap, `429` + `Retry-After`).

use super::ExchangeClient;
use crate::application::market_data::rate_limiter::RateLimiter;
use crate::domain::errors::CoreError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::infrastructure::http_client_factory::HttpClientFactory;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CANDLES_PER_PAGE: usize = 500;
const SOURCE: &str = "hyperliquid";

#[derive(Debug, Deserialize)]
struct RawCandle {
    #[serde(rename = "t")]
    open_ms: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
}

pub struct HyperliquidClient {
    client: ClientWithMiddleware,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl HyperliquidClient {
    pub fn new(base_url: impl Into<String>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into(),
            rate_limiter,
        }
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<RawCandle>, CoreError> {
        self.rate_limiter.acquire().await;

        let body = serde_json::json!({
            "type": "candleSnapshot",
            "req": {
                "coin": symbol,
                "interval": interval,
                "startTime": start_ms,
                "endTime": end_ms,
            }
        });

        let response = self
            .client
            .post(format!("{}/info", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("candleSnapshot request failed: {e}")))?;

        if response.status().as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            warn!(retry_after, "hyperliquid rate limited us despite headroom");
            return Err(CoreError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            return Err(CoreError::Permanent(format!(
                "candleSnapshot returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<RawCandle>>()
            .await
            .map_err(|e| CoreError::Permanent(format!("malformed candleSnapshot body: {e}")))
    }
}

#[async_trait]
impl ExchangeClient for HyperliquidClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, CoreError> {
        let interval = timeframe.exchange_interval();
        let page_span_ms = timeframe.duration_secs() * 1000 * CANDLES_PER_PAGE as i64;

        let mut out = Vec::new();
        let mut cursor = start_ms;
        while cursor < end_ms {
            let page_end = (cursor + page_span_ms).min(end_ms);
            debug!(symbol, interval, cursor, page_end, "fetching candle page");

            let raw = match self.fetch_page(symbol, interval, cursor, page_end).await {
                Ok(raw) => raw,
                Err(CoreError::RateLimited { retry_after_secs }) => {
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                    self.fetch_page(symbol, interval, cursor, page_end).await?
                }
                Err(e) => return Err(e),
            };

            if raw.is_empty() {
                break;
            }
            for rc in &raw {
                out.push(to_candle(rc, timeframe)?);
            }
            cursor = page_end;
        }
        Ok(out)
    }
}

fn to_candle(raw: &RawCandle, timeframe: Timeframe) -> Result<Candle, CoreError> {
    let parse = |s: &str| -> Result<Decimal, CoreError> {
        Decimal::from_str(s).map_err(|e| CoreError::Permanent(format!("bad decimal {s}: {e}")))
    };
    Candle::new(
        raw.symbol.clone(),
        timeframe,
        raw.open_ms / 1000,
        parse(&raw.open)?,
        parse(&raw.high)?,
        parse(&raw.low)?,
        parse(&raw.close)?,
        parse(&raw.volume)?,
        SOURCE,
    )
    .map_err(|e| CoreError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_encoded_ohlcv() {
        let raw = RawCandle {
            open_ms: 60_000,
            symbol: "BTC".to_string(),
            open: "100.5".to_string(),
            high: "101.0".to_string(),
            low: "99.5".to_string(),
            close: "100.8".to_string(),
            volume: "12.34".to_string(),
        };
        let candle = to_candle(&raw, Timeframe::OneMin).unwrap();
        assert_eq!(candle.timestamp, 60);
        assert_eq!(candle.open, Decimal::from_str("100.5").unwrap());
        assert_eq!(candle.source, "hyperliquid");
    }

    #[test]
    fn rejects_malformed_decimal() {
        let raw = RawCandle {
            open_ms: 0,
            symbol: "BTC".to_string(),
            open: "not-a-number".to_string(),
            high: "1".to_string(),
            low: "1".to_string(),
            close: "1".to_string(),
            volume: "1".to_string(),
        };
        assert!(to_candle(&raw, Timeframe::OneMin).is_err());
    }
}
