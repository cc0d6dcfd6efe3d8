//! Bulk-load a CSV file of OHLCV candles into the candle repository,
//! writing any rows that fail validation to a dead-letter JSONL file.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use confluence_engine::application::bootstrap::AppContext;
use confluence_engine::application::market_data::csv_importer::{dead_letters_to_jsonl, import_csv};
use confluence_engine::config::Config;
use confluence_engine::domain::market::timeframe::Timeframe;
use confluence_engine::domain::repositories::CandleRepository;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Import a CSV of OHLCV candles into the candle repository")]
struct Cli {
    /// Path to the CSV file, with header `time,open,high,low,close[,volume]`.
    path: String,

    /// Symbol every row in the file belongs to, e.g. "BTC-USD".
    #[arg(long, default_value = "BTC-USD")]
    symbol: String,

    /// Timeframe every row in the file belongs to, e.g. "1h", "15m", "1d".
    #[arg(long, default_value = "1h")]
    timeframe: String,

    /// Source tag stamped onto every imported candle.
    #[arg(long, default_value = "csv")]
    source: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    if dotenvy::from_filename(".env").is_err() {
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();
    let timeframe = Timeframe::from_str(&cli.timeframe)
        .with_context(|| format!("unrecognized timeframe '{}'", cli.timeframe))?;

    let bytes = std::fs::read(&cli.path).with_context(|| format!("reading {}", cli.path))?;
    let result = import_csv(&bytes, &cli.symbol, timeframe, &cli.source);

    if !result.dead_letters.is_empty() {
        let run_id = Utc::now().timestamp();
        let dlq_path = format!("dlq-{run_id}.jsonl");
        std::fs::write(&dlq_path, dead_letters_to_jsonl(&result.dead_letters))
            .with_context(|| format!("writing {dlq_path}"))?;
        warn!(
            rejected = result.dead_letters.len(),
            path = %dlq_path,
            "some rows failed to parse or validate"
        );
    }

    if result.candles.is_empty() {
        info!("no valid candles to import");
        return Ok(());
    }

    let config = Config::from_env().context("loading configuration")?;
    let ctx = AppContext::bootstrap(&config).await?;
    ctx.candles
        .upsert_many(&result.candles)
        .await
        .context("persisting imported candles")?;

    info!(imported = result.candles.len(), "candles imported");
    Ok(())
}
