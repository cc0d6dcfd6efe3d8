//! Run a deterministic backtest over CSV or exchange-fetched candles and
//! print the resulting metrics.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use confluence_engine::application::backtest::{BacktestConfig, BacktestEngine};
use confluence_engine::application::bootstrap::AppContext;
use confluence_engine::application::market_data::csv_importer::{dead_letters_to_jsonl, import_csv};
use confluence_engine::config::Config;
use confluence_engine::domain::market::timeframe::Timeframe;
use confluence_engine::domain::repositories::CandleRepository;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Replay candles through the confluence signal pipeline and report performance")]
struct Cli {
    /// Symbol to backtest.
    #[arg(long, default_value = "BTC-USD")]
    symbol: String,

    /// Timeframe to replay, e.g. "1h", "15m", "1d".
    #[arg(long, default_value = "1h")]
    timeframe: String,

    /// Load candles from this CSV file instead of the candle repository.
    #[arg(long)]
    csv: Option<String>,

    /// Starting cash for the simulated account.
    #[arg(long)]
    starting_cash: Option<Decimal>,
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
    let config = Config::from_env().context("loading configuration")?;
    let timeframe = parse_timeframe(&cli.timeframe)?;

    let candles = if let Some(path) = &cli.csv {
        let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
        let result = import_csv(&bytes, &cli.symbol, timeframe, "csv");
        if !result.dead_letters.is_empty() {
            let dlq_path = format!("dlq-{}.jsonl", Utc::now().timestamp());
            std::fs::write(&dlq_path, dead_letters_to_jsonl(&result.dead_letters))
                .with_context(|| format!("writing {dlq_path}"))?;
            info!(rejected = result.dead_letters.len(), path = %dlq_path, "wrote dead-letter queue");
        }
        result.candles
    } else {
        let ctx = AppContext::bootstrap(&config).await?;
        let now_ms = Utc::now().timestamp_millis();
        let start_ms = now_ms - Timeframe::OneDay.duration_secs() * 1000 * 365;
        ctx.candles
            .find_range(&cli.symbol, timeframe, "hyperliquid", start_ms, now_ms)
            .await
            .context("loading candles from repository")?
    };

    if candles.is_empty() {
        anyhow::bail!("no candles to backtest; pass --csv or sync candles first");
    }
    info!(count = candles.len(), symbol = %cli.symbol, %timeframe, "replaying candles");

    let mut backtest_config = BacktestConfig {
        starting_cash: config.backtest.initial_capital,
        slippage_pct: Decimal::try_from(config.backtest.slippage_percent).unwrap_or_default(),
        commission_pct: Decimal::try_from(config.backtest.commission_percent).unwrap_or_default(),
        move_stop_to_breakeven_after_tp1: true,
        position_size_percent: Decimal::try_from(config.backtest.position_size_percent).unwrap_or_default(),
        max_open_trades: config.backtest.max_open_trades,
        partial_exit_enabled: config.backtest.partial_exit_enabled,
        tp1_exit_percent: Decimal::try_from(config.backtest.tp1_exit_percent).unwrap_or_default(),
        tp2_exit_percent: Decimal::try_from(config.backtest.tp2_exit_percent).unwrap_or_default(),
    };
    if let Some(cash) = cli.starting_cash {
        backtest_config.starting_cash = cash;
    }

    let pipeline = confluence_engine::application::trading::SignalPipeline::new(
        config.signal.clone(),
        config.confluence.clone(),
        config.detector.clone(),
    );
    let engine = BacktestEngine::new(backtest_config);
    let cancel = Arc::new(AtomicBool::new(false));
    let result = engine.run(&candles, |window, index| pipeline.evaluate(window, index), cancel);

    println!("trades:            {}", result.metrics.total_trades);
    println!("win rate:          {:.2}%", result.metrics.win_rate * Decimal::from(100));
    println!("profit factor:     {}", result.metrics.profit_factor);
    println!("total pnl:         {}", result.metrics.total_pnl);
    println!("avg R-multiple:    {}", result.metrics.average_r_multiple);
    println!("max drawdown:      {:.2}%", result.metrics.max_drawdown_pct * Decimal::from(100));
    println!("sharpe:            {:.3}", result.metrics.sharpe_ratio);
    println!("sortino:           {:.3}", result.metrics.sortino_ratio);
    println!("calmar:            {:.3}", result.metrics.calmar_ratio);

    Ok(())
}

fn parse_timeframe(s: &str) -> Result<Timeframe> {
    Timeframe::from_str(s).with_context(|| format!("unrecognized timeframe '{s}'"))
}
