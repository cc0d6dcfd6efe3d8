//! Backtest performance metrics computed from a closed-trade list and an
//! equity curve.
//!
//! Grounded on `domain::performance::metrics`/`stats` (Sharpe, Sortino,
//! Calmar, drawdown, profit-factor formulas), adapted to operate over this
//! crate's own `Trade`/equity-curve shapes.

use crate::domain::trading::trade::Trade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub total_pnl: Decimal,
    pub average_r_multiple: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
}

/// `equity_curve` must be non-empty and chronologically ordered.
pub fn compute_metrics(trades: &[Trade], equity_curve: &[Decimal]) -> BacktestMetrics {
    let total_trades = trades.len();
    let wins: Vec<&Trade> = trades.iter().filter(|t| t.realized_pnl > Decimal::ZERO).collect();
    let losses: Vec<&Trade> = trades.iter().filter(|t| t.realized_pnl < Decimal::ZERO).collect();

    let win_rate = if total_trades == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(wins.len()) / Decimal::from(total_trades)
    };

    let gross_profit: Decimal = wins.iter().map(|t| t.realized_pnl).sum();
    let gross_loss: Decimal = losses.iter().map(|t| t.realized_pnl.abs()).sum();
    let profit_factor = if gross_loss.is_zero() {
        if gross_profit.is_zero() { Decimal::ZERO } else { Decimal::MAX }
    } else {
        gross_profit / gross_loss
    };

    let total_pnl: Decimal = trades.iter().map(|t| t.realized_pnl).sum();

    let r_multiples: Vec<Decimal> = trades.iter().filter_map(|t| t.r_multiple()).collect();
    let average_r_multiple = if r_multiples.is_empty() {
        Decimal::ZERO
    } else {
        r_multiples.iter().sum::<Decimal>() / Decimal::from(r_multiples.len())
    };

    let max_drawdown_pct = max_drawdown(equity_curve);

    let returns = period_returns(equity_curve);
    let sharpe_ratio = sharpe(&returns);
    let sortino_ratio = sortino(&returns);
    let calmar_ratio = if max_drawdown_pct.is_zero() {
        0.0
    } else {
        annualized_return(equity_curve) / decimal_to_f64(max_drawdown_pct)
    };

    BacktestMetrics {
        total_trades,
        win_rate,
        profit_factor,
        total_pnl,
        average_r_multiple,
        max_drawdown_pct,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
    }
}

fn max_drawdown(equity_curve: &[Decimal]) -> Decimal {
    let mut peak = match equity_curve.first() {
        Some(&v) => v,
        None => return Decimal::ZERO,
    };
    let mut worst = Decimal::ZERO;
    for &point in equity_curve {
        if point > peak {
            peak = point;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - point) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

fn period_returns(equity_curve: &[Decimal]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter_map(|w| {
            if w[0].is_zero() {
                None
            } else {
                Some(decimal_to_f64((w[1] - w[0]) / w[0]))
            }
        })
        .collect()
}

fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.to_vec().mean();
    let std_dev = returns.to_vec().std_dev();
    if std_dev == 0.0 {
        0.0
    } else {
        mean / std_dev * (returns.len() as f64).sqrt()
    }
}

fn sortino(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.to_vec().mean();
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = downside.to_vec().std_dev();
    if downside_dev == 0.0 {
        0.0
    } else {
        mean / downside_dev * (returns.len() as f64).sqrt()
    }
}

fn annualized_return(equity_curve: &[Decimal]) -> f64 {
    let (Some(&first), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if first.is_zero() {
        return 0.0;
    }
    decimal_to_f64((last - first) / first)
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use std::str::FromStr;
    f64::from_str(&d.to_string()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::OrderSide;

    fn winning_trade(pnl: Decimal) -> Trade {
        let mut t = Trade::open("1", "BTC-USD", OrderSide::Buy, "s", dec!(100), dec!(1), 0, "entry");
        t.stop_loss = Some(dec!(90));
        t.apply_exit(crate::domain::trading::trade::ExitReason::TakeProfit1, dec!(100) + pnl, dec!(1), 1);
        t
    }

    #[test]
    fn win_rate_and_profit_factor_on_mixed_trades() {
        let trades = vec![winning_trade(dec!(20)), winning_trade(dec!(-10))];
        let equity = vec![dec!(1000), dec!(1020), dec!(1010)];
        let metrics = compute_metrics(&trades, &equity);
        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.win_rate, dec!(0.5));
        assert_eq!(metrics.total_pnl, dec!(10));
    }

    #[test]
    fn max_drawdown_tracks_worst_peak_to_trough() {
        let equity = vec![dec!(1000), dec!(1200), dec!(900), dec!(1100)];
        let drawdown = max_drawdown(&equity);
        assert_eq!(drawdown, dec!(0.25));
    }

    #[test]
    fn no_trades_yields_zeroed_metrics() {
        let metrics = compute_metrics(&[], &[dec!(1000)]);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, Decimal::ZERO);
    }
}
