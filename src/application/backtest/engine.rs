//! Deterministic, single-threaded backtest replay over a candle series.
//!
//! Grounded on `application/benchmarking/engine.rs`'s `BenchmarkEngine`/
//! `BacktestResult` shape, re-architected from the teacher's streaming
//! mpsc-actor `Simulator` to a synchronous, cancellable per-candle loop
//! that owns its own state machine rather than coordinating through
//! channels — the spec calls for "uniform tasks with cancellation", which
//! a plain loop checked against an `Arc<AtomicBool>` models more directly
//! than an actor pipeline.

use super::metrics::{compute_metrics, BacktestMetrics};
use crate::domain::market::candle::Candle;
use crate::domain::trading::signal::Signal;
use crate::domain::trading::trade::{ExitReason, Trade};
use crate::domain::trading::types::OrderSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub starting_cash: Decimal,
    pub slippage_pct: Decimal,
    pub commission_pct: Decimal,
    pub move_stop_to_breakeven_after_tp1: bool,
    /// Fraction of current cash risked per trade (fixed-fractional sizing).
    pub position_size_percent: Decimal,
    /// How many trades may be open at once; the engine stops consulting
    /// `signal_fn` once this many positions are live.
    pub max_open_trades: usize,
    /// When `false`, the first take-profit tier hit closes the whole
    /// position instead of scaling out.
    pub partial_exit_enabled: bool,
    pub tp1_exit_percent: Decimal,
    pub tp2_exit_percent: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            starting_cash: dec!(10_000),
            slippage_pct: dec!(0.0005),
            commission_pct: dec!(0.0004),
            move_stop_to_breakeven_after_tp1: true,
            position_size_percent: dec!(0.01),
            max_open_trades: 1,
            partial_exit_enabled: true,
            tp1_exit_percent: dec!(0.5),
            tp2_exit_percent: dec!(0.3),
        }
    }
}

pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<Decimal>,
    pub metrics: BacktestMetrics,
}

struct OpenTrade {
    trade: Trade,
    stop_loss: Decimal,
    take_profit_1: Option<Decimal>,
    take_profit_2: Option<Decimal>,
    take_profit_3: Option<Decimal>,
    tp1_hit: bool,
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Replay `candles` chronologically, calling `signal_fn(candles, index)`
    /// on every bar to ask whether a new trade should open (only consulted
    /// while under `max_open_trades`). `cancel` lets a caller stop the
    /// replay early — the engine still returns whatever trades/equity it
    /// accumulated so far.
    pub fn run<F>(&self, candles: &[Candle], mut signal_fn: F, cancel: Arc<AtomicBool>) -> BacktestResult
    where
        F: FnMut(&[Candle], usize) -> Option<Signal>,
    {
        let mut cash = self.config.starting_cash;
        let mut equity_curve = Vec::with_capacity(candles.len());
        let mut closed_trades = Vec::new();
        let mut open: Vec<OpenTrade> = Vec::new();
        let mut next_id = 0usize;

        for i in 0..candles.len() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let candle = &candles[i];

            let mut still_open = Vec::with_capacity(open.len());
            for mut position in open.drain(..) {
                self.process_bar(&mut position, candle, &mut cash);
                if position.trade.is_closed() {
                    closed_trades.push(position.trade);
                } else {
                    still_open.push(position);
                }
            }
            open = still_open;

            while open.len() < self.config.max_open_trades {
                let Some(signal) = signal_fn(candles, i) else { break };
                next_id += 1;
                match self.open_trade(next_id, &signal, candle, &mut cash) {
                    Some(position) => open.push(position),
                    None => break,
                }
            }

            let unrealized: Decimal = open.iter().map(|p| unrealized_pnl(&p.trade, candle.close)).sum();
            equity_curve.push(cash + unrealized);
        }

        closed_trades.extend(open.into_iter().map(|p| p.trade));

        let metrics = compute_metrics(&closed_trades, &equity_curve);
        BacktestResult {
            trades: closed_trades,
            equity_curve,
            metrics,
        }
    }

    fn open_trade(&self, id: usize, signal: &Signal, candle: &Candle, cash: &mut Decimal) -> Option<OpenTrade> {
        let stop_loss = signal.stop_loss?;
        let risk_per_unit = (signal.entry_price - stop_loss).abs();
        if risk_per_unit.is_zero() {
            return None;
        }
        // Fixed-fractional sizing: risk `position_size_percent` of current cash per trade.
        let risk_budget = *cash * self.config.position_size_percent;
        let quantity = (risk_budget / risk_per_unit).max(Decimal::ZERO);
        if quantity.is_zero() {
            return None;
        }

        let entry_price = apply_slippage(signal.entry_price, signal.side, self.config.slippage_pct, true);
        let commission = entry_price * quantity * self.config.commission_pct;
        *cash -= commission;

        let mut trade = Trade::open(
            id.to_string(),
            signal.symbol.clone(),
            signal.side,
            "confluence-engine".to_string(),
            entry_price,
            quantity,
            candle.timestamp,
            signal.reason.clone(),
        );
        trade.stop_loss = Some(stop_loss);
        trade.fees_paid += commission;

        Some(OpenTrade {
            trade,
            stop_loss,
            take_profit_1: signal.take_profit_1,
            take_profit_2: signal.take_profit_2,
            take_profit_3: signal.take_profit_3,
            tp1_hit: false,
        })
    }

    fn process_bar(&self, position: &mut OpenTrade, candle: &Candle, cash: &mut Decimal) {
        let remaining = position.trade.quantity_remaining();
        if remaining.is_zero() {
            return;
        }

        let tiers = self.take_profit_tiers(position);
        let stop_distance = (candle.open - position.stop_loss).abs();
        let nearest_target_distance = tiers
            .iter()
            .filter_map(|(tp, _, _)| tp.map(|t| (candle.open - t).abs()))
            .min();

        // §4.14: whichever level the candle's open sits closer to is taken
        // to trigger first within the bar; ties favor the stop.
        let stop_first = nearest_target_distance.map(|d| stop_distance <= d).unwrap_or(true);

        if stop_first {
            if self.check_stop(position, candle, cash) {
                return;
            }
            self.check_targets(position, &tiers, candle, cash);
        } else {
            self.check_targets(position, &tiers, candle, cash);
            if position.trade.quantity_remaining().is_zero() {
                return;
            }
            self.check_stop(position, candle, cash);
        }
    }

    fn take_profit_tiers(&self, position: &OpenTrade) -> [(Option<Decimal>, ExitReason, Decimal); 3] {
        let (tp1_fraction, tp2_fraction) = if self.config.partial_exit_enabled {
            (self.config.tp1_exit_percent, self.config.tp2_exit_percent)
        } else {
            (Decimal::ONE, Decimal::ONE)
        };
        [
            (position.take_profit_1, ExitReason::TakeProfit1, tp1_fraction),
            (position.take_profit_2, ExitReason::TakeProfit2, tp2_fraction),
            (position.take_profit_3, ExitReason::TakeProfit3, Decimal::ONE),
        ]
    }

    /// Returns `true` if the stop was hit (and the position fully closed).
    fn check_stop(&self, position: &mut OpenTrade, candle: &Candle, cash: &mut Decimal) -> bool {
        let side = position.trade.side;
        let remaining = position.trade.quantity_remaining();
        let stop_hit = match side {
            OrderSide::Buy => candle.low <= position.stop_loss,
            OrderSide::Sell => candle.high >= position.stop_loss,
        };
        if stop_hit {
            self.exit(position, ExitReason::StopLoss, position.stop_loss, remaining, candle, cash);
        }
        stop_hit
    }

    fn check_targets(
        &self,
        position: &mut OpenTrade,
        tiers: &[(Option<Decimal>, ExitReason, Decimal); 3],
        candle: &Candle,
        cash: &mut Decimal,
    ) {
        let side = position.trade.side;
        for &(tp, reason, fraction) in tiers {
            let Some(tp) = tp else { continue };
            let hit = match side {
                OrderSide::Buy => candle.high >= tp,
                OrderSide::Sell => candle.low <= tp,
            };
            if !hit {
                continue;
            }
            let remaining_now = position.trade.quantity_remaining();
            if remaining_now.is_zero() {
                break;
            }
            let qty = if matches!(reason, ExitReason::TakeProfit3) {
                remaining_now
            } else {
                (position.trade.entry_quantity * fraction).min(remaining_now)
            };
            self.exit(position, reason, tp, qty, candle, cash);

            // A tier only ever fires once; clear it so a later bar whose
            // open still straddles this price doesn't re-trigger it.
            match reason {
                ExitReason::TakeProfit1 => position.take_profit_1 = None,
                ExitReason::TakeProfit2 => position.take_profit_2 = None,
                ExitReason::TakeProfit3 => position.take_profit_3 = None,
                _ => {}
            }

            if matches!(reason, ExitReason::TakeProfit1)
                && self.config.move_stop_to_breakeven_after_tp1
                && !position.tp1_hit
            {
                position.tp1_hit = true;
                position.stop_loss = position.trade.entry_price;
            }
        }
    }

    fn exit(
        &self,
        position: &mut OpenTrade,
        reason: ExitReason,
        price: Decimal,
        quantity: Decimal,
        candle: &Candle,
        cash: &mut Decimal,
    ) {
        let exit_price = apply_slippage(price, position.trade.side, self.config.slippage_pct, false);
        let commission = exit_price * quantity * self.config.commission_pct;
        position.trade.apply_exit(reason, exit_price, quantity, candle.timestamp);
        position.trade.fees_paid += commission;
        *cash += realized_cash_delta(position.trade.side, position.trade.entry_price, exit_price, quantity) - commission;
    }
}

fn apply_slippage(price: Decimal, side: OrderSide, slippage_pct: Decimal, is_entry: bool) -> Decimal {
    let adverse = match (side, is_entry) {
        (OrderSide::Buy, true) => true,
        (OrderSide::Sell, true) => false,
        (OrderSide::Buy, false) => false,
        (OrderSide::Sell, false) => true,
    };
    if adverse {
        price * (Decimal::ONE + slippage_pct)
    } else {
        price * (Decimal::ONE - slippage_pct)
    }
}

fn realized_cash_delta(side: OrderSide, entry: Decimal, exit: Decimal, quantity: Decimal) -> Decimal {
    match side {
        OrderSide::Buy => (exit - entry) * quantity,
        OrderSide::Sell => (entry - exit) * quantity,
    }
}

fn unrealized_pnl(trade: &Trade, current_price: Decimal) -> Decimal {
    let remaining = trade.quantity_remaining();
    match trade.side {
        OrderSide::Buy => (current_price - trade.entry_price) * remaining,
        OrderSide::Sell => (trade.entry_price - current_price) * remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;

    fn c(ts: i64, o: i64, h: i64, l: i64, cl: i64) -> Candle {
        Candle::new(
            "BTC-USD",
            Timeframe::OneHour,
            ts,
            Decimal::from(o),
            Decimal::from(h),
            Decimal::from(l),
            Decimal::from(cl),
            dec!(10),
            "hyperliquid",
        )
        .unwrap()
    }

    #[test]
    fn deterministic_replay_produces_identical_results_on_rerun() {
        let candles = vec![
            c(0, 100, 101, 99, 100),
            c(1, 100, 130, 99, 120),
            c(2, 120, 121, 119, 120),
        ];
        let engine = BacktestEngine::new(BacktestConfig::default());
        let signal_fn = |_candles: &[Candle], i: usize| {
            if i == 0 {
                Some(
                    Signal::buy("BTC-USD", "test", dec!(100), 0)
                        .with_stop_loss(dec!(90))
                        .with_take_profits(dec!(115), dec!(125), dec!(135)),
                )
            } else {
                None
            }
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let result1 = engine.run(&candles, signal_fn, cancel.clone());
        let result2 = engine.run(&candles, signal_fn, cancel);
        assert_eq!(result1.trades.len(), result2.trades.len());
        assert_eq!(result1.equity_curve, result2.equity_curve);
    }

    #[test]
    fn take_profit_1_partially_closes_and_moves_stop_to_breakeven() {
        let candles = vec![c(0, 100, 101, 99, 100), c(1, 100, 120, 99, 115), c(2, 115, 116, 100, 101)];
        let engine = BacktestEngine::new(BacktestConfig::default());
        let signal_fn = |_candles: &[Candle], i: usize| {
            if i == 0 {
                Some(
                    Signal::buy("BTC-USD", "test", dec!(100), 0)
                        .with_stop_loss(dec!(90))
                        .with_take_profits(dec!(115), dec!(125), dec!(135)),
                )
            } else {
                None
            }
        };
        let result = engine.run(&candles, signal_fn, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert!(trade
            .partial_exits
            .iter()
            .any(|e| e.reason == ExitReason::TakeProfit1));
    }

    #[test]
    fn cancellation_stops_the_loop_early() {
        let candles = vec![c(0, 100, 101, 99, 100); 100];
        let engine = BacktestEngine::new(BacktestConfig::default());
        let cancel = Arc::new(AtomicBool::new(true));
        let result = engine.run(&candles, |_, _| None, cancel);
        assert!(result.equity_curve.is_empty());
    }

    #[test]
    fn stop_fires_alone_when_open_is_closer_to_stop_than_any_target() {
        // bar 1's open (95) sits 5 away from the stop (90) but 20 away from
        // the nearest target (115), so the stop is taken to trigger first
        // even though the bar's range also reaches the target.
        let candles = vec![c(0, 100, 101, 99, 100), c(1, 95, 115, 85, 100), c(2, 100, 101, 99, 100)];
        let engine = BacktestEngine::new(BacktestConfig::default());
        let signal_fn = |_candles: &[Candle], i: usize| {
            if i == 0 {
                Some(
                    Signal::buy("BTC-USD", "test", dec!(100), 0)
                        .with_stop_loss(dec!(90))
                        .with_take_profits(dec!(115), dec!(125), dec!(135)),
                )
            } else {
                None
            }
        };
        let result = engine.run(&candles, signal_fn, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.partial_exits.len(), 1);
        assert_eq!(trade.partial_exits[0].reason, ExitReason::StopLoss);
    }

    #[test]
    fn target_fires_before_stop_when_open_is_closer_to_the_target() {
        // bar 1's open (113) sits only 2 away from tp1 (115) but 23 away
        // from the stop (90), so tp1 takes its partial exit before the
        // stop (now at breakeven) closes the remainder in the same bar.
        let candles = vec![c(0, 100, 101, 99, 100), c(1, 113, 120, 85, 100), c(2, 100, 101, 99, 100)];
        let engine = BacktestEngine::new(BacktestConfig::default());
        let signal_fn = |_candles: &[Candle], i: usize| {
            if i == 0 {
                Some(
                    Signal::buy("BTC-USD", "test", dec!(100), 0)
                        .with_stop_loss(dec!(90))
                        .with_take_profits(dec!(115), dec!(125), dec!(135)),
                )
            } else {
                None
            }
        };
        let result = engine.run(&candles, signal_fn, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.partial_exits.len(), 2);
        assert_eq!(trade.partial_exits[0].reason, ExitReason::TakeProfit1);
        assert_eq!(trade.partial_exits[1].reason, ExitReason::StopLoss);
    }

    #[test]
    fn max_open_trades_caps_concurrent_positions() {
        let candles = vec![c(0, 100, 101, 99, 100); 5];
        let config = BacktestConfig {
            max_open_trades: 2,
            ..BacktestConfig::default()
        };
        let engine = BacktestEngine::new(config);
        // A stop/targets far outside the flat candle range, so nothing
        // ever exits and every open slot stays occupied.
        let signal_fn = |_candles: &[Candle], i: usize| {
            Some(
                Signal::buy("BTC-USD", "test", dec!(100), i as i64)
                    .with_stop_loss(dec!(50))
                    .with_take_profits(dec!(200), dec!(210), dec!(220)),
            )
        };
        let result = engine.run(&candles, signal_fn, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.trades.len(), 2);
    }

    #[test]
    fn disabling_partial_exit_closes_the_whole_position_on_the_first_target() {
        let candles = vec![c(0, 100, 101, 99, 100), c(1, 100, 120, 99, 115), c(2, 115, 116, 100, 101)];
        let config = BacktestConfig {
            partial_exit_enabled: false,
            ..BacktestConfig::default()
        };
        let engine = BacktestEngine::new(config);
        let signal_fn = |_candles: &[Candle], i: usize| {
            if i == 0 {
                Some(
                    Signal::buy("BTC-USD", "test", dec!(100), 0)
                        .with_stop_loss(dec!(90))
                        .with_take_profits(dec!(115), dec!(125), dec!(135)),
                )
            } else {
                None
            }
        };
        let result = engine.run(&candles, signal_fn, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.partial_exits.len(), 1);
        assert_eq!(trade.partial_exits[0].reason, ExitReason::TakeProfit1);
        assert_eq!(trade.partial_exits[0].quantity, trade.entry_quantity);
    }
}
