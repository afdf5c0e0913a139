//! Monthly performance metrics over a run's position history.
//!
//! Only closed positions are trades; canceled positions never realized a
//! market outcome and are skipped. Trades are grouped by the UTC calendar
//! month of their open time and walked in chronological order.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::{Direction, Month, Position};

/// Statistics for the trades opened in one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub winning_trades: usize,
    /// Percent, `100 * wins / total`.
    pub win_rate: f64,
    pub net_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// `gross_profit / gross_loss`; 0 when there are no losses.
    pub profit_factor: f64,
    /// Absolute peak-to-trough decline of cumulative PnL.
    pub max_drawdown: f64,
    /// Largest `drawdown / peak` (percent) over points with a positive peak.
    pub max_drawdown_pct: f64,
    /// Mean R-multiple over trades with a defined risk.
    pub expected_value_r: f64,
    pub max_r: f64,
    pub avg_trade_duration_secs: f64,
}

impl MonthlyMetrics {
    /// Compute metrics over trades already in chronological order.
    pub fn compute(trades: &[&Position]) -> Self {
        let pnls: Vec<f64> = trades.iter().map(|p| p.pnl()).collect();
        let r_multiples: Vec<f64> = trades.iter().filter_map(|p| r_multiple(p)).collect();
        let (max_drawdown, max_drawdown_pct) = drawdown(&pnls);
        let (gross_profit, gross_loss) = gross_profit_loss(&pnls);

        Self {
            total_trades: trades.len(),
            long_trades: trades
                .iter()
                .filter(|p| p.direction == Direction::Long)
                .count(),
            short_trades: trades
                .iter()
                .filter(|p| p.direction == Direction::Short)
                .count(),
            winning_trades: pnls.iter().filter(|&&p| p > 0.0).count(),
            win_rate: win_rate(&pnls),
            net_pnl: pnls.iter().sum(),
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(&pnls),
            max_drawdown,
            max_drawdown_pct,
            expected_value_r: mean(&r_multiples),
            max_r: r_multiples.iter().copied().fold(0.0_f64, f64::max),
            avg_trade_duration_secs: avg_duration_secs(trades),
        }
    }

    pub fn avg_trade_duration(&self) -> Duration {
        Duration::milliseconds((self.avg_trade_duration_secs * 1000.0).round() as i64)
    }
}

/// Group closed positions by open month and compute each month's metrics.
pub fn compute_monthly(positions: &[Position]) -> BTreeMap<Month, MonthlyMetrics> {
    let mut by_month: BTreeMap<Month, Vec<&Position>> = BTreeMap::new();
    for pos in positions.iter().filter(|p| p.is_closed()) {
        by_month
            .entry(Month::from_datetime(pos.open_time))
            .or_default()
            .push(pos);
    }

    by_month
        .into_iter()
        .map(|(month, mut trades)| {
            trades.sort_by_key(|p| (p.open_time, p.id));
            (month, MonthlyMetrics::compute(&trades))
        })
        .collect()
}

/// Metrics over every closed position, regardless of open month.
///
/// A dataset sliced in a non-UTC timezone spills into the neighbouring UTC
/// month, so a run over one data month counts all of its trades here.
pub fn compute_period(positions: &[Position]) -> MonthlyMetrics {
    let mut trades: Vec<&Position> = positions.iter().filter(|p| p.is_closed()).collect();
    if trades.is_empty() {
        return MonthlyMetrics::default();
    }
    trades.sort_by_key(|p| (p.open_time, p.id));
    MonthlyMetrics::compute(&trades)
}

// ─── Individual metric functions ────────────────────────────────────

/// `pnl / (|open - stop_loss| * quantity)`; `None` when the risk is zero.
pub fn r_multiple(position: &Position) -> Option<f64> {
    let risk = position.risk_distance() * position.quantity as f64;
    if risk > 0.0 {
        Some(position.pnl() / risk)
    } else {
        None
    }
}

/// Win rate in percent.
pub fn win_rate(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let winners = pnls.iter().filter(|&&p| p > 0.0).count();
    winners as f64 / pnls.len() as f64 * 100.0
}

/// Sum of positive PnL and sum of absolute negative PnL.
pub fn gross_profit_loss(pnls: &[f64]) -> (f64, f64) {
    pnls.iter().fold((0.0, 0.0), |(profit, loss), &p| {
        if p > 0.0 {
            (profit + p, loss)
        } else {
            (profit, loss - p)
        }
    })
}

/// Gross profit / gross loss. Reported as 0 when there is no loss.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let (gross_profit, gross_loss) = gross_profit_loss(pnls);
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        0.0
    }
}

/// Max absolute drawdown and max percentage drawdown of the cumulative PnL
/// curve. The peak starts at the first trade's equity, not zero.
pub fn drawdown(pnls: &[f64]) -> (f64, f64) {
    let mut equity = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;

    for &pnl in pnls {
        equity += pnl;
        peak = peak.max(equity);
        let dd = peak - equity;
        max_dd = max_dd.max(dd);
        if peak > 0.0 {
            max_dd_pct = max_dd_pct.max(dd / peak * 100.0);
        }
    }
    (max_dd, max_dd_pct)
}

fn avg_duration_secs(trades: &[&Position]) -> f64 {
    let durations: Vec<f64> = trades
        .iter()
        .filter_map(|p| p.duration())
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .collect();
    mean(&durations)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
