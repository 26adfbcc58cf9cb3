//! `StrategyPerformance` (spec §3) plus risk analytics enrichment carried
//! over from the teacher's `risk.rs` neighborhood (historical VaR/CVaR and
//! max drawdown over an equity curve) — not named in spec.md itself, but
//! the kind of ambient reporting a trading engine's performance tracker
//! already carries in this codebase.

use crate::engine::broker::EquitySnapshot;

#[derive(Debug, Clone, Default)]
pub struct StrategyPerformance {
    pub strategy_id: String,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

impl StrategyPerformance {
    pub fn new(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            ..Default::default()
        }
    }

    pub fn record_trade(&mut self, realized_pnl: f64) {
        self.total_trades += 1;
        if realized_pnl > 0.0 {
            self.winning_trades += 1;
        }
        self.realized_pnl += realized_pnl;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64
        }
    }
}

fn daily_returns(curve: &[EquitySnapshot]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect()
}

/// Historical Value at Risk at `confidence` (e.g. 0.95): the loss such
/// that `confidence` of observed daily returns were no worse than it.
/// Returned as a positive magnitude.
pub fn value_at_risk(curve: &[EquitySnapshot], confidence: f64) -> f64 {
    let mut returns = daily_returns(curve);
    if returns.is_empty() {
        return 0.0;
    }
    returns.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = (((1.0 - confidence) * returns.len() as f64).floor() as usize).min(returns.len() - 1);
    (-returns[idx]).max(0.0)
}

/// Conditional VaR (expected shortfall): the average loss among returns
/// at or beyond the VaR cutoff.
pub fn conditional_value_at_risk(curve: &[EquitySnapshot], confidence: f64) -> f64 {
    let mut returns = daily_returns(curve);
    if returns.is_empty() {
        return 0.0;
    }
    returns.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let cutoff = (((1.0 - confidence) * returns.len() as f64).ceil() as usize).max(1).min(returns.len());
    let tail = &returns[..cutoff];
    (-(tail.iter().sum::<f64>() / tail.len() as f64)).max(0.0)
}

/// Maximum peak-to-trough drawdown over the equity curve, as a positive
/// fraction.
pub fn max_drawdown(curve: &[EquitySnapshot]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0;
    for snap in curve {
        if snap.equity > peak {
            peak = snap.equity;
        }
        if peak > 0.0 {
            let dd = (peak - snap.equity) / peak;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snap(day: u32, equity: f64) -> EquitySnapshot {
        EquitySnapshot {
            date: NaiveDate::from_ymd_opt(2020, 1, day).unwrap(),
            equity,
            cash: equity,
            daily_pnl: 0.0,
            total_pnl: 0.0,
        }
    }

    #[test]
    fn max_drawdown_measures_peak_to_trough() {
        let curve = vec![snap(1, 100.0), snap(2, 120.0), snap(3, 90.0), snap(4, 110.0)];
        let dd = max_drawdown(&curve);
        assert!((dd - 0.25).abs() < 1e-9); // (120-90)/120
    }

    #[test]
    fn win_rate_is_zero_with_no_trades() {
        let perf = StrategyPerformance::new("s1");
        assert_eq!(perf.win_rate(), 0.0);
    }

    #[test]
    fn record_trade_tracks_wins_and_realized_pnl() {
        let mut perf = StrategyPerformance::new("s1");
        perf.record_trade(50.0);
        perf.record_trade(-20.0);
        assert_eq!(perf.total_trades, 2);
        assert_eq!(perf.winning_trades, 1);
        assert_eq!(perf.realized_pnl, 30.0);
        assert_eq!(perf.win_rate(), 0.5);
    }
}
