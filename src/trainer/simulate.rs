//! `simulate_trade` (spec §4.5): entered at D's close, exited at the
//! close of the H-th subsequent trading day.

use crate::memory::{Direction, TradeOutcome};
use crate::trainer::preload::MarketDataPreload;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;

pub fn simulate_trade(
    preload: &MarketDataPreload,
    entry_date: NaiveDate,
    exit_date: NaiveDate,
    action: Direction,
) -> Result<TradeOutcome> {
    let entry_bar = preload
        .bar(entry_date)
        .ok_or_else(|| anyhow!("no entry bar for {entry_date}"))?;
    let exit_bar = preload
        .bar(exit_date)
        .ok_or_else(|| anyhow!("no exit bar for {exit_date}"))?;

    let entry_price = entry_bar.close;
    let exit_price = exit_bar.close;
    let holding_days = preload
        .trading_days_between(entry_date, exit_date)
        .unwrap_or(0);

    let sign = match action {
        Direction::Long => 1.0,
        Direction::Short => -1.0,
        Direction::Hold => 0.0,
    };
    let pct_return = sign * (exit_price - entry_price) / entry_price;

    let path = preload.bars_between(entry_date, exit_date);
    let mut peak = entry_price;
    let mut max_drawdown = 0.0;
    for bar in &path {
        let mark = bar.close;
        let favorable_peak = if action == Direction::Short { peak.min(mark) } else { peak.max(mark) };
        peak = favorable_peak;
        let dd = match action {
            Direction::Short => (mark - peak) / entry_price,
            _ => (peak - mark) / entry_price,
        };
        if dd > max_drawdown {
            max_drawdown = dd;
        }
    }

    Ok(TradeOutcome {
        action,
        entry_price,
        exit_price,
        holding_days,
        pct_return,
        max_drawdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_support::FakeMarketDataAdapter;
    use crate::external::MarketBar;

    fn bar(day: u32, close: f64) -> MarketBar {
        MarketBar {
            date: NaiveDate::from_ymd_opt(2020, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn long_trade_computes_positive_return_on_a_rally() {
        let adapter = FakeMarketDataAdapter::new(vec![bar(1, 100.0), bar(2, 105.0), bar(3, 110.0)]);
        let d = |day: u32| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let preload = MarketDataPreload::load(&adapter, "600519", d(1), d(3)).unwrap();

        let outcome = simulate_trade(&preload, d(1), d(3), Direction::Long).unwrap();
        assert!((outcome.pct_return - 0.10).abs() < 1e-9);
        assert_eq!(outcome.holding_days, 2);
    }

    #[test]
    fn short_trade_computes_positive_return_on_a_decline() {
        let adapter = FakeMarketDataAdapter::new(vec![bar(1, 100.0), bar(2, 95.0), bar(3, 90.0)]);
        let d = |day: u32| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let preload = MarketDataPreload::load(&adapter, "600519", d(1), d(3)).unwrap();

        let outcome = simulate_trade(&preload, d(1), d(3), Direction::Short).unwrap();
        assert!((outcome.pct_return - 0.10).abs() < 1e-9);
    }
}
