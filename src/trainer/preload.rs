//! The batched pre-load data-lookup contract (spec §4.5): one upfront
//! fetch over `[start-365d, end+30d]`, indexed by date, so every
//! day-level lookup the trainer performs afterward is O(1) — the
//! documented "~40-minute run vs. >2-hour run" contract.

use crate::external::{MarketBar, MarketDataAdapter};
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::BTreeMap;

pub struct MarketDataPreload {
    bars: BTreeMap<NaiveDate, MarketBar>,
    trading_days: Vec<NaiveDate>,
}

impl MarketDataPreload {
    pub fn load(adapter: &dyn MarketDataAdapter, symbol: &str, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        let fetch_start = start - ChronoDuration::days(365);
        let fetch_end = end + ChronoDuration::days(30);
        let rows = adapter.get_bars(symbol, fetch_start, fetch_end)?;

        let bars: BTreeMap<NaiveDate, MarketBar> = rows.into_iter().map(|b| (b.date, b)).collect();
        let trading_days: Vec<NaiveDate> = bars
            .keys()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect();

        Ok(Self { bars, trading_days })
    }

    pub fn trading_days(&self) -> &[NaiveDate] {
        &self.trading_days
    }

    pub fn bar(&self, date: NaiveDate) -> Option<&MarketBar> {
        self.bars.get(&date)
    }

    /// All bars at or before `date`, oldest-to-newest — used for
    /// indicator windows so a snapshot never sees data from `D' > D`.
    pub fn history_up_to(&self, date: NaiveDate) -> Vec<&MarketBar> {
        self.bars.range(..=date).map(|(_, b)| b).collect()
    }

    /// Trading days strictly between `entry` and `exit`, i.e. the holding
    /// period length used in `TradeOutcome::holding_days`.
    pub fn trading_days_between(&self, entry: NaiveDate, exit: NaiveDate) -> Option<u32> {
        if exit < entry {
            return None;
        }
        Some(self.bars.range(entry..=exit).count().saturating_sub(1) as u32)
    }

    /// Bars strictly after `entry` up to and including `exit`, used to
    /// trace the intra-holding-period drawdown path.
    pub fn bars_between(&self, entry: NaiveDate, exit: NaiveDate) -> Vec<&MarketBar> {
        self.bars
            .range(entry..=exit)
            .skip(1)
            .map(|(_, b)| b)
            .collect()
    }

    /// The close-to-close holding-period exit date: the `n`-th *trading*
    /// day after `date`, or `None` if fewer than `n` trading days remain
    /// in the preloaded range (spec §4.5 holding-period semantics).
    pub fn nth_trading_day_after(&self, date: NaiveDate, n: u32) -> Option<NaiveDate> {
        self.bars
            .range(date..)
            .skip(1) // exclude `date` itself
            .nth((n - 1) as usize)
            .map(|(d, _)| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_support::FakeMarketDataAdapter;

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
    fn nth_trading_day_after_skips_non_trading_gaps() {
        let adapter = FakeMarketDataAdapter::new(vec![bar(1, 100.0), bar(2, 101.0), bar(5, 102.0), bar(6, 103.0)]);
        let preload = MarketDataPreload::load(
            &adapter,
            "600519",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
        )
        .unwrap();

        let exit = preload
            .nth_trading_day_after(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), 2)
            .unwrap();
        assert_eq!(exit, NaiveDate::from_ymd_opt(2020, 1, 6).unwrap());
    }

    #[test]
    fn nth_trading_day_after_returns_none_past_the_end_of_data() {
        let adapter = FakeMarketDataAdapter::new(vec![bar(1, 100.0), bar(2, 101.0)]);
        let preload = MarketDataPreload::load(
            &adapter,
            "600519",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
        )
        .unwrap();
        assert!(preload
            .nth_trading_day_after(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), 5)
            .is_none());
    }
}
