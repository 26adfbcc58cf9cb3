//! `snapshot_market_state` (spec §4.5): reconstructs `MarketState` for a
//! symbol as of day `D` from the pre-loaded bar series, touching nothing
//! after `D`.

use crate::memory::MarketState;
use crate::trainer::indicators::{macd, regime, rsi_14, simple_moving_average};
use crate::trainer::preload::MarketDataPreload;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;

pub fn snapshot_market_state(preload: &MarketDataPreload, symbol: &str, date: NaiveDate) -> Result<MarketState> {
    let bar = preload
        .bar(date)
        .ok_or_else(|| anyhow!("no bar for {symbol} on {date}"))?;
    let history = preload.history_up_to(date);

    let ma_short = simple_moving_average(&history, 5);
    let ma_long = simple_moving_average(&history, 20);

    Ok(MarketState {
        date,
        symbol: symbol.to_string(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
        rsi: rsi_14(&history),
        macd: macd(&history),
        ma_short,
        ma_long,
        regime: regime(ma_short, ma_long),
    })
}
