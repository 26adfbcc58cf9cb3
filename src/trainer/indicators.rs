//! Simple technical indicators computed only from bars at or before the
//! snapshot date — never `D' > D` (spec §4.5's "reconstruct the
//! information available on D").

use crate::external::MarketBar;

pub fn simple_moving_average(bars: &[&MarketBar], window: usize) -> Option<f64> {
    if bars.len() < window || window == 0 {
        return None;
    }
    let slice = &bars[bars.len() - window..];
    Some(slice.iter().map(|b| b.close).sum::<f64>() / window as f64)
}

/// 14-period RSI over `bars` (oldest-to-newest, inclusive of the
/// snapshot date).
pub fn rsi_14(bars: &[&MarketBar]) -> Option<f64> {
    const PERIOD: usize = 14;
    if bars.len() < PERIOD + 1 {
        return None;
    }
    let window = &bars[bars.len() - (PERIOD + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1].close - pair[0].close;
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / PERIOD as f64;
    let avg_loss = losses / PERIOD as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// MACD line: EMA(12) - EMA(26), approximated here with simple moving
/// averages to avoid carrying indicator state across calls.
pub fn macd(bars: &[&MarketBar]) -> Option<f64> {
    let short = simple_moving_average(bars, 12)?;
    let long = simple_moving_average(bars, 26)?;
    Some(short - long)
}

pub fn regime(ma_short: Option<f64>, ma_long: Option<f64>) -> Option<String> {
    match (ma_short, ma_long) {
        (Some(s), Some(l)) if s > l * 1.01 => Some("uptrend".to_string()),
        (Some(s), Some(l)) if s < l * 0.99 => Some("downtrend".to_string()),
        (Some(_), Some(_)) => Some("sideways".to_string()),
        _ => None,
    }
}
