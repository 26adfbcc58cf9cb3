//! The portfolio-state contract the engine builds from the real broker
//! before every `generate_signal` call (spec §4.4.4). No synthesised
//! fields: every value here is read straight off `SimulatedBroker`.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub qty: i64,
    pub avg_price: f64,
    pub cost_basis: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub can_sell_today: bool,
    pub bought_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtherPositionSummary {
    pub symbol: String,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub total_equity: f64,
    pub has_position: bool,
    pub position: Option<PositionView>,
    pub cash_ratio: f64,
    pub position_ratio: f64,
    pub other_positions: Vec<OtherPositionSummary>,
}
