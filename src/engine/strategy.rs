//! Strategy capability set (spec §4.4.1): a polymorphic object the engine
//! drives against a homogeneous collection, the way the teacher's own
//! strategy structs are driven by hand — generalized here behind a trait
//! so the engine can hold `Vec<Box<dyn Strategy + Send>>`.

use crate::engine::portfolio::PortfolioState;
use crate::external::MarketBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// `target_ratio` on `Buy` is the fraction of *cash* to commit; on `Sell`
/// it is the fraction of the *current position* to liquidate (spec
/// §4.4.1, arithmetic in §4.4.3).
#[derive(Debug, Clone)]
pub struct Signal {
    pub action: Action,
    pub target_ratio: f64,
    pub reason: String,
    pub confidence: f64,
}

impl Signal {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            target_ratio: 0.0,
            reason: reason.into(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fill {
    pub symbol: String,
    pub action: Action,
    pub quantity: i64,
    pub price: f64,
}

pub trait Strategy: Send {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    fn generate_signal(&mut self, symbol: &str, current_bar: &MarketBar, portfolio_state: &PortfolioState) -> Signal;

    fn on_fill(&mut self, _fill: &Fill) {}
    fn on_day_end(&mut self) {}
}
