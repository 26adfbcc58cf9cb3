//! Data model for the episodic memory store (spec §3): `MarketState`,
//! `AgentAnalysis`, `DecisionChain`, `TradeOutcome`, and the `TradingEpisode`
//! that ties them together. All derive `Serialize`/`Deserialize` the way the
//! teacher's persisted structs (`vault/vault_db.rs` records) do.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub regime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub agent_name: String,
    pub direction: Direction,
    pub confidence: f64,
    pub reasoning: String,
    pub execution_time_ms: u64,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionChain {
    pub bull_argument: String,
    pub bear_argument: String,
    pub judge_decision: String,
    pub risk_decision: String,
    pub final_action: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub action: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub holding_days: u32,
    pub pct_return: f64,
    pub max_drawdown: f64,
}

impl TradeOutcome {
    pub fn hold(date: NaiveDate) -> Self {
        let _ = date;
        Self {
            action: Direction::Hold,
            entry_price: 0.0,
            exit_price: 0.0,
            holding_days: 0,
            pct_return: 0.0,
            max_drawdown: 0.0,
        }
    }

    /// Narrative string ("returned +3.2%") — this, along with every other
    /// outcome-derived field, MUST live exclusively here and never in
    /// `decision_context` (invariant I1).
    pub fn narrative(&self) -> String {
        format!(
            "action={:?} entry={:.4} exit={:.4} held {}d, returned {:+.2}%, max_drawdown {:.2}%",
            self.action,
            self.entry_price,
            self.exit_price,
            self.holding_days,
            self.pct_return * 100.0,
            self.max_drawdown * 100.0
        )
    }
}

/// Current schema version for persisted episodes. Records without a
/// recognised version (or below this) are rejected on read per the §9
/// Open Question on legacy records.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingEpisode {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub episode_id: String,
    pub date: NaiveDate,
    pub symbol: String,
    pub market_state: MarketState,
    pub analyses: Vec<AgentAnalysis>,
    pub decision_chain: DecisionChain,
    pub outcome: TradeOutcome,
    /// Decision-time-only text. The ONLY input to embedding and retrieval
    /// (invariant I2). Must never contain a token from the leakage
    /// blocklist (invariant I1, enforced at write time in `leakage.rs`).
    pub decision_context: String,
    /// Outcome-derived narrative text. Free to mention returns/PnL — lives
    /// entirely outside `decision_context` and is never embedded.
    pub outcome_result: String,
    pub success: bool,
}

fn default_schema_version() -> u32 {
    0
}

impl TradingEpisode {
    pub fn episode_id_for(date: NaiveDate, symbol: &str) -> String {
        format!("{date}::{symbol}")
    }

    pub fn is_legacy(&self) -> bool {
        self.schema_version < CURRENT_SCHEMA_VERSION
    }
}

/// A query into the store is just decision-context text plus an optional
/// symbol hint; it is embedded the same way a stored episode's
/// `decision_context` is.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub text: String,
}

impl DecisionContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
