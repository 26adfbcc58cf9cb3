//! External collaborators (spec §6). These are opaque to the core: the
//! trait is the contract the trainer/engine/memory store consume, not a
//! place to re-implement vendor logic, LLM prompting, or RL network
//! internals. `reqwest` is already the teacher's HTTP client dependency
//! (`vault/llm.rs::OpenRouterClient`); the one concrete adapter below
//! (`OpenRouterEmbeddingBackend` / `OpenRouterLlmRouter`) follows that same
//! shape for whichever binary wants a real network-backed implementation.

pub mod bars;
pub mod llm_router;
pub mod openrouter;
pub mod vector_index;

#[cfg(test)]
pub mod test_support;

use crate::error::MemoryError;
use crate::memory::episode::{DecisionContext, Direction, TradingEpisode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use bars::MarketBar;
pub use llm_router::ModelTier;
pub use openrouter::OpenRouterEmbeddingBackend;
pub use vector_index::{EpisodePayload, InMemoryVectorIndex};

/// `get_bars(symbol, start, end)` from spec §6. Implementations MUST honour
/// the deadline injected by the timeout wrapper at the call site; this
/// trait itself does not retry.
pub trait MarketDataAdapter: Send + Sync {
    fn get_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<MarketBar>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analyses: Vec<crate::memory::episode::AgentAnalysis>,
    pub decision_chain: crate::memory::episode::DecisionChain,
    pub final_action: Direction,
    pub target_ratio: f64,
}

/// `analyse(symbol, date, context, retrieved) -> (analyses, decision,
/// final action with target_ratio)` from spec §6. A black box to the core.
pub trait MultiAgentAnalyser: Send + Sync {
    fn analyse(
        &self,
        symbol: &str,
        date: NaiveDate,
        context: &DecisionContext,
        retrieved: &[TradingEpisode],
    ) -> anyhow::Result<AnalysisOutcome>;
}

/// `embed(text) -> fixed-length float vector` from spec §6, raising a typed
/// error rather than panicking or returning a zero vector.
pub trait EmbeddingBackend: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
    fn token_limit(&self) -> usize;
}

pub use vector_index::{EpisodePatch, VectorIndex};

/// `pick_llm(agent_name) -> callable` from spec §6; the core only reads
/// `enable_small_model_routing` and is otherwise agnostic to how tiers map
/// to concrete models.
pub trait LlmRouter: Send + Sync {
    fn pick_llm(&self, agent_name: &str) -> anyhow::Result<ModelTier>;
}
