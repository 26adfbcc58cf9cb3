//! Episodic Memory Store (spec §4.2): the data model, embedding hygiene,
//! leakage enforcement, and the mode-gated store that ties them together.

pub mod embeddings;
pub mod episode;
pub mod leakage;
pub mod store;

pub use embeddings::{cosine_similarity, EmbeddingService};
pub use episode::{
    AgentAnalysis, DecisionChain, DecisionContext, Direction, MarketState, TradeOutcome,
    TradingEpisode, CURRENT_SCHEMA_VERSION,
};
pub use leakage::LeakageGuard;
pub use store::MemoryStore;
