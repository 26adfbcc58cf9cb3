//! Time-Travel Trainer (spec §4.5): for each trading day in a bounded
//! range, reconstruct the information available on that day, invoke the
//! external multi-agent analyser, simulate the resulting trade, and
//! commit a `TradingEpisode`.

pub mod assemble;
pub mod basket;
pub mod export;
pub mod indicators;
pub mod preload;
pub mod simulate;
pub mod single_symbol;
pub mod snapshot;

pub use assemble::{assemble_episode, build_decision_context};
pub use basket::BasketTrainer;
pub use export::TrainingDataExporter;
pub use preload::MarketDataPreload;
pub use simulate::simulate_trade;
pub use single_symbol::SingleSymbolTrainer;
pub use snapshot::snapshot_market_state;
