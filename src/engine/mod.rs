//! Multi-Strategy Trading Engine (spec §4.4): drives N strategies in
//! lockstep against one market clock, isolates capital and state per
//! strategy, and survives strategy-level failures via the supervisor.

pub mod broker;
pub mod clock;
pub mod performance;
pub mod portfolio;
pub mod strategy;
pub mod supervisor;

pub use broker::{EquitySnapshot, OrderType, Position, SimulatedBroker};
pub use clock::{MarketClock, StrategySlot, TickReport};
pub use performance::StrategyPerformance;
pub use portfolio::PortfolioState;
pub use strategy::{Action, Fill, Signal, Strategy};
pub use supervisor::{Heartbeat, Supervisor, SupervisorOutcome};
