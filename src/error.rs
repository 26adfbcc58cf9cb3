//! Typed error kinds for the memory store and broker.
//!
//! Everything else in the crate propagates through `anyhow::Result` the way
//! the rest of the call graph (trainer, engine orchestration) already does;
//! these two enums exist because spec §7 requires invalid-input and
//! invariant-violation errors to be *distinguishable* by callers, which a
//! flat `anyhow::Error` can't give them without downcasting.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryError {
    #[error("embedding backend unavailable: {0}")]
    EmbeddingServiceUnavailable(String),

    #[error("text too long to embed even after chunking ({chars} chars, limit {limit} tokens)")]
    EmbeddingTextTooLong { chars: usize, limit: usize },

    #[error("invalid input for embedding: {0}")]
    EmbeddingInvalidInput(String),

    #[error("memory store is disabled (no embedding backend configured)")]
    MemoryDisabled,

    #[error("decision_context contains outcome-leakage token: {token}")]
    LeakageDetected { token: String },

    #[error("patch touches a field that participated in the stored vector: {field}")]
    PatchTouchesIndexedField { field: String },

    #[error("episode not found: {0}")]
    NotFound(String),

    #[error("store is in ANALYSIS mode; writes are rejected")]
    ReadOnlyMode,

    #[error("legacy record without a schema version was rejected on read: {0}")]
    LegacyRecordRejected(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("order quantity {quantity} is below one lot (100) and does not fully close a residual position")]
    SubLotOrder { quantity: i64 },

    #[error("order would exceed held quantity: requested {requested}, held {held}")]
    ExceedsHolding { requested: i64, held: i64 },

    #[error("position {symbol} acquired on {bought_date} cannot be sold before T+1")]
    T1Violation { symbol: String, bought_date: String },

    #[error("insufficient cash: needed {needed:.2}, available {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("invalid price: {0}")]
    InvalidPrice(f64),
}
