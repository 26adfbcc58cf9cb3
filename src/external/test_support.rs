//! Fakes for the external-collaborator traits, used by unit tests across
//! `memory`, `trainer`, and `engine`. Not compiled into release builds.

use super::{AnalysisOutcome, MarketBar, MarketDataAdapter, MultiAgentAnalyser};
use crate::error::MemoryError;
use crate::external::EmbeddingBackend;
use crate::memory::episode::{AgentAnalysis, DecisionChain, DecisionContext, Direction, TradingEpisode};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A deterministic embedding backend: hashes the input into a fixed-length
/// vector so cosine similarity behaves predictably in tests, and counts
/// calls so cache-hit tests (P5) can assert on invocation count.
pub struct FakeEmbeddingBackend {
    dimension: usize,
    token_limit: usize,
    calls: AtomicUsize,
}

impl FakeEmbeddingBackend {
    pub fn new(dimension: usize, token_limit: usize) -> Self {
        Self {
            dimension,
            token_limit,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingBackend for FakeEmbeddingBackend {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(MemoryError::EmbeddingInvalidInput("empty text".into()));
        }
        let mut v = vec![0.0f32; self.dimension];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dimension] += (b as f32) / 255.0;
        }
        // never a zero vector
        v[0] += 0.001;
        Ok(v)
    }

    fn token_limit(&self) -> usize {
        self.token_limit
    }
}

/// A fixed historical bar series keyed by date, standing in for a real
/// market-data vendor.
#[derive(Default)]
pub struct FakeMarketDataAdapter {
    bars: Vec<MarketBar>,
}

impl FakeMarketDataAdapter {
    pub fn new(bars: Vec<MarketBar>) -> Self {
        Self { bars }
    }
}

impl MarketDataAdapter for FakeMarketDataAdapter {
    fn get_bars(&self, _symbol: &str, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<MarketBar>> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect())
    }
}

/// A scripted analyser: returns a fixed action per date, defaulting to
/// `hold`, used to drive deterministic end-to-end trainer tests.
pub struct ScriptedAnalyser {
    decisions: Mutex<HashMap<NaiveDate, (Direction, f64)>>,
}

impl ScriptedAnalyser {
    pub fn new(decisions: HashMap<NaiveDate, (Direction, f64)>) -> Self {
        Self {
            decisions: Mutex::new(decisions),
        }
    }
}

impl MultiAgentAnalyser for ScriptedAnalyser {
    fn analyse(
        &self,
        _symbol: &str,
        date: NaiveDate,
        _context: &DecisionContext,
        _retrieved: &[TradingEpisode],
    ) -> anyhow::Result<AnalysisOutcome> {
        let (action, target_ratio) = self
            .decisions
            .lock()
            .unwrap()
            .get(&date)
            .copied()
            .unwrap_or((Direction::Hold, 0.0));

        Ok(AnalysisOutcome {
            analyses: vec![AgentAnalysis {
                agent_name: "scripted".to_string(),
                direction: action,
                confidence: 0.8,
                reasoning: "scripted decision for test".to_string(),
                execution_time_ms: 1,
                is_error: false,
            }],
            decision_chain: DecisionChain {
                bull_argument: "scripted bull".to_string(),
                bear_argument: "scripted bear".to_string(),
                judge_decision: format!("{action:?}"),
                risk_decision: "approved".to_string(),
                final_action: action,
            },
            final_action: action,
            target_ratio,
        })
    }
}
