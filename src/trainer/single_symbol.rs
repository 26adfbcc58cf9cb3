//! Single-symbol Time-Travel Trainer main loop (spec §4.5).

use crate::config::CoreConfig;
use crate::external::{MarketDataAdapter, MultiAgentAnalyser};
use crate::memory::{DecisionContext, Direction, EmbeddingService, MemoryStore, TradeOutcome};
use crate::monitor::TaskMonitor;
use crate::trainer::assemble::{assemble_episode, build_decision_context};
use crate::trainer::export::TrainingDataExporter;
use crate::trainer::preload::MarketDataPreload;
use crate::trainer::simulate::simulate_trade;
use crate::trainer::snapshot::snapshot_market_state;
use crate::external::{EmbeddingBackend, VectorIndex};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub struct SingleSymbolTrainer<'a, A, M, B, V>
where
    A: MarketDataAdapter,
    M: MultiAgentAnalyser,
    B: EmbeddingBackend,
    V: VectorIndex,
{
    symbol: String,
    preload: MarketDataPreload,
    analyser: &'a M,
    memory: &'a MemoryStore<B, V>,
    monitor: &'a TaskMonitor,
    config: &'a CoreConfig,
    exporter: Option<&'a TrainingDataExporter>,
    top_k: usize,
    _adapter: std::marker::PhantomData<A>,
}

impl<'a, A, M, B, V> SingleSymbolTrainer<'a, A, M, B, V>
where
    A: MarketDataAdapter,
    M: MultiAgentAnalyser,
    B: EmbeddingBackend,
    V: VectorIndex,
{
    pub fn new(
        adapter: &A,
        analyser: &'a M,
        memory: &'a MemoryStore<B, V>,
        monitor: &'a TaskMonitor,
        config: &'a CoreConfig,
        exporter: Option<&'a TrainingDataExporter>,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        top_k: usize,
    ) -> Result<Self> {
        let preload = MarketDataPreload::load(adapter, symbol, start, end)
            .with_context(|| format!("preloading market data for {symbol}"))?;
        Ok(Self {
            symbol: symbol.to_string(),
            preload,
            analyser,
            memory,
            monitor,
            config,
            exporter,
            top_k,
            _adapter: std::marker::PhantomData,
        })
    }

    /// Runs the loop from spec §4.5, resuming from the Task Monitor's
    /// checkpoint when one already exists (resume protocol, §4.3).
    pub fn run(&self, task_id: &str, should_stop: &AtomicBool) -> Result<()> {
        let trading_days = self.preload.trading_days().to_vec();
        let total_steps = trading_days.len() as u64;

        let existing = self.monitor.get_checkpoint(task_id)?;
        let (start_idx, mut cumulative) = match &existing {
            Some(cp) if cp.is_resumable() => (cp.resume_step() as usize, cp.metadata.clone()),
            _ => (1, std::collections::HashMap::new()),
        };
        self.monitor.start_task(task_id, "single_symbol", total_steps)?;

        for (i, date) in trading_days.iter().enumerate().skip(start_idx.saturating_sub(1)) {
            if should_stop.load(Ordering::Relaxed) {
                self.monitor.pause_task(task_id)?;
                info!(task_id, day = i, "trainer paused cooperatively");
                return Ok(());
            }

            let state = snapshot_market_state(&self.preload, &self.symbol, *date)?;
            let probe_context = DecisionContext::new(format!(
                "symbol={} date={} rsi={:?} regime={:?}",
                self.symbol, date, state.rsi, state.regime
            ));
            let similar = self.memory.retrieve_episodes(&probe_context, self.top_k).unwrap_or_default();

            let analysis = self.analyser.analyse(&self.symbol, *date, &probe_context, &similar)?;
            let decision_context = build_decision_context(&state, &analysis);

            let outcome = if analysis.final_action != Direction::Hold {
                match self.preload.nth_trading_day_after(*date, self.config.holding_days) {
                    Some(exit_date) => simulate_trade(&self.preload, *date, exit_date, analysis.final_action)?,
                    None => {
                        // Fewer than H trading days remain: skip the episode,
                        // advance the monitor normally (spec §4.5).
                        cumulative.insert("episodes_skipped_insufficient_horizon".to_string(), serde_json::json!(
                            cumulative
                                .get("episodes_skipped_insufficient_horizon")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0)
                                + 1
                        ));
                        self.monitor.update_progress(task_id, (i + 1) as u64, (i + 1) as u64, cumulative.clone())?;
                        continue;
                    }
                }
            } else {
                TradeOutcome::hold(*date)
            };

            let episode = assemble_episode(
                &self.symbol,
                *date,
                state,
                analysis.analyses,
                decision_context,
                analysis.decision_chain,
                outcome,
            );

            match self.memory.add_episode(&episode) {
                Ok(true) => {}
                Ok(false) => warn!(task_id, "memory store is in ANALYSIS mode; episode not written"),
                Err(e) => return Err(e.into()),
            }

            if let Some(exporter) = self.exporter {
                exporter.append(&episode, "Given the market state and analyst arguments, decide the next action.")?;
            }

            let episodes_written = cumulative.get("episodes_written").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            cumulative.insert("episodes_written".to_string(), serde_json::json!(episodes_written));
            self.monitor.update_progress(task_id, (i + 1) as u64, (i + 1) as u64, cumulative.clone())?;
        }

        self.monitor.complete_task(task_id, cumulative)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeakageConfig;
    use crate::external::test_support::{FakeEmbeddingBackend, FakeMarketDataAdapter, ScriptedAnalyser};
    use crate::external::{InMemoryVectorIndex, MarketBar};
    use crate::memory::LeakageGuard;
    use crate::monitor::TaskMonitor;
    use std::collections::HashMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> MarketBar {
        MarketBar { date: d(day), open: close, high: close, low: close, close, volume: 1000.0 }
    }

    #[test]
    fn runs_to_completion_and_writes_one_episode_per_trading_day() {
        let bars: Vec<MarketBar> = (1..=40).map(|d| bar(d, 100.0 + d as f64)).collect();
        let adapter = FakeMarketDataAdapter::new(bars);
        let decisions = HashMap::from([(d(5), (Direction::Long, 0.2))]);
        let analyser = ScriptedAnalyser::new(decisions);

        let embeddings = EmbeddingService::new(FakeEmbeddingBackend::new(8, 1000));
        let leakage = LeakageGuard::new(&LeakageConfig::default()).unwrap();
        let memory = MemoryStore::new(crate::config::MemoryMode::Training, Some(embeddings), InMemoryVectorIndex::new(), leakage);

        let tmp = tempfile::tempdir().unwrap();
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        let config = CoreConfig::default();

        let trainer = SingleSymbolTrainer::new(
            &adapter, &analyser, &memory, &monitor, &config, None, "600519", d(5), d(10), 3,
        )
        .unwrap();

        let should_stop = AtomicBool::new(false);
        trainer.run("task-1", &should_stop).unwrap();

        let cp = monitor.get_checkpoint("task-1").unwrap().unwrap();
        assert_eq!(cp.status, crate::monitor::TaskStatus::Completed);
    }

    #[test]
    fn should_stop_pauses_instead_of_failing() {
        let bars: Vec<MarketBar> = (1..=40).map(|d| bar(d, 100.0 + d as f64)).collect();
        let adapter = FakeMarketDataAdapter::new(bars);
        let analyser = ScriptedAnalyser::new(HashMap::new());
        let embeddings = EmbeddingService::new(FakeEmbeddingBackend::new(8, 1000));
        let leakage = LeakageGuard::new(&LeakageConfig::default()).unwrap();
        let memory = MemoryStore::new(crate::config::MemoryMode::Training, Some(embeddings), InMemoryVectorIndex::new(), leakage);
        let tmp = tempfile::tempdir().unwrap();
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        let config = CoreConfig::default();

        let trainer = SingleSymbolTrainer::new(
            &adapter, &analyser, &memory, &monitor, &config, None, "600519", d(5), d(10), 3,
        )
        .unwrap();

        let should_stop = AtomicBool::new(true);
        trainer.run("task-2", &should_stop).unwrap();
        let cp = monitor.get_checkpoint("task-2").unwrap().unwrap();
        assert_eq!(cp.status, crate::monitor::TaskStatus::Paused);
    }
}
