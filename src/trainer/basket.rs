//! Portfolio-mode Time-Travel Trainer (spec §4.5, "Portfolio mode"): the
//! same per-day loop generalized to a small fixed basket sharing one cash
//! pool, capped at `max_positions` concurrent positions, recording one
//! combined `symbol = "PORTFOLIO"` episode per day.

use crate::config::CoreConfig;
use crate::engine::broker::OrderType;
use crate::engine::SimulatedBroker;
use crate::external::{EmbeddingBackend, MarketDataAdapter, MultiAgentAnalyser, VectorIndex};
use crate::memory::{DecisionChain, DecisionContext, Direction, MemoryStore, TradeOutcome, TradingEpisode};
use crate::monitor::TaskMonitor;
use crate::trainer::assemble::build_decision_context;
use crate::trainer::export::TrainingDataExporter;
use crate::trainer::preload::MarketDataPreload;
use crate::trainer::snapshot::snapshot_market_state;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

pub struct BasketTrainer<'a, M, B, V>
where
    M: MultiAgentAnalyser,
    B: EmbeddingBackend,
    V: VectorIndex,
{
    symbols: Vec<String>,
    preloads: HashMap<String, MarketDataPreload>,
    analyser: &'a M,
    memory: &'a MemoryStore<B, V>,
    monitor: &'a TaskMonitor,
    config: &'a CoreConfig,
    exporter: Option<&'a TrainingDataExporter>,
    top_k: usize,
    broker: SimulatedBroker,
}

impl<'a, M, B, V> BasketTrainer<'a, M, B, V>
where
    M: MultiAgentAnalyser,
    B: EmbeddingBackend,
    V: VectorIndex,
{
    pub fn new(
        adapter: &dyn MarketDataAdapter,
        analyser: &'a M,
        memory: &'a MemoryStore<B, V>,
        monitor: &'a TaskMonitor,
        config: &'a CoreConfig,
        exporter: Option<&'a TrainingDataExporter>,
        symbols: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
        top_k: usize,
    ) -> Result<Self> {
        let mut preloads = HashMap::new();
        for symbol in &symbols {
            preloads.insert(symbol.clone(), MarketDataPreload::load(adapter, symbol, start, end)?);
        }
        let broker = SimulatedBroker::new(config.initial_cash, 0.0, 0.0);
        Ok(Self {
            symbols,
            preloads,
            analyser,
            memory,
            monitor,
            config,
            exporter,
            top_k,
            broker,
        })
    }

    fn trading_days(&self) -> Vec<NaiveDate> {
        self.preloads
            .values()
            .next()
            .map(|p| p.trading_days().to_vec())
            .unwrap_or_default()
    }

    pub fn run(&mut self, task_id: &str, should_stop: &AtomicBool) -> Result<()> {
        let trading_days = self.trading_days();
        let total_steps = trading_days.len() as u64;

        let existing = self.monitor.get_checkpoint(task_id)?;
        let (start_idx, mut cumulative) = match &existing {
            Some(cp) if cp.is_resumable() => (cp.resume_step() as usize, cp.metadata.clone()),
            _ => (1, HashMap::new()),
        };
        self.monitor.start_task(task_id, "portfolio", total_steps)?;

        for (i, date) in trading_days.iter().enumerate().skip(start_idx.saturating_sub(1)) {
            if should_stop.load(Ordering::Relaxed) {
                self.monitor.pause_task(task_id)?;
                info!(task_id, day = i, "portfolio trainer paused cooperatively");
                return Ok(());
            }

            let equity_before = self.broker.equity();

            // Forced exit on age >= holding_days, before any new entries.
            let held: Vec<(String, NaiveDate)> = self
                .broker
                .positions()
                .map(|p| (p.symbol.clone(), p.bought_date))
                .collect();
            let mut expiring = Vec::new();
            for (symbol, bought_date) in held {
                let age = self.preloads[&symbol].trading_days_between(bought_date, *date).unwrap_or(0);
                if age >= self.config.holding_days {
                    expiring.push(symbol);
                }
            }

            for symbol in &expiring {
                if let Some(bar) = self.preloads[symbol].bar(*date) {
                    let _ = self.broker.sell(symbol, bar.close, 1.0, OrderType::Market, *date);
                }
            }

            let mut analyses_all = Vec::new();
            let mut bull_all = Vec::new();
            let mut bear_all = Vec::new();
            let mut decisions_all = Vec::new();

            let held_count = self.broker.positions().count();
            let mut free_slots = self.config.max_positions.saturating_sub(held_count);

            for symbol in self.symbols.clone() {
                if free_slots == 0 || self.broker.position(&symbol).is_some() {
                    continue;
                }
                let Some(preload) = self.preloads.get(&symbol) else { continue };
                let Some(state) = snapshot_market_state(preload, &symbol, *date).ok() else { continue };
                let probe = DecisionContext::new(format!("symbol={symbol} date={date}"));
                let similar = self.memory.retrieve_episodes(&probe, self.top_k).unwrap_or_default();
                let analysis = self.analyser.analyse(&symbol, *date, &probe, &similar)?;

                if analysis.final_action == Direction::Long {
                    if let Some(bar) = preload.bar(*date) {
                        if self
                            .broker
                            .buy(&symbol, bar.close, self.config.position_size, OrderType::Market, *date)?
                            .is_some()
                        {
                            free_slots -= 1;
                        }
                    }
                }

                bull_all.push(format!("[{symbol}] {}", analysis.decision_chain.bull_argument));
                bear_all.push(format!("[{symbol}] {}", analysis.decision_chain.bear_argument));
                decisions_all.push(format!("[{symbol}] {:?}", analysis.final_action));
                analyses_all.extend(analysis.analyses);
            }

            self.broker.record_snapshot(*date);
            self.broker.on_day_end();
            let equity_after = self.broker.equity();

            let pct_return = if equity_before > 0.0 { (equity_after - equity_before) / equity_before } else { 0.0 };
            let outcome = TradeOutcome {
                action: Direction::Hold,
                entry_price: equity_before,
                exit_price: equity_after,
                holding_days: 1,
                pct_return,
                max_drawdown: 0.0,
            };

            let combined_chain = DecisionChain {
                bull_argument: bull_all.join(" ; "),
                bear_argument: bear_all.join(" ; "),
                judge_decision: decisions_all.join(" ; "),
                risk_decision: format!("cash={:.2} equity={:.2}", self.broker.cash(), equity_after),
                final_action: Direction::Hold,
            };

            let synthetic_state = crate::memory::MarketState {
                date: *date,
                symbol: "PORTFOLIO".to_string(),
                open: equity_before,
                high: equity_after.max(equity_before),
                low: equity_after.min(equity_before),
                close: equity_after,
                volume: 0.0,
                rsi: None,
                macd: None,
                ma_short: None,
                ma_long: None,
                regime: None,
            };
            let decision_context = build_decision_context(
                &synthetic_state,
                &crate::external::AnalysisOutcome {
                    analyses: analyses_all.clone(),
                    decision_chain: combined_chain.clone(),
                    final_action: Direction::Hold,
                    target_ratio: 0.0,
                },
            );

            let outcome_result = outcome.narrative();
            let success = outcome.pct_return > 0.0;
            let episode = TradingEpisode {
                schema_version: crate::memory::CURRENT_SCHEMA_VERSION,
                episode_id: TradingEpisode::episode_id_for(*date, "PORTFOLIO"),
                date: *date,
                symbol: "PORTFOLIO".to_string(),
                market_state: synthetic_state,
                analyses: analyses_all,
                decision_chain: combined_chain,
                outcome_result,
                outcome,
                decision_context,
                success,
            };

            if self.memory.add_episode(&episode)? {
                if let Some(exporter) = self.exporter {
                    exporter.append(&episode, "Given today's basket state, decide entries and exits.")?;
                }
            }

            cumulative.insert(
                "episodes_written".to_string(),
                serde_json::json!(cumulative.get("episodes_written").and_then(|v| v.as_u64()).unwrap_or(0) + 1),
            );
            self.monitor.update_progress(task_id, (i + 1) as u64, (i + 1) as u64, cumulative.clone())?;
        }

        self.monitor.complete_task(task_id, cumulative)?;
        Ok(())
    }
}
