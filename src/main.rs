//! Epoch Trader CLI — drives the Time-Travel Trainer against a local bar
//! file and a checkpoint directory. The market-data adapter and
//! multi-agent analyser are external collaborators by design; this binary
//! wires in the simplest concrete stand-ins (a JSON bar reader, a
//! hold-only analyser) so the pipeline runs end to end without a live
//! vendor integration.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crossbeam::channel::bounded;
use dotenv::dotenv;
use epoch_trader::config::{CoreConfig, MemoryMode};
use epoch_trader::engine::{
    Action, MarketClock, PortfolioState, Signal, SimulatedBroker, Strategy, StrategySlot,
    Supervisor, SupervisorOutcome,
};
use epoch_trader::external::{
    AnalysisOutcome, InMemoryVectorIndex, MarketBar, MarketDataAdapter, MultiAgentAnalyser,
    OpenRouterEmbeddingBackend,
};
use epoch_trader::memory::{DecisionChain, DecisionContext, Direction, EmbeddingService, LeakageGuard, MemoryStore, TradingEpisode};
use epoch_trader::monitor::TaskMonitor;
use epoch_trader::trainer::{BasketTrainer, MarketDataPreload, SingleSymbolTrainer, TrainingDataExporter};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "epoch-trader", about = "Episodic-memory training platform for equity trading agents")]
struct Cli {
    #[arg(long, env = "EPOCH_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, overlay, and print the resolved configuration.
    CheckConfig,
    /// Print the latest checkpoint for a task, if one exists.
    MonitorStatus {
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "results/checkpoints")]
        checkpoint_dir: PathBuf,
    },
    /// Run the single-symbol trainer against a local JSON bar file.
    TrainSingleSymbol {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        bars_file: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "results/checkpoints")]
        checkpoint_dir: PathBuf,
        #[arg(long, default_value = "training_data")]
        export_dir: PathBuf,
    },
    /// Run the portfolio-mode (basket) trainer against a local JSON bar file.
    TrainBasket {
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[arg(long)]
        bars_file: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "results/checkpoints")]
        checkpoint_dir: PathBuf,
        #[arg(long, default_value = "training_data")]
        export_dir: PathBuf,
    },
    /// Run the supervised Multi-Strategy Trading Engine against a local JSON
    /// bar file, restarting the worker up to `max_restarts` times on crash
    /// or heartbeat stall.
    RunEngine {
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[arg(long)]
        bars_file: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
}

/// Reads bars for one symbol from a local JSON file: `[{date, open, high,
/// low, close, volume}, ...]`. Stands in for a real vendor feed, which is
/// an external collaborator by design.
struct JsonBarsAdapter {
    bars: Vec<MarketBar>,
}

impl JsonBarsAdapter {
    fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let bars: Vec<MarketBar> = serde_json::from_str(&raw)?;
        Ok(Self { bars })
    }
}

impl MarketDataAdapter for JsonBarsAdapter {
    fn get_bars(&self, _symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<MarketBar>> {
        Ok(self.bars.iter().filter(|b| b.date >= start && b.date <= end).copied().collect())
    }
}

/// The simplest concrete `MultiAgentAnalyser`: always holds. A real
/// deployment wires in the actual multi-agent analyser described in
/// spec §6; this crate treats that analyser as opaque and out of scope.
struct HoldAnalyser;

impl MultiAgentAnalyser for HoldAnalyser {
    fn analyse(
        &self,
        _symbol: &str,
        _date: NaiveDate,
        _context: &DecisionContext,
        _retrieved: &[TradingEpisode],
    ) -> Result<AnalysisOutcome> {
        Ok(AnalysisOutcome {
            analyses: vec![],
            decision_chain: DecisionChain {
                bull_argument: String::new(),
                bear_argument: String::new(),
                judge_decision: "hold".to_string(),
                risk_decision: "no analyser configured".to_string(),
                final_action: Direction::Hold,
            },
            final_action: Direction::Hold,
            target_ratio: 0.0,
        })
    }
}

/// The simplest concrete `Strategy`: allocates a fixed slice of equity to a
/// symbol the first time it sees it, then holds. Stands in for the real
/// strategies the engine runs in production, which are external
/// collaborators by design.
struct PassiveHoldStrategy;

impl Strategy for PassiveHoldStrategy {
    fn id(&self) -> &str {
        "passive_hold"
    }

    fn name(&self) -> &str {
        "PassiveHold"
    }

    fn generate_signal(&mut self, _symbol: &str, _bar: &MarketBar, state: &PortfolioState) -> Signal {
        if state.has_position {
            Signal::hold("already holding")
        } else {
            Signal {
                action: Action::Buy,
                target_ratio: 0.2,
                reason: "initial allocation".to_string(),
                confidence: 1.0,
            }
        }
    }
}

/// Shared memory-store construction for the two trainer subcommands: an
/// `OpenRouterEmbeddingBackend` if `OPENROUTER_API_KEY` is set, falling
/// back to a disabled (embeddings-less) store otherwise.
fn build_memory_store(config: &CoreConfig) -> Result<MemoryStore<OpenRouterEmbeddingBackend, InMemoryVectorIndex>> {
    let embedding_backend = OpenRouterEmbeddingBackend::from_env(
        reqwest::Client::new(),
        "text-embedding-3-small",
        1536,
        8191,
        config.cache_ttl_s,
    );
    let embeddings = match embedding_backend {
        Ok(backend) => Some(EmbeddingService::new(backend)),
        Err(e) => {
            tracing::warn!(error = %e, "no embedding backend configured; memory store will be disabled");
            None
        }
    };
    let leakage = LeakageGuard::new(&config.leakage)?;
    Ok(MemoryStore::new(MemoryMode::Training, embeddings, InMemoryVectorIndex::new(), leakage))
}

/// Runs the engine once, end to end, over every trading day in
/// `[start, end]`. Pulses `heartbeat` once per day and checks
/// `worker_stop_rx` cooperatively so the supervisor's restart ceiling
/// never fires on a clean, completed run.
fn run_engine_once(
    bars_file: &std::path::Path,
    symbols: &[String],
    config: &CoreConfig,
    start: NaiveDate,
    end: NaiveDate,
    heartbeat: &epoch_trader::engine::Heartbeat,
    worker_stop_rx: &crossbeam::channel::Receiver<()>,
) -> Result<()> {
    let adapter = JsonBarsAdapter::load(bars_file)?;
    let mut preloads = HashMap::new();
    for symbol in symbols {
        preloads.insert(symbol.clone(), MarketDataPreload::load(&adapter, symbol, start, end)?);
    }
    let trading_days = preloads.values().next().map(|p| p.trading_days().to_vec()).unwrap_or_default();

    let mut clock = MarketClock::new(symbols.to_vec());
    let mut slots = vec![StrategySlot::new(
        Box::new(PassiveHoldStrategy),
        SimulatedBroker::new(config.initial_cash, 0.0, 0.0),
    )];

    for date in trading_days {
        if worker_stop_rx.try_recv().is_ok() {
            info!("engine worker stopping cooperatively");
            return Ok(());
        }
        heartbeat.pulse();
        let fetch = |symbol: &str| preloads.get(symbol).and_then(|p| p.bar(date));
        clock.tick(date, &fetch, &mut slots);
    }

    for slot in &slots {
        info!(
            strategy = slot.strategy.name(),
            total_trades = slot.performance.total_trades,
            realized_pnl = slot.performance.realized_pnl,
            "engine run complete"
        );
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epoch_trader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: &std::path::Path) -> CoreConfig {
    let mut cfg = CoreConfig::from_file(path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %path.display(), "falling back to default config");
        CoreConfig::default()
    });
    cfg.apply_env_overrides();
    cfg
}

fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig => {
            let cfg = load_config(&cli.config);
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }

        Command::MonitorStatus { task_id, checkpoint_dir } => {
            let monitor = TaskMonitor::open(&checkpoint_dir)?;
            match monitor.get_checkpoint(&task_id)? {
                Some(cp) => println!("{}", serde_json::to_string_pretty(&cp)?),
                None => println!("no checkpoint for task {task_id}"),
            }
        }

        Command::TrainSingleSymbol { symbol, bars_file, start, end, task_id, checkpoint_dir, export_dir } => {
            let config = load_config(&cli.config);
            let adapter = JsonBarsAdapter::load(&bars_file)?;
            let analyser = HoldAnalyser;
            let memory = build_memory_store(&config)?;

            let monitor = TaskMonitor::open(&checkpoint_dir)?;
            let exporter = if config.export_training_data {
                Some(TrainingDataExporter::open(&export_dir, &task_id)?)
            } else {
                None
            };

            let trainer = SingleSymbolTrainer::new(
                &adapter,
                &analyser,
                &memory,
                &monitor,
                &config,
                exporter.as_ref(),
                &symbol,
                start,
                end,
                5,
            )?;

            let should_stop = AtomicBool::new(false);
            trainer.run(&task_id, &should_stop)?;
            info!(task_id, "training run finished");
        }

        Command::TrainBasket { symbols, bars_file, start, end, task_id, checkpoint_dir, export_dir } => {
            let config = load_config(&cli.config);
            let adapter = JsonBarsAdapter::load(&bars_file)?;
            let analyser = HoldAnalyser;
            let memory = build_memory_store(&config)?;

            let monitor = TaskMonitor::open(&checkpoint_dir)?;
            let exporter = if config.export_training_data {
                Some(TrainingDataExporter::open(&export_dir, &task_id)?)
            } else {
                None
            };

            let mut trainer = BasketTrainer::new(
                &adapter,
                &analyser,
                &memory,
                &monitor,
                &config,
                exporter.as_ref(),
                symbols,
                start,
                end,
                5,
            )?;

            let should_stop = AtomicBool::new(false);
            trainer.run(&task_id, &should_stop)?;
            info!(task_id, "portfolio training run finished");
        }

        Command::RunEngine { symbols, bars_file, start, end } => {
            let config = load_config(&cli.config);
            let supervisor = Supervisor::new(Duration::from_secs(config.heartbeat_interval_s), config.max_restarts);
            let (stop_tx, stop_rx) = bounded::<()>(1);

            let outcome = supervisor.supervise(stop_rx, |heartbeat, worker_stop_rx| {
                let bars_file = bars_file.clone();
                let symbols = symbols.clone();
                let config = config.clone();
                let stop_tx = stop_tx.clone();
                let (error_tx, error_rx) = bounded::<String>(1);

                let handle = thread::spawn(move || {
                    match run_engine_once(&bars_file, &symbols, &config, start, end, &heartbeat, &worker_stop_rx) {
                        Ok(()) => {
                            // A clean, completed run reports as a stop
                            // request so the supervisor never treats it
                            // as a crash to restart.
                            let _ = stop_tx.send(());
                        }
                        Err(e) => {
                            let _ = error_tx.send(e.to_string());
                        }
                    }
                });
                (handle, error_rx)
            });

            match outcome {
                SupervisorOutcome::StoppedByRequest => info!("engine run completed"),
                SupervisorOutcome::MaxRestartsExceeded { last_error } => {
                    return Err(anyhow::anyhow!("engine exhausted its restart budget: {last_error}"));
                }
            }
        }
    }

    Ok(())
}
