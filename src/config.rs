//! The configuration surface (spec §6) — the only options the core
//! recognises. Loaded from a TOML file with environment-variable overrides,
//! the same layering `main.rs` already performs with `dotenv` before reading
//! env-derived settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_holding_days() -> u32 {
    5
}
fn default_max_positions() -> usize {
    5
}
fn default_position_size() -> f64 {
    0.2
}
fn default_initial_cash() -> f64 {
    1_000_000.0
}
fn default_heartbeat_interval_s() -> u64 {
    5
}
fn default_max_restarts() -> u32 {
    3
}
fn default_cache_ttl_s() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryMode {
    Analysis,
    Training,
}

impl Default for MemoryMode {
    fn default() -> Self {
        MemoryMode::Analysis
    }
}

/// `CoreConfig` — every field here corresponds to a row in spec.md §6's
/// configuration table. Nothing outside this struct is a recognised option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_holding_days")]
    pub holding_days: u32,

    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    #[serde(default = "default_position_size")]
    pub position_size: f64,

    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,

    #[serde(default = "default_heartbeat_interval_s")]
    pub heartbeat_interval_s: u64,

    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    #[serde(default = "default_cache_ttl_s")]
    pub cache_ttl_s: u64,

    #[serde(default)]
    pub memory_mode: MemoryMode,

    #[serde(default = "default_true")]
    pub enable_small_model_routing: bool,

    #[serde(default)]
    pub leakage: LeakageConfig,

    #[serde(default)]
    pub export_training_data: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            holding_days: default_holding_days(),
            max_positions: default_max_positions(),
            position_size: default_position_size(),
            initial_cash: default_initial_cash(),
            heartbeat_interval_s: default_heartbeat_interval_s(),
            max_restarts: default_max_restarts(),
            cache_ttl_s: default_cache_ttl_s(),
            memory_mode: MemoryMode::default(),
            enable_small_model_routing: default_true(),
            leakage: LeakageConfig::default(),
            export_training_data: false,
        }
    }
}

impl CoreConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: CoreConfig = toml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Overlay `EPOCH_`-prefixed environment variables onto a loaded config.
    /// Mirrors the teacher's `dotenv().ok()` + `env::var` layering in
    /// `main.rs`, generalized into one call instead of scattered `env::var`s.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EPOCH_HOLDING_DAYS") {
            if let Ok(v) = v.parse() {
                self.holding_days = v;
            }
        }
        if let Ok(v) = std::env::var("EPOCH_INITIAL_CASH") {
            if let Ok(v) = v.parse() {
                self.initial_cash = v;
            }
        }
        if let Ok(v) = std::env::var("EPOCH_MEMORY_MODE") {
            self.memory_mode = match v.to_ascii_uppercase().as_str() {
                "TRAINING" => MemoryMode::Training,
                _ => MemoryMode::Analysis,
            };
        }
    }
}

/// Policy-level blocklist for the leakage guard (§4.2.2 / §9 Open Question).
/// Deliberately configuration, not a hardcoded list: implementers disagree
/// on which synonyms count, so the store fails closed on an empty list
/// rather than guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageConfig {
    pub blocklist: Vec<String>,
    #[serde(default = "default_true")]
    pub fail_closed: bool,
}

impl Default for LeakageConfig {
    fn default() -> Self {
        Self {
            blocklist: vec![
                "return".into(),
                "pnl".into(),
                "p&l".into(),
                "gain".into(),
                "loss %".into(),
                "drawdown".into(),
                "exit_price".into(),
                "outcome".into(),
                "profit".into(),
            ],
            fail_closed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.holding_days, 5);
        assert!(cfg.enable_small_model_routing);
        assert_eq!(cfg.memory_mode, MemoryMode::Analysis);
    }

    #[test]
    fn leakage_blocklist_is_never_empty_by_default() {
        let cfg = LeakageConfig::default();
        assert!(!cfg.blocklist.is_empty());
        assert!(cfg.fail_closed);
    }
}
