//! Leakage enforcement (spec §4.2.2), the runtime guard behind invariant
//! I1: `decision_context` must never contain an outcome-keyword token.

use crate::config::LeakageConfig;
use crate::error::MemoryError;

pub struct LeakageGuard {
    blocklist: Vec<String>,
    fail_closed: bool,
}

impl LeakageGuard {
    pub fn new(config: &LeakageConfig) -> anyhow::Result<Self> {
        if config.fail_closed && config.blocklist.is_empty() {
            anyhow::bail!("leakage blocklist is empty; refusing to start in fail-closed mode");
        }
        Ok(Self {
            blocklist: config.blocklist.iter().map(|t| t.to_lowercase()).collect(),
            fail_closed: config.fail_closed,
        })
    }

    /// Returns `Err(LeakageDetected)` on the first blocklist token found in
    /// `text`. Case-insensitive substring match, matching the conservative
    /// "treat the list as configuration and fail closed on unknown fields"
    /// stance from spec §9.
    pub fn check(&self, text: &str) -> Result<(), MemoryError> {
        let lowered = text.to_lowercase();
        for token in &self.blocklist {
            if lowered.contains(token.as_str()) {
                return Err(MemoryError::LeakageDetected {
                    token: token.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn fail_closed(&self) -> bool {
        self.fail_closed
    }
}
