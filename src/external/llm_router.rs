//! `LlmRouter` tiers (spec §6). The core reads only
//! `enable_small_model_routing`; everything else about model selection is
//! the router's business.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

/// A static router keyed by agent name, the simplest concrete
/// implementation a binary can wire in without a network round trip.
pub struct StaticLlmRouter {
    default_tier: ModelTier,
    overrides: std::collections::HashMap<String, ModelTier>,
    small_model_routing_enabled: bool,
}

impl StaticLlmRouter {
    pub fn new(default_tier: ModelTier, small_model_routing_enabled: bool) -> Self {
        Self {
            default_tier,
            overrides: std::collections::HashMap::new(),
            small_model_routing_enabled,
        }
    }

    pub fn with_override(mut self, agent_name: &str, tier: ModelTier) -> Self {
        self.overrides.insert(agent_name.to_string(), tier);
        self
    }
}

impl super::LlmRouter for StaticLlmRouter {
    fn pick_llm(&self, agent_name: &str) -> anyhow::Result<ModelTier> {
        if let Some(tier) = self.overrides.get(agent_name) {
            return Ok(*tier);
        }
        if !self.small_model_routing_enabled && self.default_tier == ModelTier::Small {
            return Ok(ModelTier::Medium);
        }
        Ok(self.default_tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::LlmRouter;

    #[test]
    fn overrides_win_over_default() {
        let router = StaticLlmRouter::new(ModelTier::Medium, true)
            .with_override("bull_agent", ModelTier::Large);
        assert_eq!(router.pick_llm("bull_agent").unwrap(), ModelTier::Large);
        assert_eq!(router.pick_llm("bear_agent").unwrap(), ModelTier::Medium);
    }

    #[test]
    fn disabling_small_model_routing_upgrades_small_default() {
        let router = StaticLlmRouter::new(ModelTier::Small, false);
        assert_eq!(router.pick_llm("any_agent").unwrap(), ModelTier::Medium);
    }
}
