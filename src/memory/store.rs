//! The episodic memory store's state machine (spec §4.2): `ANALYSIS`
//! (read-only) vs `TRAINING` (read-write), plus the four public operations.
//! The vector backend is serialised behind a single `parking_lot::Mutex`
//! per spec §5 ("serialised per instance by an internal lock").

use crate::config::MemoryMode;
use crate::error::MemoryError;
use crate::external::{EmbeddingBackend, EpisodePatch, EpisodePayload, VectorIndex};
use crate::memory::embeddings::EmbeddingService;
use crate::memory::episode::{DecisionContext, TradingEpisode, CURRENT_SCHEMA_VERSION};
use crate::memory::leakage::LeakageGuard;
use parking_lot::Mutex;
use tracing::warn;

pub struct MemoryStore<B: EmbeddingBackend, V: VectorIndex> {
    mode: MemoryMode,
    embeddings: Option<EmbeddingService<B>>,
    index: Mutex<V>,
    leakage: LeakageGuard,
}

impl<B: EmbeddingBackend, V: VectorIndex> MemoryStore<B, V> {
    pub fn new(
        mode: MemoryMode,
        embeddings: Option<EmbeddingService<B>>,
        index: V,
        leakage: LeakageGuard,
    ) -> Self {
        Self {
            mode,
            embeddings,
            index: Mutex::new(index),
            leakage,
        }
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    /// `get_embedding(text)` from spec §4.2 / §4.2.1.
    pub fn get_embedding(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let svc = self.embeddings.as_ref().ok_or(MemoryError::MemoryDisabled)?;
        svc.get_embedding(text)
    }

    /// `add_episode(episode)` from spec §4.2. Returns `false` (not an
    /// error) when the store is in `ANALYSIS` mode, per the documented
    /// fail-fast-with-sentinel contract — mode violations never raise.
    pub fn add_episode(&self, episode: &TradingEpisode) -> Result<bool, MemoryError> {
        if self.mode != MemoryMode::Training {
            warn!(episode_id = %episode.episode_id, "memory store in ANALYSIS mode: rejecting write");
            return Ok(false);
        }

        // Invariant I1, runtime guard: decision_context must be free of
        // outcome-keyword tokens before it ever reaches the embedder.
        self.leakage.check(&episode.decision_context)?;

        // Invariant I2: the vector is computed from decision_context only.
        let vector = self.get_embedding(&episode.decision_context)?;

        let payload = EpisodePayload {
            schema_version: CURRENT_SCHEMA_VERSION,
            episode_json: serde_json::to_string(episode)
                .map_err(|e| MemoryError::EmbeddingInvalidInput(e.to_string()))?,
        };

        self.index
            .lock()
            .add(&episode.episode_id, &vector, payload)
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

        Ok(true)
    }

    /// `retrieve_episodes(query_context, top_k)` from spec §4.2. Fully
    /// functional in both modes.
    pub fn retrieve_episodes(
        &self,
        query_context: &DecisionContext,
        top_k: usize,
    ) -> Result<Vec<TradingEpisode>, MemoryError> {
        let vector = self.get_embedding(&query_context.text)?;
        let hits = self
            .index
            .lock()
            .search(&vector, top_k)
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

        let mut episodes = Vec::with_capacity(hits.len());
        for (id, _score) in hits {
            match self.load_episode(&id)? {
                Some(ep) => episodes.push(ep),
                None => continue,
            }
        }
        Ok(episodes)
    }

    fn load_episode(&self, id: &str) -> Result<Option<TradingEpisode>, MemoryError> {
        let payload = self
            .index
            .lock()
            .get(id)
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        if payload.schema_version < CURRENT_SCHEMA_VERSION {
            warn!(episode_id = id, version = payload.schema_version, "rejecting legacy episode record on read");
            return Err(MemoryError::LegacyRecordRejected(id.to_string()));
        }

        let episode: TradingEpisode = serde_json::from_str(&payload.episode_json)
            .map_err(|e| MemoryError::EmbeddingInvalidInput(e.to_string()))?;
        Ok(Some(episode))
    }

    /// Admin-only. `patch` must not touch fields that participated in the
    /// stored vector — i.e. `decision_context` itself is immutable once
    /// written; only `outcome_result`/`success` may be patched.
    pub fn update_episode(&self, id: &str, patch: EpisodePatch) -> Result<(), MemoryError> {
        if self.mode != MemoryMode::Training {
            return Err(MemoryError::ReadOnlyMode);
        }

        let mut episode = self
            .load_episode(id)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;

        if let Some(outcome_result) = patch.outcome_result {
            episode.outcome_result = outcome_result;
        }
        if let Some(success) = patch.success {
            episode.success = success;
        }

        let episode_json = serde_json::to_string(&episode)
            .map_err(|e| MemoryError::EmbeddingInvalidInput(e.to_string()))?;
        self.index
            .lock()
            .update_payload(id, episode_json)
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))
    }

    pub fn delete_episode(&self, id: &str) -> Result<(), MemoryError> {
        if self.mode != MemoryMode::Training {
            return Err(MemoryError::ReadOnlyMode);
        }
        self.index
            .lock()
            .delete(id)
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeakageConfig;
    use crate::external::test_support::FakeEmbeddingBackend;
    use crate::external::InMemoryVectorIndex;
    use crate::memory::episode::tests::sample_episode;

    fn store_in(mode: MemoryMode) -> MemoryStore<FakeEmbeddingBackend, InMemoryVectorIndex> {
        let embeddings = EmbeddingService::new(FakeEmbeddingBackend::new(8, 1000));
        let leakage = LeakageGuard::new(&LeakageConfig::default()).unwrap();
        MemoryStore::new(mode, Some(embeddings), InMemoryVectorIndex::new(), leakage)
    }

    #[test]
    fn add_then_retrieve_returns_the_episode_as_top_result() {
        // R1 round-trip property.
        let store = store_in(MemoryMode::Training);
        let ep = sample_episode();
        assert!(store.add_episode(&ep).unwrap());

        let results = store
            .retrieve_episodes(&DecisionContext::new(ep.decision_context.clone()), 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].episode_id, ep.episode_id);
    }

    #[test]
    fn analysis_mode_rejects_writes_but_allows_reads() {
        // Scenario 6 from spec §8.
        let store = store_in(MemoryMode::Analysis);
        let ep = sample_episode();
        assert_eq!(store.add_episode(&ep).unwrap(), false);

        let results = store
            .retrieve_episodes(&DecisionContext::new("anything".to_string()), 5)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn add_episode_rejects_leaking_decision_context() {
        // Scenario 2 from spec §8.
        let store = store_in(MemoryMode::Training);
        let mut ep = sample_episode();
        ep.decision_context = "analyst expects eventual return +3.2%".to_string();
        let err = store.add_episode(&ep).unwrap_err();
        assert!(matches!(err, MemoryError::LeakageDetected { .. }));
    }

    #[test]
    fn update_can_touch_outcome_result_but_not_vector_input() {
        let store = store_in(MemoryMode::Training);
        let ep = sample_episode();
        store.add_episode(&ep).unwrap();

        store
            .update_episode(
                &ep.episode_id,
                EpisodePatch {
                    outcome_result: Some("closed at +3.2%".to_string()),
                    success: Some(true),
                },
            )
            .unwrap();

        let results = store
            .retrieve_episodes(&DecisionContext::new(ep.decision_context.clone()), 1)
            .unwrap();
        assert_eq!(results[0].outcome_result, "closed at +3.2%");
    }
}
