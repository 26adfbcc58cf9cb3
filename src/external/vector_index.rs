//! `VectorIndex` trait (spec §6) plus a brute-force in-memory reference
//! implementation. A real deployment would point this at an external ANN
//! service; the core only ever calls through the trait.

use crate::memory::embeddings::cosine_similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodePayload {
    pub schema_version: u32,
    pub episode_json: String,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodePatch {
    pub outcome_result: Option<String>,
    pub success: Option<bool>,
}

pub trait VectorIndex: Send {
    fn add(&mut self, id: &str, vector: &[f32], payload: EpisodePayload) -> anyhow::Result<()>;
    fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<(String, f32)>>;
    fn get(&self, id: &str) -> anyhow::Result<Option<EpisodePayload>>;
    fn delete(&mut self, id: &str) -> anyhow::Result<()>;
    /// The vector itself is immutable across an update — only the payload
    /// may be patched, and only in fields that did not participate in the
    /// stored vector (enforced one layer up, in `memory::store`).
    fn update_payload(&mut self, id: &str, episode_json: String) -> anyhow::Result<()>;
}

struct Record {
    vector: Vec<f32>,
    payload: EpisodePayload,
}

#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: HashMap<String, Record>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn add(&mut self, id: &str, vector: &[f32], payload: EpisodePayload) -> anyhow::Result<()> {
        self.records.insert(
            id.to_string(),
            Record {
                vector: vector.to_vec(),
                payload,
            },
        );
        Ok(())
    }

    fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<(String, f32)>> {
        let mut scored: Vec<(String, f32)> = self
            .records
            .iter()
            .map(|(id, r)| (id.clone(), cosine_similarity(vector, &r.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn get(&self, id: &str) -> anyhow::Result<Option<EpisodePayload>> {
        Ok(self.records.get(id).map(|r| r.payload.clone()))
    }

    fn delete(&mut self, id: &str) -> anyhow::Result<()> {
        self.records.remove(id);
        Ok(())
    }

    fn update_payload(&mut self, id: &str, episode_json: String) -> anyhow::Result<()> {
        if let Some(r) = self.records.get_mut(id) {
            r.payload.episode_json = episode_json;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> EpisodePayload {
        EpisodePayload {
            schema_version: 2,
            episode_json: s.to_string(),
        }
    }

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let mut idx = InMemoryVectorIndex::new();
        idx.add("a", &[1.0, 0.0], payload("a")).unwrap();
        idx.add("b", &[0.0, 1.0], payload("b")).unwrap();
        let results = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn delete_removes_from_search_results() {
        let mut idx = InMemoryVectorIndex::new();
        idx.add("a", &[1.0, 0.0], payload("a")).unwrap();
        idx.delete("a").unwrap();
        assert!(idx.get("a").unwrap().is_none());
    }
}
