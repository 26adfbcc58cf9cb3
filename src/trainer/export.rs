//! JSONL export (spec §4.5): one `{instruction, input, output, metadata}`
//! line per successful episode, where `output` is decision-time text only.

use crate::memory::TradingEpisode;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize)]
struct TrainingRecord<'a> {
    instruction: &'a str,
    input: &'a str,
    output: &'a str,
    metadata: serde_json::Value,
}

pub struct TrainingDataExporter {
    path: PathBuf,
    file: Mutex<File>,
}

impl TrainingDataExporter {
    pub fn open(dir: impl AsRef<Path>, task_id: &str) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.as_ref().join(format!("{task_id}.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening training-data export {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// `output` is the decision-context text that produced `episode`'s
    /// final action — never the outcome narrative.
    pub fn append(&self, episode: &TradingEpisode, instruction: &str) -> Result<()> {
        let record = TrainingRecord {
            instruction,
            input: &episode.decision_context,
            output: &format!("{:?}", episode.decision_chain.final_action),
            metadata: serde_json::json!({
                "episode_id": episode.episode_id,
                "symbol": episode.symbol,
                "date": episode.date,
            }),
        };
        let line = serde_json::to_string(&record)?;
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
