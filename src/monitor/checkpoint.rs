//! `TaskCheckpoint` (spec §3 / §4.3): the durable record of a run's progress.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCheckpoint {
    pub task_id: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub current_step: u64,
    pub completed_steps: u64,
    pub total_steps: u64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub error_text: Option<String>,
}

impl TaskCheckpoint {
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>, total_steps: u64) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            status: TaskStatus::Running,
            current_step: 0,
            completed_steps: 0,
            total_steps,
            metadata: HashMap::new(),
            error_text: None,
        }
    }

    /// Resume protocol step 2 (spec §4.3): the step to begin at when
    /// resuming an incomplete run.
    pub fn resume_step(&self) -> u64 {
        self.completed_steps + 1
    }

    pub fn is_resumable(&self) -> bool {
        self.status != TaskStatus::Completed
    }
}
