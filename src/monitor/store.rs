//! Task Monitor (spec §4.3): crash-safe checkpointing with a
//! rename-into-place write path, guarded by a single-writer lock file on
//! the checkpoint directory (spec §5).

use super::checkpoint::{TaskCheckpoint, TaskStatus};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub struct TaskMonitor {
    dir: PathBuf,
    _lock: File,
}

impl TaskMonitor {
    /// Acquires the directory's advisory lock. Only one `TaskMonitor` may
    /// be live against a given `dir` at a time (spec §5).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating checkpoint directory {}", dir.display()))?;

        let lock_path = dir.join(".lock");
        let lock = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| {
                format!(
                    "checkpoint directory {} is already locked by another process",
                    dir.display()
                )
            })?;

        Ok(Self { dir, _lock: lock })
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }

    /// Serializes `checkpoint` to a sibling temp file and renames it over
    /// the final path so a reader never observes a torn file.
    fn write_durably(&self, checkpoint: &TaskCheckpoint) -> Result<()> {
        let final_path = self.path_for(&checkpoint.task_id);
        let tmp_path = self.dir.join(format!(
            "{}.json.tmp-{}",
            checkpoint.task_id,
            std::process::id()
        ));

        let body = serde_json::to_vec_pretty(checkpoint)?;
        fs::write(&tmp_path, &body)
            .with_context(|| format!("writing checkpoint temp file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("renaming checkpoint into place {}", final_path.display()))?;
        Ok(())
    }

    /// `start_task(task_id, task_type, total_steps)` from spec §4.3.
    pub fn start_task(&self, task_id: &str, task_type: &str, total_steps: u64) -> Result<TaskCheckpoint> {
        if let Some(existing) = self.get_checkpoint(task_id)? {
            if existing.status == TaskStatus::Completed {
                return Err(anyhow!("task {task_id} is already COMPLETED; refusing to restart"));
            }
            return Ok(existing);
        }

        let checkpoint = TaskCheckpoint::new(task_id, task_type, total_steps);
        self.write_durably(&checkpoint)?;
        Ok(checkpoint)
    }

    /// `update_progress(task_id, current_step, completed_steps, metadata)`
    /// from spec §4.3. Durable before returning.
    pub fn update_progress(
        &self,
        task_id: &str,
        current_step: u64,
        completed_steps: u64,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<TaskCheckpoint> {
        let mut checkpoint = self
            .get_checkpoint(task_id)?
            .ok_or_else(|| anyhow!("no checkpoint exists for task {task_id}"))?;

        checkpoint.current_step = current_step;
        checkpoint.completed_steps = completed_steps;
        checkpoint.metadata.extend(metadata);
        self.write_durably(&checkpoint)?;
        Ok(checkpoint)
    }

    /// `get_checkpoint(task_id)` from spec §4.3.
    pub fn get_checkpoint(&self, task_id: &str) -> Result<Option<TaskCheckpoint>> {
        let path = self.path_for(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading checkpoint {}", path.display()))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// `complete_task(task_id, final_metadata)` from spec §4.3.
    pub fn complete_task(&self, task_id: &str, final_metadata: HashMap<String, serde_json::Value>) -> Result<()> {
        let mut checkpoint = self
            .get_checkpoint(task_id)?
            .ok_or_else(|| anyhow!("no checkpoint exists for task {task_id}"))?;
        checkpoint.status = TaskStatus::Completed;
        checkpoint.completed_steps = checkpoint.total_steps;
        checkpoint.metadata.extend(final_metadata);
        self.write_durably(&checkpoint)
    }

    /// Transitions a task to `PAUSED` (spec §5's cooperative cancellation:
    /// the trainer checks `should_stop` each loop iteration and pauses
    /// rather than failing). The checkpoint is retained for a later
    /// resume via the same `get_checkpoint` + resume-step protocol.
    pub fn pause_task(&self, task_id: &str) -> Result<()> {
        let mut checkpoint = self
            .get_checkpoint(task_id)?
            .ok_or_else(|| anyhow!("no checkpoint exists for task {task_id}"))?;
        checkpoint.status = TaskStatus::Paused;
        self.write_durably(&checkpoint)
    }

    /// `fail_task(task_id, error_text)` from spec §4.3. The checkpoint is
    /// retained, not deleted, so a later resume attempt can inspect it.
    pub fn fail_task(&self, task_id: &str, error_text: &str) -> Result<()> {
        let mut checkpoint = self
            .get_checkpoint(task_id)?
            .ok_or_else(|| anyhow!("no checkpoint exists for task {task_id}"))?;
        checkpoint.status = TaskStatus::Failed;
        checkpoint.error_text = Some(error_text.to_string());
        self.write_durably(&checkpoint)
    }
}

impl Drop for TaskMonitor {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.dir.join(".lock"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_task_is_idempotent_for_an_in_progress_task() {
        let tmp = tempfile::tempdir().unwrap();
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        let first = monitor.start_task("t1", "single_symbol", 100).unwrap();
        let second = monitor.start_task("t1", "single_symbol", 100).unwrap();
        assert_eq!(first.task_id, second.task_id);
        assert_eq!(second.status, TaskStatus::Running);
    }

    #[test]
    fn start_task_refuses_to_restart_a_completed_task() {
        let tmp = tempfile::tempdir().unwrap();
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        monitor.start_task("t1", "single_symbol", 10).unwrap();
        monitor.complete_task("t1", HashMap::new()).unwrap();
        assert!(monitor.start_task("t1", "single_symbol", 10).is_err());
    }

    #[test]
    fn update_progress_persists_across_a_fresh_open() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let monitor = TaskMonitor::open(tmp.path()).unwrap();
            monitor.start_task("t1", "single_symbol", 10).unwrap();
            monitor
                .update_progress("t1", 3, 3, HashMap::from([("cum_return".to_string(), serde_json::json!(0.02))]))
                .unwrap();
        }
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        let cp = monitor.get_checkpoint("t1").unwrap().unwrap();
        assert_eq!(cp.completed_steps, 3);
        assert_eq!(cp.resume_step(), 4);
    }

    #[test]
    fn second_monitor_on_same_directory_fails_to_acquire_the_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let _first = TaskMonitor::open(tmp.path()).unwrap();
        assert!(TaskMonitor::open(tmp.path()).is_err());
    }

    #[test]
    fn fail_task_retains_the_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let monitor = TaskMonitor::open(tmp.path()).unwrap();
        monitor.start_task("t1", "single_symbol", 10).unwrap();
        monitor.fail_task("t1", "adapter timed out").unwrap();
        let cp = monitor.get_checkpoint("t1").unwrap().unwrap();
        assert_eq!(cp.status, TaskStatus::Failed);
        assert_eq!(cp.error_text.as_deref(), Some("adapter timed out"));
    }
}
