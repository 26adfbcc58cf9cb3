//! The trading-loop supervisor (spec §4.4.5): a dedicated watchdog thread
//! samples a heartbeat published by the worker every `heartbeat_interval`
//! and restarts it up to `max_restarts` times before giving up and
//! requiring manual intervention. `crossbeam::channel` carries the
//! restart/stop commands, `parking_lot::Mutex` guards the heartbeat clock
//! — the same cross-thread-signaling dependencies the rest of this crate
//! already carries.

use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, warn};

#[derive(Clone)]
pub struct Heartbeat(Arc<Mutex<Instant>>);

impl Heartbeat {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn pulse(&self) {
        *self.0.lock() = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.0.lock().elapsed()
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq)]
pub enum SupervisorOutcome {
    StoppedByRequest,
    /// `restart_count == max_restarts`: the service is now in a stopped
    /// state and requires manual intervention (spec §4.4.5).
    MaxRestartsExceeded { last_error: String },
}

pub struct Supervisor {
    heartbeat_interval: Duration,
    max_restarts: u32,
}

impl Supervisor {
    pub fn new(heartbeat_interval: Duration, max_restarts: u32) -> Self {
        Self {
            heartbeat_interval,
            max_restarts,
        }
    }

    /// Drives `spawn_worker` with restart-with-ceiling. `spawn_worker`
    /// receives a fresh `Heartbeat` to pulse and a stop signal it must
    /// honour, and returns the worker's `JoinHandle` plus a channel it
    /// uses to report a terminal error before exiting.
    pub fn supervise<F>(&self, stop_rx: Receiver<()>, mut spawn_worker: F) -> SupervisorOutcome
    where
        F: FnMut(Heartbeat, Receiver<()>) -> (JoinHandle<()>, Receiver<String>),
    {
        let threshold = 2 * self.heartbeat_interval + self.heartbeat_interval;
        let mut restart_count = 0u32;

        loop {
            let (worker_stop_tx, worker_stop_rx) = bounded::<()>(1);
            let heartbeat = Heartbeat::new();
            let (handle, error_rx) = spawn_worker(heartbeat.clone(), worker_stop_rx);

            loop {
                if stop_rx.try_recv().is_ok() {
                    let _ = worker_stop_tx.send(());
                    let _ = handle.join();
                    return SupervisorOutcome::StoppedByRequest;
                }

                if handle.is_finished() {
                    let last_error = error_rx
                        .try_recv()
                        .unwrap_or_else(|_| "worker exited without reporting an error".to_string());
                    let _ = handle.join();
                    if restart_count >= self.max_restarts {
                        return SupervisorOutcome::MaxRestartsExceeded { last_error };
                    }
                    restart_count += 1;
                    warn!(restart_count, error = %last_error, "restarting trading worker");
                    break;
                }

                if heartbeat.elapsed() > threshold {
                    error!(elapsed_ms = heartbeat.elapsed().as_millis() as u64, "worker heartbeat stalled");
                    let _ = worker_stop_tx.send(());
                    let _ = handle.join();
                    if restart_count >= self.max_restarts {
                        return SupervisorOutcome::MaxRestartsExceeded {
                            last_error: "heartbeat stalled".to_string(),
                        };
                    }
                    restart_count += 1;
                    break;
                }

                thread::sleep(self.heartbeat_interval / 4);
            }
        }
    }
}
