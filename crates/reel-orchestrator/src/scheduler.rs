//! Per-job wake-up timers.
//!
//! The scheduler is only a clock: it holds at most one timer per job
//! (re-arming replaces the previous one) and delivers wake-ups over a
//! channel. Firings are at-least-once; the orchestrator's resume path is
//! idempotent, so a duplicate wake-up is harmless.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use reel_models::JobId;

/// A wake-up for one job.
#[derive(Debug, Clone)]
pub struct WakeUp {
    pub owner_id: String,
    pub job_id: JobId,
}

/// One replaceable timer per job, delivering wake-ups over a channel.
pub struct Scheduler {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    tx: mpsc::UnboundedSender<WakeUp>,
}

impl Scheduler {
    /// Create a scheduler and the receiving end of its wake-up channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WakeUp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    fn key(owner_id: &str, job_id: &JobId) -> String {
        format!("{}/{}", owner_id, job_id)
    }

    /// Arm (or replace) the job's timer to fire after `delay`.
    pub fn arm_in(&self, owner_id: &str, job_id: &JobId, delay: Duration) {
        let wake = WakeUp {
            owner_id: owner_id.to_string(),
            job_id: job_id.clone(),
        };
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver may already be gone during shutdown.
            let _ = tx.send(wake);
        });

        let mut timers = self.timers.lock().expect("scheduler lock poisoned");
        if let Some(previous) = timers.insert(Self::key(owner_id, job_id), handle) {
            previous.abort();
        }
        debug!(owner_id = %owner_id, job_id = %job_id, delay_ms = delay.as_millis() as u64, "Timer armed");
    }

    /// Arm an immediate wake-up.
    pub fn arm_now(&self, owner_id: &str, job_id: &JobId) {
        self.arm_in(owner_id, job_id, Duration::ZERO);
    }

    /// Drop the job's timer, if any.
    pub fn disarm(&self, owner_id: &str, job_id: &JobId) {
        let mut timers = self.timers.lock().expect("scheduler lock poisoned");
        if let Some(handle) = timers.remove(&Self::key(owner_id, job_id)) {
            handle.abort();
        }
    }
}
