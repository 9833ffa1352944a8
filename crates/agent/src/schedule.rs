use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Follow-up scheduling capability. The engine only decides *when* and with
/// *what text* to nudge; delivering the nudge at `run_at` is the scheduler
/// owner's job.
#[async_trait]
pub trait FollowUpScheduler: Send + Sync {
    /// Schedules an outbound message and returns the job id.
    async fn schedule(&self, phone: &str, message: &str, run_at: DateTime<Utc>) -> Result<String>;
}

/// Used when follow-up delivery is not wired (tests, one-shot CLI runs).
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledScheduler;

#[async_trait]
impl FollowUpScheduler for DisabledScheduler {
    async fn schedule(&self, phone: &str, _message: &str, run_at: DateTime<Utc>) -> Result<String> {
        debug!(%phone, %run_at, "follow-up scheduling skipped: no scheduler configured");
        Ok(String::from("disabled"))
    }
}
