use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use venta_agent::schedule::FollowUpScheduler;
use venta_db::{DbPool, FollowUpRepository};
use venta_whatsapp::client::OutboundMessenger;

/// Batch size per dispatcher tick.
const DISPATCH_LIMIT: u32 = 20;

/// Scheduler backed by the follow-up job table. Jobs survive restarts; the
/// dispatcher loop below delivers them when due.
pub struct DbFollowUpScheduler {
    repository: FollowUpRepository,
}

impl DbFollowUpScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self { repository: FollowUpRepository::new(pool) }
    }
}

#[async_trait]
impl FollowUpScheduler for DbFollowUpScheduler {
    async fn schedule(&self, phone: &str, message: &str, run_at: DateTime<Utc>) -> Result<String> {
        let id = format!("fu-{}", Uuid::new_v4());
        self.repository.enqueue(&id, phone, message, run_at, Utc::now()).await?;
        Ok(id)
    }
}

/// Delivers every due job once: send, then mark sent. Delivery failures
/// leave the job pending so the next tick retries it. Returns how many jobs
/// were delivered.
pub async fn dispatch_due(
    repository: &FollowUpRepository,
    messenger: &dyn OutboundMessenger,
    now: DateTime<Utc>,
) -> Result<u32> {
    let due = repository.due(now, DISPATCH_LIMIT).await?;
    let mut delivered = 0;

    for job in due {
        match messenger.deliver(&job.phone, &job.message).await {
            Ok(()) => {
                repository.mark_sent(&job.id, now).await?;
                info!(job_id = %job.id, phone = %job.phone, "follow-up delivered");
                delivered += 1;
            }
            Err(delivery_error) => {
                warn!(job_id = %job.id, %delivery_error, "follow-up delivery failed, will retry");
            }
        }
    }

    Ok(delivered)
}

/// Background loop polling for due follow-ups.
pub fn spawn_dispatcher(
    pool: DbPool,
    messenger: Arc<dyn OutboundMessenger>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let repository = FollowUpRepository::new(pool);
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(dispatch_error) =
                dispatch_due(&repository, messenger.as_ref(), Utc::now()).await
            {
                error!(%dispatch_error, "follow-up dispatch tick failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use venta_agent::schedule::FollowUpScheduler;
    use venta_db::{connect_with_settings, migrations, DbPool, FollowUpRepository};
    use venta_whatsapp::client::OutboundMessenger;

    use super::{dispatch_due, DbFollowUpScheduler};

    #[derive(Default)]
    struct RecordingMessenger {
        delivered: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl OutboundMessenger for RecordingMessenger {
        async fn deliver(&self, phone: &str, text: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("scripted delivery failure"));
            }
            self.delivered
                .lock()
                .expect("delivered lock")
                .push((phone.to_string(), text.to_string()));
            Ok(())
        }
    }

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn due_jobs_are_delivered_and_marked_sent() {
        let pool = pool().await;
        let scheduler = DbFollowUpScheduler::new(pool.clone());
        let repository = FollowUpRepository::new(pool);
        let messenger = RecordingMessenger::default();
        let now = Utc::now();

        scheduler
            .schedule("+52100", "¿sigues ahí?", now - Duration::minutes(1))
            .await
            .expect("schedule");

        let delivered = dispatch_due(&repository, &messenger, now).await.expect("dispatch");
        assert_eq!(delivered, 1);
        assert_eq!(
            messenger.delivered.lock().expect("lock").as_slice(),
            &[("+52100".to_string(), "¿sigues ahí?".to_string())]
        );

        // Second tick finds nothing.
        let delivered = dispatch_due(&repository, &messenger, now).await.expect("dispatch");
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn failed_deliveries_stay_pending_for_retry() {
        let pool = pool().await;
        let scheduler = DbFollowUpScheduler::new(pool.clone());
        let repository = FollowUpRepository::new(pool);
        let now = Utc::now();

        scheduler
            .schedule("+52100", "¿sigues ahí?", now - Duration::minutes(1))
            .await
            .expect("schedule");

        let failing = RecordingMessenger { fail: true, ..Default::default() };
        let delivered = dispatch_due(&repository, &failing, now).await.expect("dispatch");
        assert_eq!(delivered, 0);

        let working = RecordingMessenger::default();
        let delivered = dispatch_due(&repository, &working, now).await.expect("dispatch");
        assert_eq!(delivered, 1);
    }
}
