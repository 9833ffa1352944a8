use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Sent,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FollowUpJob {
    pub id: String,
    pub phone: String,
    pub message: String,
    pub run_at: DateTime<Utc>,
    pub status: JobStatus,
}

/// Persistent follow-up queue. The engine schedules through this table and a
/// dispatcher loop delivers due rows; a contact replying cancels their
/// pending jobs so they are not nudged about a conversation that moved on.
pub struct FollowUpRepository {
    pool: DbPool,
}

impl FollowUpRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        id: &str,
        phone: &str,
        message: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO follow_up_jobs (id, phone, message, run_at, status, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(id)
        .bind(phone)
        .bind(message)
        .bind(run_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Pending jobs whose run time has passed, oldest first.
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<FollowUpJob>, RepositoryError> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, phone, message, run_at, status FROM follow_up_jobs \
             WHERE status = 'pending' AND run_at <= ? ORDER BY run_at ASC LIMIT ?",
        )
        .bind(now.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_job).collect()
    }

    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE follow_up_jobs SET status = 'sent', completed_at = ? WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancels every pending job for a contact. Returns how many were
    /// cancelled.
    pub async fn cancel_pending(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE follow_up_jobs SET status = 'cancelled', completed_at = ? \
             WHERE phone = ? AND status = 'pending'",
        )
        .bind(now.to_rfc3339())
        .bind(phone)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn decode_job(
    row: (String, String, String, String, String),
) -> Result<FollowUpJob, RepositoryError> {
    let (id, phone, message, run_at, status) = row;

    let run_at = DateTime::parse_from_rfc3339(&run_at)
        .map_err(|error| RepositoryError::Decode(format!("bad run_at `{run_at}`: {error}")))?
        .with_timezone(&Utc);
    let status = JobStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status}`")))?;

    Ok(FollowUpJob { id, phone, message, run_at, status })
}
