use chrono::{DateTime, Utc};

use venta_core::domain::profile::BotProfile;

use super::RepositoryError;
use crate::DbPool;

/// Key/value store for tenant bot settings. Missing keys fall back to the
/// profile defaults, so a fresh database yields a usable (if silent) bot.
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bot_settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_profile(&self) -> Result<BotProfile, RepositoryError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM bot_settings").fetch_all(&self.pool).await?;

        Ok(BotProfile::from_settings(
            rows.iter().map(|(key, value)| (key.as_str(), value.as_str())),
        ))
    }
}
