use chrono::{DateTime, Utc};

use venta_core::domain::message::{ChatMessage, MessageRole};
use venta_core::flows::state::Sentiment;

use super::RepositoryError;
use crate::DbPool;

/// Message history per contact. Append-only; the engine never edits stored
/// text, it only stamps sentiment through `save_pass_result`-time appends.
pub struct HistoryRepository {
    pool: DbPool,
}

impl HistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        phone: &str,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (phone, role, content, sentiment, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(phone)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.sentiment.map(|sentiment| sentiment.as_str()))
        .bind(message.sent_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the most recent `limit` messages in chronological order.
    pub async fn recent(
        &self,
        phone: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows: Vec<(String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT role, content, sentiment, created_at FROM messages \
             WHERE phone = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(phone)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(decode_message)
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn decode_message(
    row: (String, String, Option<String>, String),
) -> Result<ChatMessage, RepositoryError> {
    let (role, content, sentiment, created_at) = row;

    let role = MessageRole::parse(&role)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown message role `{role}`")))?;
    let sent_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{created_at}`: {error}")))?
        .with_timezone(&Utc);

    Ok(ChatMessage {
        role,
        content,
        sentiment: sentiment.as_deref().map(Sentiment::from_label),
        sent_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use venta_core::domain::message::{ChatMessage, MessageRole};
    use venta_core::flows::state::Sentiment;

    use super::HistoryRepository;
    use crate::repositories::ContactRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_contact(phone: &str) -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        ContactRepository::new(pool.clone())
            .get_or_create(phone, Utc::now())
            .await
            .expect("contact");
        pool
    }

    #[tokio::test]
    async fn appended_messages_come_back_in_order_with_stamps() {
        let pool = pool_with_contact("+521555200100").await;
        let repo = HistoryRepository::new(pool);
        let now = Utc::now();

        repo.append(
            "+521555200100",
            &ChatMessage::user("no me gustó", now).with_sentiment(Sentiment::Negative),
        )
        .await
        .expect("append user");
        repo.append("+521555200100", &ChatMessage::assistant("lo siento", now))
            .await
            .expect("append assistant");

        let history = repo.recent("+521555200100", 50).await.expect("recent");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].sentiment, Some(Sentiment::Negative));
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].sentiment, None);
    }

    #[tokio::test]
    async fn recent_caps_at_the_limit_keeping_newest() {
        let pool = pool_with_contact("+521555200200").await;
        let repo = HistoryRepository::new(pool);
        let now = Utc::now();

        for i in 0..6 {
            repo.append("+521555200200", &ChatMessage::user(format!("mensaje {i}"), now))
                .await
                .expect("append");
        }

        let history = repo.recent("+521555200200", 4).await.expect("recent");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "mensaje 2");
        assert_eq!(history[3].content, "mensaje 5");
    }
}
