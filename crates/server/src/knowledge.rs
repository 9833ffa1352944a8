use anyhow::Result;
use async_trait::async_trait;

use venta_agent::retrieval::KnowledgeBase;
use venta_db::{DbPool, KnowledgeRepository};

/// Knowledge base over the chunk table. Retrieval turns on automatically as
/// soon as any document chunks are indexed.
pub struct DbKnowledgeBase {
    repository: KnowledgeRepository,
}

impl DbKnowledgeBase {
    pub fn new(pool: DbPool) -> Self {
        Self { repository: KnowledgeRepository::new(pool) }
    }
}

#[async_trait]
impl KnowledgeBase for DbKnowledgeBase {
    async fn chunk_count(&self) -> Result<u64> {
        Ok(self.repository.chunk_count().await?)
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Option<String>> {
        let chunks = self.repository.search(query, k).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunks.join("\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use venta_agent::retrieval::KnowledgeBase;
    use venta_db::{connect_with_settings, migrations, KnowledgeRepository};

    use super::DbKnowledgeBase;

    #[tokio::test]
    async fn retrieval_joins_ranked_chunks() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let repo = KnowledgeRepository::new(pool.clone());
        repo.add_chunk("faq.txt", "El curso dura 12 semanas.", Utc::now())
            .await
            .expect("add");

        let knowledge = DbKnowledgeBase::new(pool);
        assert_eq!(knowledge.chunk_count().await.expect("count"), 1);

        let context =
            knowledge.retrieve("¿cuánto dura el curso?", 3).await.expect("retrieve");
        assert_eq!(context.as_deref(), Some("El curso dura 12 semanas."));

        let missing = knowledge.retrieve("zzz", 3).await.expect("retrieve");
        assert!(missing.is_none());
    }
}
