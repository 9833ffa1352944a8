use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::DbPool;

/// Indexed document chunks for retrieval. Ranking is a plain keyword-overlap
/// score over a linear scan, which is adequate for the document volumes a
/// single sales bot indexes.
pub struct KnowledgeRepository {
    pool: DbPool,
}

impl KnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn add_chunk(
        &self,
        source: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO knowledge_chunks (source, content, created_at) VALUES (?, ?, ?)",
        )
        .bind(source)
        .bind(content)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_source(&self, source: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM knowledge_chunks WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn chunk_count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM knowledge_chunks").fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Top-`k` chunks by keyword overlap with the query; empty when nothing
    /// matches at all.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, RepositoryError> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT content FROM knowledge_chunks").fetch_all(&self.pool).await?;

        let mut scored: Vec<(usize, String)> = rows
            .into_iter()
            .filter_map(|(content,)| {
                let score = overlap_score(&content, &terms);
                (score > 0).then_some((score, content))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, content)| content).collect())
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() >= 3)
        .map(|term| term.to_string())
        .collect()
}

fn overlap_score(content: &str, terms: &[String]) -> usize {
    let lowered = content.to_lowercase();
    terms.iter().filter(|term| lowered.contains(term.as_str())).count()
}
