use anyhow::Result;
use async_trait::async_trait;

/// Knowledge-base capability. Retrieval is auto-enabled by content: when no
/// chunks are indexed the conversation node skips the lookup entirely.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn chunk_count(&self) -> Result<u64>;

    /// Returns concatenated context for the query, or `None` when nothing
    /// relevant is indexed.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Option<String>>;
}

/// Stand-in for deployments without an indexed knowledge base.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyKnowledgeBase;

#[async_trait]
impl KnowledgeBase for EmptyKnowledgeBase {
    async fn chunk_count(&self) -> Result<u64> {
        Ok(0)
    }

    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Option<String>> {
        Ok(None)
    }
}
