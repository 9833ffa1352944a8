use anyhow::Result;
use async_trait::async_trait;

use venta_core::domain::message::ChatMessage;
use venta_core::flows::state::{CollectedData, Sentiment};

/// Intent categories the classifier may return, ordered roughly by
/// purchase-readiness. The numeric score is the routing signal; the category
/// is kept for CRM notes and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentCategory {
    Browsing,
    Interested,
    ReadyToBuy,
    Objection,
    Leaving,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Interested => "interested",
            Self::ReadyToBuy => "ready_to_buy",
            Self::Objection => "objection",
            Self::Leaving => "leaving",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browsing" => Some(Self::Browsing),
            "interested" => Some(Self::Interested),
            "ready_to_buy" => Some(Self::ReadyToBuy),
            "objection" => Some(Self::Objection),
            "leaving" => Some(Self::Leaving),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntentClassification {
    pub category: IntentCategory,
    pub score: f64,
}

impl IntentClassification {
    /// Safe default when the classifier fails or returns garbage: treat the
    /// user as browsing with mild interest so routing stays on the default
    /// conversation branch.
    pub fn fallback() -> Self {
        Self { category: IntentCategory::Browsing, score: 0.3 }
    }
}

/// Knobs the engine passes alongside a generation request. `context` carries
/// retrieved knowledge-base text when available.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub context: Option<String>,
    pub use_emojis: bool,
    pub max_words: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { context: None, use_emojis: true, max_words: 100 }
    }
}

/// The language-model capability consumed by the workflow. Implementations
/// own prompt construction for the analysis tasks and any model routing; the
/// engine only depends on these four operations.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn classify_intent(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<IntentClassification>;

    async fn analyze_sentiment(&self, message: &str) -> Result<Sentiment>;

    async fn extract_profile(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<CollectedData>;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::{IntentCategory, IntentClassification};

    #[test]
    fn category_labels_round_trip() {
        for category in [
            IntentCategory::Browsing,
            IntentCategory::Interested,
            IntentCategory::ReadyToBuy,
            IntentCategory::Objection,
            IntentCategory::Leaving,
        ] {
            assert_eq!(IntentCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(IntentCategory::parse("confused"), None);
    }

    #[test]
    fn fallback_keeps_routing_on_the_default_branch() {
        let fallback = IntentClassification::fallback();
        assert!(fallback.score > 0.2 && fallback.score < 0.8);
    }
}
