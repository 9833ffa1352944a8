use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flows::state::Sentiment;

/// Marker inserted between reply parts when multi-part delivery is enabled.
/// The transport splits on it and sends each part as its own message.
pub const PART_SEPARATOR: &str = "\n\n[PAUSA]\n\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One entry of the conversation history. User messages carry the sentiment
/// stamp assigned by the analyzer on the pass that processed them, which is
/// what makes the negative-streak heuristic work over real history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub sentiment: Option<Sentiment>,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self { role: MessageRole::User, content: content.into(), sentiment: None, sent_at }
    }

    pub fn assistant(content: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), sentiment: None, sent_at }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ChatMessage, MessageRole};
    use crate::flows::state::Sentiment;

    #[test]
    fn role_round_trips_through_storage_labels() {
        assert_eq!(MessageRole::parse(MessageRole::User.as_str()), Some(MessageRole::User));
        assert_eq!(
            MessageRole::parse(MessageRole::Assistant.as_str()),
            Some(MessageRole::Assistant)
        );
        assert_eq!(MessageRole::parse("system"), None);
    }

    #[test]
    fn sentiment_stamp_is_optional_until_analyzed() {
        let message = ChatMessage::user("hola", Utc::now());
        assert!(message.sentiment.is_none());

        let stamped = message.with_sentiment(Sentiment::Negative);
        assert_eq!(stamped.sentiment, Some(Sentiment::Negative));
    }
}
