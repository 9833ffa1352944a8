use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::Contact;
use crate::domain::message::ChatMessage;
use crate::domain::profile::BotProfile;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Classifier output contract: anything that is not exactly one of the
    /// three labels is coerced to neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Welcome,
    Qualifying,
    Nurturing,
    Closing,
    Sold,
    FollowUp,
    Handoff,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Qualifying => "qualifying",
            Self::Nurturing => "nurturing",
            Self::Closing => "closing",
            Self::Sold => "sold",
            Self::FollowUp => "follow_up",
            Self::Handoff => "handoff",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "welcome" => Some(Self::Welcome),
            "qualifying" => Some(Self::Qualifying),
            "nurturing" => Some(Self::Nurturing),
            "closing" => Some(Self::Closing),
            "sold" => Some(Self::Sold),
            "follow_up" => Some(Self::FollowUp),
            "handoff" => Some(Self::Handoff),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// AUTO lets the engine run. MANUAL means a human has taken the thread over
/// and the transport must not invoke the engine at all. NEEDS_ATTENTION is
/// set by the engine and cleared only by a human action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationMode {
    #[default]
    Auto,
    Manual,
    NeedsAttention,
}

impl ConversationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
            Self::NeedsAttention => "NEEDS_ATTENTION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AUTO" => Some(Self::Auto),
            "MANUAL" => Some(Self::Manual),
            "NEEDS_ATTENTION" => Some(Self::NeedsAttention),
            _ => None,
        }
    }
}

/// Structured facts extracted from free-text user messages. Extraction
/// results merge key-wise: a later non-empty value overrides, an absent one
/// leaves the earlier value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub needs: Option<String>,
    pub budget: Option<String>,
    pub pain_points: Option<String>,
}

impl CollectedData {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.needs.is_none()
            && self.budget.is_none()
            && self.pain_points.is_none()
    }

    pub fn merge(&mut self, newer: &CollectedData) {
        merge_field(&mut self.name, &newer.name);
        merge_field(&mut self.email, &newer.email);
        merge_field(&mut self.phone, &newer.phone);
        merge_field(&mut self.needs, &newer.needs);
        merge_field(&mut self.budget, &newer.budget);
        merge_field(&mut self.pain_points, &newer.pain_points);
    }
}

fn merge_field(current: &mut Option<String>, newer: &Option<String>) {
    if let Some(value) = newer {
        if !value.trim().is_empty() {
            *current = Some(value.clone());
        }
    }
}

/// The durable slice of conversation state: what the transport loads before
/// a pass and writes back after it. Everything else is recomputed per pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DurableState {
    pub stage: Stage,
    pub mode: ConversationMode,
    pub collected: CollectedData,
    pub payment_link_sent: bool,
    pub follow_up_count: u32,
}

/// The single record threaded through one engine pass. Constructed fresh
/// from persisted history plus the new inbound message; owned exclusively by
/// that pass, so no locking happens inside the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationState {
    pub contact: Contact,
    pub messages: Vec<ChatMessage>,
    pub intent_score: f64,
    pub sentiment: Sentiment,
    pub stage: Stage,
    pub mode: ConversationMode,
    pub collected: CollectedData,
    pub payment_link_sent: bool,
    pub follow_up_count: u32,
    pub follow_up_scheduled: Option<DateTime<Utc>>,
    pub current_response: Option<String>,
    pub summary: Option<String>,
    pub profile: BotProfile,
}

impl ConversationState {
    pub fn for_pass(
        contact: Contact,
        history: Vec<ChatMessage>,
        inbound_text: &str,
        durable: DurableState,
        profile: BotProfile,
        received_at: DateTime<Utc>,
    ) -> Self {
        let mut messages = history;
        messages.push(ChatMessage::user(inbound_text, received_at));

        Self {
            contact,
            messages,
            intent_score: 0.0,
            sentiment: Sentiment::Neutral,
            stage: durable.stage,
            mode: durable.mode,
            collected: durable.collected,
            payment_link_sent: durable.payment_link_sent,
            follow_up_count: durable.follow_up_count,
            follow_up_scheduled: None,
            current_response: None,
            summary: None,
            profile,
        }
    }

    pub fn durable(&self) -> DurableState {
        DurableState {
            stage: self.stage,
            mode: self.mode,
            collected: self.collected.clone(),
            payment_link_sent: self.payment_link_sent,
            follow_up_count: self.follow_up_count,
        }
    }

    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|message| message.is_user()).count()
    }

    pub fn last_user_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|message| message.is_user())
    }

    /// Counts user messages stamped negative among the last `window` entries
    /// of the history (user and assistant entries both consume window slots,
    /// mirroring the original heuristic).
    pub fn negative_signals(&self, window: usize) -> usize {
        let start = self.messages.len().saturating_sub(window);
        self.messages[start..]
            .iter()
            .filter(|message| message.is_user() && message.sentiment == Some(Sentiment::Negative))
            .count()
    }

    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(sentiment) = patch.stamp_message_sentiment {
            if let Some(message) =
                self.messages.iter_mut().rev().find(|message| message.is_user())
            {
                message.sentiment = Some(sentiment);
            }
        }
        if let Some(score) = patch.intent_score {
            self.intent_score = score.clamp(0.0, 1.0);
        }
        if let Some(sentiment) = patch.sentiment {
            self.sentiment = sentiment;
        }
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(collected) = patch.collected {
            self.collected.merge(&collected);
        }
        // Identity fields are add-only: a later pass never erases a known
        // name or email, and the first discovered value wins.
        if let Some(name) = patch.contact_name {
            if self.contact.name.is_none() && !name.trim().is_empty() {
                self.contact.name = Some(name);
            }
        }
        if let Some(email) = patch.contact_email {
            if self.contact.email.is_none() && !email.trim().is_empty() {
                self.contact.email = Some(email);
            }
        }
        if let Some(sent) = patch.payment_link_sent {
            self.payment_link_sent = sent;
        }
        if let Some(count) = patch.follow_up_count {
            self.follow_up_count = count;
        }
        if let Some(when) = patch.follow_up_scheduled {
            self.follow_up_scheduled = Some(when);
        }
        if let Some(response) = patch.response {
            self.current_response = Some(response);
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary);
        }
    }
}

/// Sparse update returned by a node. Unset fields leave the running state
/// untouched; `collected` merges instead of replacing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatePatch {
    pub intent_score: Option<f64>,
    pub sentiment: Option<Sentiment>,
    pub stamp_message_sentiment: Option<Sentiment>,
    pub stage: Option<Stage>,
    pub mode: Option<ConversationMode>,
    pub collected: Option<CollectedData>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub payment_link_sent: Option<bool>,
    pub follow_up_count: Option<u32>,
    pub follow_up_scheduled: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub summary: Option<String>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self { response: Some(text.into()), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        CollectedData, ConversationMode, ConversationState, DurableState, Sentiment, Stage,
        StatePatch,
    };
    use crate::domain::contact::Contact;
    use crate::domain::message::ChatMessage;
    use crate::domain::profile::BotProfile;

    fn state_with_history(history: Vec<ChatMessage>) -> ConversationState {
        ConversationState::for_pass(
            Contact::new("+521555000111"),
            history,
            "hola",
            DurableState::default(),
            BotProfile::default(),
            Utc::now(),
        )
    }

    #[test]
    fn pass_construction_appends_inbound_as_latest_user_message() {
        let now = Utc::now();
        let state = state_with_history(vec![
            ChatMessage::user("primer mensaje", now),
            ChatMessage::assistant("respuesta", now),
        ]);

        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.last_user_message().map(|m| m.content.as_str()), Some("hola"));
        assert_eq!(state.user_message_count(), 2);
    }

    #[test]
    fn sentiment_labels_coerce_unknown_values_to_neutral() {
        assert_eq!(Sentiment::from_label("POSITIVE"), Sentiment::Positive);
        assert_eq!(Sentiment::from_label(" negative "), Sentiment::Negative);
        assert_eq!(Sentiment::from_label("enthusiastic"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label(""), Sentiment::Neutral);
    }

    #[test]
    fn stage_and_mode_round_trip_through_storage_labels() {
        for stage in [
            Stage::Welcome,
            Stage::Qualifying,
            Stage::Nurturing,
            Stage::Closing,
            Stage::Sold,
            Stage::FollowUp,
            Stage::Handoff,
            Stage::Completed,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        for mode in
            [ConversationMode::Auto, ConversationMode::Manual, ConversationMode::NeedsAttention]
        {
            assert_eq!(ConversationMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(Stage::parse("unknown"), None);
    }

    #[test]
    fn collected_data_merge_is_keywise_and_associative() {
        let a = CollectedData { name: Some("Ana".into()), ..CollectedData::default() };
        let b = CollectedData {
            name: Some("Ana María".into()),
            email: Some("ana@example.com".into()),
            ..CollectedData::default()
        };

        // Sequential merge.
        let mut sequential = CollectedData::default();
        sequential.merge(&a);
        sequential.merge(&b);

        // Key-wise union merged in one step.
        let mut union = a.clone();
        union.merge(&b);
        let mut one_shot = CollectedData::default();
        one_shot.merge(&union);

        assert_eq!(sequential, one_shot);
        assert_eq!(sequential.name.as_deref(), Some("Ana María"));
        assert_eq!(sequential.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn merge_ignores_empty_values() {
        let mut data = CollectedData { needs: Some("automatizar ventas".into()), ..Default::default() };
        data.merge(&CollectedData { needs: Some("   ".into()), ..Default::default() });
        assert_eq!(data.needs.as_deref(), Some("automatizar ventas"));
    }

    #[test]
    fn apply_never_clears_known_identity_fields() {
        let mut state = state_with_history(Vec::new());
        state.apply(StatePatch { contact_name: Some("Luis".into()), ..Default::default() });
        state.apply(StatePatch { contact_name: Some("Pedro".into()), ..Default::default() });

        assert_eq!(state.contact.name.as_deref(), Some("Luis"));
    }

    #[test]
    fn apply_clamps_intent_score_to_unit_interval() {
        let mut state = state_with_history(Vec::new());
        state.apply(StatePatch { intent_score: Some(1.7), ..Default::default() });
        assert_eq!(state.intent_score, 1.0);
        state.apply(StatePatch { intent_score: Some(-0.2), ..Default::default() });
        assert_eq!(state.intent_score, 0.0);
    }

    #[test]
    fn stamping_marks_only_the_latest_user_message() {
        let now = Utc::now();
        let mut state = state_with_history(vec![
            ChatMessage::user("antes", now),
            ChatMessage::assistant("ok", now),
        ]);
        state.apply(StatePatch {
            stamp_message_sentiment: Some(Sentiment::Negative),
            ..Default::default()
        });

        assert_eq!(state.messages[0].sentiment, None);
        assert_eq!(state.messages[2].sentiment, Some(Sentiment::Negative));
    }

    #[test]
    fn negative_signals_count_only_user_messages_inside_window() {
        let now = Utc::now();
        let mut state = state_with_history(vec![
            ChatMessage::user("uno", now).with_sentiment(Sentiment::Negative),
            ChatMessage::assistant("dos", now),
            ChatMessage::user("tres", now).with_sentiment(Sentiment::Negative),
            ChatMessage::assistant("cuatro", now),
        ]);
        state.apply(StatePatch {
            stamp_message_sentiment: Some(Sentiment::Negative),
            ..Default::default()
        });

        // Window of 4 covers messages "tres", "cuatro", and the inbound one.
        assert_eq!(state.negative_signals(4), 2);
        assert_eq!(state.negative_signals(1), 1);
        assert_eq!(state.negative_signals(10), 3);
    }

    #[test]
    fn durable_round_trip_preserves_transportable_fields() {
        let mut state = state_with_history(Vec::new());
        state.apply(StatePatch {
            stage: Some(Stage::Closing),
            mode: Some(ConversationMode::NeedsAttention),
            payment_link_sent: Some(true),
            follow_up_count: Some(2),
            collected: Some(CollectedData { budget: Some("500 USD".into()), ..Default::default() }),
            ..Default::default()
        });

        let durable = state.durable();
        assert_eq!(durable.stage, Stage::Closing);
        assert_eq!(durable.mode, ConversationMode::NeedsAttention);
        assert!(durable.payment_link_sent);
        assert_eq!(durable.follow_up_count, 2);
        assert_eq!(durable.collected.budget.as_deref(), Some("500 USD"));
    }
}
