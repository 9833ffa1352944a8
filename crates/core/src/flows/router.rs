use serde::{Deserialize, Serialize};

use crate::flows::state::{ConversationMode, ConversationState, Sentiment, Stage};

/// Purchase-readiness score above which the pass routes straight to closing.
pub const HIGH_INTENT_THRESHOLD: f64 = 0.8;
/// Score below which the user is treated as leaving and follow-up kicks in.
pub const LOW_INTENT_THRESHOLD: f64 = 0.2;
/// How many trailing history entries the negative-signal check inspects.
pub const NEGATIVE_SIGNAL_WINDOW: usize = 4;
/// Negative user messages inside the window required to escalate.
pub const NEGATIVE_SIGNAL_STRIKES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Conversation,
    Closing,
    Payment,
    FollowUp,
    Handoff,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Closing => "closing",
            Self::Payment => "payment",
            Self::FollowUp => "follow_up",
            Self::Handoff => "handoff",
        }
    }
}

/// Selects the branch for the current pass. Pure function of the state,
/// evaluated once after the analysis pipeline; conditions are checked in
/// priority order and the first match wins.
///
/// The negative-sentiment rule re-derives the two-strikes escalation from
/// message history instead of trusting the analyzer's mode flag, so routing
/// stays a function of observable state alone.
pub fn route(state: &ConversationState) -> Branch {
    if state.mode == ConversationMode::NeedsAttention {
        return Branch::Handoff;
    }

    if state.sentiment == Sentiment::Negative
        && state.negative_signals(NEGATIVE_SIGNAL_WINDOW) >= NEGATIVE_SIGNAL_STRIKES
    {
        return Branch::Handoff;
    }

    if state.intent_score > HIGH_INTENT_THRESHOLD {
        return Branch::Closing;
    }

    if state.stage == Stage::Closing && !state.payment_link_sent {
        return Branch::Payment;
    }

    if state.intent_score < LOW_INTENT_THRESHOLD {
        return Branch::FollowUp;
    }

    Branch::Conversation
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{route, Branch};
    use crate::domain::contact::Contact;
    use crate::domain::message::ChatMessage;
    use crate::domain::profile::BotProfile;
    use crate::flows::state::{
        ConversationMode, ConversationState, DurableState, Sentiment, Stage, StatePatch,
    };

    fn base_state() -> ConversationState {
        ConversationState::for_pass(
            Contact::new("+521555000222"),
            Vec::new(),
            "mensaje",
            DurableState::default(),
            BotProfile::default(),
            Utc::now(),
        )
    }

    #[test]
    fn needs_attention_always_routes_to_handoff() {
        for (score, stage, sent) in [
            (0.95, Stage::Closing, false),
            (0.1, Stage::Welcome, true),
            (0.5, Stage::Qualifying, false),
        ] {
            let mut state = base_state();
            state.apply(StatePatch {
                mode: Some(ConversationMode::NeedsAttention),
                intent_score: Some(score),
                stage: Some(stage),
                payment_link_sent: Some(sent),
                ..Default::default()
            });
            assert_eq!(route(&state), Branch::Handoff);
        }
    }

    #[test]
    fn two_negative_strikes_route_to_handoff_without_mode_flag() {
        let now = Utc::now();
        let mut state = ConversationState::for_pass(
            Contact::new("+521555000222"),
            vec![
                ChatMessage::user("esto no sirve", now).with_sentiment(Sentiment::Negative),
                ChatMessage::assistant("lamento escuchar eso", now),
            ],
            "sigue sin funcionar",
            DurableState::default(),
            BotProfile::default(),
            now,
        );
        state.apply(StatePatch {
            sentiment: Some(Sentiment::Negative),
            stamp_message_sentiment: Some(Sentiment::Negative),
            intent_score: Some(0.95),
            ..Default::default()
        });

        // Escalation outranks the high-intent rule.
        assert_eq!(route(&state), Branch::Handoff);
    }

    #[test]
    fn single_negative_message_does_not_escalate() {
        let mut state = base_state();
        state.apply(StatePatch {
            sentiment: Some(Sentiment::Negative),
            stamp_message_sentiment: Some(Sentiment::Negative),
            intent_score: Some(0.5),
            ..Default::default()
        });

        assert_eq!(route(&state), Branch::Conversation);
    }

    #[test]
    fn high_intent_routes_to_closing_even_when_already_closing() {
        let mut state = base_state();
        state.apply(StatePatch {
            intent_score: Some(0.9),
            stage: Some(Stage::Closing),
            ..Default::default()
        });

        // Rule order: closing wins over payment on the same pass; payment is
        // only reached on a later pass once the score drops.
        assert_eq!(route(&state), Branch::Closing);
    }

    #[test]
    fn closing_stage_without_link_routes_to_payment() {
        let mut state = base_state();
        state.apply(StatePatch {
            intent_score: Some(0.5),
            stage: Some(Stage::Closing),
            ..Default::default()
        });

        assert_eq!(route(&state), Branch::Payment);
    }

    #[test]
    fn closing_stage_with_link_already_sent_falls_through() {
        let mut state = base_state();
        state.apply(StatePatch {
            intent_score: Some(0.5),
            stage: Some(Stage::Closing),
            payment_link_sent: Some(true),
            ..Default::default()
        });

        assert_eq!(route(&state), Branch::Conversation);
    }

    #[test]
    fn low_intent_routes_to_follow_up() {
        let mut state = base_state();
        state.apply(StatePatch { intent_score: Some(0.1), ..Default::default() });

        assert_eq!(route(&state), Branch::FollowUp);
    }

    #[test]
    fn thresholds_are_exclusive_boundaries() {
        let mut high = base_state();
        high.apply(StatePatch { intent_score: Some(0.8), ..Default::default() });
        assert_eq!(route(&high), Branch::Conversation);

        let mut low = base_state();
        low.apply(StatePatch { intent_score: Some(0.2), ..Default::default() });
        assert_eq!(route(&low), Branch::Conversation);
    }

    #[test]
    fn default_route_is_conversation() {
        let mut state = base_state();
        state.apply(StatePatch { intent_score: Some(0.5), ..Default::default() });

        assert_eq!(route(&state), Branch::Conversation);
    }
}
