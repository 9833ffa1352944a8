use tracing::{error, info, warn};

use venta_core::flows::router::{NEGATIVE_SIGNAL_STRIKES, NEGATIVE_SIGNAL_WINDOW};
use venta_core::flows::state::{ConversationMode, ConversationState, Sentiment, StatePatch};

use crate::crm::{CrmContact, CrmSync};
use crate::llm::{IntentClassification, LanguageModel};

/// Recomputes the purchase-readiness score from the latest user message.
/// Classifier failures fall back to a low fixed score instead of failing the
/// pass.
pub async fn intent_classifier(llm: &dyn LanguageModel, state: &ConversationState) -> StatePatch {
    let Some(last) = state.last_user_message() else {
        return StatePatch::default();
    };

    let classification = match llm.classify_intent(&last.content, &state.messages).await {
        Ok(classification) => classification,
        Err(error) => {
            warn!(%error, "intent classification failed, using fallback score");
            IntentClassification::fallback()
        }
    };

    info!(
        category = classification.category.as_str(),
        score = classification.score,
        "intent classified"
    );

    StatePatch { intent_score: Some(classification.score), ..StatePatch::default() }
}

/// Analyzes the latest user message's sentiment and stamps it onto the
/// message history. Two negative user messages inside the trailing window
/// escalate the conversation for human attention.
pub async fn sentiment_analyzer(llm: &dyn LanguageModel, state: &ConversationState) -> StatePatch {
    let Some(last) = state.last_user_message() else {
        return StatePatch::default();
    };

    let sentiment = match llm.analyze_sentiment(&last.content).await {
        Ok(sentiment) => sentiment,
        Err(error) => {
            warn!(%error, "sentiment analysis failed, defaulting to neutral");
            Sentiment::Neutral
        }
    };

    info!(sentiment = sentiment.as_str(), "sentiment analyzed");

    let mut patch = StatePatch {
        sentiment: Some(sentiment),
        stamp_message_sentiment: Some(sentiment),
        ..StatePatch::default()
    };

    if sentiment == Sentiment::Negative
        && negative_signals_with_current(state) >= NEGATIVE_SIGNAL_STRIKES
    {
        warn!("repeated negative sentiment detected, escalating for human attention");
        patch.mode = Some(ConversationMode::NeedsAttention);
    }

    patch
}

/// Counts negative user messages inside the trailing window, treating the
/// not-yet-stamped current message as negative (the caller only invokes this
/// on the negative path).
fn negative_signals_with_current(state: &ConversationState) -> usize {
    let history = &state.messages[..state.messages.len().saturating_sub(1)];
    let start = history.len().saturating_sub(NEGATIVE_SIGNAL_WINDOW.saturating_sub(1));
    let prior = history[start..]
        .iter()
        .filter(|message| message.is_user() && message.sentiment == Some(Sentiment::Negative))
        .count();
    prior + 1
}

/// Extracts structured facts from the latest user message, merges them into
/// the collected data, and pushes a best-effort CRM update when anything new
/// was learned.
pub async fn data_collector(
    llm: &dyn LanguageModel,
    crm: &dyn CrmSync,
    state: &ConversationState,
) -> StatePatch {
    let Some(last) = state.last_user_message() else {
        return StatePatch::default();
    };

    let extracted = match llm.extract_profile(&last.content, &state.messages).await {
        Ok(extracted) => extracted,
        Err(error) => {
            warn!(%error, "data extraction failed, continuing without update");
            return StatePatch::default();
        }
    };

    if extracted.is_empty() {
        return StatePatch::default();
    }

    info!(
        has_name = extracted.name.is_some(),
        has_email = extracted.email.is_some(),
        has_needs = extracted.needs.is_some(),
        "data extracted"
    );

    let mut patch = StatePatch { collected: Some(extracted.clone()), ..StatePatch::default() };
    if state.contact.name.is_none() {
        patch.contact_name = extracted.name.clone();
    }
    if state.contact.email.is_none() {
        patch.contact_email = extracted.email.clone();
    }

    // Best-effort CRM sync; a failure never reaches the user.
    let mut snapshot = CrmContact::from_state(state);
    snapshot.name = snapshot.name.or_else(|| extracted.name.clone());
    snapshot.email = snapshot.email.or_else(|| extracted.email.clone());
    if let Err(error) = crm.sync_contact(&snapshot).await {
        error!(%error, "crm sync failed (non-blocking)");
    }

    patch
}
