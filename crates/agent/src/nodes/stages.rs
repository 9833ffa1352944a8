use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use venta_core::domain::message::ChatMessage;
use venta_core::flows::state::{ConversationMode, ConversationState, Stage, StatePatch};

use crate::crm::{CrmContact, CrmSync};
use crate::format::apply_multi_part;
use crate::llm::{GenerationOptions, LanguageModel};
use crate::prompts;
use crate::retrieval::KnowledgeBase;
use crate::schedule::FollowUpScheduler;

/// Asked when the user is ready to buy but has not given a name yet.
pub const ASK_NAME_REPLY: &str = "¡Perfecto! Me encantaría ayudarte a completar tu compra. \
                                  ¿Podrías decirme tu nombre primero?";

/// Follow-up texts by attempt number.
pub const FIRST_FOLLOW_UP_REPLY: &str =
    "¡No hay problema! Te contactaré en un par de horas. ¡Tómate tu tiempo!";
pub const SECOND_FOLLOW_UP_REPLY: &str =
    "¡Por supuesto! Te contactaré mañana. ¡Que tengas un excelente día!";
pub const FINAL_FOLLOW_UP_REPLY: &str =
    "¡Entendido! No dudes en contactarme cuando estés listo. ¡Estoy aquí para ayudarte!";

pub const FIRST_FOLLOW_UP_DELAY_HOURS: i64 = 2;
pub const SECOND_FOLLOW_UP_DELAY_HOURS: i64 = 24;

/// Used when no payment link was configured for the tenant.
pub const FALLBACK_PAYMENT_LINK: &str = "https://example.com/pay";

/// Number of retrieved context chunks requested per generation.
const RETRIEVAL_TOP_K: usize = 3;

/// Greets on the first user turn only. Runs unconditionally at the start of
/// every pass; when it fires, the engine lets the greeting win the pass.
pub fn welcome(state: &ConversationState) -> StatePatch {
    if state.user_message_count() > 1 {
        return StatePatch::default();
    }

    let text = if state.profile.welcome_message.trim().is_empty() {
        prompts::DEFAULT_WELCOME_MESSAGE.to_string()
    } else {
        state.profile.welcome_message.clone()
    };

    info!("first user turn, sending configured welcome message");
    StatePatch { response: Some(text), stage: Some(Stage::Welcome), ..StatePatch::default() }
}

/// Default branch: free-form reply with the product-aware prompt and, when
/// indexed content exists, retrieved knowledge-base context.
///
/// A human-handoff request short-circuits to flipping the conversation mode;
/// the handoff reply itself fires on the next pass via the router.
pub async fn conversation(
    llm: &dyn LanguageModel,
    knowledge: &dyn KnowledgeBase,
    state: &ConversationState,
) -> anyhow::Result<StatePatch> {
    let last_message =
        state.last_user_message().map(|message| message.content.clone()).unwrap_or_default();

    if prompts::requests_human(&last_message) {
        info!("human request detected, flagging conversation for handoff");
        return Ok(StatePatch {
            mode: Some(ConversationMode::NeedsAttention),
            ..StatePatch::default()
        });
    }

    let system_prompt = prompts::build_system_prompt(&state.profile);

    let context = match knowledge.chunk_count().await {
        Ok(0) => None,
        Ok(total) if !last_message.is_empty() => {
            match knowledge.retrieve(&last_message, RETRIEVAL_TOP_K).await {
                Ok(context) => {
                    if context.is_some() {
                        info!(indexed_chunks = total, "retrieved knowledge-base context");
                    }
                    context
                }
                Err(error) => {
                    error!(%error, "knowledge retrieval failed, continuing without context");
                    None
                }
            }
        }
        Ok(_) => None,
        Err(error) => {
            error!(%error, "knowledge-base stats unavailable, continuing without context");
            None
        }
    };

    let options = GenerationOptions {
        context,
        use_emojis: state.profile.use_emojis,
        max_words: state.profile.max_words_per_response,
    };
    let reply = llm.generate(&state.messages, &system_prompt, &options).await?;
    let reply = apply_multi_part(&reply, state.profile.multi_part_messages);

    let stage = match state.stage {
        Stage::Welcome => Some(Stage::Qualifying),
        _ => None,
    };

    Ok(StatePatch { response: Some(reply), stage, ..StatePatch::default() })
}

/// Validates the minimum data needed before sending a payment link. Returns
/// the patch plus whether the pass may continue into the payment node.
pub fn closing(state: &ConversationState) -> (StatePatch, bool) {
    if state.contact.name.is_none() {
        info!("closing reached without a name, requesting it");
        let patch = StatePatch {
            response: Some(ASK_NAME_REPLY.to_string()),
            stage: Some(Stage::Closing),
            ..StatePatch::default()
        };
        return (patch, false);
    }

    (StatePatch { stage: Some(Stage::Closing), ..StatePatch::default() }, true)
}

/// Sends the payment link inside a personalized closing message. The link is
/// guaranteed to appear in the reply even when generation omits or mangles
/// it.
pub async fn payment(llm: &dyn LanguageModel, state: &ConversationState) -> StatePatch {
    let link = if state.profile.payment_link.trim().is_empty() {
        FALLBACK_PAYMENT_LINK
    } else {
        state.profile.payment_link.trim()
    };
    let name = state.contact.name.clone().unwrap_or_default();

    let prompt = prompts::payment_prompt(&name, link);
    let request = vec![ChatMessage::user(prompt, Utc::now())];
    let options = GenerationOptions {
        context: None,
        use_emojis: state.profile.use_emojis,
        max_words: state.profile.max_words_per_response,
    };

    let mut reply = match llm.generate(&request, prompts::DEFAULT_SYSTEM_PROMPT, &options).await {
        Ok(reply) => reply,
        Err(error) => {
            warn!(%error, "payment message generation failed, using fallback text");
            format!(
                "Great! Here's your payment link: {link}\n\nFeel free to reach out if you \
                 have any questions!"
            )
        }
    };

    if !reply.contains(link) {
        reply.push_str(&format!("\n\n{link}"));
    }

    info!("payment link sent");
    StatePatch {
        response: Some(reply),
        payment_link_sent: Some(true),
        stage: Some(Stage::Closing),
        ..StatePatch::default()
    }
}

/// Escalating retry policy keyed on how many follow-ups were already sent:
/// two tries with growing delays, then hand the thread to a human.
pub async fn follow_up(
    scheduler: &dyn FollowUpScheduler,
    state: &ConversationState,
    now: DateTime<Utc>,
) -> StatePatch {
    if state.follow_up_count >= 2 {
        info!(count = state.follow_up_count, "max follow-ups reached, escalating");
        return StatePatch {
            response: Some(FINAL_FOLLOW_UP_REPLY.to_string()),
            mode: Some(ConversationMode::NeedsAttention),
            stage: Some(Stage::FollowUp),
            ..StatePatch::default()
        };
    }

    let (delay_hours, reply) = if state.follow_up_count == 0 {
        (FIRST_FOLLOW_UP_DELAY_HOURS, FIRST_FOLLOW_UP_REPLY)
    } else {
        (SECOND_FOLLOW_UP_DELAY_HOURS, SECOND_FOLLOW_UP_REPLY)
    };
    let run_at = now + Duration::hours(delay_hours);

    match scheduler.schedule(&state.contact.phone, reply, run_at).await {
        Ok(job_id) => {
            info!(%job_id, %run_at, attempt = state.follow_up_count + 1, "follow-up scheduled");
        }
        Err(error) => {
            error!(%error, "follow-up scheduling failed (non-blocking)");
        }
    }

    StatePatch {
        response: Some(reply.to_string()),
        follow_up_scheduled: Some(run_at),
        follow_up_count: Some(state.follow_up_count + 1),
        stage: Some(Stage::FollowUp),
        ..StatePatch::default()
    }
}

/// Pauses the bot and tells the user a human is on the way.
pub fn handoff(state: &ConversationState) -> StatePatch {
    let product = if state.profile.product_name.trim().is_empty() {
        "nuestros servicios"
    } else {
        state.profile.product_name.trim()
    };

    info!("handing conversation off to a human agent");
    StatePatch {
        response: Some(format!(
            "¡Claro que sí! 😊 Dame unos minutos para avisar a mi supervisor. Mientras tanto, \
             ¿te gustaría saber más sobre {product}?"
        )),
        mode: Some(ConversationMode::NeedsAttention),
        stage: Some(Stage::Handoff),
        ..StatePatch::default()
    }
}

/// Closes out the flow: narrative summary of the whole exchange plus a final
/// best-effort CRM sync. Generation failures leave the summary unset.
pub async fn summary(
    llm: &dyn LanguageModel,
    crm: &dyn CrmSync,
    state: &ConversationState,
) -> StatePatch {
    let prompt = prompts::summary_prompt(&state.messages);
    let request = vec![ChatMessage::user(prompt, Utc::now())];
    let options = GenerationOptions { context: None, use_emojis: false, max_words: 150 };

    let generated =
        match llm.generate(&request, prompts::SUMMARY_SYSTEM_PROMPT, &options).await {
            Ok(summary) => summary,
            Err(error) => {
                warn!(%error, "summary generation failed, skipping");
                return StatePatch::default();
            }
        };

    let mut snapshot = CrmContact::from_state(state);
    snapshot.summary = Some(generated.clone());
    if let Err(error) = crm.sync_contact(&snapshot).await {
        warn!(%error, "summary crm sync failed (non-blocking)");
    }

    StatePatch {
        summary: Some(generated),
        stage: Some(Stage::Completed),
        ..StatePatch::default()
    }
}
