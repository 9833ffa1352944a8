//! End-to-end passes through the workflow with scripted capabilities.

use std::sync::Arc;

use chrono::{Duration, Utc};

use venta_agent::engine::{Capabilities, PassInput, SalesWorkflow, FALLBACK_REPLY};
use venta_agent::nodes::stages::{
    ASK_NAME_REPLY, FINAL_FOLLOW_UP_REPLY, FIRST_FOLLOW_UP_REPLY,
};
use venta_agent::prompts::DEFAULT_WELCOME_MESSAGE;
use venta_agent::testing::{
    RecordingCrm, RecordingScheduler, ScriptedLanguageModel, StaticKnowledge,
};
use venta_core::domain::contact::Contact;
use venta_core::domain::message::ChatMessage;
use venta_core::domain::profile::BotProfile;
use venta_core::flows::state::{ConversationMode, DurableState, Stage};

struct Harness {
    workflow: SalesWorkflow,
    crm: Arc<RecordingCrm>,
    scheduler: Arc<RecordingScheduler>,
}

fn harness(llm: ScriptedLanguageModel) -> Harness {
    let crm = Arc::new(RecordingCrm::default());
    let scheduler = Arc::new(RecordingScheduler::default());
    let workflow = SalesWorkflow::new(Capabilities {
        llm: Arc::new(llm),
        knowledge: Arc::new(StaticKnowledge::default()),
        crm: crm.clone(),
        scheduler: scheduler.clone(),
    });
    Harness { workflow, crm, scheduler }
}

fn pass_input(text: &str, history: Vec<ChatMessage>, durable: DurableState) -> PassInput {
    PassInput {
        contact: Contact::new("+521555000777"),
        text: text.to_string(),
        history,
        durable,
        profile: BotProfile::default(),
        received_at: Utc::now(),
    }
}

fn prior_exchange() -> Vec<ChatMessage> {
    let now = Utc::now();
    vec![
        ChatMessage::user("hola, me interesa el curso", now),
        ChatMessage::assistant("¡Hola! Con gusto te cuento más.", now),
    ]
}

#[tokio::test]
async fn first_message_gets_the_welcome_greeting() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.45));

    let state = h
        .workflow
        .process_message(pass_input("hola", Vec::new(), DurableState::default()))
        .await;

    assert_eq!(state.current_response.as_deref(), Some(DEFAULT_WELCOME_MESSAGE));
    assert_eq!(state.stage, Stage::Welcome);
    assert!(!state.payment_link_sent);
    assert_eq!(state.follow_up_count, 0);
    assert!(state.follow_up_scheduled.is_none());
    // Analysis still ran on the greeting pass.
    assert_eq!(state.intent_score, 0.45);
}

#[tokio::test]
async fn high_intent_without_name_asks_for_it() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.95));

    let state = h
        .workflow
        .process_message(pass_input(
            "quiero comprar ahora mismo",
            prior_exchange(),
            DurableState::default(),
        ))
        .await;

    assert_eq!(state.current_response.as_deref(), Some(ASK_NAME_REPLY));
    assert_eq!(state.stage, Stage::Closing);
    assert!(!state.payment_link_sent);
}

#[tokio::test]
async fn high_intent_with_known_name_sends_payment_link_and_summary() {
    let h = harness(
        ScriptedLanguageModel::default()
            .with_intent(0.95)
            .with_reply("¡Gracias por tu confianza, Raúl!"),
    );

    let mut input = pass_input(
        "quiero comprar ahora mismo",
        prior_exchange(),
        DurableState::default(),
    );
    input.contact = input.contact.with_name("Raúl");
    input.profile.payment_link = "https://pay.venta.mx/raul".to_string();

    let state = h.workflow.process_message(input).await;

    assert!(state.payment_link_sent);
    let reply = state.current_response.as_deref().expect("payment reply");
    assert!(reply.contains("https://pay.venta.mx/raul"));
    assert!(state.summary.is_some());
    assert_eq!(state.stage, Stage::Completed);
    // The summary sync carried the narrative to the CRM.
    assert!(h.crm.synced().iter().any(|c| c.summary.is_some()));
}

#[tokio::test]
async fn low_intent_schedules_the_first_follow_up() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.1));

    let input = pass_input("luego te escribo", prior_exchange(), DurableState::default());
    let received_at = input.received_at;
    let state = h.workflow.process_message(input).await;

    assert_eq!(state.current_response.as_deref(), Some(FIRST_FOLLOW_UP_REPLY));
    assert_eq!(state.follow_up_count, 1);
    assert_eq!(state.follow_up_scheduled, Some(received_at + Duration::hours(2)));

    let jobs = h.scheduler.scheduled();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].run_at, received_at + Duration::hours(2));
}

#[tokio::test]
async fn third_follow_up_escalates_without_scheduling() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.1));

    let durable = DurableState { follow_up_count: 2, ..DurableState::default() };
    let state = h
        .workflow
        .process_message(pass_input("sigo ocupado", prior_exchange(), durable))
        .await;

    assert_eq!(state.current_response.as_deref(), Some(FINAL_FOLLOW_UP_REPLY));
    assert_eq!(state.mode, ConversationMode::NeedsAttention);
    assert_eq!(state.follow_up_count, 2);
    assert!(h.scheduler.scheduled().is_empty());
}

#[tokio::test]
async fn human_request_flips_mode_now_and_hands_off_next_pass() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.5));

    // Pass 1: keyword detected, conversation node short-circuits.
    let first = h
        .workflow
        .process_message(pass_input(
            "quiero hablar con un humano",
            prior_exchange(),
            DurableState::default(),
        ))
        .await;

    assert_eq!(first.mode, ConversationMode::NeedsAttention);
    assert!(first.current_response.is_none(), "mode flip pass sends no reply");

    // Pass 2: the router sees NEEDS_ATTENTION and the handoff reply fires.
    let second = h
        .workflow
        .process_message(pass_input("¿hola?", prior_exchange(), first.durable()))
        .await;

    assert_eq!(second.stage, Stage::Handoff);
    let reply = second.current_response.expect("handoff reply");
    assert!(reply.contains("supervisor"));
}

#[tokio::test]
async fn payment_branch_fires_on_the_pass_after_closing() {
    let h = harness(
        ScriptedLanguageModel::default().with_intent(0.5).with_reply("aquí tienes"),
    );

    // Durable stage closing with no link sent yet: rule 4 routes to payment.
    let durable = DurableState { stage: Stage::Closing, ..DurableState::default() };
    let mut input = pass_input("me llamo Raúl", prior_exchange(), durable);
    input.contact = input.contact.with_name("Raúl");

    let state = h.workflow.process_message(input).await;

    assert!(state.payment_link_sent);
    assert!(state.summary.is_some());
}

#[tokio::test]
async fn generation_failure_yields_the_apology_reply() {
    let h = harness(
        ScriptedLanguageModel::default().with_intent(0.5).failing_generation(),
    );

    let state = h
        .workflow
        .process_message(pass_input(
            "cuéntame más del curso",
            prior_exchange(),
            DurableState::default(),
        ))
        .await;

    assert_eq!(state.current_response.as_deref(), Some(FALLBACK_REPLY));
    // No spurious writes: durable fields stay at their pre-pass values.
    assert_eq!(state.stage, Stage::Welcome);
    assert!(!state.payment_link_sent);
    assert_eq!(state.follow_up_count, 0);
}

#[tokio::test]
async fn collected_data_accumulates_across_passes() {
    let h = harness(ScriptedLanguageModel::default().with_intent(0.5).with_extraction(
        venta_core::flows::state::CollectedData {
            name: Some("Raúl".into()),
            needs: Some("curso intensivo".into()),
            ..Default::default()
        },
    ));

    let first = h
        .workflow
        .process_message(pass_input(
            "soy Raúl y busco un curso intensivo",
            prior_exchange(),
            DurableState::default(),
        ))
        .await;
    assert_eq!(first.collected.name.as_deref(), Some("Raúl"));
    assert_eq!(first.contact.name.as_deref(), Some("Raúl"));

    // Second pass with a different extraction merges instead of replacing.
    let h2 = harness(ScriptedLanguageModel::default().with_intent(0.5).with_extraction(
        venta_core::flows::state::CollectedData {
            budget: Some("300 USD".into()),
            ..Default::default()
        },
    ));
    let second = h2
        .workflow
        .process_message(pass_input("tengo 300 USD", prior_exchange(), first.durable()))
        .await;

    assert_eq!(second.collected.name.as_deref(), Some("Raúl"));
    assert_eq!(second.collected.budget.as_deref(), Some("300 USD"));
}
