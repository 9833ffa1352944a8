use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use venta_core::domain::contact::Contact;
use venta_core::domain::message::ChatMessage;
use venta_core::domain::profile::BotProfile;
use venta_core::flows::router::{route, Branch};
use venta_core::flows::state::{ConversationState, DurableState};

use crate::crm::CrmSync;
use crate::llm::LanguageModel;
use crate::nodes::{analysis, stages};
use crate::retrieval::KnowledgeBase;
use crate::schedule::FollowUpScheduler;

/// Reply substituted when a pass fails in a way no node-level fallback
/// caught. The user always gets some text back.
pub const FALLBACK_REPLY: &str =
    "I apologize, I'm having trouble responding right now. Could you please try again?";

/// The external capabilities the workflow depends on, injected once at
/// bootstrap so tests can substitute doubles.
#[derive(Clone)]
pub struct Capabilities {
    pub llm: Arc<dyn LanguageModel>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub crm: Arc<dyn CrmSync>,
    pub scheduler: Arc<dyn FollowUpScheduler>,
}

/// Everything one pass needs: identity, the new inbound text, persisted
/// history, the durable state slice, the tenant profile, and the pass
/// timestamp (injected rather than read from the clock, so follow-up timing
/// is testable).
#[derive(Clone, Debug)]
pub struct PassInput {
    pub contact: Contact,
    pub text: String,
    pub history: Vec<ChatMessage>,
    pub durable: DurableState,
    pub profile: BotProfile,
    pub received_at: DateTime<Utc>,
}

/// The conversation workflow: a fixed analysis pipeline, a pure router, and
/// one handler per branch, run to completion for each inbound message.
///
/// Pass shape:
///
/// ```text
/// welcome → intent → sentiment → data collector → route ─┬→ conversation → END
///                                                        ├→ closing → payment → summary → END
///                                                        ├→ payment → summary → END
///                                                        ├→ follow_up → summary → END
///                                                        └→ handoff → END
/// ```
pub struct SalesWorkflow {
    capabilities: Capabilities,
}

impl SalesWorkflow {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Runs one pass. Never returns an error: anything that escapes the
    /// node-level fallbacks yields the pre-pass state with a generic apology
    /// so the caller always has a reply to deliver and no spurious writes.
    pub async fn process_message(&self, input: PassInput) -> ConversationState {
        let phone = input.contact.phone.clone();
        let state = ConversationState::for_pass(
            input.contact,
            input.history,
            &input.text,
            input.durable,
            input.profile,
            input.received_at,
        );
        let pre_pass = state.clone();

        match self.run_pass(state, input.received_at).await {
            Ok(state) => state,
            Err(error) => {
                error!(%phone, %error, "pass failed, substituting fallback reply");
                let mut state = pre_pass;
                state.current_response = Some(FALLBACK_REPLY.to_string());
                state
            }
        }
    }

    async fn run_pass(
        &self,
        mut state: ConversationState,
        now: DateTime<Utc>,
    ) -> Result<ConversationState> {
        let llm = self.capabilities.llm.as_ref();
        let crm = self.capabilities.crm.as_ref();

        let greeting = stages::welcome(&state);
        let greeted = greeting.response.is_some();
        state.apply(greeting);

        let patch = analysis::intent_classifier(llm, &state).await;
        state.apply(patch);
        let patch = analysis::sentiment_analyzer(llm, &state).await;
        state.apply(patch);
        let patch = analysis::data_collector(llm, crm, &state).await;
        state.apply(patch);

        // First user turn: the greeting wins the pass. Analysis still ran so
        // intent/sentiment/collected data are fresh for the next pass.
        if greeted {
            debug!("greeting pass, skipping branch dispatch");
            return Ok(state);
        }

        let branch = route(&state);
        info!(branch = branch.as_str(), stage = state.stage.as_str(), "branch selected");

        match branch {
            Branch::Conversation => {
                let patch =
                    stages::conversation(llm, self.capabilities.knowledge.as_ref(), &state).await?;
                state.apply(patch);
            }
            Branch::Closing => {
                let (patch, ready_for_payment) = stages::closing(&state);
                state.apply(patch);
                if ready_for_payment {
                    let patch = stages::payment(llm, &state).await;
                    state.apply(patch);
                    let patch = stages::summary(llm, crm, &state).await;
                    state.apply(patch);
                }
            }
            Branch::Payment => {
                let patch = stages::payment(llm, &state).await;
                state.apply(patch);
                let patch = stages::summary(llm, crm, &state).await;
                state.apply(patch);
            }
            Branch::FollowUp => {
                let patch =
                    stages::follow_up(self.capabilities.scheduler.as_ref(), &state, now).await;
                state.apply(patch);
                let patch = stages::summary(llm, crm, &state).await;
                state.apply(patch);
            }
            Branch::Handoff => {
                let patch = stages::handoff(&state);
                state.apply(patch);
            }
        }

        Ok(state)
    }
}
