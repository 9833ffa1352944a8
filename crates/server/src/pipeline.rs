use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use venta_agent::engine::{PassInput, SalesWorkflow};
use venta_core::domain::message::ChatMessage;
use venta_core::flows::state::ConversationMode;
use venta_db::{
    ContactRepository, DbPool, FollowUpRepository, HistoryRepository, SettingsRepository,
};
use venta_whatsapp::client::OutboundMessenger;
use venta_whatsapp::webhook::IncomingText;

/// Transport-side orchestration for one inbound message: load durable state,
/// gate on conversation mode, run the engine, write everything back, and
/// deliver the reply.
///
/// Messages from the same contact are serialized through a per-phone lock;
/// different contacts proceed in parallel. The engine itself assumes this
/// serialization exists and does no locking of its own.
pub struct MessagePipeline {
    workflow: SalesWorkflow,
    pool: DbPool,
    messenger: Arc<dyn OutboundMessenger>,
    history_limit: u32,
    contact_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MessagePipeline {
    pub fn new(
        workflow: SalesWorkflow,
        pool: DbPool,
        messenger: Arc<dyn OutboundMessenger>,
        history_limit: u32,
    ) -> Self {
        Self {
            workflow,
            pool,
            messenger,
            history_limit,
            contact_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn contact_lock(&self, phone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.contact_locks.lock().await;
        locks.entry(phone.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub async fn handle(&self, incoming: IncomingText) -> Result<()> {
        let lock = self.contact_lock(&incoming.phone).await;
        let _serialized = lock.lock().await;

        let contacts = ContactRepository::new(self.pool.clone());
        let history = HistoryRepository::new(self.pool.clone());
        let follow_ups = FollowUpRepository::new(self.pool.clone());
        let settings = SettingsRepository::new(self.pool.clone());

        let record = contacts.get_or_create(&incoming.phone, incoming.received_at).await?;

        // The contact came back on their own; pending nudges are stale now.
        let cancelled = follow_ups.cancel_pending(&incoming.phone, incoming.received_at).await?;
        if cancelled > 0 {
            debug!(phone = %incoming.phone, cancelled, "cancelled pending follow-ups");
        }

        if record.durable.mode == ConversationMode::Manual {
            info!(phone = %incoming.phone, "conversation in manual mode, storing without processing");
            history
                .append(&incoming.phone, &ChatMessage::user(&incoming.text, incoming.received_at))
                .await?;
            return Ok(());
        }

        let prior_messages = history.recent(&incoming.phone, self.history_limit).await?;
        let profile = settings.load_profile().await?;

        let state = self
            .workflow
            .process_message(PassInput {
                contact: record.contact,
                text: incoming.text.clone(),
                history: prior_messages,
                durable: record.durable,
                profile,
                received_at: incoming.received_at,
            })
            .await;

        // Persist the inbound message with the sentiment stamp the analyzer
        // assigned to it, then the reply, then the durable fields.
        let inbound = state
            .last_user_message()
            .cloned()
            .unwrap_or_else(|| ChatMessage::user(&incoming.text, incoming.received_at));
        history.append(&incoming.phone, &inbound).await?;

        if let Some(reply) = &state.current_response {
            history.append(&incoming.phone, &ChatMessage::assistant(reply, Utc::now())).await?;
        }
        contacts.save_pass_result(&state, Utc::now()).await?;

        if let Some(reply) = &state.current_response {
            if let Err(delivery_error) = self.messenger.deliver(&incoming.phone, reply).await {
                // The pass already persisted; delivery is retried by the
                // user sending again, not by re-running the engine.
                error!(phone = %incoming.phone, %delivery_error, "outbound delivery failed");
            }
        } else {
            debug!(phone = %incoming.phone, "pass produced no reply");
        }

        Ok(())
    }
}
