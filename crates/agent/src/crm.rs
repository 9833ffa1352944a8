use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use venta_core::flows::state::{ConversationState, Sentiment, Stage};

/// Snapshot of a conversation pushed to the CRM. Built from the running
/// state at the moment of sync, so later nodes' updates produce later syncs.
#[derive(Clone, Debug, PartialEq)]
pub struct CrmContact {
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub intent_score: f64,
    pub sentiment: Sentiment,
    pub stage: Stage,
    pub summary: Option<String>,
}

impl CrmContact {
    pub fn from_state(state: &ConversationState) -> Self {
        Self {
            phone: state.contact.phone.clone(),
            name: state.contact.name.clone().or_else(|| state.collected.name.clone()),
            email: state.contact.email.clone().or_else(|| state.collected.email.clone()),
            intent_score: state.intent_score,
            sentiment: state.sentiment,
            stage: state.stage,
            summary: state.summary.clone(),
        }
    }
}

/// CRM capability. Always best-effort: callers log failures and move on, a
/// broken CRM must never cost the user a reply.
#[async_trait]
pub trait CrmSync: Send + Sync {
    async fn sync_contact(&self, contact: &CrmContact) -> Result<()>;
}

/// Used when no CRM is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledCrm;

#[async_trait]
impl CrmSync for DisabledCrm {
    async fn sync_contact(&self, contact: &CrmContact) -> Result<()> {
        debug!(phone = %contact.phone, "crm sync skipped: no crm configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use venta_core::domain::contact::Contact;
    use venta_core::domain::profile::BotProfile;
    use venta_core::flows::state::{
        CollectedData, ConversationState, DurableState, StatePatch,
    };

    use super::CrmContact;

    #[test]
    fn snapshot_prefers_identity_fields_over_collected_ones() {
        let mut state = ConversationState::for_pass(
            Contact::new("+521555000333").with_name("Marta"),
            Vec::new(),
            "hola",
            DurableState::default(),
            BotProfile::default(),
            Utc::now(),
        );
        state.apply(StatePatch {
            collected: Some(CollectedData {
                name: Some("M. García".into()),
                email: Some("marta@example.com".into()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let snapshot = CrmContact::from_state(&state);
        assert_eq!(snapshot.name.as_deref(), Some("Marta"));
        assert_eq!(snapshot.email.as_deref(), Some("marta@example.com"));
    }
}
