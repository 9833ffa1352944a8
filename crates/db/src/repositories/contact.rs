use chrono::{DateTime, Utc};

use venta_core::domain::contact::Contact;
use venta_core::flows::state::{
    CollectedData, ConversationMode, ConversationState, DurableState, Sentiment, Stage,
};

use super::RepositoryError;
use crate::DbPool;

/// Durable view of one contact as the transport loads it before a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactRecord {
    pub contact: Contact,
    pub durable: DurableState,
    pub intent_score: f64,
    pub sentiment: Sentiment,
    pub summary: Option<String>,
}

pub struct ContactRepository {
    pool: DbPool,
}

type ContactRow = (
    String,         // phone
    Option<String>, // name
    Option<String>, // email
    String,         // stage
    String,         // conversation_mode
    f64,            // intent_score
    String,         // sentiment
    Option<String>, // collected_name
    Option<String>, // collected_email
    Option<String>, // collected_phone
    Option<String>, // collected_needs
    Option<String>, // collected_budget
    Option<String>, // collected_pain_points
    i64,            // payment_link_sent
    i64,            // follow_up_count
    Option<String>, // conversation_summary
);

const CONTACT_COLUMNS: &str = "phone, name, email, stage, conversation_mode, intent_score, \
                               sentiment, collected_name, collected_email, collected_phone, \
                               collected_needs, collected_budget, collected_pain_points, \
                               payment_link_sent, follow_up_count, conversation_summary";

impl ContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, phone: &str) -> Result<Option<ContactRecord>, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_contact).transpose()
    }

    pub async fn get_or_create(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<ContactRecord, RepositoryError> {
        if let Some(record) = self.find(phone).await? {
            return Ok(record);
        }

        sqlx::query(
            "INSERT INTO contacts (phone, created_at, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(phone)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find(phone).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("contact `{phone}` missing after insert"))
        })
    }

    /// Writes the durable slice of a finished pass back to storage.
    pub async fn save_pass_result(
        &self,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE contacts SET \
                 name = ?, email = ?, stage = ?, conversation_mode = ?, intent_score = ?, \
                 sentiment = ?, collected_name = ?, collected_email = ?, collected_phone = ?, \
                 collected_needs = ?, collected_budget = ?, collected_pain_points = ?, \
                 payment_link_sent = ?, follow_up_count = ?, \
                 conversation_summary = COALESCE(?, conversation_summary), updated_at = ? \
             WHERE phone = ?",
        )
        .bind(&state.contact.name)
        .bind(&state.contact.email)
        .bind(state.stage.as_str())
        .bind(state.mode.as_str())
        .bind(state.intent_score)
        .bind(state.sentiment.as_str())
        .bind(&state.collected.name)
        .bind(&state.collected.email)
        .bind(&state.collected.phone)
        .bind(&state.collected.needs)
        .bind(&state.collected.budget)
        .bind(&state.collected.pain_points)
        .bind(state.payment_link_sent as i64)
        .bind(state.follow_up_count as i64)
        .bind(&state.summary)
        .bind(now.to_rfc3339())
        .bind(&state.contact.phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Human takeover / release, driven from outside the engine.
    pub async fn set_mode(
        &self,
        phone: &str,
        mode: ConversationMode,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE contacts SET conversation_mode = ?, updated_at = ? WHERE phone = ?")
            .bind(mode.as_str())
            .bind(now.to_rfc3339())
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_contact(row: ContactRow) -> Result<ContactRecord, RepositoryError> {
    let (
        phone,
        name,
        email,
        stage,
        mode,
        intent_score,
        sentiment,
        collected_name,
        collected_email,
        collected_phone,
        collected_needs,
        collected_budget,
        collected_pain_points,
        payment_link_sent,
        follow_up_count,
        summary,
    ) = row;

    let stage = Stage::parse(&stage)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown stage `{stage}`")))?;
    let mode = ConversationMode::parse(&mode)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown conversation mode `{mode}`")))?;

    Ok(ContactRecord {
        contact: Contact { phone, name, email },
        durable: DurableState {
            stage,
            mode,
            collected: CollectedData {
                name: collected_name,
                email: collected_email,
                phone: collected_phone,
                needs: collected_needs,
                budget: collected_budget,
                pain_points: collected_pain_points,
            },
            payment_link_sent: payment_link_sent != 0,
            follow_up_count: follow_up_count.max(0) as u32,
        },
        intent_score,
        sentiment: Sentiment::from_label(&sentiment),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use venta_core::domain::contact::Contact;
    use venta_core::domain::profile::BotProfile;
    use venta_core::flows::state::{
        ConversationMode, ConversationState, DurableState, Stage, StatePatch,
    };

    use super::ContactRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> ContactRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        ContactRepository::new(pool)
    }

    #[tokio::test]
    async fn get_or_create_returns_defaults_for_new_contacts() {
        let repo = repo().await;
        let record = repo.get_or_create("+521555100100", Utc::now()).await.expect("create");

        assert_eq!(record.contact.phone, "+521555100100");
        assert_eq!(record.durable.stage, Stage::Welcome);
        assert_eq!(record.durable.mode, ConversationMode::Auto);
        assert_eq!(record.durable.follow_up_count, 0);
        assert!(!record.durable.payment_link_sent);
    }

    #[tokio::test]
    async fn pass_result_round_trips_through_storage() {
        let repo = repo().await;
        let now = Utc::now();
        repo.get_or_create("+521555100200", now).await.expect("create");

        let mut state = ConversationState::for_pass(
            Contact::new("+521555100200"),
            Vec::new(),
            "quiero comprar",
            DurableState::default(),
            BotProfile::default(),
            now,
        );
        state.apply(StatePatch {
            intent_score: Some(0.92),
            stage: Some(Stage::Closing),
            contact_name: Some("Raúl".into()),
            payment_link_sent: Some(true),
            follow_up_count: Some(1),
            summary: Some("Cliente listo para pagar.".into()),
            ..Default::default()
        });

        repo.save_pass_result(&state, now).await.expect("save");

        let loaded = repo.find("+521555100200").await.expect("find").expect("present");
        assert_eq!(loaded.contact.name.as_deref(), Some("Raúl"));
        assert_eq!(loaded.durable.stage, Stage::Closing);
        assert!(loaded.durable.payment_link_sent);
        assert_eq!(loaded.durable.follow_up_count, 1);
        assert_eq!(loaded.intent_score, 0.92);
        assert_eq!(loaded.summary.as_deref(), Some("Cliente listo para pagar."));
    }

    #[tokio::test]
    async fn summary_is_never_overwritten_with_null() {
        let repo = repo().await;
        let now = Utc::now();
        repo.get_or_create("+521555100300", now).await.expect("create");

        let mut state = ConversationState::for_pass(
            Contact::new("+521555100300"),
            Vec::new(),
            "hola",
            DurableState::default(),
            BotProfile::default(),
            now,
        );
        state.apply(StatePatch { summary: Some("Primer resumen.".into()), ..Default::default() });
        repo.save_pass_result(&state, now).await.expect("first save");

        // A later pass without a summary keeps the stored one.
        state.summary = None;
        repo.save_pass_result(&state, now).await.expect("second save");

        let loaded = repo.find("+521555100300").await.expect("find").expect("present");
        assert_eq!(loaded.summary.as_deref(), Some("Primer resumen."));
    }

    #[tokio::test]
    async fn mode_can_be_toggled_for_human_takeover() {
        let repo = repo().await;
        let now = Utc::now();
        repo.get_or_create("+521555100400", now).await.expect("create");

        repo.set_mode("+521555100400", ConversationMode::Manual, now).await.expect("set");
        let loaded = repo.find("+521555100400").await.expect("find").expect("present");
        assert_eq!(loaded.durable.mode, ConversationMode::Manual);
    }
}
