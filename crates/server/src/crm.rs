use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use venta_agent::crm::{CrmContact, CrmSync};
use venta_core::config::CrmConfig;
use venta_core::flows::state::Stage;

/// HubSpot contact sync: search by phone (then email), update when found,
/// create otherwise. Conversation stage maps onto HubSpot lifecycle stages.
pub struct HubSpotCrm {
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

/// Conversation stage → HubSpot lifecycle stage.
pub fn lifecycle_stage(stage: Stage) -> &'static str {
    match stage {
        Stage::Welcome | Stage::Qualifying => "lead",
        Stage::Nurturing => "marketingqualifiedlead",
        Stage::Closing => "salesqualifiedlead",
        Stage::Sold => "customer",
        Stage::FollowUp | Stage::Handoff | Stage::Completed => "opportunity",
    }
}

impl HubSpotCrm {
    /// Returns `None` when the integration is disabled or unconfigured.
    pub fn from_config(config: &CrmConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(access_token) = config.access_token.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building crm http client")?;

        Ok(Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
        }))
    }

    async fn search_contact(&self, phone: &str, email: Option<&str>) -> Result<Option<String>> {
        if let Some(id) = self.search_by_property("phone", phone).await? {
            return Ok(Some(id));
        }
        if let Some(email) = email {
            return self.search_by_property("email", email).await;
        }
        Ok(None)
    }

    async fn search_by_property(&self, property: &str, value: &str) -> Result<Option<String>> {
        let url = format!("{}/crm/v3/objects/contacts/search", self.base_url);
        let body = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": property,
                    "operator": "EQ",
                    "value": value,
                }]
            }],
            "limit": 1,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .context("searching crm contact")?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("crm contact search failed with {status}"));
        }

        let results: SearchResponse =
            response.json().await.context("decoding crm search response")?;
        Ok(results.results.into_iter().next().map(|result| result.id))
    }

    async fn create_contact(&self, properties: serde_json::Value) -> Result<String> {
        let url = format!("{}/crm/v3/objects/contacts", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .context("creating crm contact")?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("crm contact creation failed with {status}"));
        }

        let created: ObjectResponse =
            response.json().await.context("decoding crm create response")?;
        Ok(created.id)
    }

    async fn update_contact(&self, id: &str, properties: serde_json::Value) -> Result<()> {
        let url = format!("{}/crm/v3/objects/contacts/{id}", self.base_url);
        let response = self
            .http
            .patch(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .context("updating crm contact")?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("crm contact update failed with {status}"));
        }
        Ok(())
    }
}

fn contact_properties(contact: &CrmContact) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("phone".to_string(), json!(contact.phone));
    map.insert("lifecyclestage".to_string(), json!(lifecycle_stage(contact.stage)));
    if let Some(name) = &contact.name {
        map.insert("firstname".to_string(), json!(name));
    }
    if let Some(email) = &contact.email {
        map.insert("email".to_string(), json!(email));
    }
    if let Some(summary) = &contact.summary {
        map.insert("conversation_summary".to_string(), json!(summary));
    }
    serde_json::Value::Object(map)
}

#[async_trait]
impl CrmSync for HubSpotCrm {
    async fn sync_contact(&self, contact: &CrmContact) -> Result<()> {
        let properties = contact_properties(contact);

        match self.search_contact(&contact.phone, contact.email.as_deref()).await? {
            Some(id) => {
                debug!(contact_id = %id, "updating existing crm contact");
                self.update_contact(&id, properties).await?;
                info!(contact_id = %id, action = "updated", "crm sync successful");
            }
            None => {
                let id = self.create_contact(properties).await?;
                info!(contact_id = %id, action = "created", "crm sync successful");
            }
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ObjectResponse>,
}

#[derive(Deserialize, Serialize)]
struct ObjectResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use venta_agent::crm::CrmContact;
    use venta_core::flows::state::{Sentiment, Stage};

    use super::{contact_properties, lifecycle_stage, HubSpotCrm};
    use venta_core::config::CrmConfig;

    #[test]
    fn stage_mapping_follows_the_sales_funnel() {
        assert_eq!(lifecycle_stage(Stage::Welcome), "lead");
        assert_eq!(lifecycle_stage(Stage::Qualifying), "lead");
        assert_eq!(lifecycle_stage(Stage::Nurturing), "marketingqualifiedlead");
        assert_eq!(lifecycle_stage(Stage::Closing), "salesqualifiedlead");
        assert_eq!(lifecycle_stage(Stage::Sold), "customer");
        assert_eq!(lifecycle_stage(Stage::FollowUp), "opportunity");
    }

    #[test]
    fn properties_skip_absent_fields() {
        let contact = CrmContact {
            phone: "+5215512345678".into(),
            name: Some("Laura".into()),
            email: None,
            intent_score: 0.4,
            sentiment: Sentiment::Neutral,
            stage: Stage::Qualifying,
            summary: None,
        };

        let properties = contact_properties(&contact);
        assert_eq!(properties["phone"], "+5215512345678");
        assert_eq!(properties["firstname"], "Laura");
        assert_eq!(properties["lifecyclestage"], "lead");
        assert!(properties.get("email").is_none());
        assert!(properties.get("conversation_summary").is_none());
    }

    #[test]
    fn disabled_config_yields_no_client() {
        let config = CrmConfig {
            enabled: false,
            access_token: Some("token".to_string().into()),
            base_url: "https://api.hubapi.com".into(),
        };
        assert!(HubSpotCrm::from_config(&config).expect("construct").is_none());
    }
}
