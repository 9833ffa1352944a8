use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use venta_core::config::WhatsAppConfig;
use venta_core::domain::message::PART_SEPARATOR;

/// Outbound delivery seam. The pipeline and the follow-up dispatcher only
/// know this trait; tests substitute a recording double.
#[async_trait]
pub trait OutboundMessenger: Send + Sync {
    async fn deliver(&self, phone: &str, text: &str) -> Result<()>;
}

/// Splits a reply on the part separator, dropping empty parts. A reply
/// without separators is delivered as a single message.
pub fn delivery_parts(text: &str) -> Vec<&str> {
    text.split(PART_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: SendMessageText<'a>,
}

#[derive(Serialize)]
struct SendMessageText<'a> {
    body: &'a str,
}

/// WhatsApp Cloud API client for outbound text messages.
pub struct CloudApiClient {
    http: reqwest::Client,
    api_base_url: String,
    phone_number_id: String,
    access_token: SecretString,
}

impl CloudApiClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building whatsapp http client")?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    async fn send_text(&self, phone: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.api_base_url, self.phone_number_id);
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            to: phone.trim_start_matches('+'),
            kind: "text",
            text: SendMessageText { body },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .context("sending whatsapp message")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("whatsapp send failed with {status}: {detail}"));
        }

        Ok(())
    }
}

#[async_trait]
impl OutboundMessenger for CloudApiClient {
    async fn deliver(&self, phone: &str, text: &str) -> Result<()> {
        let parts = delivery_parts(text);
        info!(%phone, parts = parts.len(), "delivering outbound message");

        for part in parts {
            self.send_text(phone, part).await?;
        }

        Ok(())
    }
}

/// Messenger that logs instead of sending. Used by dry runs and smoke tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMessenger;

#[async_trait]
impl OutboundMessenger for NoopMessenger {
    async fn deliver(&self, phone: &str, text: &str) -> Result<()> {
        debug!(%phone, chars = text.len(), "noop messenger dropped outbound message");
        Ok(())
    }
}
