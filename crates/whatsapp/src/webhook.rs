use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing X-Hub-Signature-256 header")]
    MissingSignature,
    #[error("webhook signature mismatch")]
    InvalidSignature,
    #[error("unparseable webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Query parameters of the Cloud API verification handshake.
#[derive(Clone, Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Answers the subscription handshake: returns the challenge to echo when
/// the mode and token match, `None` otherwise.
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> Option<String> {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(expected_token);
    if mode_ok && token_ok {
        params.challenge.clone()
    } else {
        None
    }
}

/// Checks the `X-Hub-Signature-256: sha256=<hex>` header against the raw
/// request body.
pub fn verify_signature(
    app_secret: &str,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let provided = header.strip_prefix("sha256=").ok_or(WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    let expected = hex_encode(&mac.finalize().into_bytes());

    if constant_time_eq(expected.as_bytes(), provided.to_ascii_lowercase().as_bytes()) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Inbound payload shape, trimmed to the fields the pipeline consumes.

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// One text message ready for the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingText {
    pub phone: String,
    pub message_id: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Parses a webhook body and keeps only deliverable text messages. Media and
/// status updates are dropped here; the pipeline never sees them.
pub fn parse_incoming(body: &[u8]) -> Result<Vec<IncomingText>, WebhookError> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;

    let mut incoming = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                continue;
            }
            for message in change.value.messages {
                if message.kind != "text" {
                    continue;
                }
                let Some(text) = message.text else { continue };
                incoming.push(IncomingText {
                    phone: normalize_phone(&message.from),
                    message_id: message.id,
                    text: text.body,
                    received_at: parse_unix_timestamp(&message.timestamp),
                });
            }
        }
    }

    Ok(incoming)
}

/// Normalizes a sender id to `+<msisdn>` so storage, CRM, and outbound
/// delivery agree on the key.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches("whatsapp:").trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{trimmed}")
    }
}

fn parse_unix_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::{
        normalize_phone, parse_incoming, verify_signature, verify_subscription, VerifyParams,
        WebhookError,
    };

    const SAMPLE_PAYLOAD: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1031",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "messages": [
                        {
                            "from": "5215512345678",
                            "id": "wamid.A1",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "hola"}
                        },
                        {
                            "from": "5215512345678",
                            "id": "wamid.A2",
                            "timestamp": "1700000001",
                            "type": "image"
                        }
                    ]
                }
            }]
        }]
    }"#;

    #[test]
    fn handshake_echoes_challenge_on_token_match() {
        let params = VerifyParams {
            mode: Some("subscribe".into()),
            verify_token: Some("secreto".into()),
            challenge: Some("12345".into()),
        };
        assert_eq!(verify_subscription(&params, "secreto").as_deref(), Some("12345"));
        assert_eq!(verify_subscription(&params, "otro"), None);
    }

    #[test]
    fn handshake_rejects_wrong_mode() {
        let params = VerifyParams {
            mode: Some("unsubscribe".into()),
            verify_token: Some("secreto".into()),
            challenge: Some("12345".into()),
        };
        assert_eq!(verify_subscription(&params, "secreto"), None);
    }

    #[test]
    fn parse_keeps_text_messages_and_drops_media() {
        let incoming = parse_incoming(SAMPLE_PAYLOAD.as_bytes()).expect("parse");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].phone, "+5215512345678");
        assert_eq!(incoming[0].text, "hola");
        assert_eq!(incoming[0].message_id, "wamid.A1");
    }

    #[test]
    fn phone_normalization_is_idempotent() {
        assert_eq!(normalize_phone("whatsapp:+5215512345678"), "+5215512345678");
        assert_eq!(normalize_phone("5215512345678"), "+5215512345678");
        assert_eq!(normalize_phone("+5215512345678"), "+5215512345678");
    }

    #[test]
    fn signature_round_trip_accepts_and_rejects() {
        let secret = "app-secret";
        let body = br#"{"object":"whatsapp_business_account"}"#;

        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
        mac.update(body);
        let hex: String =
            mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect();
        let header = format!("sha256={hex}");

        assert!(verify_signature(secret, body, Some(&header)).is_ok());
        assert!(matches!(
            verify_signature(secret, body, Some("sha256=deadbeef")),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(secret, body, None),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature("other-secret", body, Some(&header)),
            Err(WebhookError::InvalidSignature)
        ));
    }
}
