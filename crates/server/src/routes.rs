use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use venta_whatsapp::webhook::{
    parse_incoming, verify_signature, verify_subscription, VerifyParams,
};

use crate::pipeline::MessagePipeline;

#[derive(Clone)]
pub struct WebhookState {
    pub pipeline: Arc<MessagePipeline>,
    pub verify_token: String,
    pub app_secret: Option<String>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(verify).post(receive))
        .route("/webhook/whatsapp/", get(verify).post(receive))
        .with_state(state)
}

/// Subscription handshake: echo the challenge when the verify token matches.
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    match verify_subscription(&params, &state.verify_token) {
        Some(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        None => {
            warn!("webhook verification rejected");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// Inbound messages. The platform expects a fast 200, so processing is
/// spawned off the request path; failures surface in logs, not in the
/// webhook response.
async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Some(app_secret) = &state.app_secret {
        let signature =
            headers.get("x-hub-signature-256").and_then(|value| value.to_str().ok());
        if let Err(signature_error) = verify_signature(app_secret, &body, signature) {
            warn!(%signature_error, "rejecting webhook delivery");
            return (StatusCode::FORBIDDEN, Json(json!({"status": "forbidden"})));
        }
    }

    let incoming = match parse_incoming(&body) {
        Ok(incoming) => incoming,
        Err(payload_error) => {
            warn!(%payload_error, "unparseable webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad_request"})));
        }
    };

    for message in incoming {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            let phone = message.phone.clone();
            if let Err(pipeline_error) = pipeline.handle(message).await {
                error!(%phone, %pipeline_error, "inbound message processing failed");
            }
        });
    }

    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn serve(
    bind_address: &str,
    port: u16,
    state: WebhookState,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(bind_address = %address, "webhook endpoint started");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
