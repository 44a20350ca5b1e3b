use super::error::{invalid_payload, ok};
use super::AppState;
use crate::core::webhook::{MailgunWebhook, DOCUSEAL_SIGNATURE_HEADER};
use crate::utils::error::{HubError, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

fn not_configured(source: &str) -> HubError {
    HubError::SignatureError {
        reason: format!("{} webhook secret is not configured", source),
    }
}

pub async fn mailgun(
    State(state): State<AppState>,
    Json(webhook): Json<MailgunWebhook>,
) -> Result<Json<Value>> {
    let verifier = state
        .mailgun_webhooks
        .as_ref()
        .ok_or_else(|| not_configured("Mailgun"))?;
    verifier.verify(&webhook.signature)?;

    let event = webhook
        .event_data
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    state.phi.info(
        &format!("📧 Mailgun webhook received: {}", event),
        &webhook.event_data,
    );

    Ok(ok(json!({ "received": true, "event": event })))
}

/// The signature covers the raw body, so it is read as bytes and only
/// parsed after verification.
pub async fn docuseal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let verifier = state
        .docuseal_webhooks
        .as_ref()
        .ok_or_else(|| not_configured("DocuSeal"))?;
    let signature = headers
        .get(DOCUSEAL_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    verifier.verify(&body, signature)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| invalid_payload("webhook body", &e))?;
    let event_type = payload
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    state.phi.info(
        &format!("✍️ DocuSeal webhook received: {}", event_type),
        &payload,
    );

    Ok(ok(json!({ "received": true, "event_type": event_type })))
}
