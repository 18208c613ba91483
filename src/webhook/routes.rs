//! Webhook HTTP surface
//!
//! One POST endpoint per provider plus a health check. The handler is the
//! verify-then-dispatch pipeline: resolve provider, verify the signature
//! against the candidate secret set, parse, process. Raw body bytes are
//! what gets verified; parsing happens only after the signature holds.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::error::WebhookError;
use super::handlers::EventProcessor;
use super::models::WebhookEvent;
use super::signature::{SignatureScheme, verify_signature};
use crate::providers::{PaymentMethod, PlatformAccountRegistry};

pub struct GatewayState {
    pub processor: EventProcessor,
    pub platform_accounts: Arc<PlatformAccountRegistry>,
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/{provider}", post(receive_webhook))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn receive_webhook(
    State(state): State<Arc<GatewayState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, WebhookError> {
    let provider: PaymentMethod = provider
        .parse()
        .map_err(|_| WebhookError::UnknownProvider(provider.clone()))?;

    let scheme = SignatureScheme::for_provider(provider);
    let signature = headers
        .get(scheme.header_name())
        .and_then(|v| v.to_str().ok());
    let candidates = state.platform_accounts.webhook_secrets(provider);
    let currency_hint = verify_signature(scheme, signature, body.as_bytes(), &candidates)?;

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    info!(
        provider = %provider,
        provider_ref = %event.event_ref,
        kind = event.kind.as_str(),
        "Webhook received"
    );
    state
        .processor
        .process_event(provider, event, currency_hint)
        .await?;

    Ok(Json(json!({ "received": true })))
}
