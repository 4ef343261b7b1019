//! Inbound HTTP surface: accepts webhooks on any path and hands them to intake.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::pipeline::intake::Intake;
use crate::pipeline::normalize::is_supported_agent;
use crate::pipeline::types::{Envelope, Headers};

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub intake: Arc<Intake>,
}

/// Build the inbound router. Every path other than `/healthcheck` is a
/// webhook endpoint; the path is kept so it can be replayed downstream.
pub fn webhook_routes(intake: Arc<Intake>) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .fallback(receive)
        .with_state(WebhookState { intake })
        .layer(TraceLayer::new_for_http())
}

async fn healthcheck() -> &'static str {
    "OK"
}

async fn receive(
    State(state): State<WebhookState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    if !is_supported_agent(user_agent) {
        warn!(path = %uri.path(), user_agent = user_agent.unwrap_or("<none>"), "Rejecting webhook from unsupported source");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Unsupported User-Agent, expected Sonarr"})),
        );
    }

    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let envelope = Envelope::new(path, collect_headers(&headers), body.to_vec());
    info!(envelope_id = %envelope.id, path = %envelope.source_path, bytes = body.len(), "Webhook received");

    let intake = Arc::clone(&state.intake);
    tokio::spawn(async move {
        if let Ok(accepted) = intake.accept(envelope).await {
            debug!(?accepted, "Envelope accepted");
        }
    });

    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "accepted"})),
    )
}

/// Header names are already lower-case in `HeaderMap`. Values that are not
/// valid UTF-8 are skipped.
fn collect_headers(headers: &HeaderMap) -> Headers {
    let mut collected = Headers::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            collected
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    collected
}
