//! Core library for Quicksum.  The client half (sanitizer, detector,
//! prompts, entitlements, orchestration, extension messages) is embedded
//! by the extension contexts; the backend half is the axum router built by
//! [`app`], which answers subscription checks and applies Stripe webhooks.

mod config;
pub mod ai;
pub mod detect;
pub mod entitlement;
pub mod error;
pub mod messages;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod sanitize;
pub mod store;
pub mod usage;
pub mod webhook;

pub use config::{AppConfig, ClientConfig};

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::ai::AiClient;
use crate::entitlement::{EntitlementService, HttpSubscriptionSource};
use crate::error::WebhookError;
use crate::messages::BackgroundWorker;
use crate::model::Subscription;
use crate::orchestrator::Orchestrator;
use crate::store::{JsonFileStore, MemoryStore, SubscriptionStore};
use crate::webhook::{apply_event, StripeEvent, WebhookOutcome, WebhookVerifier, SIGNATURE_HEADER};

#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared backend state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub verifier: WebhookVerifier,
    /// Acknowledge event types we don't act on with 200 instead of 400.
    pub ack_unknown_events: bool,
    /// Maximum accepted raw request body size in bytes (None => axum default)
    pub max_request_bytes: Option<usize>,
}

impl AppState {
    pub fn new(store: Arc<dyn SubscriptionStore>, verifier: WebhookVerifier) -> Self {
        Self {
            store,
            verifier,
            ack_unknown_events: true,
            max_request_bytes: None,
        }
    }
}

/// Build state from environment variables.  See [`AppConfig::from_env`]
/// for the variables read; `QUICKSUM_STORE_FILE` selects the file-backed
/// store, otherwise records live in memory.
pub async fn build_state_from_env() -> Result<AppState, Box<dyn std::error::Error>> {
    let config = AppConfig::from_env().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
    let AppConfig {
        webhook_secret,
        webhook_tolerance_secs,
        ack_unknown_events,
        store_file,
        max_request_bytes,
    } = config;

    let store: Arc<dyn SubscriptionStore> = match store_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "using file-backed subscription store");
            Arc::new(JsonFileStore::open(&path)?)
        }
        None => {
            tracing::warn!("QUICKSUM_STORE_FILE not set; subscriptions are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(AppState {
        store,
        verifier: WebhookVerifier::new(webhook_secret, webhook_tolerance_secs),
        ack_unknown_events,
        max_request_bytes,
    })
}

/// Assemble the background worker from client settings: HTTP subscription
/// lookups against the backend, the generation client and a fresh
/// orchestrator.
pub fn build_worker(cfg: &ClientConfig) -> anyhow::Result<BackgroundWorker> {
    let source = HttpSubscriptionSource::new(cfg.backend_url.clone(), cfg.lookup_timeout)?;
    let entitlements = EntitlementService::new(Arc::new(source), cfg.cache_ttl);
    let generator = AiClient::new(cfg.ai.clone())?;
    let orchestrator = Orchestrator::new(entitlements, Arc::new(generator));
    Ok(BackgroundWorker::new(orchestrator, cfg.checkout_url.clone()))
}

/// Build the Axum router and attach handlers.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        .route("/check-subscription", get(check_subscription_handler))
        .route("/webhook", post(webhook_handler))
        .route("/healthz", get(healthz_handler));

    let router = if let Some(limit) = max_request_bytes {
        router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(limit))
    } else {
        router
    };

    router.with_state(state)
}

fn respond_with_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    let err = ErrorResponse {
        error: message.into(),
    };
    (status, Json(err)).into_response()
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: Option<String>,
}

/// Handler for `GET /check-subscription?email=`.  Unknown emails are on the
/// free plan.
async fn check_subscription_handler(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> axum::response::Response {
    let email = match params.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => e.to_string(),
        None => return respond_with_error(StatusCode::BAD_REQUEST, "Email is required"),
    };
    match state.store.get(&email).await {
        Ok(Some(record)) => (StatusCode::OK, Json(Subscription::from(record))).into_response(),
        Ok(None) => (StatusCode::OK, Json(Subscription::free())).into_response(),
        Err(err) => {
            tracing::error!(email = %email, error = %err, "subscription lookup failed");
            respond_with_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Handler for `POST /webhook`.  The raw body is needed for signature
/// verification, so it is taken as bytes and decoded afterwards.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(err) = state.verifier.verify(&body, signature) {
        tracing::warn!(error = %err, "webhook signature verification failed");
        return respond_with_error(StatusCode::BAD_REQUEST, format!("Webhook Error: {}", err));
    }

    let event = match StripeEvent::parse(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "invalid webhook payload");
            return respond_with_error(StatusCode::BAD_REQUEST, format!("Webhook Error: {}", err));
        }
    };

    match apply_event(state.store.as_ref(), &event, chrono::Utc::now()).await {
        Ok(WebhookOutcome::Upgraded(_)) => {
            (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
        }
        Ok(WebhookOutcome::Unhandled(event_type)) => {
            if state.ack_unknown_events {
                tracing::info!(event_type = %event_type, "acknowledging unhandled webhook event");
                let ack = serde_json::json!({ "received": true, "handled": false });
                (StatusCode::OK, Json(ack)).into_response()
            } else {
                respond_with_error(StatusCode::BAD_REQUEST, "Unhandled event type")
            }
        }
        Err(err @ (WebhookError::MissingEmail | WebhookError::Payload(_))) => {
            tracing::warn!(error = %err, "webhook event rejected");
            respond_with_error(StatusCode::BAD_REQUEST, format!("Webhook Error: {}", err))
        }
        Err(WebhookError::Store(err)) => {
            tracing::error!(error = %err, "database update failed");
            respond_with_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler() -> axum::response::Response {
    let json = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(json)).into_response()
}
