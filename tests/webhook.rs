use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Months, Utc};
use http_body_util::BodyExt;
use quicksum::error::StoreError;
use quicksum::model::Plan;
use quicksum::store::{MemoryStore, SubscriptionRecord, SubscriptionStore};
use quicksum::webhook::{sign_payload, WebhookVerifier, SIGNATURE_HEADER};
use quicksum::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "whsec_integration";

struct ReadOnlyStore;

#[async_trait::async_trait]
impl SubscriptionStore for ReadOnlyStore {
    async fn get(&self, _email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(None)
    }

    async fn set(
        &self,
        _email: &str,
        _plan: Plan,
        _expires_at: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError> {
        Err(StoreError::Io(std::io::Error::other("read-only")))
    }
}

fn checkout_event(email: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_test", "customer_email": email}}
    }))
    .unwrap()
}

fn signed_request(body: Vec<u8>, secret: &str) -> Request<Body> {
    let header = sign_payload(secret, Utc::now().timestamp(), &body);
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, header)
        .body(Body::from(body))
        .unwrap()
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn state(store: Arc<dyn SubscriptionStore>) -> AppState {
    AppState::new(store, WebhookVerifier::new(SECRET, 300))
}

#[tokio::test]
async fn checkout_completed_upgrades_to_pro() {
    let store = Arc::new(MemoryStore::new());
    let before = Utc::now();
    let (status, body) = send(
        state(store.clone()),
        signed_request(checkout_event("a@b.com"), SECRET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));

    let rec = store.get("a@b.com").await.unwrap().unwrap();
    assert_eq!(rec.plan, Plan::Pro);
    let lower = before.checked_add_months(Months::new(1)).unwrap();
    let upper = Utc::now().checked_add_months(Months::new(1)).unwrap();
    assert!(rec.expires_at >= lower && rec.expires_at <= upper);
}

#[tokio::test]
async fn tampered_signature_is_rejected_without_writes() {
    let store = Arc::new(MemoryStore::new());
    let (status, body) = send(
        state(store.clone()),
        signed_request(checkout_event("a@b.com"), "whsec_someone_else"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from(checkout_event("a@b.com")))
        .unwrap();
    let (status, _) = send(state(store.clone()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn out_of_range_timestamps_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    for t in [i64::MIN, i64::MAX] {
        let req = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(SIGNATURE_HEADER, format!("t={},v1=00", t))
            .body(Body::from(checkout_event("a@b.com")))
            .unwrap();
        let (status, body) = send(state(store.clone()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn unconfigured_secret_rejects_everything() {
    let store = Arc::new(MemoryStore::new());
    let st = AppState::new(store.clone(), WebhookVerifier::new("", 300));
    let (status, _) = send(st, signed_request(checkout_event("a@b.com"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn unknown_events_are_acknowledged_by_default() {
    let store = Arc::new(MemoryStore::new());
    let body = serde_json::to_vec(&json!({
        "type": "invoice.paid",
        "data": {"object": {"customer_email": "a@b.com"}}
    }))
    .unwrap();
    let (status, reply) = send(state(store.clone()), signed_request(body.clone(), SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, json!({"received": true, "handled": false}));
    assert!(store.is_empty());

    let mut strict = state(store.clone());
    strict.ack_unknown_events = false;
    let (status, reply) = send(strict, signed_request(body, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], "Unhandled event type");
}

#[tokio::test]
async fn checkout_without_email_is_bad_request() {
    let store = Arc::new(MemoryStore::new());
    let body = serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_no_email"}}
    }))
    .unwrap();
    let (status, _) = send(state(store.clone()), signed_request(body, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn signed_garbage_is_bad_request() {
    let (status, _) = send(
        state(Arc::new(MemoryStore::new())),
        signed_request(b"not json".to_vec(), SECRET),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let (status, body) = send(
        state(Arc::new(ReadOnlyStore)),
        signed_request(checkout_event("a@b.com"), SECRET),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut st = state(Arc::new(MemoryStore::new()));
    st.max_request_bytes = Some(64);
    let mut body = checkout_event("a@b.com");
    body.extend(std::iter::repeat(b' ').take(256));
    let (status, _) = send(st, signed_request(body, SECRET)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
