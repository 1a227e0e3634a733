//! Stripe webhook verification and event handling.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `stripe-signature: t=<unix secs>,v1=<hex>[,v1=<hex>...]`.  A payload is
//! accepted when any `v1` entry matches and the timestamp is within the
//! configured tolerance.

use chrono::{DateTime, Months, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{SignatureError, WebhookError};
use crate::model::Plan;
use crate::store::{SubscriptionRecord, SubscriptionStore};

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        if self.secret.is_empty() {
            return Err(SignatureError::NotConfigured);
        }
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SignatureError::Missing)?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();
        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or(SignatureError::Malformed)?;
            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
                }
                // Undecodable entries simply never match.
                "v1" => candidates.extend(hex::decode(value).ok()),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }
        // `t` is attacker-controlled; extreme values count as out of range.
        let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
        if skew.map_or(true, |s| s > self.tolerance_secs) {
            return Err(SignatureError::Expired);
        }

        let mac = self.mac_for(timestamp, payload)?;
        if candidates
            .iter()
            .any(|sig| mac.clone().verify_slice(sig).is_ok())
        {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::NotConfigured)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Build a `stripe-signature` header value for `payload`.  Used by tests
/// and local tooling that replays events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            format!(
                "t={},v1={}",
                timestamp,
                hex::encode(mac.finalize().into_bytes())
            )
        }
        Err(e) => {
            tracing::error!("Failed to create HMAC: {}", e);
            String::new()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
    }

    /// Payer email of a checkout session.
    pub fn customer_email(&self) -> Option<&str> {
        let obj = &self.data.object;
        obj.get("customer_email")
            .and_then(|v| v.as_str())
            .or_else(|| obj.pointer("/customer_details/email").and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Upgraded(SubscriptionRecord),
    Unhandled(String),
}

/// One calendar month after `now`, clamped to the end of shorter months.
pub fn pro_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(1))
        .unwrap_or_else(|| now + chrono::Duration::days(31))
}

/// Apply a verified event.  Only checkout completion changes state.
pub async fn apply_event(
    store: &dyn SubscriptionStore,
    event: &StripeEvent,
    now: DateTime<Utc>,
) -> Result<WebhookOutcome, WebhookError> {
    if event.event_type != CHECKOUT_COMPLETED {
        return Ok(WebhookOutcome::Unhandled(event.event_type.clone()));
    }
    let email = event.customer_email().ok_or(WebhookError::MissingEmail)?;
    let record = store.set(email, Plan::Pro, pro_expiry(now)).await?;
    tracing::info!(email = %email, event_id = ?event.id, expires_at = %record.expires_at, "subscription upgraded to pro");
    Ok(WebhookOutcome::Upgraded(record))
}
