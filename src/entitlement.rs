//! Plan resolution and feature limits.
//!
//! Lookups go through a per-email cache first and fall back to a
//! [`SubscriptionSource`].  A failed lookup never surfaces as an error: the
//! caller gets [`PlanResolution::Degraded`] carrying the free plan, which
//! is deliberately not cached so the next request retries the backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::LookupError;
use crate::model::{Limits, Subscription};

/// Where subscriptions come from on a cache miss.
#[async_trait::async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn fetch(&self, email: &str) -> Result<Subscription, LookupError>;
}

/// Queries the backend's `/check-subscription` route.
pub struct HttpSubscriptionSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSubscriptionSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SubscriptionSource for HttpSubscriptionSource {
    async fn fetch(&self, email: &str) -> Result<Subscription, LookupError> {
        let url = format!(
            "{}/check-subscription?email={}",
            self.base_url,
            urlencoding::encode(email)
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

/// Result of a plan lookup.  Both variants carry a usable subscription;
/// `Degraded` means the lookup failed and the free plan was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanResolution {
    Resolved(Subscription),
    Degraded(Subscription),
}

impl PlanResolution {
    pub fn subscription(&self) -> &Subscription {
        match self {
            PlanResolution::Resolved(s) | PlanResolution::Degraded(s) => s,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PlanResolution::Degraded(_))
    }
}

struct CacheEntry {
    subscription: Subscription,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct EntitlementService {
    source: Arc<dyn SubscriptionSource>,
    cache: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl EntitlementService {
    pub fn new(source: Arc<dyn SubscriptionSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub async fn resolve_plan(&self, email: &str) -> PlanResolution {
        if let Some(entry) = self.cache.get(email) {
            if entry.stored_at.elapsed() < self.ttl {
                return PlanResolution::Resolved(entry.subscription.clone());
            }
        }
        // Expired entries are replaced below or left for the next attempt.
        match self.source.fetch(email).await {
            Ok(subscription) => {
                self.cache.insert(
                    email.to_string(),
                    CacheEntry {
                        subscription: subscription.clone(),
                        stored_at: Instant::now(),
                    },
                );
                PlanResolution::Resolved(subscription)
            }
            Err(err) => {
                tracing::warn!(email = %email, error = %err, "subscription check failed; using free plan");
                PlanResolution::Degraded(Subscription::free())
            }
        }
    }

    /// Drop the cached plan for `email`, e.g. after starting an upgrade.
    pub fn invalidate(&self, email: &str) {
        self.cache.remove(email);
    }

    pub fn compute_limits(subscription: &Subscription) -> Limits {
        Limits::for_plan(subscription.plan)
    }
}
