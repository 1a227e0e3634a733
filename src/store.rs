//! Subscription persistence keyed by email.
//!
//! Two backends: an in-process [`MemoryStore`] and a [`JsonFileStore`] that
//! keeps every record in one JSON document.  Writes to the file store go to
//! a sibling temp file that is then renamed over the original, so a single
//! `set` is atomic with respect to readers of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::{Plan, Subscription};

/// Persisted record shape: `{email, plan, expiresAt, createdAt}` with
/// RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub email: String,
    pub plan: Plan,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<SubscriptionRecord> for Subscription {
    fn from(rec: SubscriptionRecord) -> Self {
        Subscription {
            email: Some(rec.email),
            plan: rec.plan,
            expires_at: Some(rec.expires_at),
            created_at: Some(rec.created_at),
        }
    }
}

fn upsert_record(
    existing: Option<&SubscriptionRecord>,
    email: &str,
    plan: Plan,
    expires_at: DateTime<Utc>,
) -> SubscriptionRecord {
    SubscriptionRecord {
        email: email.to_string(),
        plan,
        expires_at,
        // An overwrite keeps the first creation time.
        created_at: existing.map(|r| r.created_at).unwrap_or_else(Utc::now),
    }
}

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError>;
    async fn set(
        &self,
        email: &str,
        plan: Plan,
        expires_at: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, SubscriptionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self.records.get(email).map(|r| r.clone()))
    }

    async fn set(
        &self,
        email: &str,
        plan: Plan,
        expires_at: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError> {
        let mut slot = self
            .records
            .entry(email.to_string())
            .or_insert_with(|| upsert_record(None, email, plan, expires_at));
        let rec = upsert_record(Some(&*slot), email, plan, expires_at);
        *slot = rec.clone();
        Ok(rec)
    }
}

/// File-backed store.  The whole map is rewritten on each `set`; the lock
/// serialises writers within this process only.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            std::fs::write(&path, b"{}")?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, SubscriptionRecord>, StoreError> {
        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, records: &BTreeMap<String, SubscriptionRecord>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        let _held = self.lock.lock().await;
        Ok(self.load().await?.remove(email))
    }

    async fn set(
        &self,
        email: &str,
        plan: Plan,
        expires_at: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError> {
        let _held = self.lock.lock().await;
        let mut records = self.load().await?;
        let rec = upsert_record(records.get(email), email, plan, expires_at);
        records.insert(email.to_string(), rec.clone());
        self.save(&records).await?;
        Ok(rec)
    }
}
