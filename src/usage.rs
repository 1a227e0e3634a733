//! Daily summary counter backing the free-plan quota.  Counts reset at the
//! UTC day boundary and live only as long as the owning context.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;

#[derive(Clone, Default)]
pub struct UsageLedger {
    counts: Arc<DashMap<String, (NaiveDate, u32)>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used_today(&self, email: &str) -> u32 {
        self.used_on(email, Utc::now().date_naive())
    }

    pub fn used_on(&self, email: &str, day: NaiveDate) -> u32 {
        match self.counts.get(email) {
            Some(entry) if entry.0 == day => entry.1,
            _ => 0,
        }
    }

    /// True when `limit` (None = unbounded) still leaves room today.
    pub fn has_remaining(&self, email: &str, limit: Option<u32>) -> bool {
        match limit {
            None => true,
            Some(max) => self.used_today(email) < max,
        }
    }

    pub fn record(&self, email: &str) -> u32 {
        self.record_on(email, Utc::now().date_naive())
    }

    pub fn record_on(&self, email: &str, day: NaiveDate) -> u32 {
        let mut entry = self.counts.entry(email.to_string()).or_insert((day, 0));
        if entry.0 != day {
            *entry = (day, 0);
        }
        entry.1 += 1;
        entry.1
    }
}
