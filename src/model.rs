//! Shared data model: summary types, plans, subscription records and the
//! limits derived from a plan.  Wire names follow the extension's JSON
//! (camelCase fields, lower-case enum values).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    #[default]
    Short,
    Medium,
    Bullet,
}

impl SummaryType {
    pub const ALL: [SummaryType; 3] = [SummaryType::Short, SummaryType::Medium, SummaryType::Bullet];

    /// Strict parse used for request validation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "bullet" => Some(Self::Bullet),
            _ => None,
        }
    }

    /// Lenient parse used when picking a prompt template.
    pub fn parse_or_medium(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Bullet => "bullet",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

/// A subscription record.  The backend answers `{"plan":"free"}` for
/// unknown emails, so everything except the plan is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub plan: Plan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn free() -> Self {
        Self {
            email: None,
            plan: Plan::Free,
            expires_at: None,
            created_at: None,
        }
    }
}

/// Feature limits granted by a plan.  `max_summaries == None` means
/// unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_summaries: Option<u32>,
    pub allowed_types: BTreeSet<SummaryType>,
    pub allow_code_explanation: bool,
}

impl Limits {
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Free => Limits {
                max_summaries: Some(5),
                allowed_types: BTreeSet::from([SummaryType::Short]),
                allow_code_explanation: false,
            },
            Plan::Pro => Limits {
                max_summaries: None,
                allowed_types: SummaryType::ALL.into_iter().collect(),
                allow_code_explanation: true,
            },
        }
    }

    pub fn allows(&self, ty: SummaryType) -> bool {
        self.allowed_types.contains(&ty)
    }
}

/// Payload of a `summarizeText` message.  `text` and `type` are kept loose
/// so that validation can reject them with a proper error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(default)]
    pub text: serde_json::Value,
    #[serde(default, rename = "type")]
    pub summary_type: String,
    #[serde(default)]
    pub is_code: bool,
    #[serde(default)]
    pub email: String,
}

impl SummaryRequest {
    pub fn new(text: &str, summary_type: SummaryType, email: &str) -> Self {
        Self {
            text: serde_json::Value::String(text.to_string()),
            summary_type: summary_type.as_str().to_string(),
            is_code: false,
            email: email.to_string(),
        }
    }

    pub fn with_code(mut self, is_code: bool) -> Self {
        self.is_code = is_code;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary: String,
    pub is_code: bool,
}
