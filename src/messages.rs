//! Extension-internal messages.  Every message is a JSON object tagged by
//! `action`; replies are plain objects carrying either a payload or an
//! `error` string.

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::model::{SummaryRequest, SummaryResponse, SummaryType};
use crate::orchestrator::{Orchestrator, RequestGate};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionRequest {
    SummarizeText(SummaryRequest),
    GetPreferences,
    SavePreferences {
        #[serde(rename = "type")]
        summary_type: SummaryType,
    },
    UpgradeToPro {
        #[serde(default)]
        email: Option<String>,
    },
    GetSelectedText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtensionResponse {
    Summary(SummaryResponse),
    Preferences {
        #[serde(rename = "preferredType")]
        preferred_type: SummaryType,
    },
    Saved {
        success: bool,
    },
    Upgrade {
        success: bool,
        #[serde(rename = "checkoutUrl")]
        checkout_url: String,
    },
    SelectedText {
        text: String,
    },
    Error {
        error: String,
    },
}

impl ExtensionResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ExtensionResponse::Error {
            error: message.into(),
        }
    }
}

/// Decode a raw message.  Unknown actions and malformed payloads come back
/// as an error reply rather than a decode failure.
pub fn parse_request(raw: serde_json::Value) -> Result<ExtensionRequest, ExtensionResponse> {
    serde_json::from_value(raw).map_err(|e| {
        tracing::debug!(error = %e, "rejecting extension message");
        ExtensionResponse::error("Invalid request format.")
    })
}

/// Handles messages addressed to the background worker.
#[derive(Clone)]
pub struct BackgroundWorker {
    orchestrator: Orchestrator,
    preferred_type: Arc<RwLock<SummaryType>>,
    checkout_url: String,
}

impl BackgroundWorker {
    pub fn new(orchestrator: Orchestrator, checkout_url: impl Into<String>) -> Self {
        Self {
            orchestrator,
            preferred_type: Arc::new(RwLock::new(SummaryType::default())),
            checkout_url: checkout_url.into(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn handle_json(&self, raw: serde_json::Value) -> ExtensionResponse {
        match parse_request(raw) {
            Ok(req) => self.handle(req).await,
            Err(reply) => reply,
        }
    }

    pub async fn handle(&self, req: ExtensionRequest) -> ExtensionResponse {
        match req {
            ExtensionRequest::SummarizeText(summary) => {
                match self.orchestrator.summarize(summary).await {
                    Ok(resp) => ExtensionResponse::Summary(resp),
                    Err(err) => ExtensionResponse::error(err.user_message()),
                }
            }
            ExtensionRequest::GetPreferences => ExtensionResponse::Preferences {
                preferred_type: self.preferred_type(),
            },
            ExtensionRequest::SavePreferences { summary_type } => {
                if let Ok(mut slot) = self.preferred_type.write() {
                    *slot = summary_type;
                }
                ExtensionResponse::Saved { success: true }
            }
            ExtensionRequest::UpgradeToPro { email } => self.upgrade(email.as_deref()),
            ExtensionRequest::GetSelectedText => {
                ExtensionResponse::error("Selected text is only available from the page context.")
            }
        }
    }

    fn preferred_type(&self) -> SummaryType {
        self.preferred_type
            .read()
            .map(|slot| *slot)
            .unwrap_or_default()
    }

    fn upgrade(&self, email: Option<&str>) -> ExtensionResponse {
        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => e,
            None => return ExtensionResponse::error("Email is required to upgrade to Pro."),
        };
        // The plan changes once the webhook lands; don't serve the stale one.
        self.orchestrator.entitlements().invalidate(email);
        let sep = if self.checkout_url.contains('?') { '&' } else { '?' };
        ExtensionResponse::Upgrade {
            success: true,
            checkout_url: format!(
                "{}{}email={}",
                self.checkout_url,
                sep,
                urlencoding::encode(email)
            ),
        }
    }
}

/// Page-side context: remembers the current selection and keeps its own
/// in-flight gate so repeated clicks don't queue work in the worker.
#[derive(Clone, Default)]
pub struct ContentScript {
    selection: Arc<Mutex<Option<String>>>,
    gate: RequestGate,
}

impl ContentScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn set_selection(&self, text: &str) {
        let trimmed = text.trim();
        if let Ok(mut slot) = self.selection.lock() {
            *slot = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    }

    pub fn selection(&self) -> Option<String> {
        self.selection.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn handle(&self, req: &ExtensionRequest) -> Option<ExtensionResponse> {
        match req {
            ExtensionRequest::GetSelectedText => Some(match self.selection() {
                Some(text) => ExtensionResponse::SelectedText { text },
                None => ExtensionResponse::error("No text selected."),
            }),
            _ => None,
        }
    }

    /// Send the current selection to the worker.
    pub async fn request_summary(
        &self,
        worker: &BackgroundWorker,
        summary_type: SummaryType,
        is_code: bool,
        email: &str,
    ) -> ExtensionResponse {
        let Some(_guard) = self.gate.try_begin() else {
            return ExtensionResponse::error("Request already in progress. Please wait.");
        };
        let Some(text) = self.selection() else {
            return ExtensionResponse::error("No text selected.");
        };
        let req = SummaryRequest::new(&text, summary_type, email).with_code(is_code);
        worker.handle(ExtensionRequest::SummarizeText(req)).await
    }
}
