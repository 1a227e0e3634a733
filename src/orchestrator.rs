//! Request orchestration for one execution context.
//!
//! Each context (background worker, content script) owns its own
//! [`RequestGate`]; the gate allows exactly one outstanding generation and
//! is released by an RAII guard on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ai::AiClient;
use crate::detect::looks_like_code;
use crate::entitlement::EntitlementService;
use crate::error::{AiError, SummarizeError};
use crate::model::{SummaryRequest, SummaryResponse, SummaryType};
use crate::prompt::build_prompt;
use crate::sanitize::sanitize_value;
use crate::usage::UsageLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    InFlight,
}

/// Idle/InFlight state owned by a single context.
#[derive(Clone, Default)]
pub struct RequestGate {
    in_flight: Arc<AtomicBool>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        if self.in_flight.load(Ordering::Acquire) {
            GateState::InFlight
        } else {
            GateState::Idle
        }
    }

    /// Transition Idle -> InFlight.  Returns `None` if a request is
    /// already outstanding.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: self.in_flight.clone(),
            })
    }
}

/// Returns the gate to Idle when dropped.
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Anything that can turn a prompt into text.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

#[async_trait::async_trait]
impl Generator for AiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        AiClient::generate(self, prompt).await
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    gate: RequestGate,
    entitlements: EntitlementService,
    usage: UsageLedger,
    generator: Arc<dyn Generator>,
}

impl Orchestrator {
    pub fn new(entitlements: EntitlementService, generator: Arc<dyn Generator>) -> Self {
        Self {
            gate: RequestGate::new(),
            entitlements,
            usage: UsageLedger::new(),
            generator,
        }
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn usage(&self) -> &UsageLedger {
        &self.usage
    }

    pub fn entitlements(&self) -> &EntitlementService {
        &self.entitlements
    }

    pub async fn summarize(&self, req: SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        if self.gate.state() == GateState::InFlight {
            return Err(SummarizeError::InProgress);
        }
        let summary_type = validate(&req)?;
        let _guard = self.gate.try_begin().ok_or(SummarizeError::InProgress)?;

        let resolution = self.entitlements.resolve_plan(&req.email).await;
        if resolution.is_degraded() {
            tracing::info!(email = %req.email, "entitlements degraded to free plan");
        }
        let limits = EntitlementService::compute_limits(resolution.subscription());

        if !self.usage.has_remaining(&req.email, limits.max_summaries) {
            return Err(SummarizeError::Quota {
                limit: limits.max_summaries.unwrap_or_default(),
            });
        }
        if !limits.allows(summary_type) {
            return Err(SummarizeError::PlanRestriction(
                "This summary type is not available in the free plan.".into(),
            ));
        }
        if req.is_code && !limits.allow_code_explanation {
            return Err(SummarizeError::PlanRestriction(
                "Code explanation is a Pro feature. Upgrade to Pro to access this feature.".into(),
            ));
        }

        let text = sanitize_value(&req.text);
        if text.is_empty() {
            return Err(SummarizeError::Validation("No valid text provided.".into()));
        }
        let is_code = req.is_code || looks_like_code(&text);
        let prompt = build_prompt(&text, summary_type, is_code);

        let summary = self.generator.generate(&prompt).await.map_err(|err| {
            tracing::error!(error = %err, "summarization failed");
            SummarizeError::from(err)
        })?;
        let used = self.usage.record(&req.email);
        tracing::debug!(email = %req.email, used, is_code, "summary generated");
        Ok(SummaryResponse { summary, is_code })
    }
}

fn validate(req: &SummaryRequest) -> Result<SummaryType, SummarizeError> {
    let invalid = || SummarizeError::Validation("Invalid request format.".into());
    if !req.text.is_string() {
        return Err(invalid());
    }
    SummaryType::parse(&req.summary_type).ok_or_else(invalid)
}
