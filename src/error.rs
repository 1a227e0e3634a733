use thiserror::Error;

/// Failures of a single call to the generation endpoint.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("generation request timed out")]
    Timeout,

    #[error("failed to reach generation endpoint: {0}")]
    Transport(String),

    #[error("generation endpoint returned status {status}")]
    Remote { status: u16 },

    #[error("failed to decode generation response: {0}")]
    Decode(String),
}

impl AiError {
    /// Timeouts, transport failures and 5xx replies may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Timeout | AiError::Transport(_) => true,
            AiError::Remote { status } => *status >= 500,
            AiError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AiError::Timeout
        } else if error.is_decode() {
            AiError::Decode(error.to_string())
        } else {
            AiError::Transport(error.to_string())
        }
    }
}

/// Outcomes the orchestrator reports back to the extension UI.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("plan restriction: {0}")]
    PlanRestriction(String),

    #[error("daily limit of {limit} summaries reached")]
    Quota { limit: u32 },

    #[error("a request is already in progress")]
    InProgress,

    #[error("generation failed: {0}")]
    Generation(#[from] AiError),
}

impl SummarizeError {
    /// Short string shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            SummarizeError::Validation(detail) => detail.clone(),
            SummarizeError::PlanRestriction(detail) => detail.clone(),
            SummarizeError::Quota { .. } => {
                "Daily limit reached. Upgrade to Pro for unlimited access.".to_string()
            }
            SummarizeError::InProgress => "Request already in progress. Please wait.".to_string(),
            SummarizeError::Generation(_) => {
                "Unable to process. Please check your connection or API configuration.".to_string()
            }
        }
    }
}

/// Subscription lookup failures.  These never reach the orchestrator's
/// caller; the entitlement service degrades to the free plan instead.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("subscription check transport error: {0}")]
    Transport(String),

    #[error("subscription check returned status {0}")]
    Status(u16),

    #[error("malformed subscription body: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,

    #[error("malformed signature header")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("no signature matched the payload")]
    Mismatch,

    #[error("webhook secret is not configured")]
    NotConfigured,
}

/// Failures while applying a verified webhook event.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid event payload: {0}")]
    Payload(String),

    #[error("checkout session carries no customer email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subscription store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscription store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
