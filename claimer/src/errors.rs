use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimError {
    /// The session could not be established or confirmed.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// An expected claim affordance was not found or could not be used.
    #[error("Claim UI failure: {0}")]
    ClaimUi(String),

    #[error("Evidence capture failed: {0}")]
    EvidenceCapture(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element is detached from DOM: {0}")]
    ElementDetached(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClaimError {
    /// Wraps a substrate failure that happened while driving a claim affordance.
    pub fn claim_ui(context: impl AsRef<str>, source: ClaimError) -> Self {
        ClaimError::ClaimUi(format!("{}: {source}", context.as_ref()))
    }

    /// Wraps a substrate failure that happened while establishing the session.
    pub fn auth(context: impl AsRef<str>, source: ClaimError) -> Self {
        ClaimError::AuthFailure(format!("{}: {source}", context.as_ref()))
    }

    /// Errors a waiting loop should treat as "not there yet".
    pub fn is_transient(&self) -> bool {
        matches!(self, ClaimError::ElementDetached(_))
    }
}
