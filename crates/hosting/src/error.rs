//! Hosting orchestrator errors.

use npanel_core::adapters::AdapterError;

#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("required tools are missing: {}", missing.join(", "))]
    MissingTools { missing: Vec<String> },

    /// Plain `terminate` is always rejected; callers must go through
    /// prepare/confirm.
    #[error("termination requires a prepared confirmation token")]
    DirectTerminateRejected,

    #[error("no termination has been prepared for this service")]
    TerminationNotPrepared,

    #[error("termination token does not match")]
    TerminationTokenMismatch,

    #[error("termination token has expired")]
    TerminationTokenExpired,

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl HostingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HostingError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HostingError::Conflict(msg.into())
    }
}
