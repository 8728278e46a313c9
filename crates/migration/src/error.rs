//! Migration engine errors.

use npanel_core::tools::ToolNotFound;
use npanel_hosting::HostingError;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("unsupported source type '{0}'")]
    UnsupportedSourceType(String),

    /// Step-level failure with structured details; recorded on the step,
    /// never retried automatically.
    #[error("{message}")]
    StepFailed {
        message: String,
        details: serde_json::Value,
    },

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    ToolNotFound(#[from] ToolNotFound),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MigrationError::Validation(msg.into())
    }

    pub fn step_failed(message: impl Into<String>, details: serde_json::Value) -> Self {
        MigrationError::StepFailed {
            message: message.into(),
            details,
        }
    }

    /// Structured details for recording on a failed step.
    pub fn step_details(&self) -> serde_json::Value {
        match self {
            MigrationError::StepFailed { details, .. } => details.clone(),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}
