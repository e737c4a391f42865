//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use cf_orchestrator_provider::GatewayError;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Request payload failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No API token supplied with the request
    #[error("Missing API token")]
    MissingToken,

    /// Template not found (by internal id or friendly id)
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Another template already uses this friendly id
    #[error("Template friendly id already exists: {0}")]
    DuplicateTemplate(String),

    /// Domain name not found
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Run stopped by the caller
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Gateway error (converting from library)
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.)
    /// is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ValidationError(_)
            | Self::MissingToken
            | Self::TemplateNotFound(_)
            | Self::DuplicateTemplate(_)
            | Self::DomainNotFound(_)
            | Self::Cancelled => true,
            Self::Gateway(e) => e.is_expected(),
            Self::StorageError(_) | Self::SerializationError(_) => false,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
