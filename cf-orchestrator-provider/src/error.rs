use serde::{Deserialize, Serialize};

/// Unified error type for every gateway operation.
///
/// All variants are serializable so the web layer can forward them as structured
/// error payloads.
///
/// # Retryable Errors
///
/// - [`NetworkError`](Self::NetworkError): connectivity issues and 502/503/504 responses
/// - [`Timeout`](Self::Timeout): request timed out
/// - [`RateLimited`](Self::RateLimited): HTTP 429
///
/// The shared HTTP helper retries these with exponential backoff before they reach callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum GatewayError {
    /// A network-level error occurred (connection refused, upstream 5xx, ...).
    NetworkError {
        /// Error details.
        detail: String,
    },

    /// The API token is invalid, expired or lacks the required scopes.
    InvalidCredentials {
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The zone does not exist or is not visible to the token.
    ZoneNotFound {
        /// Zone id or name that was requested.
        zone: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// A DNS record was not found.
    RecordNotFound {
        /// Record id that was requested.
        record_id: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// A ruleset rule was not found.
    RuleNotFound {
        /// Rule id that was requested.
        rule_id: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// A request parameter was rejected (bad expression, unknown setting value, ...).
    InvalidParameter {
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The account's plan quota has been exceeded (e.g. too many custom rules).
    ///
    /// Unlike [`RateLimited`](Self::RateLimited), this is not a transient condition.
    QuotaExceeded {
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The API rate limit has been exceeded (HTTP 429).
    RateLimited {
        /// Suggested wait time in seconds, taken from `Retry-After`.
        retry_after: Option<u64>,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Error details.
        detail: String,
    },

    /// The token is valid but not allowed to perform this operation.
    PermissionDenied {
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// Failed to parse an API response.
    ParseError {
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to serialize a request body.
    SerializationError {
        /// Details about the serialization failure.
        detail: String,
    },

    /// An API error code not mapped to a specific variant.
    Unknown {
        /// Raw error code, if available.
        raw_code: Option<String>,
        /// Raw error message.
        raw_message: String,
    },
}

impl GatewayError {
    /// Whether the error is an expected outcome (bad input, missing resource),
    /// used to pick the log level: `warn` when `true`, `error` otherwise.
    ///
    /// **Keep this in sync when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::ZoneNotFound { .. }
                | Self::RecordNotFound { .. }
                | Self::RuleNotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::QuotaExceeded { .. }
                | Self::PermissionDenied { .. }
        )
    }

    /// Whether the shared HTTP helper should retry the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Whether the error means "the thing you asked for does not exist".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ZoneNotFound { .. } | Self::RecordNotFound { .. } | Self::RuleNotFound { .. }
        )
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { detail } => write!(f, "Network error: {detail}"),
            Self::InvalidCredentials { raw_message } => match raw_message {
                Some(msg) => write!(f, "Invalid API token: {msg}"),
                None => write!(f, "Invalid API token"),
            },
            Self::ZoneNotFound { zone, raw_message } => match raw_message {
                Some(msg) => write!(f, "Zone '{zone}' not found: {msg}"),
                None => write!(f, "Zone '{zone}' not found"),
            },
            Self::RecordNotFound { record_id, .. } => {
                write!(f, "DNS record '{record_id}' not found")
            }
            Self::RuleNotFound { rule_id, .. } => write!(f, "Rule '{rule_id}' not found"),
            Self::InvalidParameter { param, detail } => {
                write!(f, "Invalid parameter '{param}': {detail}")
            }
            Self::QuotaExceeded { raw_message } => match raw_message {
                Some(msg) => write!(f, "Quota exceeded: {msg}"),
                None => write!(f, "Quota exceeded"),
            },
            Self::RateLimited { retry_after, .. } => match retry_after {
                Some(secs) => write!(f, "Rate limited (retry after {secs}s)"),
                None => write!(f, "Rate limited"),
            },
            Self::Timeout { detail } => write!(f, "Request timeout: {detail}"),
            Self::PermissionDenied { raw_message } => match raw_message {
                Some(msg) => write!(f, "Permission denied: {msg}"),
                None => write!(f, "Permission denied"),
            },
            Self::ParseError { detail } => write!(f, "Parse error: {detail}"),
            Self::SerializationError { detail } => write!(f, "Serialization error: {detail}"),
            Self::Unknown {
                raw_code,
                raw_message,
            } => match raw_code {
                Some(code) => write!(f, "Cloudflare error {code}: {raw_message}"),
                None => write!(f, "{raw_message}"),
            },
        }
    }
}

impl std::error::Error for GatewayError {}

/// Convenience type alias for `Result<T, GatewayError>`.
pub type Result<T> = std::result::Result<T, GatewayError>;
