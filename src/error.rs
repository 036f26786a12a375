//! Unified error types for the client.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors from the persistent token key-value store.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    /// The store exists but could not be decoded or decrypted.
    Corrupt(String),
    /// The store cannot be used on this platform/configuration.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Corrupt(msg) => write!(f, "{msg}"),
            Self::Unavailable(msg) => write!(f, "token store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors surfaced by the request pipeline and the domain façades.
///
/// The set is closed: every failure a caller can observe is one of these.
/// The type is `Clone` because a single in-flight read may resolve many
/// waiting callers at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connect failure, reset, timeout).
    Network { message: String, timed_out: bool },
    /// Credentials are missing or could not be renewed.
    Authentication(String),
    /// The server kept answering 429 after local retries were exhausted.
    RateLimit {
        retry_after: Option<Duration>,
        message: String,
    },
    /// Any other non-2xx response.
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Input rejected before any I/O took place.
    Validation(String),
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build an error from a non-2xx response status and its raw body.
    pub fn from_response(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let (code, message) = parse_error_body(body);
        let message = message.unwrap_or_else(|| format!("request failed with status {status}"));
        match status {
            401 => Self::Authentication(message),
            429 => Self::RateLimit {
                retry_after,
                message,
            },
            _ => Self::Status {
                status,
                code,
                message,
            },
        }
    }

    /// HTTP status associated with this error, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            Self::Authentication(_) | Self::Network { .. } | Self::Validation(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Text suitable for showing to an end user.
    ///
    /// Message-bearing errors render their message; unexpected failures
    /// collapse to a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(msg) | Self::Validation(msg) => msg.clone(),
            Self::RateLimit { message, .. } => message.clone(),
            Self::Status { status, message, .. } if *status < 500 => message.clone(),
            Self::Status { .. } | Self::Network { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { message, timed_out } => {
                if *timed_out {
                    write!(f, "network: request timed out: {message}")
                } else {
                    write!(f, "network: {message}")
                }
            }
            Self::Authentication(msg) => write!(f, "authentication: {msg}"),
            Self::RateLimit {
                retry_after,
                message,
            } => match retry_after {
                Some(delay) => write!(
                    f,
                    "rate limited: {message} (retry after {}s)",
                    delay.as_secs()
                ),
                None => write!(f, "rate limited: {message}"),
            },
            Self::Status {
                status,
                code: Some(code),
                message,
            } => write!(f, "status {status} [{code}]: {message}"),
            Self::Status {
                status,
                code: None,
                message,
            } => write!(f, "status {status}: {message}"),
            Self::Validation(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(e.to_string())
        } else if e.is_builder() {
            // Malformed URL or request; resending cannot help.
            Self::validation(format!("request could not be built: {e}"))
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Extract `(code, message)` from a server error body.
///
/// Accepts `{"message": ..}`, `{"error": ..}` and `{"msg": ..}` shapes, with
/// an optional string or numeric `code`. Non-JSON bodies are used verbatim.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return (None, Some(trimmed.to_string()));
    };
    let message = ["message", "error", "msg"]
        .iter()
        .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .map(str::to_string);
    let code = value.get("code").and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    (code, message)
}
