//! Error types for the agent runtime.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server.
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error.
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution error.
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error.
    #[error("Request timeout")]
    Timeout,

    /// A middleware returned `block` outside of `before_tool_call`.
    #[error("Middleware misuse: {0}")]
    MiddlewareMisuse(String),

    /// A synchronous operation was rejected because the agent has an
    /// async turn in flight.
    #[error("Agent is busy running an async turn")]
    Busy,

    /// `send_message` was called on an agent with no pubsub bus configured.
    #[error("No pubsub bus configured for this agent")]
    NoPubsub,

    /// `session_start` middleware halted, refusing to start the agent.
    #[error("Session start halted: {0}")]
    Halted(String),

    /// A named resource (job, session, tool) was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A scheduler job was triggered while already running.
    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    /// Other errors.
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    pub fn timeout() -> Self {
        Error::Timeout
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound(name.into())
    }
}

/// The classification a [`ProviderError`] carries, used by the retry
/// classifier in [`crate::retry`]. Kept structured (not substring-matched)
/// so retry decisions are exact per the provider interface's documented
/// error-prefix contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Http(u16),
    Named(String),
    Network(NetworkErrorKind),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionRefused,
    Closed,
    Timeout,
    Unprocessed,
}

/// An error returned by a [`crate::provider::Provider`] implementation.
/// Carries both the raw message (for display/logging) and a structured
/// `kind` the retry classifier matches on exactly, per spec.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Parses the recognized string-error prefixes from the provider
    /// interface contract (spec §6) into a structured kind. Any
    /// unrecognized prefix classifies as `Other` (non-retryable).
    pub fn parse(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = Self::classify(&message);
        ProviderError { kind, message }
    }

    fn classify(message: &str) -> ProviderErrorKind {
        if let Some(rest) = message.strip_prefix("HTTP ") {
            if let Some(code_str) = rest.split(':').next() {
                if code_str == "5xx" {
                    return ProviderErrorKind::Http(500);
                }
                if let Ok(code) = code_str.trim().parse::<u16>() {
                    return ProviderErrorKind::Http(code);
                }
            }
            if message.contains("econnrefused") {
                return ProviderErrorKind::Network(NetworkErrorKind::ConnectionRefused);
            }
            if message.contains(":closed") {
                return ProviderErrorKind::Network(NetworkErrorKind::Closed);
            }
            if message.contains(":timeout") {
                return ProviderErrorKind::Network(NetworkErrorKind::Timeout);
            }
            if message.contains(":unprocessed") {
                return ProviderErrorKind::Network(NetworkErrorKind::Unprocessed);
            }
        }

        const NAMED_PREFIXES: &[&str] = &[
            "rate_limit_error",
            "rate_limit_exceeded",
            "overloaded_error",
            "server_error",
            "RESOURCE_EXHAUSTED",
            "INTERNAL",
            "UNAVAILABLE",
        ];
        for prefix in NAMED_PREFIXES {
            if message.starts_with(prefix) && message[prefix.len()..].starts_with(':') {
                return ProviderErrorKind::Named((*prefix).to_string());
            }
        }

        ProviderErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("Invalid model");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model");
    }

    #[test]
    fn test_error_timeout() {
        let err = Error::timeout();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn provider_error_classifies_http_codes() {
        let e = ProviderError::parse("HTTP 429: slow down");
        assert_eq!(e.kind, ProviderErrorKind::Http(429));
    }

    #[test]
    fn provider_error_classifies_named_kinds() {
        let e = ProviderError::parse("rate_limit_error: slow down");
        assert_eq!(e.kind, ProviderErrorKind::Named("rate_limit_error".into()));

        let e = ProviderError::parse("overloaded_error: try again");
        assert_eq!(e.kind, ProviderErrorKind::Named("overloaded_error".into()));
    }

    #[test]
    fn provider_error_classifies_network_kinds() {
        let e = ProviderError::parse("HTTP request failed: connection refused :econnrefused");
        assert_eq!(e.kind, ProviderErrorKind::Network(NetworkErrorKind::ConnectionRefused));

        let e = ProviderError::parse("HTTP request failed: stream ended :unprocessed");
        assert_eq!(e.kind, ProviderErrorKind::Network(NetworkErrorKind::Unprocessed));
    }

    #[test]
    fn provider_error_unrecognized_prefix_is_other() {
        let e = ProviderError::parse("validation_error: bad request");
        assert_eq!(e.kind, ProviderErrorKind::Other);
    }
}
