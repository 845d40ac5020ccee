//! Error types for the ChatWait client.
//!
//! This module defines the error type system for everything that can go wrong
//! while talking to the ChatWait service or while driving a streaming turn.

use std::error;
use std::fmt;
use std::sync::Arc;

/// The main error type for the ChatWait client.
#[derive(Clone, Debug)]
pub enum Error {
    /// A generic API error occurred.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error code string from the service, e.g. `CHAT_STREAMING_ERROR`.
        error_code: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// The request was rejected by the service as invalid.
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Error code string from the service, e.g. `EMPTY_MESSAGE`.
        error_code: Option<String>,
    },

    /// A turn was requested before a session was initialized.
    NoActiveSession {
        /// Human-readable error message.
        message: String,
    },

    /// A user message was blank after trimming.
    EmptyContent {
        /// Human-readable error message.
        message: String,
    },

    /// A message status change or append violated the transcript's
    /// monotonic transition rules.
    InvalidTransition {
        /// Human-readable error message.
        message: String,
    },

    /// A connection-level failure on the live stream. Recovered via the
    /// automatic retry ladder.
    Transport {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The automatic retry ladder was exhausted.
    RetryExhausted {
        /// Number of reconnection attempts made.
        attempts: u32,
        /// Human-readable error message.
        message: String,
    },

    /// A stream record could not be parsed. Terminal for the turn.
    Parse {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The turn exceeded its absolute deadline.
    HardTimeout {
        /// Human-readable error message.
        message: String,
        /// The deadline that was exceeded, in seconds.
        deadline_secs: f64,
    },

    /// The client context required to create a session is unavailable.
    Initialization {
        /// Human-readable error message.
        message: String,
    },

    /// An HTTP request timed out before the stream was established.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, error_code: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_code,
            message: message.into(),
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, error_code: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            error_code,
        }
    }

    /// Creates a new no-active-session error.
    pub fn no_active_session(message: impl Into<String>) -> Self {
        Error::NoActiveSession {
            message: message.into(),
        }
    }

    /// Creates a new empty content error.
    pub fn empty_content(message: impl Into<String>) -> Self {
        Error::EmptyContent {
            message: message.into(),
        }
    }

    /// Creates a new invalid transition error.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Error::InvalidTransition {
            message: message.into(),
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new retry-exhausted error.
    pub fn retry_exhausted(attempts: u32, message: impl Into<String>) -> Self {
        Error::RetryExhausted {
            attempts,
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Parse {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new hard timeout error.
    pub fn hard_timeout(message: impl Into<String>, deadline_secs: f64) -> Self {
        Error::HardTimeout {
            message: message.into(),
            deadline_secs,
        }
    }

    /// Creates a new initialization error.
    pub fn initialization(message: impl Into<String>) -> Self {
        Error::Initialization {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Returns true if this error indicates the retry ladder was exhausted.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Error::RetryExhausted { .. })
    }

    /// Returns true if this error is a parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }

    /// Returns true if this error is a hard deadline expiry.
    pub fn is_hard_timeout(&self) -> bool {
        matches!(self, Error::HardTimeout { .. })
    }

    /// Returns true if this error is an invalid transcript transition.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. })
    }

    /// Returns true if this error indicates no session was initialized.
    pub fn is_no_active_session(&self) -> bool {
        matches!(self, Error::NoActiveSession { .. })
    }

    /// Returns true if the automatic retry ladder applies to this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 409 | 429 | 500..=599)
            }
            Error::Transport { .. } => true,
            Error::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns the service error code associated with this error, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Error::Api { error_code, .. } => error_code.as_deref(),
            Error::BadRequest { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_code,
                message,
            } => {
                if let Some(error_code) = error_code {
                    write!(f, "API error {status_code} ({error_code}): {message}")
                } else {
                    write!(f, "API error {status_code}: {message}")
                }
            }
            Error::BadRequest {
                message,
                error_code,
            } => {
                if let Some(error_code) = error_code {
                    write!(f, "Bad request ({error_code}): {message}")
                } else {
                    write!(f, "Bad request: {message}")
                }
            }
            Error::NoActiveSession { message } => {
                write!(f, "No active session: {message}")
            }
            Error::EmptyContent { message } => {
                write!(f, "Empty content: {message}")
            }
            Error::InvalidTransition { message } => {
                write!(f, "Invalid transition: {message}")
            }
            Error::Transport { message, .. } => {
                write!(f, "Transport error: {message}")
            }
            Error::RetryExhausted { attempts, message } => {
                write!(f, "Retries exhausted after {attempts} attempts: {message}")
            }
            Error::Parse { message, .. } => {
                write!(f, "Parse error: {message}")
            }
            Error::HardTimeout {
                message,
                deadline_secs,
            } => {
                write!(
                    f,
                    "Hard timeout: {message} ({deadline_secs} second deadline)"
                )
            }
            Error::Initialization { message } => {
                write!(f, "Initialization error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Parse { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for ChatWait operations.
pub type Result<T> = std::result::Result<T, Error>;
