//! Error types for the etu-rpc crate.
//!
//! [`Error`] is what the client layer returns: either a raw transport
//! [`Status`] or a configuration defect. [`normalize`] turns a status into a
//! [`DomainError`] whose message is safe to show to end users.

use std::fmt;

use crate::config::Environment;
use crate::registry::ServiceKind;
use crate::status::{Code, Status};

/// Unified error type for client operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The call reached the transport and failed there or at the backend.
    #[error(transparent)]
    Status(#[from] Status),

    /// A method name that the target service does not define.
    #[error("method `{method}` is not defined on {service}")]
    Configuration { service: ServiceKind, method: String },

    /// Invalid client configuration (endpoint, config file).
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Transport status, if this error came from a call.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Status(status) => Some(status),
            Error::Configuration { .. } | Error::Config(_) => None,
        }
    }

    /// Classify this error for presentation.
    ///
    /// Transport statuses go through [`normalize`]. Configuration defects keep
    /// their full description under [`ErrorKind::ConfigurationError`].
    #[must_use]
    pub fn normalize(&self) -> DomainError {
        match self {
            Error::Status(status) => normalize(status),
            Error::Configuration { .. } | Error::Config(_) => DomainError {
                kind: ErrorKind::ConfigurationError,
                message: self.to_string(),
                status: None,
            },
        }
    }
}

impl From<Error> for DomainError {
    fn from(err: Error) -> Self {
        err.normalize()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthRequired,
    Forbidden,
    NotFound,
    Conflict,
    BadRequest,
    Unavailable,
    Timeout,
    Unknown,
    /// Programmer or deployment defect; never produced by a transport status.
    ConfigurationError,
}

impl ErrorKind {
    /// Whether the message of this kind may be rendered to end users as-is.
    #[must_use]
    pub fn is_user_facing(self) -> bool {
        !matches!(self, ErrorKind::ConfigurationError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
            ErrorKind::ConfigurationError => "configuration_error",
        };
        f.write_str(name)
    }
}

/// Generic text shown in production in place of configuration defects.
const SANITIZED_MESSAGE: &str = "An error occurred";

/// Classified error with a stable message.
///
/// `Display` prints only the message. The originating status is kept for
/// diagnostics via [`DomainError::status`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    status: Option<Status>,
}

impl DomainError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Text to render to an end user in `environment`.
    ///
    /// Configuration defects are replaced by a generic message in production.
    #[must_use]
    pub fn user_message(&self, environment: Environment) -> &str {
        if self.kind.is_user_facing() || environment != Environment::Production {
            &self.message
        } else {
            SANITIZED_MESSAGE
        }
    }
}

fn detail_or(status: &Status, fallback: &str) -> String {
    if status.details().is_empty() {
        fallback.to_string()
    } else {
        status.details().to_string()
    }
}

/// Map a transport status to its domain error.
///
/// Total and deterministic. Detail text is surfaced only for invalid-argument
/// and unclassified statuses.
#[must_use]
pub fn normalize(status: &Status) -> DomainError {
    let (kind, message) = match status.code() {
        Code::Unauthenticated => (ErrorKind::AuthRequired, "Authentication required".to_string()),
        Code::PermissionDenied => (ErrorKind::Forbidden, "Permission denied".to_string()),
        Code::NotFound => (ErrorKind::NotFound, "Resource not found".to_string()),
        Code::AlreadyExists => (ErrorKind::Conflict, "Resource already exists".to_string()),
        Code::InvalidArgument => (ErrorKind::BadRequest, detail_or(status, "Invalid request")),
        Code::Unavailable => (
            ErrorKind::Unavailable,
            "Service temporarily unavailable".to_string(),
        ),
        Code::DeadlineExceeded => (ErrorKind::Timeout, "Request timed out".to_string()),
        _ => (
            ErrorKind::Unknown,
            detail_or(status, "An unexpected error occurred"),
        ),
    };

    DomainError {
        kind,
        message,
        status: Some(status.clone()),
    }
}
