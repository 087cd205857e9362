//! Error types shared by the dispatcher, the validators and the decoders.
//!
//! Every failure a caller can observe is an [`Error`]: a [`ErrorKind`] with a
//! stable numeric code, a human readable message and, optionally, the
//! underlying cause. Causes are never discarded, only nested, so the full
//! diagnostic chain is reachable through [`std::error::Error::source`].

use http::StatusCode;
use std::fmt;

/// Boxed error used for chained causes and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of failure an [`Error`] represents.
///
/// Each kind maps to a stable numeric code, see [`ErrorKind::code`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Converting the JSON payload into the request's output type failed.
    #[error("JSON -> object conversion failed")]
    SerializerFailed,

    /// The request needs a response body but none was received.
    #[error("No data received from endpoint")]
    NoDataReceived,

    /// The response body is not well-formed JSON.
    #[error("JSON parser failed to parse the content in the response")]
    JsonParsingFailed,

    /// A request-level validation failed. See the underlying error.
    #[error("Service request implements a validation which failed, see underlying error")]
    ServiceRequestValidatorFailed,

    /// The transport completed without an HTTP response.
    #[error("Inconsistent state: didn't get an HTTP response, bailing out")]
    NoResponseReceived,

    /// A parameter required to build the request could not be obtained.
    #[error("The parameter {} could not be obtained for creating the request", display_key(.0))]
    CouldNotBuildParameters(Option<String>),

    /// Any failure that does not fit another kind.
    #[error("Response processor experienced an unknown error")]
    UnknownError,

    /// The request never produced a response (connection refused, DNS, I/O).
    #[error("Transport failed before a response was received")]
    Transport,

    /// The response validator rejected the HTTP status.
    ///
    /// `message` holds the response body when it was valid UTF-8.
    #[error("{}", status_description(.status, .message))]
    HttpStatus {
        /// The rejected status code.
        status: StatusCode,
        /// The server-provided message, if any.
        message: Option<String>,
    },
}

fn display_key(key: &Option<String>) -> String {
    match key {
        Some(key) => format!("\"{key}\""),
        None => "(unnamed)".to_string(),
    }
}

fn status_description(status: &StatusCode, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("[{}] - {}", status.as_u16(), message),
        None => format!(
            "No error message reported. Default response validator failed: status code was {}",
            status.as_u16()
        ),
    }
}

impl ErrorKind {
    /// Returns the numeric code of this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use trenes::ErrorKind;
    /// use http::StatusCode;
    ///
    /// assert_eq!(ErrorKind::SerializerFailed.code(), -1000);
    /// assert_eq!(ErrorKind::UnknownError.code(), -999);
    /// assert_eq!(
    ///     ErrorKind::HttpStatus { status: StatusCode::NOT_FOUND, message: None }.code(),
    ///     404
    /// );
    /// ```
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::SerializerFailed => -1000,
            ErrorKind::NoDataReceived => -1001,
            ErrorKind::JsonParsingFailed => -1002,
            ErrorKind::ServiceRequestValidatorFailed => -1003,
            ErrorKind::NoResponseReceived => -1004,
            ErrorKind::CouldNotBuildParameters(_) => -1005,
            ErrorKind::Transport => -1006,
            ErrorKind::UnknownError => -999,
            ErrorKind::HttpStatus { status, .. } => i32::from(status.as_u16()),
        }
    }
}

/// An error record: kind, code, message and optional underlying cause.
///
/// Records are immutable once built.
///
/// # Examples
///
/// ```
/// use trenes::{Error, ErrorKind};
///
/// let err = Error::missing_parameter("ramal");
/// assert_eq!(err.code(), -1005);
/// assert_eq!(
///     err.to_string(),
///     "The parameter \"ramal\" could not be obtained for creating the request"
/// );
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error of the given kind with the kind's description as message.
    pub fn new(kind: ErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            source: None,
        }
    }

    /// Creates an error of the given kind wrapping an underlying cause.
    pub fn with_source(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        let mut err = Self::new(kind);
        err.source = Some(source.into());
        err
    }

    /// Shorthand for a [`ErrorKind::CouldNotBuildParameters`] error naming `key`.
    pub fn missing_parameter(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::CouldNotBuildParameters(Some(key.into())))
    }

    /// Shorthand for a [`ErrorKind::ServiceRequestValidatorFailed`] error.
    ///
    /// Intended for custom validators that want to report their own cause.
    pub fn validation_failed(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::ServiceRequestValidatorFailed, source)
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the numeric code of this error.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying cause when it is itself an [`Error`].
    pub fn underlying(&self) -> Option<&Error> {
        self.source.as_ref()?.downcast_ref::<Error>()
    }

    /// Returns the HTTP status for errors produced by a status validator.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            ErrorKind::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the message reported by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::HttpStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// A specialized `Result` type for dispatcher operations.
pub type Result<T> = std::result::Result<T, Error>;
