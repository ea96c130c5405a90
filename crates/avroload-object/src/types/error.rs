//! Error type for object-store operations.

use std::borrow::Cow;

use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for object-store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an object-store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    /// The object (or bucket) does not exist.
    #[display("not_found")]
    NotFound,
    /// The request was refused: bad credentials, precondition, wrong bucket.
    #[display("rejected")]
    Rejected,
    /// The backend could not be reached or failed transiently.
    #[display("unavailable")]
    Unavailable,
    /// Reading or writing the object body failed mid-stream.
    #[display("io")]
    Io,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Io)
    }
}

/// An object-store error carrying a kind, a message and an optional source.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a [`ErrorKind::Rejected`] error.
    pub fn rejected(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    /// Creates a [`ErrorKind::Unavailable`] error.
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Attach a source error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the error classification.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the caller should retry this operation.
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Whether the object was missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        let kind = match &err {
            object_store::Error::NotFound { .. } => ErrorKind::NotFound,
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. }
            | object_store::Error::AlreadyExists { .. }
            | object_store::Error::Precondition { .. }
            | object_store::Error::NotModified { .. }
            | object_store::Error::InvalidPath { .. } => ErrorKind::Rejected,
            _ => ErrorKind::Unavailable,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for Error {
    /// Keeps the kind of an [`Error`] that was carried through an I/O stream.
    fn from(err: std::io::Error) -> Self {
        let (kind, message) = match err.get_ref().and_then(|e| e.downcast_ref::<Self>()) {
            Some(inner) => (inner.kind, inner.message.clone()),
            None => (ErrorKind::Io, Cow::Owned(err.to_string())),
        };
        Self::new(kind, message).with_source(err)
    }
}
