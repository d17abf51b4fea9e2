use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Sentinel-comparable error category. Two [`Error`]s are considered
/// equivalent by [`Error::is`] when they share a `kind`, regardless of
/// message, cause, or context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad option combination, invalid key length, malformed batch.
    Validation,
    /// `get` on a missing key.
    NotFound,
    /// Caller lacks rights to read/write the target file.
    Permission,
    /// Any underlying read/write/rename/sync failure.
    Io,
    /// Auth tag mismatch, wrong key, truncated ciphertext.
    Encryption,
    /// Snapshot checksum mismatch.
    Integrity,
    /// `Locked` (sidecar/ledger held by another process); double-close.
    Concurrency,
    /// Unreachable states; wraps a lower cause.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Io => "io",
            Self::Encryption => "encryption",
            Self::Integrity => "integrity",
            Self::Concurrency => "concurrency",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A typed, matchable error carrying an optional cause chain and a
/// context map of human-readable key/value pairs.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    context: BTreeMap<String, String>,
}

impl Error {
    /// Builds a new error of the given kind with a message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// Attaches a lower-level cause, forming a chain.
    #[must_use]
    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attaches a single context key/value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The error's category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The context map attached to this error.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Matches by kind only, ignoring message/cause/context.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// `NotFound` sentinel for a missing key.
    #[must_use]
    pub fn not_found(key: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("key not found: {key}"))
            .with_context("key", key)
    }

    /// `Validation` sentinel for a rejected key length.
    #[must_use]
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, reason.into())
    }

    /// `Concurrency` sentinel for a path already held by another
    /// writer.
    #[must_use]
    pub fn locked(path: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Concurrency, format!("locked: {path}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Io,
        };
        Self::new(kind, e.to_string()).with_cause(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Validation, e.to_string()).with_cause(e)
    }
}
