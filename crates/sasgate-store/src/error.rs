//! Structured error handling for object store operations.

use std::borrow::Cow;

use strum::{AsRefStr, Display, IntoStaticStr};

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for object store operations.
pub type StoreResult<T, E = StoreError> = Result<T, E>;

/// Categories of failures reported by an object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreErrorKind {
    /// Container or object does not exist.
    NotFound,
    /// Credential or capability rejected by the store.
    AccessDenied,
    /// Conflicting resource state.
    Conflict,
    /// Container or object name violates the naming rules.
    InvalidName,
    /// The handle cannot mint shared access signatures.
    SigningUnsupported,
    /// Connectivity or service fault that may succeed on retry.
    Transient,
    /// Any other store fault.
    #[default]
    Other,
}

impl StoreErrorKind {
    /// Returns the HTTP status used when the store did not report one.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::AccessDenied => 403,
            Self::Conflict => 409,
            Self::InvalidName => 400,
            Self::Transient => 503,
            Self::SigningUnsupported | Self::Other => 500,
        }
    }
}

/// Error returned by an [`ObjectStore`].
///
/// Carries the status code and store-native error code when the remote
/// service reported them, so that callers can pass them through unchanged.
///
/// [`ObjectStore`]: crate::ObjectStore
#[must_use]
#[derive(Debug, thiserror::Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct StoreError {
    kind: StoreErrorKind,
    message: Option<Cow<'static, str>>,
    status: Option<u16>,
    code: Option<Cow<'static, str>>,
    #[source]
    source: Option<BoxedError>,
}

impl StoreError {
    /// Creates a new error of the given kind.
    pub fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            code: None,
            source: None,
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::NotFound).with_message(message)
    }

    /// Creates an access denied error.
    pub fn access_denied(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::AccessDenied).with_message(message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::Conflict).with_message(message)
    }

    /// Creates an invalid name error.
    pub fn invalid_name(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::InvalidName).with_message(message)
    }

    /// Creates a signing unsupported error.
    pub fn signing_unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::SigningUnsupported).with_message(message)
    }

    /// Creates a transient error.
    pub fn transient(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::Transient).with_message(message)
    }

    /// Creates an uncategorized store error.
    pub fn other(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StoreErrorKind::Other).with_message(message)
    }

    /// Sets the error message.
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the HTTP status reported by the store.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the store-native error code (e.g. `ContainerNotFound`).
    pub fn with_code(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the underlying source error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    #[must_use]
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the HTTP status reported by the store, if any.
    #[must_use]
    #[inline]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the store-native error code, if any.
    #[must_use]
    #[inline]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the reported status, or the kind's default status.
    #[must_use]
    pub fn effective_status(&self) -> u16 {
        self.status.unwrap_or(self.kind.default_status())
    }

    /// Returns `true` if the operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Transient)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::transient("Request to the store timed out").with_source(error)
        } else if error.is_connect() {
            Self::transient("Connection to the store failed").with_source(error)
        } else if let Some(status) = error.status() {
            let kind = kind_for_status(status.as_u16());
            Self::new(kind)
                .with_message(error.to_string())
                .with_status(status.as_u16())
                .with_source(error)
        } else {
            Self::other(error.to_string()).with_source(error)
        }
    }
}

/// Classifies an HTTP status returned by a store.
#[must_use]
pub(crate) fn kind_for_status(status: u16) -> StoreErrorKind {
    match status {
        404 => StoreErrorKind::NotFound,
        401 | 403 => StoreErrorKind::AccessDenied,
        409 | 412 => StoreErrorKind::Conflict,
        408 | 429 | 500..=599 => StoreErrorKind::Transient,
        _ => StoreErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_builder_pattern() {
        let error = StoreError::not_found("blob missing")
            .with_status(404)
            .with_code("BlobNotFound");

        assert_eq!(error.kind(), StoreErrorKind::NotFound);
        assert_eq!(error.message(), Some("blob missing"));
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.code(), Some("BlobNotFound"));
    }

    #[test]
    fn error_display_includes_kind() {
        let error = StoreError::access_denied("signature mismatch");
        let display = error.to_string();
        assert!(display.contains("access_denied"));
        assert!(display.contains("signature mismatch"));
    }

    #[test]
    fn effective_status_falls_back_to_kind() {
        assert_eq!(StoreError::not_found("x").effective_status(), 404);
        assert_eq!(StoreError::transient("x").effective_status(), 503);
        assert_eq!(StoreError::other("x").with_status(412).effective_status(), 412);
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(StoreError::transient("x").is_retryable());
        assert!(!StoreError::not_found("x").is_retryable());
        assert!(!StoreError::other("x").is_retryable());
    }

    #[test]
    fn status_classification() {
        assert_eq!(kind_for_status(404), StoreErrorKind::NotFound);
        assert_eq!(kind_for_status(403), StoreErrorKind::AccessDenied);
        assert_eq!(kind_for_status(409), StoreErrorKind::Conflict);
        assert_eq!(kind_for_status(503), StoreErrorKind::Transient);
        assert_eq!(kind_for_status(400), StoreErrorKind::Other);
    }
}
