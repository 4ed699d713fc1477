//! Service layer error types and utilities.
//!
//! Every failure of the relay workflow is reported as an [`Error`] whose
//! [`ErrorKind`] names the step that failed. Store faults are wrapped, not
//! flattened: the status code and store-native error code reported by the
//! store survive so the HTTP layer can pass them through.

use std::borrow::Cow;
use std::error::Error as StdError;

use sasgate_store::{StoreError, StoreErrorKind};
use strum::{AsRefStr, Display, IntoStaticStr};

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for service layer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing service layer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Internal container or object is absent.
    NotFound,
    /// A store rejected the credential or capability.
    AccessDenied,
    /// Caller supplied a name or value that cannot be used.
    InvalidInput,
    /// Creating the per-request container failed.
    ContainerProvision,
    /// Uploading through the write capability failed.
    Upload,
    /// Replacing the container policies failed.
    PolicyStaging,
    /// The store handle cannot mint capabilities.
    SigningUnsupported,
    /// Retryable network or service fault.
    TransientStore,
    /// Any other store fault.
    Store,
    /// Invalid service configuration.
    Config,
}

/// Service layer error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    status: Option<u16>,
    code: Option<String>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    /// Creates a new [`Error`].
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            source: None,
        }
    }

    /// Wraps a store fault raised by the step identified by `kind`.
    ///
    /// Keeps the status and code reported by the store.
    pub fn step(kind: ErrorKind, message: impl Into<Cow<'static, str>>, error: StoreError) -> Self {
        Self {
            kind,
            message: message.into(),
            status: error.status(),
            code: error.code().map(str::to_owned),
            source: Some(Box::new(error)),
        }
    }

    /// Classifies a store fault by its own kind, keeping its status and code.
    pub fn from_store(message: impl Into<Cow<'static, str>>, error: StoreError) -> Self {
        let kind = match error.kind() {
            StoreErrorKind::NotFound => ErrorKind::NotFound,
            StoreErrorKind::AccessDenied => ErrorKind::AccessDenied,
            StoreErrorKind::InvalidName => ErrorKind::InvalidInput,
            StoreErrorKind::SigningUnsupported => ErrorKind::SigningUnsupported,
            StoreErrorKind::Transient => ErrorKind::TransientStore,
            StoreErrorKind::Conflict | StoreErrorKind::Other => ErrorKind::Store,
        };

        Self::step(kind, message, error)
    }

    /// Attaches a source error to this error, enabling error chain tracking.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
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

    /// Creates a new configuration error.
    #[inline]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a new invalid input error.
    #[inline]
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = Error::config("invalid configuration");
        assert_eq!(error.kind(), ErrorKind::Config);
        assert_eq!(error.message(), "invalid configuration");
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_step_keeps_store_status() {
        let store = StoreError::access_denied("signature mismatch")
            .with_status(403)
            .with_code("AuthenticationFailed");
        let error = Error::step(ErrorKind::Upload, "upload rejected", store);

        assert_eq!(error.kind(), ErrorKind::Upload);
        assert_eq!(error.status(), Some(403));
        assert_eq!(error.code(), Some("AuthenticationFailed"));
        assert!(StdError::source(&error).is_some());
    }

    #[test]
    fn test_store_classification() {
        let cases = [
            (StoreError::not_found("x"), ErrorKind::NotFound),
            (StoreError::access_denied("x"), ErrorKind::AccessDenied),
            (StoreError::invalid_name("x"), ErrorKind::InvalidInput),
            (StoreError::signing_unsupported("x"), ErrorKind::SigningUnsupported),
            (StoreError::transient("x"), ErrorKind::TransientStore),
            (StoreError::conflict("x"), ErrorKind::Store),
            (StoreError::other("x"), ErrorKind::Store),
        ];

        for (store, expected) in cases {
            assert_eq!(Error::from_store("fetch failed", store).kind(), expected);
        }
    }

    #[test]
    fn test_error_kind_as_ref() {
        assert_eq!(ErrorKind::ContainerProvision.as_ref(), "container_provision");
        assert_eq!(ErrorKind::TransientStore.as_ref(), "transient_store");
        assert!(Error::invalid_input("bad name").to_string().contains("invalid_input"));
    }
}
