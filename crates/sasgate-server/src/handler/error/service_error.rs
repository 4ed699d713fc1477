//! Service error to HTTP error conversion implementation.
//!
//! Store faults keep the status code the store reported; everything else maps
//! onto the default status of its HTTP error kind.

use axum::http::StatusCode;

use super::http_error::{Error as HttpError, ErrorKind};
use crate::service::{Error as ServiceError, ErrorKind as ServiceErrorKind};

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "sasgate_server::handler::service";

impl From<ServiceError> for HttpError<'static> {
    fn from(error: ServiceError) -> Self {
        match error.kind() {
            ServiceErrorKind::InvalidInput | ServiceErrorKind::NotFound => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Request rejected"
                );
            }
            ServiceErrorKind::Config | ServiceErrorKind::SigningUnsupported => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Invalid service configuration"
                );
            }
            _ => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    status = ?error.status(),
                    code = ?error.code(),
                    "Storage operation failed"
                );
            }
        }

        let context = match error.code() {
            Some(code) => format!("{} ({code})", error.message()),
            None => error.message().to_owned(),
        };

        let http_error = match error.kind() {
            ServiceErrorKind::InvalidInput => ErrorKind::BadRequest
                .with_message(error.message().to_owned())
                .with_context(context),

            ServiceErrorKind::NotFound => ErrorKind::NotFound
                .with_message("The requested file or container does not exist")
                .with_context(context),

            ServiceErrorKind::AccessDenied => ErrorKind::Forbidden
                .with_message("The storage account rejected the credential")
                .with_context(context),

            ServiceErrorKind::SigningUnsupported => ErrorKind::SigningUnsupported
                .with_context(context)
                .with_suggestion("Use an account key connection string for the external store"),

            ServiceErrorKind::Config => ErrorKind::InternalServerError.with_context(context),

            ServiceErrorKind::ContainerProvision => {
                passthrough(ErrorKind::ContainerProvisionFailed, &error).with_context(context)
            }
            ServiceErrorKind::Upload => {
                passthrough(ErrorKind::UploadFailed, &error).with_context(context)
            }
            ServiceErrorKind::PolicyStaging => {
                passthrough(ErrorKind::PolicyStagingFailed, &error).with_context(context)
            }
            ServiceErrorKind::TransientStore => {
                let base = passthrough(ErrorKind::StoreError, &error);
                let base = match error.status() {
                    Some(_) => base,
                    None => base.with_status(StatusCode::SERVICE_UNAVAILABLE),
                };

                base.with_context(context)
                    .with_suggestion("Retry the request later")
            }
            ServiceErrorKind::Store => {
                passthrough(ErrorKind::StoreError, &error).with_context(context)
            }
        };

        http_error.into_static()
    }
}

/// Applies the status the store reported, when it is a valid error status.
fn passthrough(kind: ErrorKind, error: &ServiceError) -> HttpError<'static> {
    let status = error
        .status()
        .and_then(|status| StatusCode::from_u16(status).ok())
        .filter(|status| status.is_client_error() || status.is_server_error());

    match status {
        Some(status) => kind.into_error().with_status(status),
        None => kind.into_error(),
    }
}

#[cfg(test)]
mod tests {
    use sasgate_store::StoreError;

    use super::*;

    #[test]
    fn invalid_input_is_bad_request() {
        let error: HttpError = ServiceError::invalid_input("container name is not valid").into();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_blob_is_not_found() {
        let store = StoreError::not_found("blob missing")
            .with_status(404)
            .with_code("BlobNotFound");
        let error: HttpError = ServiceError::from_store("failed to fetch", store).into();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert!(error.context().is_some_and(|c| c.contains("BlobNotFound")));
    }

    #[test]
    fn access_denied_is_forbidden() {
        let store = StoreError::access_denied("bad key").with_status(403);
        let error: HttpError = ServiceError::from_store("failed to fetch", store).into();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn step_failures_pass_the_store_status_through() {
        let store = StoreError::conflict("being deleted").with_status(409);
        let error: HttpError =
            ServiceError::step(ServiceErrorKind::ContainerProvision, "create failed", store).into();

        assert_eq!(error.kind(), ErrorKind::ContainerProvisionFailed);
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn step_failures_without_status_are_internal() {
        let store = StoreError::other("connection reset");
        let error: HttpError =
            ServiceError::step(ServiceErrorKind::Upload, "upload failed", store).into();

        assert_eq!(error.kind(), ErrorKind::UploadFailed);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transient_faults_without_status_are_unavailable() {
        let store = StoreError::transient("timed out");
        let error: HttpError = ServiceError::from_store("failed to fetch", store).into();
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let store = StoreError::transient("throttled").with_status(429);
        let error: HttpError = ServiceError::from_store("failed to fetch", store).into();
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn signing_unsupported_is_internal() {
        let store = StoreError::signing_unsupported("no account key");
        let error: HttpError = ServiceError::from_store("failed to sign", store).into();

        assert_eq!(error.kind(), ErrorKind::SigningUnsupported);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
