//! Storage handlers: file capability issuance and container deletion.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;

use crate::extract::{Json, Path, Query, Version};
use crate::handler::Result;
use crate::handler::request::{ContainerQuery, FilePathParams, InternalFileQuery};
use crate::handler::response::{ErrorResponse, FileCapability};
use crate::service::{ServiceState, StorageService};

/// Tracing target for storage operations.
const TRACING_TARGET: &str = "sasgate_server::handler::storage";

/// Copies an internal file into a new external container and returns a
/// read-only capability URI for the copy.
#[tracing::instrument(
    skip_all,
    fields(
        version = %version,
        new_file_name = %path_params.new_file_name,
        internal_container = %query.internal_container_name,
        internal_file = %query.internal_file_name,
    )
)]
async fn issue_file_capability(
    State(storage): State<StorageService>,
    version: Version,
    Path(path_params): Path<FilePathParams>,
    Query(query): Query<InternalFileQuery>,
) -> Result<(StatusCode, Json<FileCapability>)> {
    tracing::debug!(target: TRACING_TARGET, "Issuing file capability");

    let uri = storage
        .issue_file_capability(
            &query.internal_container_name,
            &query.internal_file_name,
            &path_params.new_file_name,
        )
        .await?;

    tracing::info!(
        target: TRACING_TARGET,
        uri = %uri.redacted(),
        expires_on = %uri.expires_on(),
        "File capability issued"
    );

    Ok((StatusCode::OK, Json(FileCapability::from(uri))))
}

fn issue_file_capability_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Issue file capability")
        .description(
            "Copies a file from the internal store into a new external container and \
             returns a read-only, IP-restricted signed URI for the copy.",
        )
        .response::<200, Json<FileCapability>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<403, Json<ErrorResponse>>()
        .response::<404, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Deletes a container from the external store.
#[tracing::instrument(
    skip_all,
    fields(version = %version, container = %query.container_name)
)]
async fn delete_container(
    State(storage): State<StorageService>,
    version: Version,
    Query(query): Query<ContainerQuery>,
) -> Result<StatusCode> {
    tracing::debug!(target: TRACING_TARGET, "Deleting container");

    storage.delete_container(&query.container_name).await?;

    tracing::info!(target: TRACING_TARGET, "Container deleted");
    Ok(StatusCode::OK)
}

fn delete_container_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Delete container")
        .description("Deletes an external container and every file it holds.")
        .response::<200, ()>()
        .response::<400, Json<ErrorResponse>>()
        .response::<404, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Returns routes for storage operations.
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route(
            "/api/{version}/storage/file/{newFileName}",
            get_with(issue_file_capability, issue_file_capability_docs),
        )
        .api_route(
            "/api/{version}/storage/container",
            delete_with(delete_container, delete_container_docs),
        )
        .with_path_items(|item| item.tag("Storage"))
}
