//! Liveness handler.
//!
//! The health endpoint answers from process state only and never calls the
//! stores, so it stays cheap enough for load balancer health checks.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;

use crate::extract::{Json, Version};
use crate::handler::Result;
use crate::handler::response::{ErrorResponse, HealthState, MonitorStatus};
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "sasgate_server::handler::monitors";

#[tracing::instrument(skip_all, fields(version = %version))]
async fn health_status(
    State(state): State<ServiceState>,
    version: Version,
) -> Result<(StatusCode, Json<MonitorStatus>)> {
    let now = state.clock.now();
    let uptime_secs = now.duration_since(state.started_at).as_secs().max(0);

    tracing::debug!(target: TRACING_TARGET, uptime_secs, "Health status check requested");

    let response = MonitorStatus {
        status: HealthState::Ok,
        version: env!("CARGO_PKG_VERSION").to_owned(),
        started_at: state.started_at,
        uptime_secs,
    };

    Ok((StatusCode::OK, Json(response)))
}

fn health_status_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get health status")
        .description("Reports that the server process is accepting requests.")
        .response::<200, Json<MonitorStatus>>()
        .response::<404, Json<ErrorResponse>>()
}

/// Returns routes for health monitoring.
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route("/api/{version}/health", get_with(health_status, health_status_docs))
        .with_path_items(|item| item.tag("Health"))
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;
    use crate::handler::test::create_test_context_with_router;

    #[tokio::test]
    async fn health_is_ok() -> anyhow::Result<()> {
        let context = create_test_context_with_router(routes()).await?;

        let response = context.server.get("/api/v1/health").await;
        response.assert_status_ok();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn uptime_follows_the_clock() -> anyhow::Result<()> {
        let context = create_test_context_with_router(routes()).await?;
        context.clock.advance(SignedDuration::from_secs(90));

        let status = context.server.get("/api/v1.0/health").await.json::<MonitorStatus>();
        assert_eq!(status.uptime_secs, 90);
        assert_eq!(status.status, HealthState::Ok);
        Ok(())
    }

    #[tokio::test]
    async fn health_does_not_call_the_stores() -> anyhow::Result<()> {
        let context = create_test_context_with_router(routes()).await?;

        context.server.get("/api/v1/health").await.assert_status_ok();
        assert!(context.internal.calls().await.is_empty());
        assert!(context.external.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_version_is_not_found() -> anyhow::Result<()> {
        let context = create_test_context_with_router(routes()).await?;

        let response = context.server.get("/api/v3/health").await;
        response.assert_status_not_found();
        assert_eq!(
            response.json::<serde_json::Value>()["name"],
            "unsupported_api_version"
        );
        Ok(())
    }
}
