//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Routes are registered on an [`ApiRouter`] so they are documented in the
//! OpenAPI specification served by [`RouterOpenApiExt`].
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler
//! [`RouterOpenApiExt`]: crate::middleware::RouterOpenApiExt

mod error;
mod monitors;
pub mod request;
pub mod response;
mod storage;

use aide::axum::ApiRouter;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`ApiRouter`] with all routes and a JSON `404` fallback.
pub fn routes() -> ApiRouter<ServiceState> {
    ApiRouter::new()
        .merge(storage::routes())
        .merge(monitors::routes())
        .fallback(handler)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use aide::axum::ApiRouter;
    use axum_test::TestServer;
    use sasgate_store::StoreService;
    use sasgate_store::memory::MemoryStore;
    use sasgate_store::types::ObjectLocation;

    use crate::handler::routes;
    use crate::middleware::{OpenApiConfig, RouterOpenApiExt};
    use crate::service::{FixedClock, ServiceConfig, ServiceState};

    /// Server over in-memory stores and a frozen clock.
    pub struct TestContext {
        pub server: TestServer,
        pub internal: MemoryStore,
        pub external: MemoryStore,
        pub clock: FixedClock,
    }

    /// Returns a new [`TestServer`] with the given router and state.
    pub fn create_test_server_with_state(
        router: ApiRouter<ServiceState>,
        state: ServiceState,
    ) -> anyhow::Result<TestServer> {
        let app = router
            .with_open_api(OpenApiConfig::default())
            .with_state(state);
        let server = TestServer::new(app)?;
        Ok(server)
    }

    /// Returns a [`TestContext`] serving `router`.
    ///
    /// The internal store holds `incoming/report.pdf` (1024 bytes).
    pub async fn create_test_context_with_router(
        router: ApiRouter<ServiceState>,
    ) -> anyhow::Result<TestContext> {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse()?);
        let internal = MemoryStore::new("internal")?;
        let external = MemoryStore::new("external")?.with_clock(clock.clone());

        let location = ObjectLocation::parse("incoming", "report.pdf")?;
        internal.put_object(&location, vec![7u8; 1024]).await;

        let state = ServiceState::from_stores(
            &ServiceConfig::default(),
            StoreService::new(internal.clone()),
            StoreService::new(external.clone()),
            Arc::new(clock.clone()),
        )?;

        Ok(TestContext {
            server: create_test_server_with_state(router, state)?,
            internal,
            external,
            clock,
        })
    }

    /// Returns a [`TestContext`] serving every route.
    pub async fn create_test_context() -> anyhow::Result<TestContext> {
        create_test_context_with_router(routes()).await
    }

    #[tokio::test]
    async fn handlers() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        assert!(context.server.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_routes_are_json_not_found() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let response = context.server.get("/api/v1/unknown").await;
        response.assert_status_not_found();
        assert_eq!(response.json::<serde_json::Value>()["name"], "not_found");
        Ok(())
    }

    #[tokio::test]
    async fn open_api_specification_lists_routes() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let response = context.server.get("/api/openapi.json").await;
        response.assert_status_ok();

        let spec = response.json::<serde_json::Value>();
        assert!(spec["paths"]["/api/{version}/storage/file/{newFileName}"]["get"].is_object());
        assert!(spec["paths"]["/api/{version}/storage/container"]["delete"].is_object());
        assert!(spec["paths"]["/api/{version}/health"]["get"].is_object());
        Ok(())
    }
}
