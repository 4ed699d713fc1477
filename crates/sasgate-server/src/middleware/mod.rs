//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Recovery (panics, timeouts, service errors)
//! - Observability (request ids, tracing, request metrics)
//! - Security (CORS, headers, compression, body limits)
//! - OpenAPI documentation
//!
//! ```rust,no_run
//! use axum::Router;
//! use sasgate_server::middleware::{
//!     RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
//! };
//!
//! let app: Router = Router::new()
//!     .with_default_recovery()
//!     .with_metrics()
//!     .with_observability()
//!     .with_default_security();
//! ```

mod observability;
mod recovery;
mod security;
mod specification;

pub use observability::{RouterObservabilityExt, track_metrics};
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{
    CorsConfig, DEFAULT_MAX_BODY_SIZE, FrameOptions, ReferrerPolicy, RouterSecurityExt,
    SecurityHeadersConfig,
};
pub use specification::{OpenApiConfig, RouterOpenApiExt};
