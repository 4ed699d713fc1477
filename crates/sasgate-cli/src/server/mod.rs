//! HTTP/HTTPS server startup with graceful shutdown.
//!
//! The protocol is chosen at runtime: HTTPS when the `tls` feature is
//! enabled and both certificate paths are configured, plain HTTP otherwise.

mod error;
mod http_server;
#[cfg(feature = "tls")]
mod https_server;
mod lifecycle;
mod shutdown;

use axum::Router;
pub use error::{ServerError, ServerResult};
use http_server::serve_http;
#[cfg(feature = "tls")]
use https_server::serve_https;
use shutdown::shutdown_signal;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;
use crate::config::ServerConfig;

/// Starts the server and returns once it has shut down.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - TLS certificates cannot be loaded (HTTPS mode)
/// - Cannot bind to the specified address/port
/// - Server encounters a fatal error during operation
pub async fn serve(app: Router, config: ServerConfig) -> ServerResult<()> {
    let result = serve_with_protocol(app, config).await;

    if let Err(err) = &result {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %err,
            recoverable = err.is_recoverable(),
            suggestion = err.suggestion(),
            "Server stopped"
        );
    }

    result
}

async fn serve_with_protocol(app: Router, config: ServerConfig) -> ServerResult<()> {
    config.validate().map_err(|e| ServerError::invalid_config(&e))?;

    #[cfg(feature = "tls")]
    {
        if let (Some(cert_path), Some(key_path)) =
            (config.tls_cert_path.clone(), config.tls_key_path.clone())
        {
            return serve_https(app, config, cert_path, key_path).await;
        }
    }

    serve_http(app, config).await
}
