//! Reads source objects from the internal store.

use bytes::Bytes;
use sasgate_store::StoreService;
use sasgate_store::types::ObjectLocation;

use crate::service::{Error, Result};

/// Tracing target for fetch operations.
const TRACING_TARGET: &str = "sasgate_server::service::fetcher";

/// Downloads whole objects from the internal store.
#[derive(Debug, Clone)]
pub struct Fetcher {
    store: StoreService,
}

impl Fetcher {
    /// Creates a fetcher over the internal store.
    pub fn new(store: StoreService) -> Self {
        Self { store }
    }

    /// Returns the full content of `object` in `container`.
    ///
    /// Fails with `InvalidInput` for names the store would reject, `NotFound`
    /// when the container or object is absent, `AccessDenied` when the
    /// credential is refused and `TransientStore` for retryable faults.
    pub async fn fetch(&self, container: &str, object: &str) -> Result<Bytes> {
        let location = ObjectLocation::parse(container, object)
            .map_err(|e| Error::invalid_input("internal file location is not valid").with_source(e))?;

        let content = self
            .store
            .download(&location)
            .await
            .map_err(|e| Error::from_store(format!("failed to fetch {location}"), e))?;

        tracing::debug!(
            target: TRACING_TARGET,
            location = %location,
            size = content.len(),
            "Internal file fetched"
        );

        Ok(content)
    }
}
