//! Storage operations exposed to the HTTP handlers.

use sasgate_store::StoreService;
use sasgate_store::types::{ContainerName, SignedUri};

use crate::service::{CapabilityIssuer, Error, Fetcher, Result};

/// Tracing target for storage operations.
const TRACING_TARGET: &str = "sasgate_server::service::storage";

/// Fetch-then-issue workflow plus the container delete primitive.
#[derive(Debug, Clone)]
pub struct StorageService {
    fetcher: Fetcher,
    issuer: CapabilityIssuer,
    external: StoreService,
}

impl StorageService {
    /// Creates the service from its collaborators.
    pub fn new(fetcher: Fetcher, issuer: CapabilityIssuer, external: StoreService) -> Self {
        Self {
            fetcher,
            issuer,
            external,
        }
    }

    /// Copies an internal file under `new_file_name` into a fresh external
    /// container and returns a read-only capability for the copy.
    ///
    /// The external store is not touched when the fetch fails.
    pub async fn issue_file_capability(
        &self,
        internal_container: &str,
        internal_file: &str,
        new_file_name: &str,
    ) -> Result<SignedUri> {
        let payload = self.fetcher.fetch(internal_container, internal_file).await?;
        self.issuer.issue(new_file_name, payload).await
    }

    /// Deletes an external container.
    ///
    /// Fails with `NotFound` when the container does not exist.
    pub async fn delete_container(&self, name: &str) -> Result<()> {
        let container = ContainerName::new(name)
            .map_err(|e| Error::invalid_input("container name is not valid").with_source(e))?;

        self.external
            .delete_container(&container)
            .await
            .map_err(|e| Error::from_store(format!("failed to delete container {container}"), e))?;

        tracing::info!(target: TRACING_TARGET, container = %container, "Container deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use sasgate_store::clock::{Clock, FixedClock};
    use sasgate_store::memory::MemoryStore;
    use sasgate_store::types::ObjectLocation;
    use sasgate_store::{StoreError, StoreOperation};

    use super::*;
    use crate::ErrorKind;
    use crate::service::{CapabilityWindows, ContainerNamer, Signer};

    struct Fixture {
        internal: MemoryStore,
        external: MemoryStore,
        service: StorageService,
    }

    async fn fixture() -> Fixture {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse().unwrap());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());

        let internal = MemoryStore::new("internal").unwrap();
        let location = ObjectLocation::parse("incoming", "report.pdf").unwrap();
        internal.put_object(&location, vec![1u8; 1024]).await;

        let external = MemoryStore::new("external").unwrap().with_clock(clock);
        let external_service = StoreService::new(external.clone());

        let issuer = CapabilityIssuer::new(
            external_service.clone(),
            ContainerNamer::new("sas-container-", shared.clone()),
            Signer::new(external_service.clone(), shared.clone(), "1.0.0.0".parse().unwrap()),
            shared,
            CapabilityWindows::default(),
        );

        Fixture {
            service: StorageService::new(
                Fetcher::new(StoreService::new(internal.clone())),
                issuer,
                external_service,
            ),
            internal,
            external,
        }
    }

    #[tokio::test]
    async fn copies_and_issues() {
        let f = fixture().await;
        let uri = f
            .service
            .issue_file_capability("incoming", "report.pdf", "report-copy.pdf")
            .await
            .unwrap();

        let content = f.external.read_signed(&uri, None).await.unwrap();
        assert_eq!(content, Bytes::from(vec![1u8; 1024]));
    }

    #[tokio::test]
    async fn missing_source_never_touches_the_external_store() {
        let f = fixture().await;
        let error = f
            .service
            .issue_file_capability("incoming", "missing.txt", "copy.txt")
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(f.internal.calls().await.len(), 1);
        assert!(f.external.calls().await.is_empty());
    }

    #[tokio::test]
    async fn deletes_issued_containers() {
        let f = fixture().await;
        let uri = f
            .service
            .issue_file_capability("incoming", "report.pdf", "copy.pdf")
            .await
            .unwrap();
        let container = uri.location().container.clone();

        f.service.delete_container(container.as_str()).await.unwrap();
        assert!(!f.external.contains_container(&container).await);
    }

    #[tokio::test]
    async fn deleting_unknown_containers_is_not_found() {
        let f = fixture().await;
        let error = f.service.delete_container("sas-container-0").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn delete_passes_store_faults_through() {
        let f = fixture().await;
        f.external
            .fail_next(
                StoreOperation::DeleteContainer,
                StoreError::conflict("lease present").with_status(412),
            )
            .await;

        let error = f.service.delete_container("sas-container-0").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Store);
        assert_eq!(error.status(), Some(412));
    }

    #[tokio::test]
    async fn invalid_container_names_are_rejected() {
        let f = fixture().await;
        let error = f.service.delete_container("ab").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
        assert!(f.external.calls().await.is_empty());
    }
}
