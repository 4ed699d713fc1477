//! Capability issuance: the owner to read-only downgrade pipeline.
//!
//! Every issuance provisions its own container in the external store, so
//! concurrent issuances never touch the same resources. The steps run
//! strictly in order and the first failure aborts the rest. Nothing is
//! rolled back: a half-provisioned container is left behind under a name
//! that is never reused.

use std::sync::Arc;

use bytes::Bytes;
use jiff::{SignedDuration, Timestamp};
use sasgate_store::StoreService;
use sasgate_store::clock::Clock;
use sasgate_store::types::{ObjectLocation, ObjectName, Permissions, SignedUri, TimeWindow, offset};

use crate::service::staging::{OWNER_POLICY_ID, READ_ONLY_POLICY_ID};
use crate::service::{
    CapabilityWindows, ContainerNamer, Error, ErrorKind, PolicyStager, Result, Signer,
};

/// Tracing target for capability issuance.
const TRACING_TARGET: &str = "sasgate_server::service::issuer";

/// Copies payloads into fresh containers and hands out read-only capabilities.
#[derive(Debug, Clone)]
pub struct CapabilityIssuer {
    store: StoreService,
    namer: ContainerNamer,
    stager: PolicyStager,
    signer: Signer,
    clock: Arc<dyn Clock>,
    windows: CapabilityWindows,
}

impl CapabilityIssuer {
    /// Creates an issuer over the external store.
    pub fn new(
        store: StoreService,
        namer: ContainerNamer,
        signer: Signer,
        clock: Arc<dyn Clock>,
        windows: CapabilityWindows,
    ) -> Self {
        Self {
            stager: PolicyStager::new(store.clone()),
            store,
            namer,
            signer,
            clock,
            windows,
        }
    }

    /// Returns the windows applied to policies and capabilities.
    #[must_use]
    pub fn windows(&self) -> CapabilityWindows {
        self.windows
    }

    /// Stores `payload` as `target_name` in a new container and returns a
    /// read-only capability for it.
    ///
    /// The container is writable only while the payload is uploaded; its
    /// policy is downgraded to read-only before the capability is minted.
    pub async fn issue(&self, target_name: &str, payload: Bytes) -> Result<SignedUri> {
        let object = ObjectName::new(target_name)
            .map_err(|e| Error::invalid_input("new file name is not valid").with_source(e))?;

        let container = self.namer.next_name()?;
        let location = ObjectLocation::new(container, object);
        let size = payload.len();

        tracing::debug!(target: TRACING_TARGET, location = %location, size, "Issuing capability");

        self.store
            .create_container_if_not_exists(&location.container)
            .await
            .map_err(|e| {
                Error::step(
                    ErrorKind::ContainerProvision,
                    format!("failed to create container {}", location.container),
                    e,
                )
            })?;

        self.stager
            .stage(
                &location.container,
                OWNER_POLICY_ID,
                Permissions::OWNER,
                self.policy_window()?,
            )
            .await?;

        let write = self
            .signer
            .sign(
                &location,
                Permissions::WRITE,
                Some(self.after(self.windows.write_ttl)?),
                None,
            )
            .await?;

        self.store.upload_signed(&write, payload).await.map_err(|e| {
            Error::step(ErrorKind::Upload, format!("failed to upload {location}"), e)
        })?;

        self.stager
            .stage(
                &location.container,
                READ_ONLY_POLICY_ID,
                Permissions::READ_ONLY,
                self.policy_window()?,
            )
            .await?;

        let read = self
            .signer
            .sign(
                &location,
                Permissions::READ_ONLY,
                Some(self.after(self.windows.read_ttl)?),
                None,
            )
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            location = %location,
            size,
            expires_on = %read.expires_on(),
            "Read-only capability issued"
        );

        Ok(read)
    }

    fn policy_window(&self) -> Result<TimeWindow> {
        TimeWindow::around(
            self.clock.now(),
            self.windows.policy_backdate,
            self.windows.policy_ttl,
        )
        .map_err(|e| Error::config("policy window is empty or out of range").with_source(e))
    }

    fn after(&self, ttl: SignedDuration) -> Result<Timestamp> {
        offset(self.clock.now(), ttl)
            .map_err(|e| Error::config("capability lifetime is out of range").with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::IpAddr;

    use sasgate_store::clock::FixedClock;
    use sasgate_store::memory::MemoryStore;
    use sasgate_store::types::{PublicAccess, SasRequest};
    use sasgate_store::{ObjectStore, StoreError, StoreErrorKind, StoreOperation};

    use super::*;

    struct Fixture {
        clock: FixedClock,
        store: MemoryStore,
        issuer: CapabilityIssuer,
    }

    fn fixture() -> Fixture {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse().unwrap());
        let store = MemoryStore::new("external").unwrap().with_clock(clock.clone());
        let service = StoreService::new(store.clone());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());

        let issuer = CapabilityIssuer::new(
            service.clone(),
            ContainerNamer::new("sas-container-", shared.clone()),
            Signer::new(service, shared.clone(), "1.0.0.0".parse().unwrap()),
            shared,
            CapabilityWindows::default(),
        );

        Fixture {
            clock,
            store,
            issuer,
        }
    }

    fn caller() -> Option<IpAddr> {
        Some("1.0.0.0".parse().unwrap())
    }

    #[tokio::test]
    async fn issued_capability_reads_back_the_payload() {
        let f = fixture();
        let payload = Bytes::from(vec![42u8; 1024]);

        let uri = f.issuer.issue("report-copy.pdf", payload.clone()).await.unwrap();

        assert_eq!(uri.permissions(), Permissions::READ_ONLY);
        assert_eq!(uri.location().object.as_str(), "report-copy.pdf");
        assert!(uri.location().container.as_str().starts_with("sas-container-"));
        assert_eq!(f.store.read_signed(&uri, caller()).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn container_ends_read_only_and_private() {
        let f = fixture();
        let uri = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap();

        let (public_access, identifiers) = f.store.policies(&uri.location().container).await.unwrap();
        assert_eq!(public_access, PublicAccess::None);
        assert_eq!(identifiers.len(), 1);
        assert_eq!(identifiers[0].id(), READ_ONLY_POLICY_ID);
        assert_eq!(identifiers[0].policy().permissions, Permissions::READ_ONLY);
    }

    #[tokio::test]
    async fn read_only_capability_cannot_write() {
        let f = fixture();
        let uri = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap();

        let error = f
            .store
            .upload_signed(&uri, Bytes::from_static(b"overwrite"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), StoreErrorKind::AccessDenied);
        assert_eq!(f.store.object(uri.location()).await.unwrap(), Bytes::from_static(b"a"));
    }

    #[tokio::test]
    async fn write_capability_minted_before_the_downgrade_is_revoked() {
        let f = fixture();
        let uri = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap();

        // Same shape as the write capability used for the upload.
        let window = TimeWindow::around(
            f.clock.now(),
            SignedDuration::from_mins(15),
            SignedDuration::from_secs(60),
        )
        .unwrap();
        let request = SasRequest::new(uri.location().clone(), Permissions::WRITE, window)
            .with_ip_restriction("1.0.0.0".parse().unwrap());
        let write = StoreService::new(f.store.clone()).sign_object(&request).await.unwrap();

        let error = f
            .store
            .upload_signed(&write, Bytes::from_static(b"late"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), StoreErrorKind::AccessDenied);
        assert_eq!(error.code(), Some("AuthorizationPermissionMismatch"));
    }

    #[tokio::test]
    async fn containers_are_unique_per_issuance() {
        let f = fixture();
        let mut containers = HashSet::new();

        for _ in 0..20 {
            let uri = f.issuer.issue("same.txt", Bytes::from_static(b"x")).await.unwrap();
            containers.insert(uri.location().container.clone());
        }

        assert_eq!(containers.len(), 20);
    }

    #[tokio::test]
    async fn read_capability_outlives_the_write_capability() {
        let f = fixture();
        let uri = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap();
        let now = f.clock.now();

        let starts_on = uri.starts_on().unwrap();
        assert!(uri.expires_on() > starts_on);
        assert_eq!(uri.expires_on(), now + SignedDuration::from_hours(24));
        assert!(uri.expires_on() >= now + f.issuer.windows().write_ttl);

        f.clock.advance(SignedDuration::from_hours(23));
        assert!(f.store.read_signed(&uri, caller()).await.is_ok());

        f.clock.advance(SignedDuration::from_hours(1));
        assert!(f.store.read_signed(&uri, caller()).await.is_err());
    }

    #[tokio::test]
    async fn capability_is_bound_to_the_configured_address() {
        let f = fixture();
        let uri = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap();

        assert_eq!(uri.param("sip").as_deref(), Some("1.0.0.0"));
        let error = f
            .store
            .read_signed(&uri, Some("203.0.113.7".parse().unwrap()))
            .await
            .unwrap_err();
        assert_eq!(error.code(), Some("AuthorizationSourceIPMismatch"));
    }

    #[tokio::test]
    async fn upload_failure_aborts_issuance() {
        let f = fixture();
        f.store
            .fail_next(
                StoreOperation::UploadSigned,
                StoreError::other("disk full").with_status(500),
            )
            .await;

        let error = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Upload);
        assert_eq!(error.status(), Some(500));

        let calls: Vec<StoreOperation> = f.store.calls().await.into_iter().map(|c| c.operation).collect();
        assert_eq!(
            calls,
            [
                StoreOperation::CreateContainer,
                StoreOperation::ReplacePolicies,
                StoreOperation::SignObject,
                StoreOperation::UploadSigned,
            ]
        );
    }

    #[tokio::test]
    async fn provisioning_failure_stops_before_staging() {
        let f = fixture();
        f.store
            .fail_next(
                StoreOperation::CreateContainer,
                StoreError::access_denied("key revoked").with_status(403),
            )
            .await;

        let error = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ContainerProvision);
        assert_eq!(error.status(), Some(403));
        assert_eq!(f.store.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn policy_failure_is_policy_staging_error() {
        let f = fixture();
        f.store
            .fail_next(StoreOperation::ReplacePolicies, StoreError::other("acl rejected"))
            .await;

        let error = f.issuer.issue("a.txt", Bytes::from_static(b"a")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PolicyStaging);
    }

    #[tokio::test]
    async fn nested_names_survive_reparsing() {
        let f = fixture();
        let payload = Bytes::from_static(b"nested");

        let uri = f.issuer.issue("reports/2024/q1.pdf", payload.clone()).await.unwrap();
        let reparsed = SignedUri::parse(uri.as_str()).unwrap();

        assert_eq!(reparsed.location(), uri.location());
        assert_eq!(f.store.read_signed(&reparsed, caller()).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn relative_segments_are_rejected_before_provisioning() {
        let f = fixture();

        for name in ["a/../b.txt", "a/./b.txt", "a//b.txt"] {
            let error = f.issuer.issue(name, Bytes::from_static(b"a")).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidInput, "{name}");
        }

        assert!(f.store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_target_names_touch_nothing() {
        let f = fixture();
        let error = f.issuer.issue("trailing/", Bytes::from_static(b"a")).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidInput);
        assert!(f.store.calls().await.is_empty());
    }
}
