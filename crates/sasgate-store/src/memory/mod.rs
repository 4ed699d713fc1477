//! In-memory [`ObjectStore`] with use-time enforcement of signed URIs.
//!
//! Clones share one account. Signed URIs are checked every time they are
//! used: signature, validity window, source address, and the container
//! policies active at that moment. Replacing the policies of a container
//! therefore revokes capabilities that ask for more than the new policies
//! grant.

mod fault;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use url::Url;

pub use self::fault::StoreCall;
use self::fault::Faults;
use crate::TRACING_TARGET;
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::sas::SasSigner;
use crate::store::{ObjectStore, StoreOperation};
use crate::types::{
    ContainerName, MAX_SIGNED_IDENTIFIERS, ObjectLocation, ObjectName, Permission, Permissions,
    PublicAccess, SasRequest, SignedIdentifier, SignedUri,
};

/// Domain under which in-memory accounts are addressed.
pub const MEMORY_HOST_SUFFIX: &str = "blob.memory.invalid";

#[derive(Debug, Default)]
struct Container {
    public_access: PublicAccess,
    identifiers: Vec<SignedIdentifier>,
    objects: BTreeMap<ObjectName, Bytes>,
}

#[derive(Debug, Default)]
struct Account {
    containers: BTreeMap<ContainerName, Container>,
    faults: Faults,
    calls: Vec<StoreCall>,
}

/// In-memory object store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    account: String,
    endpoint: Url,
    signer: Option<SasSigner>,
    clock: Arc<dyn Clock>,
    egress_ip: Option<IpAddr>,
    state: Arc<RwLock<Account>>,
}

impl MemoryStore {
    /// Creates an empty account whose key is derived from its name.
    pub fn new(account: impl Into<String>) -> StoreResult<Self> {
        let account = account.into();
        let key = Sha256::digest(account.as_bytes()).to_vec();
        Self::with_key(account, key)
    }

    /// Creates an empty account signing with the given key.
    pub fn with_key(account: impl Into<String>, key: Vec<u8>) -> StoreResult<Self> {
        let account = account.into();
        let endpoint = Url::parse(&format!("https://{account}.{MEMORY_HOST_SUFFIX}/")).map_err(|e| {
            StoreError::other(format!("invalid account name {account:?}")).with_source(e)
        })?;

        Ok(Self {
            signer: Some(SasSigner::from_key_bytes(account.clone(), key)?),
            account,
            endpoint,
            clock: Arc::new(SystemClock),
            egress_ip: None,
            state: Arc::default(),
        })
    }

    /// Uses `clock` for use-time checks of signed URIs.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Treats uploads through signed URIs as coming from `ip`.
    ///
    /// Without it the source address of uploads is unknown and not checked.
    #[must_use]
    pub fn with_egress_ip(mut self, ip: IpAddr) -> Self {
        self.egress_ip = Some(ip);
        self
    }

    /// Drops the account key, as for a handle built from a URI: signing fails.
    #[must_use]
    pub fn without_signing(mut self) -> Self {
        self.signer = None;
        self
    }

    /// Returns the account endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the url addressing an object, without any signature.
    pub fn object_url(&self, location: &ObjectLocation) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::other("endpoint cannot hold a path"))?
            .pop_if_empty()
            .push(location.container.as_str())
            .extend(location.object.split('/'));
        Ok(url)
    }

    /// Makes the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.state.write().await.faults.push(operation, error);
    }

    /// Returns every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.read().await.calls.clone()
    }

    /// Stores an object directly, creating its container if needed.
    pub async fn put_object(&self, location: &ObjectLocation, content: impl Into<Bytes>) {
        let mut state = self.state.write().await;
        state
            .containers
            .entry(location.container.clone())
            .or_default()
            .objects
            .insert(location.object.clone(), content.into());
    }

    /// Returns an object's content without going through a capability.
    pub async fn object(&self, location: &ObjectLocation) -> Option<Bytes> {
        let state = self.state.read().await;
        state
            .containers
            .get(&location.container)?
            .objects
            .get(&location.object)
            .cloned()
    }

    /// Returns `true` if the container exists.
    pub async fn contains_container(&self, container: &ContainerName) -> bool {
        self.state.read().await.containers.contains_key(container)
    }

    /// Returns the container's signed identifiers and public access level.
    pub async fn policies(
        &self,
        container: &ContainerName,
    ) -> Option<(PublicAccess, Vec<SignedIdentifier>)> {
        let state = self.state.read().await;
        state
            .containers
            .get(container)
            .map(|c| (c.public_access, c.identifiers.clone()))
    }

    /// Dereferences a read capability, as a client holding it would.
    pub async fn read_signed(&self, uri: &SignedUri, caller_ip: Option<IpAddr>) -> StoreResult<Bytes> {
        let state = self.state.read().await;
        let container = self.authorize(&state, uri, Permissions::READ_ONLY, caller_ip)?;

        container
            .objects
            .get(&uri.location().object)
            .cloned()
            .ok_or_else(|| blob_not_found(&uri.location().object))
    }

    /// Records the call and returns the fault queued for it, if any.
    fn begin(&self, state: &mut Account, operation: StoreOperation, target: String) -> StoreResult<()> {
        tracing::trace!(
            target: TRACING_TARGET,
            store = %self.account,
            operation = %operation,
            resource = %target,
            "Memory store call"
        );

        state.calls.push(StoreCall { operation, target });
        match state.faults.take(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Checks a capability against the account state at use time.
    ///
    /// The capability must carry at least one of the `any_of` permissions.
    fn authorize<'a>(
        &self,
        state: &'a Account,
        uri: &SignedUri,
        any_of: Permissions,
        caller_ip: Option<IpAddr>,
    ) -> StoreResult<&'a Container> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            denied("store holds no account key to verify signatures", "AuthenticationFailed")
        })?;

        if uri.as_url().host_str() != self.endpoint.host_str() {
            return Err(denied("signed uri addresses another account", "AuthenticationFailed"));
        }

        signer.verify(uri)?;

        let now = self.clock.now();
        if !uri.permits_at(now, None) {
            return Err(denied("signed uri is not valid at this time", "AuthenticationFailed"));
        }

        if !uri.permits_at(now, caller_ip) {
            return Err(denied(
                "request source address is not allowed by the signed uri",
                "AuthorizationSourceIPMismatch",
            ));
        }

        if !any_of.iter().any(|p| uri.permissions().contains(p)) {
            return Err(permission_mismatch(uri.permissions()));
        }

        let location = uri.location();
        let container = state
            .containers
            .get(&location.container)
            .ok_or_else(|| container_not_found(&location.container))?;

        match uri.policy_id() {
            Some(id) => {
                let identifier = container
                    .identifiers
                    .iter()
                    .find(|identifier| identifier.id() == id)
                    .ok_or_else(|| {
                        denied("referenced access policy does not exist", "AuthenticationFailed")
                    })?;

                let policy = identifier.policy();
                if !policy.is_active_at(now) {
                    return Err(denied("referenced access policy is not active", "AuthenticationFailed"));
                }

                if !uri.permissions().is_subset_of(policy.permissions) {
                    return Err(permission_mismatch(uri.permissions()));
                }
            }
            None if !container.identifiers.is_empty() => {
                let granted = container
                    .identifiers
                    .iter()
                    .map(|identifier| identifier.policy().permissions)
                    .fold(Permissions::NONE, Permissions::union);

                if !uri.permissions().is_subset_of(granted) {
                    return Err(permission_mismatch(uri.permissions()));
                }
            }
            None => {}
        }

        Ok(container)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    fn store_id(&self) -> &str {
        &self.account
    }

    fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    async fn create_container_if_not_exists(&self, container: &ContainerName) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::CreateContainer, container.to_string())?;

        if state.containers.contains_key(container) {
            return Ok(false);
        }

        state.containers.insert(container.clone(), Container::default());
        Ok(true)
    }

    async fn download(&self, location: &ObjectLocation) -> StoreResult<Bytes> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::Download, location.to_string())?;

        state
            .containers
            .get(&location.container)
            .ok_or_else(|| container_not_found(&location.container))?
            .objects
            .get(&location.object)
            .cloned()
            .ok_or_else(|| blob_not_found(&location.object))
    }

    async fn upload_signed(&self, uri: &SignedUri, content: Bytes) -> StoreResult<()> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::UploadSigned, uri.redacted())?;

        let writable: Permissions = [Permission::Create, Permission::Write].into_iter().collect();
        self.authorize(&state, uri, writable, self.egress_ip)?;

        let location = uri.location();
        if let Some(container) = state.containers.get_mut(&location.container) {
            container.objects.insert(location.object.clone(), content);
        }

        Ok(())
    }

    async fn replace_policies(
        &self,
        container: &ContainerName,
        public_access: PublicAccess,
        identifiers: Vec<SignedIdentifier>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::ReplacePolicies, container.to_string())?;

        if identifiers.len() > MAX_SIGNED_IDENTIFIERS {
            return Err(StoreError::other(format!(
                "a container holds at most {MAX_SIGNED_IDENTIFIERS} signed identifiers, got {}",
                identifiers.len()
            ))
            .with_status(400)
            .with_code("InvalidXmlDocument"));
        }

        let entry = state
            .containers
            .get_mut(container)
            .ok_or_else(|| container_not_found(container))?;

        entry.public_access = public_access;
        entry.identifiers = identifiers;
        Ok(())
    }

    async fn sign_object(&self, request: &SasRequest) -> StoreResult<SignedUri> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::SignObject, request.location.to_string())?;

        let signer = self.signer.as_ref().ok_or_else(|| {
            StoreError::signing_unsupported(format!(
                "account {} was opened without a key and cannot sign",
                self.account
            ))
        })?;

        signer.sign(self.object_url(&request.location)?, request)
    }

    async fn delete_container(&self, container: &ContainerName) -> StoreResult<()> {
        let mut state = self.state.write().await;
        self.begin(&mut state, StoreOperation::DeleteContainer, container.to_string())?;

        state
            .containers
            .remove(container)
            .map(|_| ())
            .ok_or_else(|| container_not_found(container))
    }
}

fn container_not_found(container: &ContainerName) -> StoreError {
    StoreError::not_found(format!("container {container} does not exist"))
        .with_status(404)
        .with_code("ContainerNotFound")
}

fn blob_not_found(object: &ObjectName) -> StoreError {
    StoreError::not_found(format!("object {object} does not exist"))
        .with_status(404)
        .with_code("BlobNotFound")
}

fn denied(message: &'static str, code: &'static str) -> StoreError {
    StoreError::access_denied(message).with_status(403).with_code(code)
}

fn permission_mismatch(permissions: Permissions) -> StoreError {
    StoreError::access_denied(format!(
        "signed permissions {permissions} do not allow this operation"
    ))
    .with_status(403)
    .with_code("AuthorizationPermissionMismatch")
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};

    use super::*;
    use crate::StoreErrorKind;
    use crate::clock::FixedClock;
    use crate::types::{AccessPolicy, IpRestriction, TimeWindow};

    fn clock() -> FixedClock {
        FixedClock::new("2024-05-01T12:00:00Z".parse::<Timestamp>().unwrap())
    }

    fn location(container: &str, object: &str) -> ObjectLocation {
        ObjectLocation::parse(container, object).unwrap()
    }

    fn window(clock: &FixedClock, ttl: SignedDuration) -> TimeWindow {
        TimeWindow::around(clock.now(), SignedDuration::from_mins(15), ttl).unwrap()
    }

    fn identifier(id: &str, permissions: Permissions, clock: &FixedClock) -> SignedIdentifier {
        let policy = AccessPolicy::new(permissions, window(clock, SignedDuration::from_hours(1)));
        SignedIdentifier::new(id, policy).unwrap()
    }

    async fn sign(
        store: &MemoryStore,
        location: &ObjectLocation,
        permissions: Permissions,
        clock: &FixedClock,
    ) -> SignedUri {
        let request = SasRequest::new(location.clone(), permissions, window(clock, SignedDuration::from_mins(5)))
            .with_ip_restriction(IpRestriction::default());
        store.sign_object(&request).await.unwrap()
    }

    #[tokio::test]
    async fn create_container_is_idempotent() {
        let store = MemoryStore::new("external").unwrap();
        let name = ContainerName::new("sas-container-1").unwrap();

        assert!(store.create_container_if_not_exists(&name).await.unwrap());
        assert!(!store.create_container_if_not_exists(&name).await.unwrap());
    }

    #[tokio::test]
    async fn download_reports_missing_container_and_blob() {
        let store = MemoryStore::new("internal").unwrap();
        store.put_object(&location("incoming", "report.pdf"), vec![1u8; 8]).await;

        let missing_blob = store.download(&location("incoming", "missing.txt")).await.unwrap_err();
        assert_eq!(missing_blob.kind(), StoreErrorKind::NotFound);
        assert_eq!(missing_blob.code(), Some("BlobNotFound"));

        let missing_container = store.download(&location("absent", "x.txt")).await.unwrap_err();
        assert_eq!(missing_container.code(), Some("ContainerNotFound"));

        let content = store.download(&location("incoming", "report.pdf")).await.unwrap();
        assert_eq!(content.len(), 8);
    }

    #[tokio::test]
    async fn write_capability_is_revoked_by_policy_downgrade() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap().with_clock(clock.clone());
        let target = location("sas-container-1", "copy.pdf");
        store.create_container_if_not_exists(&target.container).await.unwrap();

        store
            .replace_policies(
                &target.container,
                PublicAccess::None,
                vec![identifier("access-policy-owner", Permissions::OWNER, &clock)],
            )
            .await
            .unwrap();

        let write = sign(&store, &target, Permissions::WRITE, &clock).await;
        store.upload_signed(&write, Bytes::from_static(b"first")).await.unwrap();

        store
            .replace_policies(
                &target.container,
                PublicAccess::None,
                vec![identifier("access-policy-read-only", Permissions::READ_ONLY, &clock)],
            )
            .await
            .unwrap();

        let error = store
            .upload_signed(&write, Bytes::from_static(b"second"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), StoreErrorKind::AccessDenied);
        assert_eq!(store.object(&target).await.unwrap(), Bytes::from_static(b"first"));

        let read = sign(&store, &target, Permissions::READ_ONLY, &clock).await;
        assert_eq!(read.permissions(), Permissions::READ_ONLY);
        assert!(store.upload_signed(&read, Bytes::new()).await.is_err());
        assert_eq!(store.read_signed(&read, None).await.unwrap(), Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn capabilities_expire_and_check_source_address() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap().with_clock(clock.clone());
        let target = location("sas-container-2", "copy.pdf");
        store.put_object(&target, Bytes::from_static(b"payload")).await;

        let read = sign(&store, &target, Permissions::READ_ONLY, &clock).await;
        assert!(store.read_signed(&read, Some("1.0.0.0".parse().unwrap())).await.is_ok());

        let wrong_ip = store
            .read_signed(&read, Some("203.0.113.9".parse().unwrap()))
            .await
            .unwrap_err();
        assert_eq!(wrong_ip.code(), Some("AuthorizationSourceIPMismatch"));

        clock.advance(SignedDuration::from_mins(6));
        let expired = store.read_signed(&read, None).await.unwrap_err();
        assert_eq!(expired.kind(), StoreErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn forged_capabilities_are_rejected() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap().with_clock(clock.clone());
        let target = location("sas-container-3", "copy.pdf");
        store.put_object(&target, Bytes::from_static(b"payload")).await;

        let read = sign(&store, &target, Permissions::READ_ONLY, &clock).await;
        let other = location("sas-container-3", "other.pdf");
        let moved = SignedUri::parse(&read.as_str().replace("copy.pdf", "other.pdf")).unwrap();
        assert_eq!(moved.location(), &other);
        assert!(store.read_signed(&moved, None).await.is_err());

        let stranger = MemoryStore::new("stranger").unwrap().with_clock(clock.clone());
        stranger.put_object(&target, Bytes::from_static(b"payload")).await;
        assert!(stranger.read_signed(&read, None).await.is_err());
    }

    #[tokio::test]
    async fn policy_bound_capabilities_follow_their_identifier() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap().with_clock(clock.clone());
        let target = location("sas-container-4", "copy.pdf");
        store.put_object(&target, Bytes::from_static(b"payload")).await;
        store
            .replace_policies(
                &target.container,
                PublicAccess::None,
                vec![identifier("access-policy-read-only", Permissions::READ_ONLY, &clock)],
            )
            .await
            .unwrap();

        let request = SasRequest::new(
            target.clone(),
            Permissions::READ_ONLY,
            window(&clock, SignedDuration::from_hours(24)),
        )
        .with_policy_id("access-policy-read-only");
        let bound = store.sign_object(&request).await.unwrap();
        assert!(store.read_signed(&bound, None).await.is_ok());

        // The identifier window ends after one hour.
        clock.advance(SignedDuration::from_hours(2));
        assert!(store.read_signed(&bound, None).await.is_err());

        store
            .replace_policies(&target.container, PublicAccess::None, Vec::new())
            .await
            .unwrap();
        clock.advance(SignedDuration::from_hours(-2));
        assert!(store.read_signed(&bound, None).await.is_err());
    }

    #[tokio::test]
    async fn replace_policies_limits_identifier_count() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap();
        let name = ContainerName::new("sas-container-5").unwrap();
        store.create_container_if_not_exists(&name).await.unwrap();

        let identifiers = (0..6)
            .map(|i| identifier(&format!("policy-{i}"), Permissions::READ_ONLY, &clock))
            .collect();
        let error = store
            .replace_policies(&name, PublicAccess::None, identifiers)
            .await
            .unwrap_err();
        assert_eq!(error.effective_status(), 400);
    }

    #[tokio::test]
    async fn signing_requires_a_key() {
        let clock = clock();
        let store = MemoryStore::new("external").unwrap().without_signing();
        assert!(!store.can_sign());

        let request = SasRequest::new(
            location("sas-container-6", "copy.pdf"),
            Permissions::READ_ONLY,
            window(&clock, SignedDuration::from_mins(5)),
        );
        let error = store.sign_object(&request).await.unwrap_err();
        assert_eq!(error.kind(), StoreErrorKind::SigningUnsupported);
    }

    #[tokio::test]
    async fn delete_unknown_container_is_not_found() {
        let store = MemoryStore::new("external").unwrap();
        let name = ContainerName::new("sas-container-7").unwrap();

        let error = store.delete_container(&name).await.unwrap_err();
        assert_eq!(error.effective_status(), 404);

        store.create_container_if_not_exists(&name).await.unwrap();
        store.delete_container(&name).await.unwrap();
        assert!(!store.contains_container(&name).await);
    }

    #[tokio::test]
    async fn injected_faults_and_journal() {
        let store = MemoryStore::new("external").unwrap();
        let name = ContainerName::new("sas-container-8").unwrap();
        store
            .fail_next(StoreOperation::CreateContainer, StoreError::transient("unavailable").with_status(503))
            .await;

        let error = store.create_container_if_not_exists(&name).await.unwrap_err();
        assert!(error.is_retryable());
        assert!(store.create_container_if_not_exists(&name).await.unwrap());

        let calls = store.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.operation == StoreOperation::CreateContainer));
        assert_eq!(calls[0].target, "sas-container-8");
    }

    #[tokio::test]
    async fn clones_share_the_account() {
        let store = MemoryStore::new("external").unwrap();
        let clone = store.clone();
        let target = location("shared", "a.txt");

        clone.put_object(&target, Bytes::from_static(b"a")).await;
        assert!(store.object(&target).await.is_some());
    }
}
