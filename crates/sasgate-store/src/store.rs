//! The object store collaborator and its observability wrapper.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::TRACING_TARGET;
use crate::error::StoreResult;
use crate::types::{
    ContainerName, ObjectLocation, PublicAccess, SasRequest, SignedIdentifier, SignedUri,
};

/// Operations offered by an [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOperation {
    /// [`ObjectStore::create_container_if_not_exists`].
    CreateContainer,
    /// [`ObjectStore::download`].
    Download,
    /// [`ObjectStore::upload_signed`].
    UploadSigned,
    /// [`ObjectStore::replace_policies`].
    ReplacePolicies,
    /// [`ObjectStore::sign_object`].
    SignObject,
    /// [`ObjectStore::delete_container`].
    DeleteContainer,
}

/// Hierarchical container/object blob storage.
///
/// Implementations must enforce signed URIs at use time: an upload through a
/// capability is checked against the container policies active when the
/// upload happens, not when the capability was minted.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Identifies the store (account) in logs.
    fn store_id(&self) -> &str;

    /// Returns `true` if the store can mint signed URIs.
    fn can_sign(&self) -> bool;

    /// Creates the container unless it exists; returns `true` if it was created.
    async fn create_container_if_not_exists(&self, container: &ContainerName) -> StoreResult<bool>;

    /// Downloads the whole content of an object.
    async fn download(&self, location: &ObjectLocation) -> StoreResult<Bytes>;

    /// Uploads `content` through a write capability, replacing any existing object.
    async fn upload_signed(&self, uri: &SignedUri, content: Bytes) -> StoreResult<()>;

    /// Replaces the container's entire set of signed identifiers and its public access level.
    async fn replace_policies(
        &self,
        container: &ContainerName,
        public_access: PublicAccess,
        identifiers: Vec<SignedIdentifier>,
    ) -> StoreResult<()>;

    /// Mints a capability for a single object.
    async fn sign_object(&self, request: &SasRequest) -> StoreResult<SignedUri>;

    /// Deletes a container and everything in it.
    async fn delete_container(&self, container: &ContainerName) -> StoreResult<()>;
}

/// Object store wrapper with observability.
///
/// Adds structured logging with timings to any [`ObjectStore`]. The inner
/// store is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct StoreService {
    inner: Arc<dyn ObjectStore>,
}

impl fmt::Debug for StoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreService")
            .field("store_id", &self.inner.store_id())
            .finish_non_exhaustive()
    }
}

impl StoreService {
    /// Creates a new store service wrapper.
    pub fn new<S>(store: S) -> Self
    where
        S: ObjectStore + 'static,
    {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Creates a wrapper around an already shared store.
    pub fn from_arc(store: Arc<dyn ObjectStore>) -> Self {
        Self { inner: store }
    }

    /// Returns the store id.
    #[must_use]
    pub fn store_id(&self) -> &str {
        self.inner.store_id()
    }

    /// Returns `true` if the store can mint signed URIs.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.inner.can_sign()
    }

    /// Creates the container unless it exists.
    pub async fn create_container_if_not_exists(&self, container: &ContainerName) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self.inner.create_container_if_not_exists(container).await;

        if let Ok(created) = &result {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                container = %container,
                created = created,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Container ensured"
            );
        }

        self.trace_error(StoreOperation::CreateContainer, started_at, result)
    }

    /// Downloads the whole content of an object.
    pub async fn download(&self, location: &ObjectLocation) -> StoreResult<Bytes> {
        let started_at = Instant::now();
        let result = self.inner.download(location).await;

        if let Ok(content) = &result {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                location = %location,
                size = content.len(),
                elapsed_ms = started_at.elapsed().as_millis(),
                "Object downloaded"
            );
        }

        self.trace_error(StoreOperation::Download, started_at, result)
    }

    /// Uploads `content` through a write capability.
    pub async fn upload_signed(&self, uri: &SignedUri, content: Bytes) -> StoreResult<()> {
        let started_at = Instant::now();
        let size = content.len();
        let result = self.inner.upload_signed(uri, content).await;

        if result.is_ok() {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                uri = %uri.redacted(),
                size = size,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Object uploaded"
            );
        }

        self.trace_error(StoreOperation::UploadSigned, started_at, result)
    }

    /// Replaces the container's signed identifiers.
    pub async fn replace_policies(
        &self,
        container: &ContainerName,
        public_access: PublicAccess,
        identifiers: Vec<SignedIdentifier>,
    ) -> StoreResult<()> {
        let started_at = Instant::now();
        let ids: Vec<String> = identifiers.iter().map(|i| i.id().to_owned()).collect();
        let result = self
            .inner
            .replace_policies(container, public_access, identifiers)
            .await;

        if result.is_ok() {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                container = %container,
                public_access = %public_access,
                identifiers = ?ids,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Container policies replaced"
            );
        }

        self.trace_error(StoreOperation::ReplacePolicies, started_at, result)
    }

    /// Mints a capability for a single object.
    pub async fn sign_object(&self, request: &SasRequest) -> StoreResult<SignedUri> {
        let started_at = Instant::now();
        let result = self.inner.sign_object(request).await;

        if let Ok(uri) = &result {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                uri = %uri.redacted(),
                permissions = %request.permissions,
                window = %request.window,
                "Object signed"
            );
        }

        self.trace_error(StoreOperation::SignObject, started_at, result)
    }

    /// Deletes a container.
    pub async fn delete_container(&self, container: &ContainerName) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.inner.delete_container(container).await;

        if result.is_ok() {
            tracing::debug!(
                target: TRACING_TARGET,
                store = self.store_id(),
                container = %container,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Container deleted"
            );
        }

        self.trace_error(StoreOperation::DeleteContainer, started_at, result)
    }

    fn trace_error<T>(
        &self,
        operation: StoreOperation,
        started_at: Instant,
        result: StoreResult<T>,
    ) -> StoreResult<T> {
        if let Err(error) = &result {
            tracing::warn!(
                target: TRACING_TARGET,
                store = self.store_id(),
                operation = %operation,
                kind = %error.kind(),
                status = ?error.status(),
                code = ?error.code(),
                error = %error,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Store operation failed"
            );
        }

        result
    }
}
