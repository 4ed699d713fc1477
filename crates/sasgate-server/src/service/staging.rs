//! Access-policy staging on external containers.

use sasgate_store::StoreService;
use sasgate_store::types::{
    AccessPolicy, ContainerName, Permissions, PublicAccess, SignedIdentifier, TimeWindow,
};

use crate::service::{Error, ErrorKind, Result};

/// Tracing target for policy staging.
const TRACING_TARGET: &str = "sasgate_server::service::staging";

/// Identifier of the policy staged while the payload is uploaded.
pub const OWNER_POLICY_ID: &str = "access-policy-owner";

/// Identifier of the policy staged before the capability is handed out.
pub const READ_ONLY_POLICY_ID: &str = "access-policy-read-only";

/// Replaces the policy set of a container with a single named policy.
#[derive(Debug, Clone)]
pub struct PolicyStager {
    store: StoreService,
}

impl PolicyStager {
    /// Creates a stager over the external store.
    pub fn new(store: StoreService) -> Self {
        Self { store }
    }

    /// Makes `{policy_id, window, permissions}` the only active policy of
    /// `container` and disables public access.
    ///
    /// Policies staged before are void once this returns, together with
    /// every capability asking for more than `permissions`.
    pub async fn stage(
        &self,
        container: &ContainerName,
        policy_id: &str,
        permissions: Permissions,
        window: TimeWindow,
    ) -> Result<()> {
        let identifier = SignedIdentifier::new(policy_id, AccessPolicy::new(permissions, window))
            .map_err(|e| Error::step(ErrorKind::PolicyStaging, "invalid access policy", e))?;

        self.store
            .replace_policies(container, PublicAccess::None, vec![identifier])
            .await
            .map_err(|e| {
                Error::step(
                    ErrorKind::PolicyStaging,
                    format!("failed to stage policy {policy_id} on {container}"),
                    e,
                )
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            container = %container,
            policy_id = policy_id,
            permissions = %permissions,
            window = %window,
            "Access policy staged"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sasgate_store::memory::MemoryStore;
    use sasgate_store::{StoreError, StoreOperation};

    use super::*;

    fn window() -> TimeWindow {
        TimeWindow::new(
            "2024-05-01T11:45:00Z".parse().unwrap(),
            "2024-05-01T13:00:00Z".parse().unwrap(),
        )
        .unwrap()
    }

    async fn stager() -> (MemoryStore, PolicyStager, ContainerName) {
        let store = MemoryStore::new("external").unwrap();
        let container = ContainerName::new("sas-container-1").unwrap();
        let service = StoreService::new(store.clone());
        service.create_container_if_not_exists(&container).await.unwrap();
        (store, PolicyStager::new(service), container)
    }

    #[tokio::test]
    async fn staging_replaces_previous_policies() {
        let (store, stager, container) = stager().await;

        stager
            .stage(&container, OWNER_POLICY_ID, Permissions::OWNER, window())
            .await
            .unwrap();
        stager
            .stage(&container, READ_ONLY_POLICY_ID, Permissions::READ_ONLY, window())
            .await
            .unwrap();

        let (public_access, identifiers) = store.policies(&container).await.unwrap();
        assert_eq!(public_access, PublicAccess::None);
        assert_eq!(identifiers.len(), 1);
        assert_eq!(identifiers[0].id(), READ_ONLY_POLICY_ID);
        assert_eq!(identifiers[0].policy().permissions, Permissions::READ_ONLY);
        assert_eq!(identifiers[0].policy().expires_on, Some(window().expires_on()));
    }

    #[tokio::test]
    async fn store_faults_are_policy_staging_errors() {
        let (store, stager, container) = stager().await;
        store
            .fail_next(
                StoreOperation::ReplacePolicies,
                StoreError::transient("service busy").with_status(503),
            )
            .await;

        let error = stager
            .stage(&container, OWNER_POLICY_ID, Permissions::OWNER, window())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::PolicyStaging);
        assert_eq!(error.status(), Some(503));
    }

    #[tokio::test]
    async fn oversized_policy_ids_are_rejected() {
        let (_, stager, container) = stager().await;
        let error = stager
            .stage(&container, &"p".repeat(65), Permissions::OWNER, window())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::PolicyStaging);
    }
}
