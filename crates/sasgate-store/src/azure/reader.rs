//! Blob downloads through [`object_store`].
//!
//! `object_store` scopes a client to one container, so readers are built
//! lazily and cached per container.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore as _;
use object_store::azure::{MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::{ClientOptions, Error as ObjectStoreError};
use tokio::sync::RwLock;

use super::config::AzureBlobConfig;
use crate::TRACING_TARGET;
use crate::error::{StoreError, StoreResult};
use crate::types::{ContainerName, ObjectLocation};

/// Container-scoped `object_store` clients for one account.
#[derive(Debug, Default)]
pub(crate) struct BlobReaders {
    readers: RwLock<HashMap<ContainerName, Arc<MicrosoftAzure>>>,
}

impl BlobReaders {
    /// Downloads the object at `location`.
    pub async fn get(&self, config: &AzureBlobConfig, location: &ObjectLocation) -> StoreResult<Bytes> {
        let reader = self.reader(config, &location.container).await?;
        let path = Path::from(location.object.as_str());

        let result = reader.get(&path).await.map_err(from_object_store)?;
        result.bytes().await.map_err(from_object_store)
    }

    async fn reader(
        &self,
        config: &AzureBlobConfig,
        container: &ContainerName,
    ) -> StoreResult<Arc<MicrosoftAzure>> {
        if let Some(reader) = self.readers.read().await.get(container) {
            return Ok(Arc::clone(reader));
        }

        let mut readers = self.readers.write().await;
        if let Some(reader) = readers.get(container) {
            return Ok(Arc::clone(reader));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            account = %config.account_name,
            container = %container,
            "Building blob reader"
        );

        let reader = Arc::new(build_reader(config, container)?);
        readers.insert(container.clone(), Arc::clone(&reader));
        Ok(reader)
    }
}

/// Builds a client for one container, authorized like the REST requests.
fn build_reader(config: &AzureBlobConfig, container: &ContainerName) -> StoreResult<MicrosoftAzure> {
    let options = ClientOptions::new().with_timeout(config.effective_timeout());

    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(&config.account_name)
        .with_container_name(container.as_str())
        .with_endpoint(config.blob_endpoint.as_str().trim_end_matches('/').to_owned())
        .with_allow_http(config.blob_endpoint.scheme() == "http")
        .with_client_options(options);

    if let Some(account_key) = &config.account_key {
        builder = builder.with_access_key(account_key);
    } else if let Some(sas_token) = &config.sas_token {
        builder = builder.with_sas_authorization(sas_query_pairs(sas_token));
    }

    builder
        .build()
        .map_err(|e| StoreError::other("failed to build blob reader").with_source(e))
}

/// Splits a SAS token into decoded query pairs.
fn sas_query_pairs(sas_token: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(sas_token.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

/// Maps an `object_store` failure onto the store error taxonomy.
fn from_object_store(error: ObjectStoreError) -> StoreError {
    let mapped = match &error {
        ObjectStoreError::NotFound { path, .. } => StoreError::not_found(format!("blob {path} does not exist"))
            .with_status(404)
            .with_code("BlobNotFound"),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            StoreError::access_denied("store refused the download").with_status(403)
        }
        ObjectStoreError::InvalidPath { .. } => StoreError::invalid_name("blob path is not valid"),
        ObjectStoreError::Generic { .. } => StoreError::transient("blob download failed"),
        _ => StoreError::other("blob download failed"),
    };

    mapped.with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreErrorKind;

    #[test]
    fn sas_tokens_are_decoded_into_pairs() {
        let pairs = sas_query_pairs("?sv=2021-08-06&sig=abc%2Bdef%3D");
        assert_eq!(
            pairs,
            vec![
                ("sv".to_owned(), "2021-08-06".to_owned()),
                ("sig".to_owned(), "abc+def=".to_owned()),
            ]
        );
    }

    #[test]
    fn missing_blobs_map_to_not_found() {
        let error = from_object_store(ObjectStoreError::NotFound {
            path: "reports/q1.pdf".to_owned(),
            source: "404".into(),
        });

        assert_eq!(error.kind(), StoreErrorKind::NotFound);
        assert_eq!(error.effective_status(), 404);
        assert_eq!(error.code(), Some("BlobNotFound"));
    }

    #[test]
    fn refusals_map_to_access_denied() {
        let denied = from_object_store(ObjectStoreError::PermissionDenied {
            path: "a.txt".to_owned(),
            source: "403".into(),
        });
        assert_eq!(denied.kind(), StoreErrorKind::AccessDenied);

        let unauthenticated = from_object_store(ObjectStoreError::Unauthenticated {
            path: "a.txt".to_owned(),
            source: "401".into(),
        });
        assert_eq!(unauthenticated.effective_status(), 403);
    }

    #[test]
    fn generic_failures_are_retryable() {
        let error = from_object_store(ObjectStoreError::Generic {
            store: "MicrosoftAzure",
            source: "connection reset".into(),
        });
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn readers_are_cached_per_container() {
        let config = AzureBlobConfig::from_connection_string("UseDevelopmentStorage=true").unwrap();
        let readers = BlobReaders::default();
        let incoming = ContainerName::new("incoming").unwrap();

        let first = readers.reader(&config, &incoming).await.unwrap();
        let second = readers.reader(&config, &incoming).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = readers
            .reader(&config, &ContainerName::new("archive").unwrap())
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(readers.readers.read().await.len(), 2);
    }
}
