//! Azure Blob Storage.
//!
//! Downloads go through [`object_store`]. Container management, access
//! policies and signed uploads use the REST interface directly, since
//! `object_store` exposes none of them. Requests are authorized with Shared
//! Key when the account key is known, otherwise with the account SAS token
//! from the connection string. Only key-backed stores can mint signed URIs.

mod acl;
mod auth;
mod config;
mod error;
mod reader;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use jiff::Timestamp;
use reqwest::{Client, Method, StatusCode};
use url::Url;

pub use self::acl::signed_identifiers_xml;
pub use self::auth::SharedKeyCredential;
pub use self::config::{
    AzureBlobConfig, DEFAULT_TIMEOUT, DEVELOPMENT_ACCOUNT_KEY, DEVELOPMENT_ACCOUNT_NAME,
    DEVELOPMENT_BLOB_ENDPOINT,
};
use self::reader::BlobReaders;
use crate::TRACING_TARGET;
use crate::error::{StoreError, StoreResult};
use crate::sas::{SAS_VERSION, SasProtocol, SasSigner};
use crate::store::{ObjectStore, StoreService};
use crate::types::{
    ContainerName, MAX_SIGNED_IDENTIFIERS, ObjectLocation, PublicAccess, SasRequest,
    SignedIdentifier, SignedUri,
};

/// Service version sent with every request.
pub const API_VERSION: &str = SAS_VERSION;

struct AzureBlobStoreInner {
    http: Client,
    config: AzureBlobConfig,
    credential: Option<SharedKeyCredential>,
    signer: Option<SasSigner>,
    readers: BlobReaders,
}

impl std::fmt::Debug for AzureBlobStoreInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobStoreInner")
            .field("config", &self.config)
            .field("can_sign", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

/// Azure Blob Storage account.
#[derive(Clone, Debug)]
pub struct AzureBlobStore {
    inner: Arc<AzureBlobStoreInner>,
}

impl AzureBlobStore {
    /// Creates a store for the configured account.
    ///
    /// # Errors
    ///
    /// Returns an error if the account key is not valid base64 or the HTTP
    /// client cannot be created.
    pub fn new(config: AzureBlobConfig) -> StoreResult<Self> {
        tracing::debug!(
            target: TRACING_TARGET,
            account = %config.account_name,
            endpoint = %config.blob_endpoint,
            timeout_ms = config.effective_timeout().as_millis(),
            "Creating Azure Blob store"
        );

        let (credential, signer) = match &config.account_key {
            Some(key) => {
                let credential = SharedKeyCredential::new(&config.account_name, key)?;
                let mut signer = SasSigner::new(&config.account_name, key)?;
                if config.blob_endpoint.scheme() == "https" {
                    signer = signer.with_protocol(SasProtocol::Https);
                }
                (Some(credential), Some(signer))
            }
            None => (None, None),
        };

        let http = Client::builder()
            .timeout(config.effective_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        let store = Self {
            inner: Arc::new(AzureBlobStoreInner {
                http,
                config,
                credential,
                signer,
                readers: BlobReaders::default(),
            }),
        };

        tracing::info!(
            target: TRACING_TARGET,
            account = %store.inner.config.account_name,
            can_sign = store.inner.signer.is_some(),
            "Azure Blob store created"
        );

        Ok(store)
    }

    /// Creates a store from a connection string.
    pub fn from_connection_string(connection_string: &str) -> StoreResult<Self> {
        Self::new(AzureBlobConfig::from_connection_string(connection_string)?)
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &AzureBlobConfig {
        &self.inner.config
    }

    /// Converts this store into a [`StoreService`] for dependency injection.
    pub fn into_service(self) -> StoreService {
        StoreService::new(self)
    }

    fn container_url(&self, container: &ContainerName) -> StoreResult<Url> {
        let mut url = self.inner.config.blob_endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::other("blob endpoint cannot hold a path"))?
            .pop_if_empty()
            .push(container.as_str());
        url.query_pairs_mut().append_pair("restype", "container");
        Ok(url)
    }

    fn object_url(&self, location: &ObjectLocation) -> StoreResult<Url> {
        let mut url = self.inner.config.blob_endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::other("blob endpoint cannot hold a path"))?
            .pop_if_empty()
            .push(location.container.as_str())
            .extend(location.object.split('/'));
        Ok(url)
    }

    /// Sends an account-authorized request and maps error responses.
    async fn send(
        &self,
        method: Method,
        mut url: Url,
        extra_headers: &[(&str, String)],
        body: Bytes,
    ) -> StoreResult<reqwest::Response> {
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-date".to_owned(), http_date(Timestamp::now()));
        headers.insert("x-ms-version".to_owned(), API_VERSION.to_owned());
        headers.insert("content-length".to_owned(), body.len().to_string());
        for (name, value) in extra_headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }

        match (&self.inner.credential, &self.inner.config.sas_token) {
            (Some(credential), _) => {
                let authorization = credential.authorization(method.as_str(), &url, &headers)?;
                headers.insert("authorization".to_owned(), authorization);
            }
            (None, Some(token)) => {
                let query = match url.query() {
                    Some(query) => format!("{query}&{token}"),
                    None => token.clone(),
                };
                url.set_query(Some(&query));
            }
            (None, None) => {}
        }

        let mut request = self.inner.http.request(method, url);
        for (name, value) in &headers {
            // Set by reqwest from the body.
            if name != "content-length" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.body(body).send().await?;
        check(response).await
    }
}

#[async_trait::async_trait]
impl ObjectStore for AzureBlobStore {
    fn store_id(&self) -> &str {
        &self.inner.config.account_name
    }

    fn can_sign(&self) -> bool {
        self.inner.signer.is_some()
    }

    async fn create_container_if_not_exists(&self, container: &ContainerName) -> StoreResult<bool> {
        let url = self.container_url(container)?;
        container_created(self.send(Method::PUT, url, &[], Bytes::new()).await)
    }

    async fn download(&self, location: &ObjectLocation) -> StoreResult<Bytes> {
        self.inner.readers.get(&self.inner.config, location).await
    }

    async fn upload_signed(&self, uri: &SignedUri, content: Bytes) -> StoreResult<()> {
        let response = self
            .inner
            .http
            .put(uri.as_url().clone())
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", http_date(Timestamp::now()))
            .body(content)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    async fn replace_policies(
        &self,
        container: &ContainerName,
        public_access: PublicAccess,
        identifiers: Vec<SignedIdentifier>,
    ) -> StoreResult<()> {
        if identifiers.len() > MAX_SIGNED_IDENTIFIERS {
            return Err(StoreError::other(format!(
                "a container holds at most {MAX_SIGNED_IDENTIFIERS} signed identifiers, got {}",
                identifiers.len()
            ))
            .with_status(400));
        }

        let mut url = self.container_url(container)?;
        url.query_pairs_mut().append_pair("comp", "acl");

        let mut headers = vec![("content-type", "application/xml".to_owned())];
        if public_access != PublicAccess::None {
            headers.push(("x-ms-blob-public-access", public_access.to_string()));
        }

        let body = Bytes::from(signed_identifiers_xml(&identifiers)?);
        self.send(Method::PUT, url, &headers, body).await.map(|_| ())
    }

    async fn sign_object(&self, request: &SasRequest) -> StoreResult<SignedUri> {
        let signer = self.inner.signer.as_ref().ok_or_else(|| {
            StoreError::signing_unsupported(format!(
                "account {} has no account key and cannot sign",
                self.inner.config.account_name
            ))
        })?;

        signer.sign(self.object_url(&request.location)?, request)
    }

    async fn delete_container(&self, container: &ContainerName) -> StoreResult<()> {
        let url = self.container_url(container)?;
        self.send(Method::DELETE, url, &[], Bytes::new()).await.map(|_| ())
    }
}

/// Returns the response unchanged if successful, its mapped error otherwise.
async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let body = match status {
        StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
            response.text().await.unwrap_or_default()
        }
        _ => String::new(),
    };

    Err(error::from_response(status.as_u16(), &headers, &body))
}

/// Reads a create-container outcome as whether the container was new.
fn container_created(result: StoreResult<reqwest::Response>) -> StoreResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(error) if error.code() == Some("ContainerAlreadyExists") => Ok(false),
        Err(error) => Err(error),
    }
}

/// Formats an instant as an RFC 1123 date.
fn http_date(instant: Timestamp) -> String {
    instant.strftime("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
