//! Azure Blob Storage configuration and connection strings.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{StoreError, StoreResult};

/// Default timeout for store requests: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Account name of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known, public account key of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Blob endpoint of the local storage emulator.
pub const DEVELOPMENT_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Azure Blob Storage account configuration.
#[derive(Clone, PartialEq)]
pub struct AzureBlobConfig {
    /// Storage account name.
    pub account_name: String,
    /// Base64 account key; required to mint signed URIs.
    pub account_key: Option<String>,
    /// Account SAS token used when no key is available.
    pub sas_token: Option<String>,
    /// Blob service endpoint.
    pub blob_endpoint: Url,
    /// Timeout for each request.
    pub timeout: Duration,
    /// User-Agent header sent with requests.
    pub user_agent: String,
}

impl AzureBlobConfig {
    /// Creates a configuration for an account authenticated with its key.
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> StoreResult<Self> {
        let account_name = account_name.into();
        let blob_endpoint = default_endpoint(&account_name, DEFAULT_PROTOCOL, DEFAULT_ENDPOINT_SUFFIX)?;

        Ok(Self {
            account_name,
            account_key: Some(account_key.into()),
            sas_token: None,
            blob_endpoint,
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
        })
    }

    /// Parses a storage connection string.
    ///
    /// Understands `DefaultEndpointsProtocol`, `AccountName`, `AccountKey`,
    /// `EndpointSuffix`, `BlobEndpoint`, `SharedAccessSignature` and
    /// `UseDevelopmentStorage=true`. Other keys are ignored.
    pub fn from_connection_string(connection_string: &str) -> StoreResult<Self> {
        let settings: HashMap<String, String> = connection_string
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_owned()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        if settings.is_empty() {
            return Err(config_error("connection string is empty or malformed"));
        }

        let setting = |key: &str| settings.get(key).filter(|v| !v.is_empty()).cloned();

        if setting("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                account_name: DEVELOPMENT_ACCOUNT_NAME.to_owned(),
                account_key: Some(DEVELOPMENT_ACCOUNT_KEY.to_owned()),
                sas_token: None,
                blob_endpoint: parse_endpoint(DEVELOPMENT_BLOB_ENDPOINT)?,
                timeout: DEFAULT_TIMEOUT,
                user_agent: default_user_agent(),
            });
        }

        let blob_endpoint = setting("blobendpoint").map(|e| parse_endpoint(&e)).transpose()?;
        let account_name = setting("accountname")
            .or_else(|| {
                blob_endpoint
                    .as_ref()
                    .and_then(|e| e.host_str())
                    .and_then(|host| host.split('.').next())
                    .map(str::to_owned)
            })
            .ok_or_else(|| config_error("connection string names no account"))?;

        let blob_endpoint = match blob_endpoint {
            Some(endpoint) => endpoint,
            None => default_endpoint(
                &account_name,
                setting("defaultendpointsprotocol").as_deref().unwrap_or(DEFAULT_PROTOCOL),
                setting("endpointsuffix").as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX),
            )?,
        };

        let account_key = setting("accountkey");
        let sas_token = setting("sharedaccesssignature")
            .map(|token| token.trim_start_matches('?').to_owned());

        if account_key.is_none() && sas_token.is_none() {
            return Err(config_error(
                "connection string carries neither an account key nor a shared access signature",
            ));
        }

        Ok(Self {
            account_name,
            account_key,
            sas_token,
            blob_endpoint,
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
        })
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the blob endpoint.
    #[must_use]
    pub fn with_blob_endpoint(mut self, blob_endpoint: Url) -> Self {
        self.blob_endpoint = blob_endpoint;
        self
    }

    /// Returns the effective timeout, using the default if zero.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }
}

impl fmt::Debug for AzureBlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobConfig")
            .field("account_name", &self.account_name)
            .field("has_account_key", &self.account_key.is_some())
            .field("has_sas_token", &self.sas_token.is_some())
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn default_user_agent() -> String {
    format!("sasgate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_endpoint(account: &str, protocol: &str, suffix: &str) -> StoreResult<Url> {
    parse_endpoint(&format!("{protocol}://{account}.blob.{suffix}"))
}

fn parse_endpoint(endpoint: &str) -> StoreResult<Url> {
    let url = Url::parse(endpoint).map_err(|e| {
        config_error(format!("invalid blob endpoint {endpoint:?}")).with_source(e)
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(config_error(format!("invalid blob endpoint {endpoint:?}")));
    }

    Ok(url)
}

fn config_error(message: impl Into<std::borrow::Cow<'static, str>>) -> StoreError {
    StoreError::other(message).with_code("InvalidConnectionString")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_key_connection_string() {
        let config = AzureBlobConfig::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acme;AccountKey=a2V5PQ==;EndpointSuffix=core.windows.net",
        )
        .unwrap();

        assert_eq!(config.account_name, "acme");
        assert_eq!(config.account_key.as_deref(), Some("a2V5PQ=="));
        assert_eq!(config.blob_endpoint.as_str(), "https://acme.blob.core.windows.net/");
        assert!(config.sas_token.is_none());
    }

    #[test]
    fn parses_development_storage() {
        let config = AzureBlobConfig::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(config.account_name, DEVELOPMENT_ACCOUNT_NAME);
        assert_eq!(config.blob_endpoint.as_str(), DEVELOPMENT_BLOB_ENDPOINT);
        assert!(config.account_key.is_some());
    }

    #[test]
    fn parses_sas_connection_string() {
        let config = AzureBlobConfig::from_connection_string(
            "BlobEndpoint=https://acme.blob.core.windows.net/;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap();

        assert_eq!(config.account_name, "acme");
        assert!(config.account_key.is_none());
        assert_eq!(config.sas_token.as_deref(), Some("sv=2021-08-06&sig=abc%3D"));
    }

    #[test]
    fn rejects_incomplete_connection_strings() {
        assert!(AzureBlobConfig::from_connection_string("").is_err());
        assert!(AzureBlobConfig::from_connection_string("AccountKey=a2V5").is_err());
        assert!(AzureBlobConfig::from_connection_string("AccountName=acme").is_err());
        assert!(AzureBlobConfig::from_connection_string("AccountName=acme;AccountKey=k;BlobEndpoint=ftp://x").is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let config = AzureBlobConfig::new("acme", "c2VjcmV0").unwrap();
        assert!(!format!("{config:?}").contains("c2VjcmV0"));
    }
}
