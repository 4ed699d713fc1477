use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use jiff::SignedDuration;
use sasgate_store::StoreService;
use sasgate_store::azure::{AzureBlobConfig, AzureBlobStore};
use sasgate_store::types::{ContainerName, IpRestriction};
use serde::{Deserialize, Serialize};

use crate::service::{Error, Result};

/// Default values for configuration options.
mod defaults {
    use sasgate_store::types::IpRestriction;

    /// Connection string of the local storage emulator.
    pub const STORAGE_CONNECTION_STRING: &str = "UseDevelopmentStorage=true";

    /// Lifetime of the write capability used for the upload.
    pub const WRITE_TTL_SECS: u64 = 60;

    /// Lifetime of the read-only capability returned to the caller.
    pub const READ_TTL_SECS: u64 = 86_400;

    /// How far policy windows start in the past, tolerating clock skew.
    pub const POLICY_BACKDATE_SECS: u64 = 900;

    /// Lifetime of staged access policies.
    pub const POLICY_TTL_SECS: u64 = 3_600;

    /// Prefix of per-request container names.
    pub const CONTAINER_PREFIX: &str = "sas-container-";

    /// Timeout of each store request.
    pub const STORAGE_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Source address embedded in every capability.
    pub fn ip_restriction() -> IpRestriction {
        IpRestriction::default()
    }
}

/// Bounds enforced on the configured windows.
mod limits {
    pub const WRITE_TTL_SECS: std::ops::RangeInclusive<u64> = 60..=900;
    pub const READ_TTL_MAX_SECS: u64 = 7 * 86_400;
    pub const POLICY_BACKDATE_MAX_SECS: u64 = 3_600;
    pub const POLICY_TTL_MAX_SECS: u64 = 7 * 86_400;
    pub const STORAGE_REQUEST_TIMEOUT_SECS: std::ops::RangeInclusive<u64> = 1..=300;
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// Connection string of the store files are copied from.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "INTERNAL_STORAGE_CONNECTION_STRING",
            default_value = defaults::STORAGE_CONNECTION_STRING,
            hide_env_values = true
        )
    )]
    #[builder(default = "defaults::STORAGE_CONNECTION_STRING.to_owned()")]
    pub internal_storage_connection_string: String,

    /// Connection string of the store capabilities are issued against.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "EXTERNAL_STORAGE_CONNECTION_STRING",
            default_value = defaults::STORAGE_CONNECTION_STRING,
            hide_env_values = true
        )
    )]
    #[builder(default = "defaults::STORAGE_CONNECTION_STRING.to_owned()")]
    pub external_storage_connection_string: String,

    /// Source address (or IPv4 range `a-b`) every capability is restricted to.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_IP_RESTRICTION", default_value = "1.0.0.0")
    )]
    #[builder(default = "defaults::ip_restriction()")]
    pub sas_ip_restriction: IpRestriction,

    /// Lifetime in seconds of the write capability (60 to 900).
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_WRITE_TTL_SECS", default_value = "60")
    )]
    #[builder(default = "defaults::WRITE_TTL_SECS")]
    pub sas_write_ttl_secs: u64,

    /// Lifetime in seconds of the returned read-only capability.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_READ_TTL_SECS", default_value = "86400")
    )]
    #[builder(default = "defaults::READ_TTL_SECS")]
    pub sas_read_ttl_secs: u64,

    /// Seconds staged policies start before the current time.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_POLICY_BACKDATE_SECS", default_value = "900")
    )]
    #[builder(default = "defaults::POLICY_BACKDATE_SECS")]
    pub sas_policy_backdate_secs: u64,

    /// Seconds staged policies stay valid after the current time.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_POLICY_TTL_SECS", default_value = "3600")
    )]
    #[builder(default = "defaults::POLICY_TTL_SECS")]
    pub sas_policy_ttl_secs: u64,

    /// Prefix of the per-request container names.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SAS_CONTAINER_PREFIX", default_value = defaults::CONTAINER_PREFIX)
    )]
    #[builder(default = "defaults::CONTAINER_PREFIX.to_owned()")]
    pub sas_container_prefix: String,

    /// Timeout in seconds of each store request.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STORAGE_REQUEST_TIMEOUT_SECS", default_value = "30")
    )]
    #[builder(default = "defaults::STORAGE_REQUEST_TIMEOUT_SECS")]
    pub storage_request_timeout_secs: u64,
}

/// Validity windows applied by the capability issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityWindows {
    /// How far staged policies start in the past.
    pub policy_backdate: SignedDuration,
    /// How long staged policies last.
    pub policy_ttl: SignedDuration,
    /// Lifetime of the write capability.
    pub write_ttl: SignedDuration,
    /// Lifetime of the read-only capability.
    pub read_ttl: SignedDuration,
}

impl Default for CapabilityWindows {
    fn default() -> Self {
        Self {
            policy_backdate: secs(defaults::POLICY_BACKDATE_SECS),
            policy_ttl: secs(defaults::POLICY_TTL_SECS),
            write_ttl: secs(defaults::WRITE_TTL_SECS),
            read_ttl: secs(defaults::READ_TTL_SECS),
        }
    }
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Checks every value, for configurations not built through the builder.
    pub fn validate(&self) -> Result<()> {
        validate_windows(
            self.sas_write_ttl_secs,
            self.sas_read_ttl_secs,
            self.sas_policy_backdate_secs,
            self.sas_policy_ttl_secs,
        )
        .and_then(|()| validate_prefix(&self.sas_container_prefix))
        .and_then(|()| validate_timeout(self.storage_request_timeout_secs))
        .map_err(Error::config)
    }

    /// Returns the issuer windows.
    pub fn windows(&self) -> CapabilityWindows {
        CapabilityWindows {
            policy_backdate: secs(self.sas_policy_backdate_secs),
            policy_ttl: secs(self.sas_policy_ttl_secs),
            write_ttl: secs(self.sas_write_ttl_secs),
            read_ttl: secs(self.sas_read_ttl_secs),
        }
    }

    /// Returns the store request timeout.
    pub fn storage_request_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_request_timeout_secs)
    }

    /// Opens the store files are copied from.
    pub fn connect_internal_store(&self) -> Result<StoreService> {
        self.connect_store("internal", &self.internal_storage_connection_string)
    }

    /// Opens the store capabilities are issued against.
    pub fn connect_external_store(&self) -> Result<StoreService> {
        let store = self.connect_store("external", &self.external_storage_connection_string)?;
        if !store.can_sign() {
            return Err(Error::config(
                "external storage connection string carries no account key to sign with",
            ));
        }

        Ok(store)
    }

    fn connect_store(&self, role: &'static str, connection_string: &str) -> Result<StoreService> {
        let config = AzureBlobConfig::from_connection_string(connection_string)
            .map_err(|e| Error::config(format!("invalid {role} storage connection string")).with_source(e))?
            .with_timeout(self.storage_request_timeout());

        let store = AzureBlobStore::new(config)
            .map_err(|e| Error::config(format!("failed to open {role} storage")).with_source(e))?;

        Ok(store.into_service())
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> std::result::Result<(), String> {
        validate_windows(
            builder.sas_write_ttl_secs.unwrap_or(defaults::WRITE_TTL_SECS),
            builder.sas_read_ttl_secs.unwrap_or(defaults::READ_TTL_SECS),
            builder
                .sas_policy_backdate_secs
                .unwrap_or(defaults::POLICY_BACKDATE_SECS),
            builder.sas_policy_ttl_secs.unwrap_or(defaults::POLICY_TTL_SECS),
        )?;

        if let Some(prefix) = &builder.sas_container_prefix {
            validate_prefix(prefix)?;
        }

        if let Some(timeout_secs) = builder.storage_request_timeout_secs {
            validate_timeout(timeout_secs)?;
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            internal_storage_connection_string: defaults::STORAGE_CONNECTION_STRING.to_owned(),
            external_storage_connection_string: defaults::STORAGE_CONNECTION_STRING.to_owned(),
            sas_ip_restriction: defaults::ip_restriction(),
            sas_write_ttl_secs: defaults::WRITE_TTL_SECS,
            sas_read_ttl_secs: defaults::READ_TTL_SECS,
            sas_policy_backdate_secs: defaults::POLICY_BACKDATE_SECS,
            sas_policy_ttl_secs: defaults::POLICY_TTL_SECS,
            sas_container_prefix: defaults::CONTAINER_PREFIX.to_owned(),
            storage_request_timeout_secs: defaults::STORAGE_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn secs(value: u64) -> SignedDuration {
    SignedDuration::from_secs(i64::try_from(value).unwrap_or(i64::MAX))
}

fn validate_windows(
    write_ttl: u64,
    read_ttl: u64,
    policy_backdate: u64,
    policy_ttl: u64,
) -> std::result::Result<(), String> {
    if !limits::WRITE_TTL_SECS.contains(&write_ttl) {
        return Err(format!(
            "write capability lifetime must be between {} and {} seconds",
            limits::WRITE_TTL_SECS.start(),
            limits::WRITE_TTL_SECS.end()
        ));
    }

    if read_ttl < write_ttl {
        return Err("read capability lifetime cannot be shorter than the write capability lifetime".to_owned());
    }

    if read_ttl > limits::READ_TTL_MAX_SECS {
        return Err(format!(
            "read capability lifetime cannot exceed {} seconds",
            limits::READ_TTL_MAX_SECS
        ));
    }

    if policy_backdate > limits::POLICY_BACKDATE_MAX_SECS {
        return Err(format!(
            "policy backdate cannot exceed {} seconds",
            limits::POLICY_BACKDATE_MAX_SECS
        ));
    }

    if policy_ttl < write_ttl {
        return Err("policy lifetime cannot be shorter than the write capability lifetime".to_owned());
    }

    if policy_ttl > limits::POLICY_TTL_MAX_SECS {
        return Err(format!(
            "policy lifetime cannot exceed {} seconds",
            limits::POLICY_TTL_MAX_SECS
        ));
    }

    Ok(())
}

fn validate_prefix(prefix: &str) -> std::result::Result<(), String> {
    // The longest name the prefix will ever be combined with.
    ContainerName::new(format!("{prefix}{}", i64::MAX))
        .map(|_| ())
        .map_err(|e| format!("container prefix {prefix:?} cannot form valid container names: {e}"))
}

fn validate_timeout(timeout_secs: u64) -> std::result::Result<(), String> {
    if !limits::STORAGE_REQUEST_TIMEOUT_SECS.contains(&timeout_secs) {
        return Err(format!(
            "storage request timeout must be between {} and {} seconds",
            limits::STORAGE_REQUEST_TIMEOUT_SECS.start(),
            limits::STORAGE_REQUEST_TIMEOUT_SECS.end()
        ));
    }

    Ok(())
}
