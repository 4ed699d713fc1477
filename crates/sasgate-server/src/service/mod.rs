//! Application state and dependency injection.

mod config;
mod fetcher;
mod issuer;
mod naming;
mod signer;
mod staging;
mod storage;

use std::sync::Arc;

use jiff::Timestamp;
pub use sasgate_store::clock::{Clock, FixedClock, SystemClock};
use sasgate_store::StoreService;

pub use crate::service::config::{CapabilityWindows, ServiceConfig, ServiceConfigBuilder};
pub use crate::service::fetcher::Fetcher;
pub use crate::service::issuer::CapabilityIssuer;
pub use crate::service::naming::{ContainerNamer, ticks};
pub use crate::service::signer::{DEFAULT_EXPIRES_AFTER, DEFAULT_STARTS_BEFORE, Signer};
pub use crate::service::staging::{OWNER_POLICY_ID, PolicyStager, READ_ONLY_POLICY_ID};
pub use crate::service::storage::StorageService;
// Re-export error types from crate root for convenience
pub use crate::{Error, ErrorKind, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    pub storage: StorageService,
    pub clock: Arc<dyn Clock>,
    pub started_at: Timestamp,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Opens both stores named by the connection strings and reads the wall clock.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let internal = config.connect_internal_store()?;
        let external = config.connect_external_store()?;
        Self::from_stores(config, internal, external, Arc::new(SystemClock))
    }

    /// Initializes application state over already opened stores.
    pub fn from_stores(
        config: &ServiceConfig,
        internal: StoreService,
        external: StoreService,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let namer = ContainerNamer::new(config.sas_container_prefix.as_str(), clock.clone());
        let signer = Signer::new(external.clone(), clock.clone(), config.sas_ip_restriction);
        let issuer = CapabilityIssuer::new(
            external.clone(),
            namer,
            signer,
            clock.clone(),
            config.windows(),
        );

        Ok(Self {
            storage: StorageService::new(Fetcher::new(internal), issuer, external),
            started_at: clock.now(),
            clock,
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(storage: StorageService);
impl_di!(clock: Arc<dyn Clock>);
