//! Capability minting for single objects.

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use sasgate_store::StoreService;
use sasgate_store::clock::Clock;
use sasgate_store::types::{
    IpRestriction, ObjectLocation, Permissions, SasRequest, SignedUri, TimeWindow, offset,
};

use crate::service::{Error, Result};

/// Tracing target for capability signing.
const TRACING_TARGET: &str = "sasgate_server::service::signer";

/// Start of the fallback window, relative to now.
pub const DEFAULT_STARTS_BEFORE: SignedDuration = SignedDuration::from_mins(15);

/// End of the fallback window, relative to now.
pub const DEFAULT_EXPIRES_AFTER: SignedDuration = SignedDuration::from_hours(1);

/// Mints blob-scoped signed URIs carrying the configured source restriction.
#[derive(Debug, Clone)]
pub struct Signer {
    store: StoreService,
    clock: Arc<dyn Clock>,
    ip_restriction: IpRestriction,
}

impl Signer {
    /// Creates a signer over the external store.
    pub fn new(store: StoreService, clock: Arc<dyn Clock>, ip_restriction: IpRestriction) -> Self {
        Self {
            store,
            clock,
            ip_restriction,
        }
    }

    /// Returns the source restriction embedded in every capability.
    #[must_use]
    pub fn ip_restriction(&self) -> IpRestriction {
        self.ip_restriction
    }

    /// Mints a capability for exactly one object.
    ///
    /// Missing bounds default to `now - 15 min` and `now + 1 h`.
    pub async fn sign(
        &self,
        location: &ObjectLocation,
        permissions: Permissions,
        expires_on: Option<Timestamp>,
        starts_on: Option<Timestamp>,
    ) -> Result<SignedUri> {
        if permissions.is_empty() {
            return Err(Error::invalid_input("a capability needs at least one permission"));
        }

        let now = self.clock.now();
        let starts_on = match starts_on {
            Some(starts_on) => starts_on,
            None => offset(now, -DEFAULT_STARTS_BEFORE).map_err(invalid_window)?,
        };
        let expires_on = match expires_on {
            Some(expires_on) => expires_on,
            None => offset(now, DEFAULT_EXPIRES_AFTER).map_err(invalid_window)?,
        };

        let window = TimeWindow::new(starts_on, expires_on).map_err(invalid_window)?;
        let request = SasRequest::new(location.clone(), permissions, window)
            .with_ip_restriction(self.ip_restriction);

        let uri = self
            .store
            .sign_object(&request)
            .await
            .map_err(|e| Error::from_store(format!("failed to sign {location}"), e))?;

        tracing::debug!(
            target: TRACING_TARGET,
            location = %location,
            permissions = %permissions,
            window = %window,
            "Capability minted"
        );

        Ok(uri)
    }
}

fn invalid_window(error: sasgate_store::StoreError) -> Error {
    Error::invalid_input("capability validity window is empty or out of range").with_source(error)
}
