//! Named access policies attached to containers.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{Permissions, TimeWindow};
use crate::error::{StoreError, StoreResult};

/// Maximum length of a signed identifier id.
pub const SIGNED_IDENTIFIER_MAX_LEN: usize = 64;

/// Maximum number of signed identifiers a container may hold.
pub const MAX_SIGNED_IDENTIFIERS: usize = 5;

/// Container-level anonymous access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PublicAccess {
    /// Anonymous access is disabled; signed URIs are the only access path.
    #[default]
    None,
    /// Anonymous read access to objects.
    Blob,
    /// Anonymous read and list access to the whole container.
    Container,
}

/// A time-bounded permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Start of the grant, if bounded.
    pub starts_on: Option<Timestamp>,
    /// End of the grant, if bounded.
    pub expires_on: Option<Timestamp>,
    /// Permissions granted.
    pub permissions: Permissions,
}

impl AccessPolicy {
    /// Creates a policy granting `permissions` for the given window.
    #[must_use]
    pub fn new(permissions: Permissions, window: TimeWindow) -> Self {
        Self {
            starts_on: Some(window.starts_on()),
            expires_on: Some(window.expires_on()),
            permissions,
        }
    }

    /// Returns `true` if the policy is active at `instant`.
    ///
    /// Missing bounds are treated as open.
    #[must_use]
    pub fn is_active_at(&self, instant: Timestamp) -> bool {
        self.starts_on.is_none_or(|starts| starts <= instant)
            && self.expires_on.is_none_or(|expires| instant < expires)
    }
}

/// An [`AccessPolicy`] registered under an id on a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIdentifier {
    id: String,
    policy: AccessPolicy,
}

impl SignedIdentifier {
    /// Creates a signed identifier; the id must be 1-64 characters.
    pub fn new(id: impl Into<String>, policy: AccessPolicy) -> StoreResult<Self> {
        let id = id.into();
        let len = id.chars().count();
        if len == 0 || len > SIGNED_IDENTIFIER_MAX_LEN {
            return Err(StoreError::other(format!(
                "signed identifier id must be 1-{SIGNED_IDENTIFIER_MAX_LEN} characters, got {len}"
            ))
            .with_status(400));
        }

        Ok(Self { id, policy })
    }

    /// Returns the identifier id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the policy.
    #[must_use]
    #[inline]
    pub const fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> Timestamp {
        value.parse().unwrap()
    }

    #[test]
    fn policy_activity_follows_window() {
        let window = TimeWindow::new(ts("2024-05-01T11:45:00Z"), ts("2024-05-01T13:00:00Z")).unwrap();
        let policy = AccessPolicy::new(Permissions::READ_ONLY, window);

        assert!(policy.is_active_at(ts("2024-05-01T12:00:00Z")));
        assert!(!policy.is_active_at(ts("2024-05-01T13:00:00Z")));
        assert!(AccessPolicy::default().is_active_at(ts("2099-01-01T00:00:00Z")));
    }

    #[test]
    fn identifier_id_length() {
        let policy = AccessPolicy::default();
        assert!(SignedIdentifier::new("access-policy-owner", policy).is_ok());
        assert!(SignedIdentifier::new("", policy).is_err());
        assert!(SignedIdentifier::new("x".repeat(65), policy).is_err());
    }

    #[test]
    fn public_access_names() {
        assert_eq!(PublicAccess::default(), PublicAccess::None);
        assert_eq!(PublicAccess::Container.as_ref(), "container");
        assert_eq!("blob".parse::<PublicAccess>().unwrap(), PublicAccess::Blob);
    }
}
