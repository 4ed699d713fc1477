//! Signing requests and the signed URIs (capabilities) they produce.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Serialize, Serializer};
use url::Url;

use super::window::parse_sas_time;
use super::{ContainerName, IpRestriction, ObjectLocation, ObjectName, Permissions, TimeWindow};
use crate::error::{StoreError, StoreResult};

/// Input of [`ObjectStore::sign_object`].
///
/// The resource scope is always a single object.
///
/// [`ObjectStore::sign_object`]: crate::ObjectStore::sign_object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasRequest {
    /// Object the capability grants access to.
    pub location: ObjectLocation,
    /// Permissions encoded in the capability.
    pub permissions: Permissions,
    /// Validity window of the capability.
    pub window: TimeWindow,
    /// Source-address restriction.
    pub ip_restriction: Option<IpRestriction>,
    /// Container policy the capability refers to, if any.
    pub policy_id: Option<String>,
}

impl SasRequest {
    /// Creates an ad-hoc request with no ip restriction or policy reference.
    #[must_use]
    pub fn new(location: ObjectLocation, permissions: Permissions, window: TimeWindow) -> Self {
        Self {
            location,
            permissions,
            window,
            ip_restriction: None,
            policy_id: None,
        }
    }

    /// Restricts the capability to the given source addresses.
    #[must_use]
    pub fn with_ip_restriction(mut self, ip_restriction: IpRestriction) -> Self {
        self.ip_restriction = Some(ip_restriction);
        self
    }

    /// Binds the capability to a container policy.
    #[must_use]
    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }
}

/// A capability URI: possession alone grants the encoded access.
///
/// Serializes as a bare string. Use [`SignedUri::redacted`] when logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedUri {
    url: Url,
    location: ObjectLocation,
    permissions: Permissions,
    starts_on: Option<Timestamp>,
    expires_on: Timestamp,
    ip_restriction: Option<IpRestriction>,
    policy_id: Option<String>,
}

impl SignedUri {
    /// Wraps a signed url whose object location is already known.
    ///
    /// The signature itself is not checked here, only the shape of the query.
    pub fn from_parts(url: Url, location: ObjectLocation) -> StoreResult<Self> {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let malformed = |what: &str| StoreError::access_denied(format!("signed uri {what}")).with_status(403);

        if param("sig").is_none() {
            return Err(malformed("carries no signature"));
        }

        if param("sr").as_deref() != Some("b") {
            return Err(malformed("is not scoped to a single object"));
        }

        let permissions: Permissions = param("sp")
            .ok_or_else(|| malformed("has no permissions"))?
            .parse()
            .map_err(|e| malformed("has invalid permissions").with_source(e))?;

        let expires_on = param("se")
            .ok_or_else(|| malformed("has no expiry"))
            .and_then(|se| parse_sas_time(&se).map_err(|e| malformed("has an invalid expiry").with_source(e)))?;

        let starts_on = param("st")
            .map(|st| parse_sas_time(&st).map_err(|e| malformed("has an invalid start").with_source(e)))
            .transpose()?;

        if starts_on.is_some_and(|starts| expires_on <= starts) {
            return Err(malformed("expires before it starts"));
        }

        let ip_restriction = param("sip")
            .map(|sip| sip.parse::<IpRestriction>().map_err(|e| malformed("has an invalid ip restriction").with_source(e)))
            .transpose()?;

        Ok(Self {
            location,
            permissions,
            starts_on,
            expires_on,
            ip_restriction,
            policy_id: param("si"),
            url,
        })
    }

    /// Parses a signed url, deriving the object location from its path.
    ///
    /// Hosts given as an ip address or `localhost` use path-style addressing
    /// (`/{account}/{container}/{object}`), all others virtual-hosted style
    /// (`/{container}/{object}`).
    pub fn parse(input: &str) -> StoreResult<Self> {
        let url = Url::parse(input).map_err(|e| {
            StoreError::access_denied("signed uri is not a valid url")
                .with_status(403)
                .with_source(e)
        })?;

        let path_style = match url.host() {
            Some(url::Host::Ipv4(_) | url::Host::Ipv6(_)) => true,
            Some(url::Host::Domain(domain)) => domain == "localhost",
            None => false,
        };

        let mut segments = url
            .path_segments()
            .map(|segments| segments.map(decode_segment).collect::<Vec<_>>())
            .unwrap_or_default();

        if path_style && !segments.is_empty() {
            segments.remove(0);
        }

        if segments.len() < 2 {
            return Err(StoreError::access_denied("signed uri does not address an object").with_status(403));
        }

        let container = ContainerName::new(segments.remove(0))?;
        let object = ObjectName::new(segments.join("/"))?;
        Self::from_parts(url, ObjectLocation::new(container, object))
    }

    /// Returns the full url, signature included.
    #[must_use]
    #[inline]
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Returns the full url as a string, signature included.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the object the capability grants access to.
    #[must_use]
    #[inline]
    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Returns the encoded permissions.
    #[must_use]
    #[inline]
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Returns the start of validity, if encoded.
    #[must_use]
    #[inline]
    pub const fn starts_on(&self) -> Option<Timestamp> {
        self.starts_on
    }

    /// Returns the end of validity.
    #[must_use]
    #[inline]
    pub const fn expires_on(&self) -> Timestamp {
        self.expires_on
    }

    /// Returns the source-address restriction, if encoded.
    #[must_use]
    #[inline]
    pub const fn ip_restriction(&self) -> Option<IpRestriction> {
        self.ip_restriction
    }

    /// Returns the referenced container policy id, if any.
    #[must_use]
    pub fn policy_id(&self) -> Option<&str> {
        self.policy_id.as_deref()
    }

    /// Returns the raw value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns `true` if the capability is usable at `instant` from `ip`.
    ///
    /// Only the encoded constraints are checked; the signature and the
    /// container policies are the store's concern.
    #[must_use]
    pub fn permits_at(&self, instant: Timestamp, ip: Option<IpAddr>) -> bool {
        let in_window =
            self.starts_on.is_none_or(|starts| starts <= instant) && instant < self.expires_on;
        let ip_allowed = match (self.ip_restriction, ip) {
            (Some(restriction), Some(ip)) => restriction.allows(ip),
            _ => true,
        };
        in_window && ip_allowed
    }

    /// Returns the url with the signature replaced, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(key, value)| {
                let value = if key == "sig" { "REDACTED".into() } else { value.into_owned() };
                (key.into_owned(), value)
            })
            .collect();

        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }

    /// Consumes the capability and returns its url.
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }
}

impl FromStr for SignedUri {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for SignedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedUri")
            .field("url", &self.redacted())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SignedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Serialize for SignedUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.url.as_str())
    }
}

/// Decodes `%XX` escapes of a url path segment.
fn decode_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
