use std::fmt;

use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::extract::Path;
use crate::handler::{Error, ErrorKind};

/// Version prefix used in version strings (e.g., "v1", "v1.0").
const VERSION_PREFIX: char = 'v';

/// API versions served by this build.
const SUPPORTED_VERSIONS: &[Version] = &[Version::V1_0];

/// API version taken from the `{version}` path segment.
///
/// Accepts `v{major}` and `v{major}.{minor}`, a missing minor part reads as
/// `0`. Extraction fails with `404 unsupported_api_version` for anything that
/// does not parse or is not served.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
}

impl Version {
    /// The only version currently served.
    pub const V1_0: Self = Self::from_parts(1, 0);

    /// Creates a version from its parts.
    #[inline]
    pub const fn from_parts(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses a version string such as `v1` or `v1.0`.
    ///
    /// ```rust
    /// # use sasgate_server::extract::Version;
    /// assert_eq!(Version::parse("v1"), Some(Version::V1_0));
    /// assert_eq!(Version::parse("v1.0"), Some(Version::V1_0));
    /// assert_eq!(Version::parse("1.0"), None);
    /// ```
    pub fn parse(version: &str) -> Option<Self> {
        let number = version.strip_prefix(VERSION_PREFIX)?;
        let (major, minor) = match number.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (number, None),
        };

        let major = parse_component(major)?;
        let minor = match minor {
            Some(minor) => parse_component(minor)?,
            None => 0,
        };

        Some(Self::from_parts(major, minor))
    }

    /// Returns the major version.
    #[inline]
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Returns the minor version.
    #[inline]
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns `true` if this build serves the version.
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(self)
    }
}

/// Parses one numeric component, rejecting signs and empty strings.
fn parse_component(component: &str) -> Option<u32> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    component.parse().ok()
}

impl Default for Version {
    #[inline]
    fn default() -> Self {
        Self::V1_0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", VERSION_PREFIX, self.major, self.minor)
    }
}

/// The `{version}` path segment.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct VersionParams {
    /// API version, `v1` or `v1.0`.
    version: String,
}

impl<S> FromRequestParts<S> for Version
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = parts.extract::<Path<VersionParams>>().await?;

        match Self::parse(&params.version) {
            Some(version) if version.is_supported() => Ok(version),
            _ => Err(ErrorKind::UnsupportedApiVersion
                .with_message(format!("API version '{}' is not served", params.version))
                .with_resource(params.version)
                .with_suggestion(format!("Use {}", Self::V1_0))),
        }
    }
}

impl aide::OperationInput for Version {
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        <Path<VersionParams> as aide::OperationInput>::operation_input(ctx, operation);
    }
}
