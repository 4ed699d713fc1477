//! Validated container and object names.

use std::fmt;
use std::str::FromStr;

use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Minimum length of a container name.
pub const CONTAINER_NAME_MIN_LEN: usize = 3;

/// Maximum length of a container name.
pub const CONTAINER_NAME_MAX_LEN: usize = 63;

/// Maximum length of an object name.
pub const OBJECT_NAME_MAX_LEN: usize = 1024;

/// Name of a container within a store account.
///
/// Lowercase letters, digits and single dashes, starting and ending with a
/// letter or digit, 3 to 63 characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Deref, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerName(String);

impl ContainerName {
    /// Validates and wraps a container name.
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        validate_container_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_container_name(name: &str) -> StoreResult<()> {
    let len = name.len();
    if !(CONTAINER_NAME_MIN_LEN..=CONTAINER_NAME_MAX_LEN).contains(&len) {
        return Err(StoreError::invalid_name(format!(
            "container name must be {CONTAINER_NAME_MIN_LEN}-{CONTAINER_NAME_MAX_LEN} characters, got {len}"
        )));
    }

    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
    if let Some(c) = name.chars().find(|c| !valid_char(*c)) {
        return Err(StoreError::invalid_name(format!(
            "container name contains invalid character {c:?}"
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(StoreError::invalid_name(
            "container name must start and end with a letter or digit",
        ));
    }

    if name.contains("--") {
        return Err(StoreError::invalid_name(
            "container name must not contain consecutive dashes",
        ));
    }

    Ok(())
}

impl FromStr for ContainerName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerName {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for ContainerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ContainerName> for String {
    fn from(value: ContainerName) -> Self {
        value.0
    }
}

/// Name of an object (blob) within a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Deref, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName(String);

impl ObjectName {
    /// Validates and wraps an object name.
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();

        if name.is_empty() || name.chars().count() > OBJECT_NAME_MAX_LEN {
            return Err(StoreError::invalid_name(format!(
                "object name must be 1-{OBJECT_NAME_MAX_LEN} characters"
            )));
        }

        if name.ends_with('.') || name.ends_with('/') {
            return Err(StoreError::invalid_name(
                "object name must not end with a dot or a slash",
            ));
        }

        if name.chars().any(char::is_control) {
            return Err(StoreError::invalid_name(
                "object name must not contain control characters",
            ));
        }

        // URL path normalisation would drop these, so the signed resource and
        // the addressed one would differ.
        if name
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(StoreError::invalid_name(
                "object name must not contain empty, `.` or `..` path segments",
            ));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ObjectName> for String {
    fn from(value: ObjectName) -> Self {
        value.0
    }
}

/// Address of a single object within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Container holding the object.
    pub container: ContainerName,
    /// Object name within the container.
    pub object: ObjectName,
}

impl ObjectLocation {
    /// Creates a new object location.
    #[must_use]
    pub fn new(container: ContainerName, object: ObjectName) -> Self {
        Self { container, object }
    }

    /// Validates both names and creates a location.
    pub fn parse(container: &str, object: &str) -> StoreResult<Self> {
        Ok(Self::new(ContainerName::new(container)?, ObjectName::new(object)?))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.object)
    }
}
