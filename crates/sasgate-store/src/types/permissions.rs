//! Permission sets carried by access policies and shared access signatures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A single permission letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Permission {
    /// `r`: read content and metadata.
    Read = 1 << 0,
    /// `a`: append blocks.
    Add = 1 << 1,
    /// `c`: create new objects.
    Create = 1 << 2,
    /// `w`: write or overwrite content.
    Write = 1 << 3,
    /// `d`: delete objects.
    Delete = 1 << 4,
    /// `l`: list objects.
    List = 1 << 5,
}

impl Permission {
    /// All permissions in canonical signature order.
    pub const ALL: [Self; 6] = [
        Self::Read,
        Self::Add,
        Self::Create,
        Self::Write,
        Self::Delete,
        Self::List,
    ];

    /// Returns the permission letter.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Read => 'r',
            Self::Add => 'a',
            Self::Create => 'c',
            Self::Write => 'w',
            Self::Delete => 'd',
            Self::List => 'l',
        }
    }

    /// Parses a permission letter.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(Self::Read),
            'a' => Some(Self::Add),
            'c' => Some(Self::Create),
            'w' => Some(Self::Write),
            'd' => Some(Self::Delete),
            'l' => Some(Self::List),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        self as u8
    }
}

/// A set of [`Permission`]s.
///
/// Parses letters in any order and always renders them in the canonical
/// `racwdl` order required by signed URIs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permissions(u8);

impl Permissions {
    /// No permissions.
    pub const NONE: Self = Self(0);
    /// `r`: the read-only grant handed to callers.
    pub const READ_ONLY: Self = Self(Permission::Read.bit());
    /// `rcw`: the short-lived ingestion grant.
    pub const WRITE: Self =
        Self(Permission::Read.bit() | Permission::Create.bit() | Permission::Write.bit());
    /// `racwdl`: full owner grant.
    pub const OWNER: Self = Self(
        Permission::Read.bit()
            | Permission::Add.bit()
            | Permission::Create.bit()
            | Permission::Write.bit()
            | Permission::Delete.bit()
            | Permission::List.bit(),
    );

    /// Returns `true` if the permission is part of the set.
    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    /// Returns `true` if every permission of `self` is also in `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the set allows writing content (create or write).
    #[must_use]
    pub const fn allows_write(self) -> bool {
        self.contains(Permission::Create) || self.contains(Permission::Write)
    }

    /// Iterates the permissions in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::NONE, |acc, p| Self(acc.0 | p.bit()))
    }
}

impl FromStr for Permissions {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::NONE;
        for c in s.chars() {
            let permission = Permission::from_char(c).ok_or_else(|| {
                StoreError::other(format!("unknown permission letter {c:?}")).with_status(400)
            })?;

            if set.contains(permission) {
                return Err(
                    StoreError::other(format!("duplicate permission letter {c:?}")).with_status(400)
                );
            }

            set = Self(set.0 | permission.bit());
        }

        Ok(set)
    }
}

impl TryFrom<String> for Permissions {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permissions> for String {
    fn from(value: Permissions) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for permission in self.iter() {
            write!(f, "{}", permission.as_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Permissions({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_canonical_order() {
        let permissions: Permissions = "wcr".parse().unwrap();
        assert_eq!(permissions.to_string(), "rcw");
        assert_eq!(permissions, Permissions::WRITE);
        assert_eq!(Permissions::OWNER.to_string(), "racwdl");
        assert_eq!(Permissions::READ_ONLY.to_string(), "r");
    }

    #[test]
    fn rejects_unknown_and_duplicate_letters() {
        assert!("rx".parse::<Permissions>().is_err());
        assert!("rr".parse::<Permissions>().is_err());
    }

    #[test]
    fn subset_relation() {
        assert!(Permissions::READ_ONLY.is_subset_of(Permissions::WRITE));
        assert!(Permissions::WRITE.is_subset_of(Permissions::OWNER));
        assert!(!Permissions::WRITE.is_subset_of(Permissions::READ_ONLY));
        assert!(Permissions::NONE.is_subset_of(Permissions::READ_ONLY));
    }

    #[test]
    fn union_and_write_detection() {
        let union = Permissions::READ_ONLY.union("d".parse().unwrap());
        assert_eq!(union.to_string(), "rd");
        assert!(!union.allows_write());
        assert!(Permissions::WRITE.allows_write());
    }

    #[test]
    fn collects_from_iterator() {
        let permissions: Permissions = [Permission::List, Permission::Read].into_iter().collect();
        assert_eq!(permissions.to_string(), "rl");

        let write: Permissions = [Permission::Write, Permission::Create, Permission::Read]
            .into_iter()
            .collect();
        assert_eq!(write, Permissions::WRITE);
    }
}
