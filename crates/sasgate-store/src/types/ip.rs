//! Source-address restrictions embedded in signed URIs.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipnet::Ipv4AddrRange;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Source-address restriction of a signed URI (the `sip` field).
///
/// Either a single address or an inclusive IPv4 range such as
/// `10.0.0.1-10.0.0.64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpRestriction {
    /// Exactly one address.
    Single(IpAddr),
    /// Inclusive IPv4 range.
    Range(Ipv4Range),
}

impl IpRestriction {
    /// Creates an inclusive IPv4 range, rejecting inverted bounds.
    pub fn range(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, StoreError> {
        Ipv4Range::new(start, end).map(Self::Range)
    }

    /// Returns `true` if requests from `ip` are allowed.
    #[must_use]
    pub fn allows(&self, ip: IpAddr) -> bool {
        match (self, ip) {
            (Self::Single(allowed), ip) => *allowed == ip,
            (Self::Range(range), IpAddr::V4(ip)) => range.contains(ip),
            (Self::Range(range), IpAddr::V6(ip)) => ip
                .to_ipv4_mapped()
                .is_some_and(|ip| range.contains(ip)),
        }
    }
}

/// Non-empty inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range(Ipv4AddrRange);

impl Ipv4Range {
    /// Creates a range from `start` to `end`, both included.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, StoreError> {
        if start > end {
            return Err(StoreError::other(format!(
                "ip range start {start} is after its end {end}"
            ))
            .with_status(400));
        }

        Ok(Self(Ipv4AddrRange::new(start, end)))
    }

    /// Returns the first address of the range.
    #[must_use]
    pub fn start(&self) -> Option<Ipv4Addr> {
        Iterator::min(self.0)
    }

    /// Returns the last address of the range.
    #[must_use]
    pub fn end(&self) -> Option<Ipv4Addr> {
        Iterator::max(self.0)
    }

    /// Returns `true` if `ip` lies within the range.
    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.start().is_some_and(|start| start <= ip) && self.end().is_some_and(|end| ip <= end)
    }

    /// Iterates over the addresses of the range.
    #[must_use]
    pub fn addrs(&self) -> Ipv4AddrRange {
        self.0
    }
}

impl fmt::Display for Ipv4Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => write!(f, "{start}-{end}"),
            _ => Ok(()),
        }
    }
}

impl Default for IpRestriction {
    fn default() -> Self {
        Self::Single(IpAddr::V4(Ipv4Addr::new(1, 0, 0, 0)))
    }
}

impl FromStr for IpRestriction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |e: std::net::AddrParseError| {
            StoreError::other(format!("invalid ip restriction {s:?}"))
                .with_status(400)
                .with_source(e)
        };

        match s.trim().split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse::<Ipv4Addr>().map_err(invalid)?;
                let end = end.trim().parse::<Ipv4Addr>().map_err(invalid)?;
                Self::range(start, end)
            }
            None => s.trim().parse::<IpAddr>().map(Self::Single).map_err(invalid),
        }
    }
}

impl TryFrom<String> for IpRestriction {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpRestriction> for String {
    fn from(value: IpRestriction) -> Self {
        value.to_string()
    }
}

impl From<IpAddr> for IpRestriction {
    fn from(value: IpAddr) -> Self {
        Self::Single(value)
    }
}

impl fmt::Display for IpRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{ip}"),
            Self::Range(range) => range.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_range() {
        let single: IpRestriction = "203.0.113.7".parse().unwrap();
        assert_eq!(single.to_string(), "203.0.113.7");

        let range: IpRestriction = "10.0.0.1-10.0.0.64".parse().unwrap();
        assert_eq!(range.to_string(), "10.0.0.1-10.0.0.64");
    }

    #[test]
    fn rejects_garbage_and_inverted_ranges() {
        assert!("not-an-ip".parse::<IpRestriction>().is_err());
        assert!("10.0.0.9-10.0.0.1".parse::<IpRestriction>().is_err());
    }

    #[test]
    fn allows_matching_addresses() {
        let range: IpRestriction = "10.0.0.1-10.0.0.64".parse().unwrap();
        assert!(range.allows("10.0.0.1".parse().unwrap()));
        assert!(range.allows("10.0.0.64".parse().unwrap()));
        assert!(!range.allows("10.0.0.65".parse().unwrap()));
        assert!(range.allows("::ffff:10.0.0.2".parse().unwrap()));
        assert!(!range.allows("::1".parse().unwrap()));

        let single = IpRestriction::default();
        assert_eq!(single.to_string(), "1.0.0.0");
        assert!(single.allows("1.0.0.0".parse().unwrap()));
        assert!(!single.allows("1.0.0.1".parse().unwrap()));
    }

    #[test]
    fn ranges_expose_their_bounds() {
        let Ok(IpRestriction::Range(range)) = "192.168.1.250-192.168.2.3".parse() else {
            panic!("expected a range");
        };

        assert_eq!(range.start(), Some(Ipv4Addr::new(192, 168, 1, 250)));
        assert_eq!(range.end(), Some(Ipv4Addr::new(192, 168, 2, 3)));
        assert_eq!(range.addrs().count(), 10);
        assert_eq!(range.addrs().nth(6), Some(Ipv4Addr::new(192, 168, 2, 0)));
        assert!(range.contains(Ipv4Addr::new(192, 168, 2, 0)));
        assert!(!range.contains(Ipv4Addr::new(192, 168, 1, 249)));
    }

    #[test]
    fn single_address_ranges_are_allowed() {
        let range = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        assert_eq!(range.addrs().count(), 1);
        assert_eq!(range.to_string(), "10.0.0.5-10.0.0.5");
        assert!(range.contains(Ipv4Addr::new(10, 0, 0, 5)));
    }
}
