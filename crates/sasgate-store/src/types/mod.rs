//! Value types shared by every [`ObjectStore`] implementation.
//!
//! [`ObjectStore`]: crate::ObjectStore

mod capability;
mod ip;
mod name;
mod permissions;
mod policy;
mod window;

pub use capability::{SasRequest, SignedUri};
pub use ip::{IpRestriction, Ipv4Range};
pub use name::{
    CONTAINER_NAME_MAX_LEN, CONTAINER_NAME_MIN_LEN, ContainerName, OBJECT_NAME_MAX_LEN,
    ObjectLocation, ObjectName,
};
pub use permissions::{Permission, Permissions};
pub use policy::{
    AccessPolicy, MAX_SIGNED_IDENTIFIERS, PublicAccess, SIGNED_IDENTIFIER_MAX_LEN,
    SignedIdentifier,
};
pub use window::{SAS_TIME_FORMAT, TimeWindow, format_sas_time, offset, parse_sas_time};
