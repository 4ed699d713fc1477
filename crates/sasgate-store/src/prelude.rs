//! Prelude module for convenient imports.

pub use crate::azure::{AzureBlobConfig, AzureBlobStore};
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::error::{StoreError, StoreErrorKind, StoreResult};
pub use crate::memory::MemoryStore;
pub use crate::store::{ObjectStore, StoreOperation, StoreService};
pub use crate::types::{
    AccessPolicy, ContainerName, IpRestriction, Ipv4Range, ObjectLocation, ObjectName, Permission,
    Permissions, PublicAccess, SasRequest, SignedIdentifier, SignedUri, TimeWindow,
};
