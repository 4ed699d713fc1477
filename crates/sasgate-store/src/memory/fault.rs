//! Fault injection and call journal for the in-memory store.

use std::collections::{HashMap, VecDeque};

use crate::error::StoreError;
use crate::store::StoreOperation;

/// A call received by a [`MemoryStore`].
///
/// [`MemoryStore`]: super::MemoryStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Operation invoked.
    pub operation: StoreOperation,
    /// Container, object location or redacted uri the call targeted.
    pub target: String,
}

/// Queued failures, consumed one per matching call.
#[derive(Debug, Default)]
pub(super) struct Faults {
    pending: HashMap<StoreOperation, VecDeque<StoreError>>,
}

impl Faults {
    pub fn push(&mut self, operation: StoreOperation, error: StoreError) {
        self.pending.entry(operation).or_default().push_back(error);
    }

    pub fn take(&mut self, operation: StoreOperation) -> Option<StoreError> {
        self.pending.get_mut(&operation)?.pop_front()
    }
}
