//! In-flight index builds awaiting readiness

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::spec::{IndexSpec, SpecKey};

/// One index whose creation is still in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub key: SpecKey,
    pub spec: IndexSpec,
    /// Resource name of the index being built
    pub index_name: String,
    /// Long-running operation that is building it
    pub operation_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(
        key: SpecKey,
        spec: IndexSpec,
        index_name: impl Into<String>,
        operation_name: impl Into<String>,
    ) -> Self {
        Self {
            key,
            spec,
            index_name: index_name.into(),
            operation_name: operation_name.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Pending operations keyed by their spec's batch position
///
/// Entries only ever leave the set; nothing re-enters once removed.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    entries: BTreeMap<SpecKey, PendingOperation>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: PendingOperation) {
        self.entries.insert(op.key, op);
    }

    pub fn remove(&mut self, key: SpecKey) -> Option<PendingOperation> {
        self.entries.remove(&key)
    }

    pub fn get(&self, key: SpecKey) -> Option<&PendingOperation> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (key, index name) of every entry, for a polling round
    pub fn targets(&self) -> Vec<(SpecKey, String)> {
        self.entries
            .values()
            .map(|op| (op.key, op.index_name.clone()))
            .collect()
    }
}

impl FromIterator<PendingOperation> for PendingSet {
    fn from_iter<I: IntoIterator<Item = PendingOperation>>(iter: I) -> Self {
        let mut set = Self::new();
        for op in iter {
            set.insert(op);
        }
        set
    }
}
