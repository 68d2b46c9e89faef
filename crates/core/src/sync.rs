//! Offline-sync marker for edge deployments.

use serde::{Deserialize, Serialize};

/// Whether a locally-mutated record has been propagated to the external
/// system of record.
///
/// Every local mutation resets the record to `Pending`; an external
/// synchronizer (single writer, out of scope here) later flips it to
/// `Synced`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
}

impl SyncStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, SyncStatus::Pending)
    }
}
