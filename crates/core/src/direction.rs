//! Direction of material flow relative to the site.

use serde::{Deserialize, Serialize};

/// Whether material is being received into the site or dispatched out of it.
///
/// Direction determines which side of the ledger a settlement lands on; the
/// weighing sequence itself (tare, then gross) is direction-agnostic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}
