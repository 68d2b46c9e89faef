use serde::{Deserialize, Serialize};

/// Human-readable ticket number, e.g. `TKT-2026-000042`.
///
/// Sequences are allocated monotonically per deployment by the store; the
/// year is fixed at allocation time so numbers sort with creation order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketNumber {
    year: i32,
    sequence: u64,
}

impl TicketNumber {
    pub fn new(year: i32, sequence: u64) -> Self {
        Self { year, sequence }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for TicketNumber {
    /// Placeholder used by empty aggregates awaiting rehydration.
    fn default() -> Self {
        Self { year: 0, sequence: 0 }
    }
}

impl core::fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TKT-{}-{:06}", self.year, self.sequence)
    }
}
