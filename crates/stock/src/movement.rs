use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weighpoint_core::{AggregateId, OperatorId, ProductId, SiteId, SyncStatus, Tonnes};
use weighpoint_orders::OrderId;
use weighpoint_tickets::TicketId;

use crate::stockpile::StockpileId;

/// Movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub AggregateId);

impl MovementId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which way the movement changes the stockpile balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

/// Reporting classification of a movement, derived from its provenance
/// and direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Inbound,
    Outbound,
    Adjustment,
    Transfer,
}

/// Closed set of reasons for a manual stock adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    PhysicalCount,
    EvaporationLoss,
    Spillage,
    QualityDowngrade,
    SystemCorrection,
    Theft,
    Other,
}

/// Which side of a transfer this movement records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferLeg {
    Outgoing,
    Incoming,
}

/// Where a movement came from. Exactly one kind per movement, enforced at
/// construction rather than by nullable-field convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementProvenance {
    /// Settlement of a finalized weighing ticket.
    Ticket {
        ticket_id: TicketId,
        order_id: Option<OrderId>,
    },
    /// Manual correction (stocktake, loss, recount).
    Adjustment {
        reason: AdjustmentReason,
        notes: Option<String>,
    },
    /// One leg of a two-movement transfer. `counterpart_stockpile_id` is
    /// the other pile; each leg touches exactly one balance.
    Transfer {
        counterpart_stockpile_id: StockpileId,
        leg: TransferLeg,
    },
}

/// One ledger entry: a signed quantity change against a single stockpile.
///
/// Movements are immutable once created; corrections are new movements,
/// never edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub stockpile_id: StockpileId,
    pub site_id: SiteId,
    pub product_id: ProductId,

    pub direction: MovementDirection,
    /// Absolute quantity moved.
    pub quantity_tonnes: Tonnes,
    /// Positive increases the stockpile balance, negative decreases it.
    pub signed_quantity_tonnes: Tonnes,

    /// Balance snapshot pair; `after = before + signed` is checked on write.
    pub balance_before_tonnes: Tonnes,
    pub balance_after_tonnes: Tonnes,

    pub provenance: MovementProvenance,
    pub recorded_by: OperatorId,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl StockMovement {
    /// The snapshot-pair invariant every stored movement must satisfy.
    pub fn balances(&self) -> bool {
        self.balance_after_tonnes == self.balance_before_tonnes + self.signed_quantity_tonnes
    }

    pub fn movement_type(&self) -> MovementType {
        match (&self.provenance, self.direction) {
            (MovementProvenance::Ticket { .. }, MovementDirection::In) => MovementType::Inbound,
            (MovementProvenance::Ticket { .. }, MovementDirection::Out) => MovementType::Outbound,
            (MovementProvenance::Adjustment { .. }, _) => MovementType::Adjustment,
            (MovementProvenance::Transfer { .. }, _) => MovementType::Transfer,
        }
    }

    pub fn ticket_id(&self) -> Option<TicketId> {
        match &self.provenance {
            MovementProvenance::Ticket { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }
}
