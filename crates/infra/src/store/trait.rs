use std::sync::Arc;

use thiserror::Error;

use weighpoint_core::{ExpectedVersion, ProductId, SiteId};
use weighpoint_stock::{AlertId, MovementId, StockAlert, StockMovement, Stockpile, StockpileId};
use weighpoint_tickets::{Ticket, TicketId, TicketNumber};

/// Store operation error.
///
/// These are infrastructure failures (versioning, uniqueness, internal
/// state), distinct from domain errors. `VersionConflict` is the only
/// retryable variant: the caller lost an optimistic race and may reload
/// and retry safely.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("duplicate identifier: {0}")]
    Duplicate(String),

    /// A settlement movement already exists for the ticket. The
    /// one-movement-per-ticket index is the backstop that makes duplicate
    /// settlements impossible even under racing retries.
    #[error("ticket already settled: {0}")]
    AlreadySettled(String),

    #[error("referenced entity missing: {0}")]
    Missing(String),

    /// The write violates a stored invariant (balance snapshot mismatch,
    /// cross-linked ids, poisoned lock).
    #[error("invalid write: {0}")]
    InvalidWrite(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict(_))
    }
}

/// One stockpile's share of a multi-pile commit.
#[derive(Debug, Clone)]
pub struct StockpileWrite {
    pub stockpile: Stockpile,
    pub expected: ExpectedVersion,
    pub movement: StockMovement,
}

/// The transactional contract the weighing core requires of its store.
///
/// Writes are compare-and-swap per entity, keyed by aggregate version.
/// The multi-entity commits (`settle_ticket`, `commit_transfer`) must be
/// atomic: every version check and invariant is validated before anything
/// is applied, and a failure leaves no observable change. Implementations
/// against a real backend would map these onto database transactions.
pub trait WeighbridgeStore: Send + Sync {
    /// Allocate the next ticket number for the deployment. Monotonic,
    /// never reused, gaps allowed (an allocation may be abandoned).
    fn allocate_ticket_number(&self, year: i32) -> Result<TicketNumber, StoreError>;

    fn insert_ticket(&self, ticket: Ticket) -> Result<(), StoreError>;
    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError>;
    fn update_ticket(&self, ticket: Ticket, expected: ExpectedVersion) -> Result<(), StoreError>;

    fn insert_stockpile(&self, stockpile: Stockpile) -> Result<(), StoreError>;
    fn stockpile(&self, id: StockpileId) -> Result<Option<Stockpile>, StoreError>;
    /// The target pile for a ticket settlement: one product at one site.
    fn find_stockpile(
        &self,
        site_id: SiteId,
        product_id: ProductId,
    ) -> Result<Option<Stockpile>, StoreError>;
    fn stockpiles(
        &self,
        site_id: Option<SiteId>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Stockpile>, StoreError>;

    /// Append one movement and swap in the updated stockpile, atomically.
    fn append_movement(
        &self,
        stockpile: Stockpile,
        expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError>;

    /// Commit a ticket settlement: the finalized ticket, its single ledger
    /// movement, and the updated stockpile, all or nothing.
    fn settle_ticket(
        &self,
        ticket: Ticket,
        ticket_expected: ExpectedVersion,
        stockpile: Stockpile,
        stockpile_expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError>;

    /// Commit both legs of a transfer, all or nothing.
    fn commit_transfer(
        &self,
        source: StockpileWrite,
        destination: StockpileWrite,
    ) -> Result<(), StoreError>;

    fn movement_for_ticket(&self, ticket_id: TicketId)
    -> Result<Option<StockMovement>, StoreError>;
    fn movements_for_stockpile(
        &self,
        stockpile_id: StockpileId,
    ) -> Result<Vec<StockMovement>, StoreError>;

    fn insert_alert(&self, alert: StockAlert) -> Result<(), StoreError>;
    fn alert(&self, id: AlertId) -> Result<Option<StockAlert>, StoreError>;
    fn update_alert(&self, alert: StockAlert) -> Result<(), StoreError>;
    fn active_alerts_for(&self, stockpile_id: StockpileId) -> Result<Vec<StockAlert>, StoreError>;
    /// The current alert set, optionally narrowed to one site.
    fn active_alerts(&self, site_id: Option<SiteId>) -> Result<Vec<StockAlert>, StoreError>;

    /// Sync bookkeeping hooks for the external synchronizer (single
    /// writer). These bypass version checks by design.
    fn mark_ticket_synced(&self, id: TicketId) -> Result<(), StoreError>;
    fn mark_movement_synced(&self, id: MovementId) -> Result<(), StoreError>;
}

impl<S> WeighbridgeStore for Arc<S>
where
    S: WeighbridgeStore + ?Sized,
{
    fn allocate_ticket_number(&self, year: i32) -> Result<TicketNumber, StoreError> {
        (**self).allocate_ticket_number(year)
    }

    fn insert_ticket(&self, ticket: Ticket) -> Result<(), StoreError> {
        (**self).insert_ticket(ticket)
    }

    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        (**self).ticket(id)
    }

    fn update_ticket(&self, ticket: Ticket, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).update_ticket(ticket, expected)
    }

    fn insert_stockpile(&self, stockpile: Stockpile) -> Result<(), StoreError> {
        (**self).insert_stockpile(stockpile)
    }

    fn stockpile(&self, id: StockpileId) -> Result<Option<Stockpile>, StoreError> {
        (**self).stockpile(id)
    }

    fn find_stockpile(
        &self,
        site_id: SiteId,
        product_id: ProductId,
    ) -> Result<Option<Stockpile>, StoreError> {
        (**self).find_stockpile(site_id, product_id)
    }

    fn stockpiles(
        &self,
        site_id: Option<SiteId>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Stockpile>, StoreError> {
        (**self).stockpiles(site_id, product_id)
    }

    fn append_movement(
        &self,
        stockpile: Stockpile,
        expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError> {
        (**self).append_movement(stockpile, expected, movement)
    }

    fn settle_ticket(
        &self,
        ticket: Ticket,
        ticket_expected: ExpectedVersion,
        stockpile: Stockpile,
        stockpile_expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError> {
        (**self).settle_ticket(
            ticket,
            ticket_expected,
            stockpile,
            stockpile_expected,
            movement,
        )
    }

    fn commit_transfer(
        &self,
        source: StockpileWrite,
        destination: StockpileWrite,
    ) -> Result<(), StoreError> {
        (**self).commit_transfer(source, destination)
    }

    fn movement_for_ticket(
        &self,
        ticket_id: TicketId,
    ) -> Result<Option<StockMovement>, StoreError> {
        (**self).movement_for_ticket(ticket_id)
    }

    fn movements_for_stockpile(
        &self,
        stockpile_id: StockpileId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements_for_stockpile(stockpile_id)
    }

    fn insert_alert(&self, alert: StockAlert) -> Result<(), StoreError> {
        (**self).insert_alert(alert)
    }

    fn alert(&self, id: AlertId) -> Result<Option<StockAlert>, StoreError> {
        (**self).alert(id)
    }

    fn update_alert(&self, alert: StockAlert) -> Result<(), StoreError> {
        (**self).update_alert(alert)
    }

    fn active_alerts_for(&self, stockpile_id: StockpileId) -> Result<Vec<StockAlert>, StoreError> {
        (**self).active_alerts_for(stockpile_id)
    }

    fn active_alerts(&self, site_id: Option<SiteId>) -> Result<Vec<StockAlert>, StoreError> {
        (**self).active_alerts(site_id)
    }

    fn mark_ticket_synced(&self, id: TicketId) -> Result<(), StoreError> {
        (**self).mark_ticket_synced(id)
    }

    fn mark_movement_synced(&self, id: MovementId) -> Result<(), StoreError> {
        (**self).mark_movement_synced(id)
    }
}
