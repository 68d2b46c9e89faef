use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use weighpoint_core::{AggregateRoot, ExpectedVersion, ProductId, SiteId, SyncStatus};
use weighpoint_stock::{AlertId, MovementId, StockAlert, StockMovement, Stockpile, StockpileId};
use weighpoint_tickets::{Ticket, TicketId, TicketNumber};

use super::r#trait::{StockpileWrite, StoreError, WeighbridgeStore};

#[derive(Debug, Default)]
struct StoreState {
    tickets: HashMap<TicketId, Ticket>,
    stockpiles: HashMap<StockpileId, Stockpile>,
    /// One pile per (site, product): the settlement target must be
    /// unambiguous.
    stockpiles_by_scope: HashMap<(SiteId, ProductId), StockpileId>,
    movements: HashMap<MovementId, StockMovement>,
    /// Ledger order (append sequence across all stockpiles).
    movement_log: Vec<MovementId>,
    /// One-movement-per-ticket uniqueness index.
    movements_by_ticket: HashMap<TicketId, MovementId>,
    alerts: HashMap<AlertId, StockAlert>,
    ticket_sequence: u64,
}

/// In-memory transactional store.
///
/// Intended for tests and single-process edge deployments. One lock over
/// the whole state: a write guard is the transaction boundary, so the
/// multi-entity commits are trivially atomic. Not optimized for
/// performance.
#[derive(Debug, Default)]
pub struct InMemoryWeighbridgeStore {
    state: RwLock<StoreState>,
}

impl InMemoryWeighbridgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::InvalidWrite("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::InvalidWrite("lock poisoned".to_string()))
    }
}

/// Validate a movement against the post-commit stockpile snapshot and the
/// store's uniqueness indexes. Called before any mutation.
fn check_movement(
    state: &StoreState,
    stockpile: &Stockpile,
    movement: &StockMovement,
) -> Result<(), StoreError> {
    if !movement.balances() {
        return Err(StoreError::InvalidWrite(format!(
            "movement {} snapshot pair does not balance",
            movement.id
        )));
    }
    if movement.stockpile_id != stockpile.id_typed() {
        return Err(StoreError::InvalidWrite(format!(
            "movement {} targets a different stockpile",
            movement.id
        )));
    }
    if stockpile.current_quantity_tonnes() != movement.balance_after_tonnes {
        return Err(StoreError::InvalidWrite(format!(
            "stockpile balance does not match movement {} balance_after",
            movement.id
        )));
    }
    if state.movements.contains_key(&movement.id) {
        return Err(StoreError::Duplicate(format!("movement {}", movement.id)));
    }
    if let Some(ticket_id) = movement.ticket_id() {
        if state.movements_by_ticket.contains_key(&ticket_id) {
            return Err(StoreError::AlreadySettled(ticket_id.to_string()));
        }
    }
    Ok(())
}

fn check_stockpile_version(
    state: &StoreState,
    id: StockpileId,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    let stored = state
        .stockpiles
        .get(&id)
        .ok_or_else(|| StoreError::Missing(format!("stockpile {id}")))?;
    if !expected.matches(stored.version()) {
        return Err(StoreError::VersionConflict(format!(
            "stockpile {id}: expected {expected:?}, found {}",
            stored.version()
        )));
    }
    Ok(())
}

fn apply_movement(state: &mut StoreState, stockpile: Stockpile, movement: StockMovement) {
    if let Some(ticket_id) = movement.ticket_id() {
        state.movements_by_ticket.insert(ticket_id, movement.id);
    }
    state.movement_log.push(movement.id);
    state.movements.insert(movement.id, movement);
    state.stockpiles.insert(stockpile.id_typed(), stockpile);
}

impl WeighbridgeStore for InMemoryWeighbridgeStore {
    fn allocate_ticket_number(&self, year: i32) -> Result<TicketNumber, StoreError> {
        let mut state = self.write()?;
        state.ticket_sequence += 1;
        Ok(TicketNumber::new(year, state.ticket_sequence))
    }

    fn insert_ticket(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = ticket.id_typed();
        if state.tickets.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("ticket {id}")));
        }
        state.tickets.insert(id, ticket);
        Ok(())
    }

    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        Ok(self.read()?.tickets.get(&id).cloned())
    }

    fn update_ticket(&self, ticket: Ticket, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = ticket.id_typed();
        let stored = state
            .tickets
            .get(&id)
            .ok_or_else(|| StoreError::Missing(format!("ticket {id}")))?;
        if !expected.matches(stored.version()) {
            return Err(StoreError::VersionConflict(format!(
                "ticket {id}: expected {expected:?}, found {}",
                stored.version()
            )));
        }
        state.tickets.insert(id, ticket);
        Ok(())
    }

    fn insert_stockpile(&self, stockpile: Stockpile) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = stockpile.id_typed();
        let scope = (stockpile.site_id(), stockpile.product_id());
        if state.stockpiles.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("stockpile {id}")));
        }
        if state.stockpiles_by_scope.contains_key(&scope) {
            return Err(StoreError::Duplicate(format!(
                "stockpile for site {} / product {}",
                scope.0, scope.1
            )));
        }
        state.stockpiles_by_scope.insert(scope, id);
        state.stockpiles.insert(id, stockpile);
        Ok(())
    }

    fn stockpile(&self, id: StockpileId) -> Result<Option<Stockpile>, StoreError> {
        Ok(self.read()?.stockpiles.get(&id).cloned())
    }

    fn find_stockpile(
        &self,
        site_id: SiteId,
        product_id: ProductId,
    ) -> Result<Option<Stockpile>, StoreError> {
        let state = self.read()?;
        Ok(state
            .stockpiles_by_scope
            .get(&(site_id, product_id))
            .and_then(|id| state.stockpiles.get(id))
            .cloned())
    }

    fn stockpiles(
        &self,
        site_id: Option<SiteId>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Stockpile>, StoreError> {
        let state = self.read()?;
        let mut piles: Vec<Stockpile> = state
            .stockpiles
            .values()
            .filter(|p| site_id.is_none_or(|s| p.site_id() == s))
            .filter(|p| product_id.is_none_or(|pr| p.product_id() == pr))
            .cloned()
            .collect();
        piles.sort_by_key(|p| *p.id_typed().0.as_uuid());
        Ok(piles)
    }

    fn append_movement(
        &self,
        stockpile: Stockpile,
        expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        check_stockpile_version(&state, stockpile.id_typed(), expected)?;
        check_movement(&state, &stockpile, &movement)?;
        apply_movement(&mut state, stockpile, movement);
        Ok(())
    }

    fn settle_ticket(
        &self,
        ticket: Ticket,
        ticket_expected: ExpectedVersion,
        stockpile: Stockpile,
        stockpile_expected: ExpectedVersion,
        movement: StockMovement,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;

        // Validate everything before touching anything: the commit is
        // all-or-nothing.
        let ticket_id = ticket.id_typed();
        let stored = state
            .tickets
            .get(&ticket_id)
            .ok_or_else(|| StoreError::Missing(format!("ticket {ticket_id}")))?;
        if !ticket_expected.matches(stored.version()) {
            return Err(StoreError::VersionConflict(format!(
                "ticket {ticket_id}: expected {ticket_expected:?}, found {}",
                stored.version()
            )));
        }
        if ticket.settlement().is_none() {
            return Err(StoreError::InvalidWrite(format!(
                "ticket {ticket_id} has no settlement to commit"
            )));
        }
        if movement.ticket_id() != Some(ticket_id) {
            return Err(StoreError::InvalidWrite(format!(
                "movement {} does not reference ticket {ticket_id}",
                movement.id
            )));
        }
        check_stockpile_version(&state, stockpile.id_typed(), stockpile_expected)?;
        check_movement(&state, &stockpile, &movement)?;

        state.tickets.insert(ticket_id, ticket);
        apply_movement(&mut state, stockpile, movement);
        Ok(())
    }

    fn commit_transfer(
        &self,
        source: StockpileWrite,
        destination: StockpileWrite,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;

        check_stockpile_version(&state, source.stockpile.id_typed(), source.expected)?;
        check_stockpile_version(&state, destination.stockpile.id_typed(), destination.expected)?;
        check_movement(&state, &source.stockpile, &source.movement)?;
        check_movement(&state, &destination.stockpile, &destination.movement)?;

        apply_movement(&mut state, source.stockpile, source.movement);
        apply_movement(&mut state, destination.stockpile, destination.movement);
        Ok(())
    }

    fn movement_for_ticket(
        &self,
        ticket_id: TicketId,
    ) -> Result<Option<StockMovement>, StoreError> {
        let state = self.read()?;
        Ok(state
            .movements_by_ticket
            .get(&ticket_id)
            .and_then(|id| state.movements.get(id))
            .cloned())
    }

    fn movements_for_stockpile(
        &self,
        stockpile_id: StockpileId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.read()?;
        Ok(state
            .movement_log
            .iter()
            .filter_map(|id| state.movements.get(id))
            .filter(|m| m.stockpile_id == stockpile_id)
            .cloned()
            .collect())
    }

    fn insert_alert(&self, alert: StockAlert) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.alerts.contains_key(&alert.id) {
            return Err(StoreError::Duplicate(format!("alert {}", alert.id)));
        }
        state.alerts.insert(alert.id, alert);
        Ok(())
    }

    fn alert(&self, id: AlertId) -> Result<Option<StockAlert>, StoreError> {
        Ok(self.read()?.alerts.get(&id).cloned())
    }

    fn update_alert(&self, alert: StockAlert) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.alerts.contains_key(&alert.id) {
            return Err(StoreError::Missing(format!("alert {}", alert.id)));
        }
        state.alerts.insert(alert.id, alert);
        Ok(())
    }

    fn active_alerts_for(&self, stockpile_id: StockpileId) -> Result<Vec<StockAlert>, StoreError> {
        let state = self.read()?;
        let mut alerts: Vec<StockAlert> = state
            .alerts
            .values()
            .filter(|a| a.stockpile_id == stockpile_id && a.is_active)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    fn active_alerts(&self, site_id: Option<SiteId>) -> Result<Vec<StockAlert>, StoreError> {
        let state = self.read()?;
        let mut alerts: Vec<StockAlert> = state
            .alerts
            .values()
            .filter(|a| a.is_active)
            .filter(|a| site_id.is_none_or(|s| a.site_id == s))
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    fn mark_ticket_synced(&self, id: TicketId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let ticket = state
            .tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("ticket {id}")))?;
        ticket.set_sync_status(SyncStatus::Synced);
        Ok(())
    }

    fn mark_movement_synced(&self, id: MovementId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let movement = state
            .movements
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("movement {id}")))?;
        movement.sync_status = SyncStatus::Synced;
        Ok(())
    }
}
