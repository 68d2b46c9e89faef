use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weighpoint_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, OperatorId, ProductId, SiteId, SyncStatus,
    Tonnes,
};
use weighpoint_events::Event;

use crate::movement::{MovementDirection, MovementId, MovementProvenance, StockMovement};

/// Stockpile identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockpileId(pub AggregateId);

impl StockpileId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockpileId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Operational status of a stockpile.
///
/// `Depleted` is derived (balance hit zero); `Inactive` is an operator
/// decision and blocks further movements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockpileStatus {
    Active,
    Inactive,
    Depleted,
}

/// Aggregate root: Stockpile.
///
/// The tracked inventory of one product at one site. The balance is never
/// set directly: every change arrives as an appended movement whose
/// `balance_after` becomes the new current quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stockpile {
    id: StockpileId,
    site_id: SiteId,
    product_id: ProductId,
    capacity_tonnes: Tonnes,
    current_quantity_tonnes: Tonnes,
    reserved_quantity_tonnes: Tonnes,
    low_stock_threshold_tonnes: Tonnes,
    high_stock_threshold_tonnes: Tonnes,
    status: StockpileStatus,
    is_low_stock: bool,
    is_overstock: bool,
    last_movement_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    created: bool,
}

impl Stockpile {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: StockpileId) -> Self {
        Self {
            id,
            site_id: SiteId::new(),
            product_id: ProductId::new(),
            capacity_tonnes: Tonnes::ZERO,
            current_quantity_tonnes: Tonnes::ZERO,
            reserved_quantity_tonnes: Tonnes::ZERO,
            low_stock_threshold_tonnes: Tonnes::ZERO,
            high_stock_threshold_tonnes: Tonnes::ZERO,
            status: StockpileStatus::Active,
            is_low_stock: false,
            is_overstock: false,
            last_movement_at: None,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockpileId {
        self.id
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn capacity_tonnes(&self) -> Tonnes {
        self.capacity_tonnes
    }

    pub fn current_quantity_tonnes(&self) -> Tonnes {
        self.current_quantity_tonnes
    }

    pub fn reserved_quantity_tonnes(&self) -> Tonnes {
        self.reserved_quantity_tonnes
    }

    /// Unreserved material physically available for dispatch.
    pub fn available_quantity_tonnes(&self) -> Tonnes {
        self.current_quantity_tonnes - self.reserved_quantity_tonnes
    }

    pub fn low_stock_threshold_tonnes(&self) -> Tonnes {
        self.low_stock_threshold_tonnes
    }

    pub fn high_stock_threshold_tonnes(&self) -> Tonnes {
        self.high_stock_threshold_tonnes
    }

    pub fn status(&self) -> StockpileStatus {
        self.status
    }

    pub fn is_low_stock(&self) -> bool {
        self.is_low_stock
    }

    pub fn is_overstock(&self) -> bool {
        self.is_overstock
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn refresh_derived_state(&mut self) {
        self.is_low_stock = self.current_quantity_tonnes < self.low_stock_threshold_tonnes;
        self.is_overstock = self.current_quantity_tonnes > self.high_stock_threshold_tonnes;

        match self.status {
            StockpileStatus::Inactive => {}
            _ => {
                self.status = if self.current_quantity_tonnes.is_zero() {
                    StockpileStatus::Depleted
                } else {
                    StockpileStatus::Active
                };
            }
        }
    }
}

impl AggregateRoot for Stockpile {
    type Id = StockpileId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateStockpile.
///
/// New piles start empty; opening balances arrive as a physical-count
/// adjustment so the ledger stays the only path to the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStockpile {
    pub stockpile_id: StockpileId,
    pub site_id: SiteId,
    pub product_id: ProductId,
    pub capacity_tonnes: Tonnes,
    pub low_stock_threshold_tonnes: Tonnes,
    pub high_stock_threshold_tonnes: Tonnes,
    pub reserved_quantity_tonnes: Tonnes,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AppendMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendMovement {
    pub stockpile_id: StockpileId,
    pub movement_id: MovementId,
    pub signed_quantity_tonnes: Tonnes,
    pub provenance: MovementProvenance,
    pub recorded_by: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockpileCommand {
    Create(CreateStockpile),
    Append(AppendMovement),
}

/// Event: StockpileCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockpileCreated {
    pub stockpile_id: StockpileId,
    pub site_id: SiteId,
    pub product_id: ProductId,
    pub capacity_tonnes: Tonnes,
    pub low_stock_threshold_tonnes: Tonnes,
    pub high_stock_threshold_tonnes: Tonnes,
    pub reserved_quantity_tonnes: Tonnes,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementAppended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementAppended {
    pub movement: StockMovement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockpileEvent {
    Created(StockpileCreated),
    MovementAppended(MovementAppended),
}

impl Event for StockpileEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockpileEvent::Created(_) => "stockpile.created",
            StockpileEvent::MovementAppended(_) => "stockpile.movement_appended",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockpileEvent::Created(e) => e.occurred_at,
            StockpileEvent::MovementAppended(e) => e.movement.occurred_at,
        }
    }
}

impl Aggregate for Stockpile {
    type Command = StockpileCommand;
    type Event = StockpileEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockpileEvent::Created(e) => {
                self.id = e.stockpile_id;
                self.site_id = e.site_id;
                self.product_id = e.product_id;
                self.capacity_tonnes = e.capacity_tonnes;
                self.current_quantity_tonnes = Tonnes::ZERO;
                self.reserved_quantity_tonnes = e.reserved_quantity_tonnes;
                self.low_stock_threshold_tonnes = e.low_stock_threshold_tonnes;
                self.high_stock_threshold_tonnes = e.high_stock_threshold_tonnes;
                self.status = StockpileStatus::Active;
                self.last_movement_at = None;
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
                self.created = true;
                self.refresh_derived_state();
            }
            StockpileEvent::MovementAppended(e) => {
                // The ledger is the only writer of the balance.
                self.current_quantity_tonnes = e.movement.balance_after_tonnes;
                self.last_movement_at = Some(e.movement.occurred_at);
                self.updated_at = e.movement.occurred_at;
                self.refresh_derived_state();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockpileCommand::Create(cmd) => self.handle_create(cmd),
            StockpileCommand::Append(cmd) => self.handle_append(cmd),
        }
    }
}

impl Stockpile {
    fn ensure_stockpile_id(&self, stockpile_id: StockpileId) -> Result<(), DomainError> {
        if self.id != stockpile_id {
            return Err(DomainError::validation("stockpile_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateStockpile) -> Result<Vec<StockpileEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stockpile already exists"));
        }
        if !cmd.capacity_tonnes.is_positive() {
            return Err(DomainError::validation("capacity must be positive"));
        }
        if cmd.low_stock_threshold_tonnes.is_negative()
            || cmd.reserved_quantity_tonnes.is_negative()
        {
            return Err(DomainError::validation(
                "thresholds and reservations cannot be negative",
            ));
        }
        if cmd.high_stock_threshold_tonnes <= cmd.low_stock_threshold_tonnes {
            return Err(DomainError::validation(
                "high-stock threshold must exceed low-stock threshold",
            ));
        }
        if cmd.high_stock_threshold_tonnes > cmd.capacity_tonnes {
            return Err(DomainError::validation(
                "high-stock threshold cannot exceed capacity",
            ));
        }

        Ok(vec![StockpileEvent::Created(StockpileCreated {
            stockpile_id: cmd.stockpile_id,
            site_id: cmd.site_id,
            product_id: cmd.product_id,
            capacity_tonnes: cmd.capacity_tonnes,
            low_stock_threshold_tonnes: cmd.low_stock_threshold_tonnes,
            high_stock_threshold_tonnes: cmd.high_stock_threshold_tonnes,
            reserved_quantity_tonnes: cmd.reserved_quantity_tonnes,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_append(&self, cmd: &AppendMovement) -> Result<Vec<StockpileEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_stockpile_id(cmd.stockpile_id)?;

        if self.status == StockpileStatus::Inactive {
            return Err(DomainError::validation(
                "stockpile is inactive and does not accept movements",
            ));
        }
        if cmd.signed_quantity_tonnes.is_zero() {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        if let MovementProvenance::Adjustment { reason, notes } = &cmd.provenance {
            if matches!(reason, crate::movement::AdjustmentReason::Other) && notes.is_none() {
                return Err(DomainError::validation(
                    "adjustments with reason 'other' require explanatory notes",
                ));
            }
        }
        if let MovementProvenance::Transfer {
            counterpart_stockpile_id,
            ..
        } = &cmd.provenance
        {
            if *counterpart_stockpile_id == self.id {
                return Err(DomainError::validation(
                    "transfer counterpart must be a different stockpile",
                ));
            }
        }

        let balance_before = self.current_quantity_tonnes;
        let balance_after = balance_before + cmd.signed_quantity_tonnes;

        // Physical stock cannot go below zero, whatever the movement kind.
        if balance_after.is_negative() {
            return Err(DomainError::balance_violation(format!(
                "movement of {} would drive balance below zero (current: {})",
                cmd.signed_quantity_tonnes, balance_before
            )));
        }

        let direction = if cmd.signed_quantity_tonnes.is_negative() {
            MovementDirection::Out
        } else {
            MovementDirection::In
        };

        Ok(vec![StockpileEvent::MovementAppended(MovementAppended {
            movement: StockMovement {
                id: cmd.movement_id,
                stockpile_id: self.id,
                site_id: self.site_id,
                product_id: self.product_id,
                direction,
                quantity_tonnes: cmd.signed_quantity_tonnes.abs(),
                signed_quantity_tonnes: cmd.signed_quantity_tonnes,
                balance_before_tonnes: balance_before,
                balance_after_tonnes: balance_after,
                provenance: cmd.provenance.clone(),
                recorded_by: cmd.recorded_by,
                occurred_at: cmd.occurred_at,
                created_at: cmd.occurred_at,
                sync_status: SyncStatus::Pending,
            },
        })])
    }
}
