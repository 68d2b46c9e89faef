use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use weighpoint_core::{
    Aggregate, AggregateId, AggregateRoot, Direction, DomainError, DriverId, Kilograms, Money,
    OperatorId, ProductId, SiteId, SyncStatus, Tonnes, VehicleId, WeighbridgeId,
};
use weighpoint_events::Event;
use weighpoint_orders::OrderId;

use crate::number::TicketNumber;

/// Ticket identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub AggregateId);

impl TicketId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TicketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One weighbridge reading with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightCapture {
    pub weight_kg: Kilograms,
    pub captured_at: DateTime<Utc>,
    pub weighbridge_id: WeighbridgeId,
    pub operator_id: OperatorId,
    /// Photo taken at the scale, when the deployment captures one.
    pub photo_url: Option<String>,
}

/// Quality and seal observations recorded at finalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub moisture_percentage: Option<Decimal>,
    pub grade: Option<String>,
    pub notes: Option<String>,
    pub seal_number: Option<String>,
}

/// Settlement computed once, at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Gross minus tare. May be negative; a negative net is a data-quality
    /// signal surfaced downstream, not a programming error.
    pub net_weight_kg: Kilograms,
    pub net_weight_tonnes: Tonnes,
    pub total_value: Money,
    pub finalized_at: DateTime<Utc>,
    pub quality: QualityRecord,
}

/// Why and by whom a ticket was voided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidRecord {
    pub reason: String,
    pub voided_by: OperatorId,
    pub voided_at: DateTime<Utc>,
}

/// Ticket lifecycle state.
///
/// Weighings live inside the variants: `GrossCaptured` cannot exist without
/// its tare capture, and a settlement only exists on `Finalized`. Voided
/// tickets keep whatever captures existed for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketState {
    Open,
    TareCaptured {
        tare: WeightCapture,
    },
    GrossCaptured {
        tare: WeightCapture,
        gross: WeightCapture,
    },
    Finalized {
        tare: WeightCapture,
        gross: WeightCapture,
        settlement: Settlement,
    },
    Voided {
        tare: Option<WeightCapture>,
        gross: Option<WeightCapture>,
        void: VoidRecord,
    },
}

impl TicketState {
    pub fn name(&self) -> &'static str {
        match self {
            TicketState::Open => "open",
            TicketState::TareCaptured { .. } => "tare_captured",
            TicketState::GrossCaptured { .. } => "gross_captured",
            TicketState::Finalized { .. } => "finalized",
            TicketState::Voided { .. } => "voided",
        }
    }

    /// Terminal states are immutable except for sync bookkeeping.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketState::Finalized { .. } | TicketState::Voided { .. }
        )
    }
}

/// Aggregate root: Ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    number: TicketNumber,
    order_id: Option<OrderId>,
    site_id: SiteId,
    vehicle_id: VehicleId,
    driver_id: DriverId,
    product_id: ProductId,
    direction: Direction,
    price_per_tonne: Money,
    notes: Option<String>,
    state: TicketState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sync_status: SyncStatus,
    version: u64,
    created: bool,
}

impl Ticket {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TicketId) -> Self {
        Self {
            id,
            number: TicketNumber::default(),
            order_id: None,
            site_id: SiteId::new(),
            vehicle_id: VehicleId::new(),
            driver_id: DriverId::new(),
            product_id: ProductId::new(),
            direction: Direction::Outbound,
            price_per_tonne: Money::ZERO,
            notes: None,
            state: TicketState::Open,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
            sync_status: SyncStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TicketId {
        self.id
    }

    pub fn number(&self) -> TicketNumber {
        self.number
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }

    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn price_per_tonne(&self) -> Money {
        self.price_per_tonne
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn state(&self) -> &TicketState {
        &self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    /// Sync bookkeeping is the one mutation allowed on terminal tickets.
    /// Single-writer discipline on the synchronizer side is assumed.
    pub fn set_sync_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
    }

    pub fn tare_weight_kg(&self) -> Option<Kilograms> {
        match &self.state {
            TicketState::Open => None,
            TicketState::TareCaptured { tare }
            | TicketState::GrossCaptured { tare, .. }
            | TicketState::Finalized { tare, .. } => Some(tare.weight_kg),
            TicketState::Voided { tare, .. } => tare.as_ref().map(|c| c.weight_kg),
        }
    }

    pub fn gross_weight_kg(&self) -> Option<Kilograms> {
        match &self.state {
            TicketState::GrossCaptured { gross, .. } | TicketState::Finalized { gross, .. } => {
                Some(gross.weight_kg)
            }
            TicketState::Voided { gross, .. } => gross.as_ref().map(|c| c.weight_kg),
            _ => None,
        }
    }

    /// Non-null iff the ticket is finalized.
    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.state {
            TicketState::Finalized { settlement, .. } => Some(settlement),
            _ => None,
        }
    }
}

impl AggregateRoot for Ticket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub ticket_id: TicketId,
    pub ticket_number: TicketNumber,
    pub order_id: Option<OrderId>,
    pub site_id: SiteId,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub price_per_tonne: Money,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CaptureTare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTare {
    pub ticket_id: TicketId,
    pub weight_kg: Kilograms,
    pub weighbridge_id: WeighbridgeId,
    pub operator_id: OperatorId,
    pub photo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CaptureGross.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureGross {
    pub ticket_id: TicketId,
    pub weight_kg: Kilograms,
    pub weighbridge_id: WeighbridgeId,
    pub operator_id: OperatorId,
    pub photo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinalizeTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeTicket {
    pub ticket_id: TicketId,
    pub quality: QualityRecord,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidTicket {
    pub ticket_id: TicketId,
    pub reason: String,
    pub voided_by: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    Open(OpenTicket),
    CaptureTare(CaptureTare),
    CaptureGross(CaptureGross),
    Finalize(FinalizeTicket),
    Void(VoidTicket),
}

/// Event: TicketOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOpened {
    pub ticket_id: TicketId,
    pub ticket_number: TicketNumber,
    pub order_id: Option<OrderId>,
    pub site_id: SiteId,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub price_per_tonne: Money,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TareWeightCaptured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TareWeightCaptured {
    pub ticket_id: TicketId,
    pub capture: WeightCapture,
}

/// Event: GrossWeightCaptured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossWeightCaptured {
    pub ticket_id: TicketId,
    pub capture: WeightCapture,
}

/// Event: TicketFinalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFinalized {
    pub ticket_id: TicketId,
    pub settlement: Settlement,
}

/// Event: TicketVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketVoided {
    pub ticket_id: TicketId,
    pub void: VoidRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    Opened(TicketOpened),
    TareCaptured(TareWeightCaptured),
    GrossCaptured(GrossWeightCaptured),
    Finalized(TicketFinalized),
    Voided(TicketVoided),
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::Opened(_) => "ticket.opened",
            TicketEvent::TareCaptured(_) => "ticket.tare_captured",
            TicketEvent::GrossCaptured(_) => "ticket.gross_captured",
            TicketEvent::Finalized(_) => "ticket.finalized",
            TicketEvent::Voided(_) => "ticket.voided",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::Opened(e) => e.occurred_at,
            TicketEvent::TareCaptured(e) => e.capture.captured_at,
            TicketEvent::GrossCaptured(e) => e.capture.captured_at,
            TicketEvent::Finalized(e) => e.settlement.finalized_at,
            TicketEvent::Voided(e) => e.void.voided_at,
        }
    }
}

impl Aggregate for Ticket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::Opened(e) => {
                self.id = e.ticket_id;
                self.number = e.ticket_number;
                self.order_id = e.order_id;
                self.site_id = e.site_id;
                self.vehicle_id = e.vehicle_id;
                self.driver_id = e.driver_id;
                self.product_id = e.product_id;
                self.direction = e.direction;
                self.price_per_tonne = e.price_per_tonne;
                self.notes = e.notes.clone();
                self.state = TicketState::Open;
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
                self.created = true;
            }
            TicketEvent::TareCaptured(e) => {
                self.state = TicketState::TareCaptured {
                    tare: e.capture.clone(),
                };
                self.updated_at = e.capture.captured_at;
            }
            TicketEvent::GrossCaptured(e) => {
                let prior = std::mem::replace(&mut self.state, TicketState::Open);
                self.state = match prior {
                    TicketState::TareCaptured { tare } => TicketState::GrossCaptured {
                        tare,
                        gross: e.capture.clone(),
                    },
                    other => other,
                };
                self.updated_at = e.capture.captured_at;
            }
            TicketEvent::Finalized(e) => {
                let prior = std::mem::replace(&mut self.state, TicketState::Open);
                self.state = match prior {
                    TicketState::GrossCaptured { tare, gross } => TicketState::Finalized {
                        tare,
                        gross,
                        settlement: e.settlement.clone(),
                    },
                    other => other,
                };
                self.updated_at = e.settlement.finalized_at;
            }
            TicketEvent::Voided(e) => {
                let prior = std::mem::replace(&mut self.state, TicketState::Open);
                let (tare, gross) = match prior {
                    TicketState::Open => (None, None),
                    TicketState::TareCaptured { tare } => (Some(tare), None),
                    TicketState::GrossCaptured { tare, gross } => (Some(tare), Some(gross)),
                    // Finalized tickets are never voided; voided is absorbing.
                    TicketState::Finalized { tare, gross, .. } => (Some(tare), Some(gross)),
                    TicketState::Voided { tare, gross, .. } => (tare, gross),
                };
                self.state = TicketState::Voided {
                    tare,
                    gross,
                    void: e.void.clone(),
                };
                self.updated_at = e.void.voided_at;
            }
        }

        // Every mutation re-marks the record for the external synchronizer.
        self.sync_status = SyncStatus::Pending;

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::Open(cmd) => self.handle_open(cmd),
            TicketCommand::CaptureTare(cmd) => self.handle_capture_tare(cmd),
            TicketCommand::CaptureGross(cmd) => self.handle_capture_gross(cmd),
            TicketCommand::Finalize(cmd) => self.handle_finalize(cmd),
            TicketCommand::Void(cmd) => self.handle_void(cmd),
        }
    }
}

impl Ticket {
    fn ensure_ticket_id(&self, ticket_id: TicketId) -> Result<(), DomainError> {
        if self.id != ticket_id {
            return Err(DomainError::validation("ticket_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ticket already exists"));
        }
        if cmd.price_per_tonne < Money::ZERO {
            return Err(DomainError::validation("price_per_tonne cannot be negative"));
        }

        Ok(vec![TicketEvent::Opened(TicketOpened {
            ticket_id: cmd.ticket_id,
            ticket_number: cmd.ticket_number,
            order_id: cmd.order_id,
            site_id: cmd.site_id,
            vehicle_id: cmd.vehicle_id,
            driver_id: cmd.driver_id,
            product_id: cmd.product_id,
            direction: cmd.direction,
            price_per_tonne: cmd.price_per_tonne,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_capture_tare(&self, cmd: &CaptureTare) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(cmd.ticket_id)?;

        if !matches!(self.state, TicketState::Open) {
            return Err(DomainError::state_transition(format!(
                "tare weight can only be captured on an open ticket (state: {})",
                self.state.name()
            )));
        }
        if !cmd.weight_kg.is_positive() {
            return Err(DomainError::validation(
                "tare weight must be a positive scale reading",
            ));
        }

        Ok(vec![TicketEvent::TareCaptured(TareWeightCaptured {
            ticket_id: cmd.ticket_id,
            capture: WeightCapture {
                weight_kg: cmd.weight_kg,
                captured_at: cmd.occurred_at,
                weighbridge_id: cmd.weighbridge_id,
                operator_id: cmd.operator_id,
                photo_url: cmd.photo_url.clone(),
            },
        })])
    }

    fn handle_capture_gross(&self, cmd: &CaptureGross) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(cmd.ticket_id)?;

        // Two-step sequencing holds for both directions: gross never
        // precedes tare.
        if !matches!(self.state, TicketState::TareCaptured { .. }) {
            return Err(DomainError::state_transition(format!(
                "gross weight can only be captured after tare (state: {})",
                self.state.name()
            )));
        }
        if !cmd.weight_kg.is_positive() {
            return Err(DomainError::validation(
                "gross weight must be a positive scale reading",
            ));
        }

        Ok(vec![TicketEvent::GrossCaptured(GrossWeightCaptured {
            ticket_id: cmd.ticket_id,
            capture: WeightCapture {
                weight_kg: cmd.weight_kg,
                captured_at: cmd.occurred_at,
                weighbridge_id: cmd.weighbridge_id,
                operator_id: cmd.operator_id,
                photo_url: cmd.photo_url.clone(),
            },
        })])
    }

    fn handle_finalize(&self, cmd: &FinalizeTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(cmd.ticket_id)?;

        let (tare, gross) = match &self.state {
            TicketState::GrossCaptured { tare, gross } => (tare, gross),
            TicketState::Open => {
                return Err(DomainError::incomplete_weighing(
                    "neither tare nor gross weight has been captured",
                ));
            }
            TicketState::TareCaptured { .. } => {
                return Err(DomainError::incomplete_weighing(
                    "gross weight has not been captured",
                ));
            }
            TicketState::Finalized { .. } => {
                return Err(DomainError::state_transition("ticket is already finalized"));
            }
            TicketState::Voided { .. } => {
                return Err(DomainError::state_transition(
                    "voided tickets cannot be finalized",
                ));
            }
        };

        // Net weight and value are derived exactly once, here. A negative
        // net settles as-is.
        let net_weight_kg = gross.weight_kg - tare.weight_kg;
        let net_weight_tonnes = net_weight_kg.to_tonnes();
        let total_value = Money::settle(self.price_per_tonne, net_weight_tonnes);

        Ok(vec![TicketEvent::Finalized(TicketFinalized {
            ticket_id: cmd.ticket_id,
            settlement: Settlement {
                net_weight_kg,
                net_weight_tonnes,
                total_value,
                finalized_at: cmd.occurred_at,
                quality: cmd.quality.clone(),
            },
        })])
    }

    fn handle_void(&self, cmd: &VoidTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(cmd.ticket_id)?;

        match &self.state {
            TicketState::Voided { .. } => {
                return Err(DomainError::state_transition("ticket is already voided"));
            }
            // Settled stock is corrected through an explicit adjustment,
            // never by voiding the ticket that produced the movement.
            TicketState::Finalized { .. } => {
                return Err(DomainError::state_transition(
                    "finalized tickets cannot be voided",
                ));
            }
            _ => {}
        }

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("void reason cannot be empty"));
        }

        Ok(vec![TicketEvent::Voided(TicketVoided {
            ticket_id: cmd.ticket_id,
            void: VoidRecord {
                reason: cmd.reason.clone(),
                voided_by: cmd.voided_by,
                voided_at: cmd.occurred_at,
            },
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn test_ticket_id() -> TicketId {
        TicketId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_cmd(ticket_id: TicketId, price_per_tonne: Money) -> OpenTicket {
        OpenTicket {
            ticket_id,
            ticket_number: TicketNumber::new(2026, 1),
            order_id: None,
            site_id: SiteId::new(),
            vehicle_id: VehicleId::new(),
            driver_id: DriverId::new(),
            product_id: ProductId::new(),
            direction: Direction::Outbound,
            price_per_tonne,
            notes: None,
            occurred_at: test_time(),
        }
    }

    fn tare_cmd(ticket_id: TicketId, weight_kg: i64) -> CaptureTare {
        CaptureTare {
            ticket_id,
            weight_kg: Kilograms::new(weight_kg),
            weighbridge_id: WeighbridgeId::new(),
            operator_id: OperatorId::new(),
            photo_url: None,
            occurred_at: test_time(),
        }
    }

    fn gross_cmd(ticket_id: TicketId, weight_kg: i64) -> CaptureGross {
        CaptureGross {
            ticket_id,
            weight_kg: Kilograms::new(weight_kg),
            weighbridge_id: WeighbridgeId::new(),
            operator_id: OperatorId::new(),
            photo_url: None,
            occurred_at: test_time(),
        }
    }

    fn finalize_cmd(ticket_id: TicketId) -> FinalizeTicket {
        FinalizeTicket {
            ticket_id,
            quality: QualityRecord::default(),
            occurred_at: test_time(),
        }
    }

    fn run(ticket: &mut Ticket, command: TicketCommand) -> Result<(), DomainError> {
        let events = ticket.handle(&command)?;
        for event in &events {
            ticket.apply(event);
        }
        Ok(())
    }

    fn opened_ticket(price_per_tonne: Money) -> Ticket {
        let id = test_ticket_id();
        let mut ticket = Ticket::empty(id);
        run(&mut ticket, TicketCommand::Open(open_cmd(id, price_per_tonne))).unwrap();
        ticket
    }

    #[test]
    fn open_ticket_emits_ticket_opened() {
        let id = test_ticket_id();
        let ticket = Ticket::empty(id);
        let cmd = open_cmd(id, Money::from_whole(50));

        let events = ticket.handle(&TicketCommand::Open(cmd.clone())).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            TicketEvent::Opened(e) => {
                assert_eq!(e.ticket_id, id);
                assert_eq!(e.ticket_number, cmd.ticket_number);
                assert_eq!(e.price_per_tonne, Money::from_whole(50));
            }
            other => panic!("expected TicketOpened, got {other:?}"),
        }
    }

    #[test]
    fn outbound_weighing_settles_net_and_value() {
        // Tare 10 000 kg, gross 32 500 kg -> net 22 500 kg = 22.500 t.
        let mut ticket = opened_ticket(Money::from_whole(50));
        let id = ticket.id_typed();

        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 10_000))).unwrap();
        assert_eq!(ticket.state().name(), "tare_captured");

        run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, 32_500))).unwrap();
        assert_eq!(ticket.state().name(), "gross_captured");

        run(&mut ticket, TicketCommand::Finalize(finalize_cmd(id))).unwrap();
        assert_eq!(ticket.state().name(), "finalized");

        let settlement = ticket.settlement().unwrap();
        assert_eq!(settlement.net_weight_kg, Kilograms::new(22_500));
        assert_eq!(
            settlement.net_weight_tonnes.value(),
            Decimal::new(22_500, 3)
        );
        assert_eq!(settlement.total_value, Money::new(Decimal::new(1_125_00, 2)));
    }

    #[test]
    fn gross_capture_on_open_ticket_is_rejected() {
        let ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();

        let err = ticket
            .handle(&TicketCommand::CaptureGross(gross_cmd(id, 32_500)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)), "{err:?}");
        assert_eq!(ticket.state().name(), "open");
    }

    #[test]
    fn tare_capture_requires_open_state() {
        let mut ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();
        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 10_000))).unwrap();

        let err = ticket
            .handle(&TicketCommand::CaptureTare(tare_cmd(id, 10_100)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)), "{err:?}");
    }

    #[test]
    fn finalize_before_both_weights_reports_incomplete_weighing() {
        let mut ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();

        let err = ticket
            .handle(&TicketCommand::Finalize(finalize_cmd(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::IncompleteWeighing(_)), "{err:?}");

        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 10_000))).unwrap();
        let err = ticket
            .handle(&TicketCommand::Finalize(finalize_cmd(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::IncompleteWeighing(_)), "{err:?}");
    }

    #[test]
    fn second_finalize_is_rejected() {
        let mut ticket = opened_ticket(Money::from_whole(10));
        let id = ticket.id_typed();
        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 10_000))).unwrap();
        run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, 30_000))).unwrap();
        run(&mut ticket, TicketCommand::Finalize(finalize_cmd(id))).unwrap();

        let err = ticket
            .handle(&TicketCommand::Finalize(finalize_cmd(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)), "{err:?}");
    }

    #[test]
    fn negative_net_weight_settles_without_error() {
        // Gross below tare: bad reading or material left on the truck.
        // The settlement carries the negative net for downstream review.
        let mut ticket = opened_ticket(Money::from_whole(40));
        let id = ticket.id_typed();
        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 18_000))).unwrap();
        run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, 17_200))).unwrap();
        run(&mut ticket, TicketCommand::Finalize(finalize_cmd(id))).unwrap();

        let settlement = ticket.settlement().unwrap();
        assert_eq!(settlement.net_weight_kg, Kilograms::new(-800));
        assert!(settlement.net_weight_tonnes.is_negative());
        assert_eq!(settlement.total_value, Money::new(Decimal::new(-32_00, 2)));
    }

    #[test]
    fn void_is_allowed_from_every_pre_settlement_state() {
        for captures in 0..3 {
            let mut ticket = opened_ticket(Money::ZERO);
            let id = ticket.id_typed();
            if captures >= 1 {
                run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 9_000))).unwrap();
            }
            if captures >= 2 {
                run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, 21_000))).unwrap();
            }

            run(
                &mut ticket,
                TicketCommand::Void(VoidTicket {
                    ticket_id: id,
                    reason: "driver left site".to_string(),
                    voided_by: OperatorId::new(),
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
            assert_eq!(ticket.state().name(), "voided");

            // Captured weights survive the void for audit.
            if captures >= 1 {
                assert_eq!(ticket.tare_weight_kg(), Some(Kilograms::new(9_000)));
            }
        }
    }

    #[test]
    fn finalized_tickets_cannot_be_voided() {
        let mut ticket = opened_ticket(Money::from_whole(10));
        let id = ticket.id_typed();
        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 10_000))).unwrap();
        run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, 30_000))).unwrap();
        run(&mut ticket, TicketCommand::Finalize(finalize_cmd(id))).unwrap();

        let err = ticket
            .handle(&TicketCommand::Void(VoidTicket {
                ticket_id: id,
                reason: "entered against wrong order".to_string(),
                voided_by: OperatorId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)), "{err:?}");
    }

    #[test]
    fn void_requires_a_reason() {
        let ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();

        let err = ticket
            .handle(&TicketCommand::Void(VoidTicket {
                ticket_id: id,
                reason: "   ".to_string(),
                voided_by: OperatorId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
    }

    #[test]
    fn every_mutation_marks_the_ticket_pending_sync() {
        let mut ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();
        assert!(ticket.sync_status().is_pending());

        ticket.set_sync_status(SyncStatus::Synced);
        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 8_000))).unwrap();
        assert!(ticket.sync_status().is_pending());
    }

    #[test]
    fn version_increments_on_apply() {
        let mut ticket = opened_ticket(Money::ZERO);
        assert_eq!(ticket.version(), 1);
        let id = ticket.id_typed();

        run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, 8_000))).unwrap();
        assert_eq!(ticket.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let ticket = opened_ticket(Money::ZERO);
        let id = ticket.id_typed();
        let before = ticket.clone();

        let _ = ticket.handle(&TicketCommand::CaptureTare(tare_cmd(id, 8_000)));
        let _ = ticket.handle(&TicketCommand::Finalize(finalize_cmd(id)));
        assert_eq!(ticket, before);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any pair of positive scale readings and any
        /// non-negative price, the settlement is exact: net = gross - tare,
        /// tonnes = net/1000 at 3 dp, value = round(price * tonnes, 2).
        #[test]
        fn settlement_arithmetic_is_exact(
            tare_kg in 1i64..80_000,
            gross_kg in 1i64..80_000,
            price_cents in 0i64..1_000_000,
        ) {
            let price = Money::new(Decimal::new(price_cents, 2));
            let mut ticket = opened_ticket(price);
            let id = ticket.id_typed();

            run(&mut ticket, TicketCommand::CaptureTare(tare_cmd(id, tare_kg))).unwrap();
            run(&mut ticket, TicketCommand::CaptureGross(gross_cmd(id, gross_kg))).unwrap();
            run(&mut ticket, TicketCommand::Finalize(finalize_cmd(id))).unwrap();

            let settlement = ticket.settlement().unwrap().clone();
            prop_assert_eq!(settlement.net_weight_kg.value(), gross_kg - tare_kg);
            prop_assert_eq!(
                settlement.net_weight_tonnes.value(),
                Decimal::new(gross_kg - tare_kg, 3)
            );
            prop_assert_eq!(
                settlement.total_value,
                Money::new(price.value() * Decimal::new(gross_kg - tare_kg, 3))
            );
        }
    }
}
