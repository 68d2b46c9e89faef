//! Application services: command orchestration over the transactional store.
//!
//! Each operation loads the target aggregate, lets it decide (pure
//! `handle`), applies the events, and commits with a compare-and-swap
//! write. Lost races retry a bounded number of times before surfacing a
//! retryable contention error; business errors are never retried. Events
//! are published to the bus only after a successful commit.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use weighpoint_core::{
    Aggregate, AggregateId, AggregateRoot, Direction, DomainError, DriverId, ExpectedVersion,
    Kilograms, Money, OperatorId, ProductId, SiteId, Tonnes, VehicleId, WeighbridgeId,
};
use weighpoint_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use weighpoint_orders::Order;
use weighpoint_stock::{
    AdjustmentReason, AlertAction, AlertId, AppendMovement, CreateStockpile, MovementId,
    MovementProvenance, StockAlert, StockMovement, Stockpile, StockpileCommand, StockpileEvent,
    StockpileId, TransferLeg, evaluate_alerts,
};
use weighpoint_tickets::{
    CaptureGross, CaptureTare, FinalizeTicket, OpenTicket, QualityRecord, Ticket, TicketCommand,
    TicketEvent, TicketId, VoidTicket,
};

use crate::config::ServiceConfig;
use crate::projections::TicketIndexProjection;
use crate::store::{InMemoryWeighbridgeStore, StockpileWrite, StoreError, WeighbridgeStore};

/// Envelope type every committed event is published under.
pub type JsonEnvelope = EventEnvelope<JsonValue>;

/// Application-level error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Deterministic business failure; retrying cannot succeed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic writes kept losing the race within the configured
    /// attempt budget. No side effect was applied; safe to retry.
    #[error("contention on {entity} after {attempts} attempts")]
    Contention { entity: &'static str, attempts: u32 },

    /// Infrastructure failure from the store.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ServiceError {
    /// Whether the caller may retry without risking duplicate side effects.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Contention { .. } => true,
            ServiceError::Store(err) => err.is_retryable(),
            ServiceError::Domain(err) => err.is_retryable(),
        }
    }

    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Missing(_) => DomainError::NotFound.into(),
            StoreError::AlreadySettled(_) => {
                DomainError::state_transition("ticket is already settled").into()
            }
            other => ServiceError::Store(other),
        }
    }
}

/// Inbound request: open a new weighing ticket.
///
/// The order, when present, is the resolved snapshot read from the
/// external order component; it supplies direction and pricing defaults.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    pub order: Option<Order>,
    pub site_id: SiteId,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub product_id: ProductId,
    pub direction: Option<Direction>,
    pub price_per_tonne: Option<Money>,
    pub notes: Option<String>,
}

/// Inbound request: capture a tare or gross reading.
#[derive(Debug, Clone)]
pub struct WeighingRequest {
    pub ticket_id: TicketId,
    pub weight_kg: Kilograms,
    pub weighbridge_id: WeighbridgeId,
    pub operator_id: OperatorId,
    pub photo_url: Option<String>,
}

/// Inbound request: finalize a fully-weighed ticket.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub ticket_id: TicketId,
    pub quality: QualityRecord,
    pub finalized_by: OperatorId,
}

/// Inbound request: void a ticket.
#[derive(Debug, Clone)]
pub struct VoidRequest {
    pub ticket_id: TicketId,
    pub reason: String,
    pub voided_by: OperatorId,
}

/// Inbound request: register a stockpile.
#[derive(Debug, Clone)]
pub struct CreateStockpileRequest {
    pub site_id: SiteId,
    pub product_id: ProductId,
    pub capacity_tonnes: Tonnes,
    pub low_stock_threshold_tonnes: Tonnes,
    pub high_stock_threshold_tonnes: Tonnes,
    pub reserved_quantity_tonnes: Tonnes,
    /// Seeded through an opening physical-count adjustment so the balance
    /// still flows through the ledger.
    pub opening_quantity_tonnes: Option<Tonnes>,
    pub recorded_by: OperatorId,
}

/// Inbound request: manual stock adjustment.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub stockpile_id: StockpileId,
    pub signed_quantity_tonnes: Tonnes,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
    pub recorded_by: OperatorId,
}

/// Inbound request: move stock between two piles of the same product.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_stockpile_id: StockpileId,
    pub destination_stockpile_id: StockpileId,
    pub quantity_tonnes: Tonnes,
    pub recorded_by: OperatorId,
}

/// Result of a committed transfer: both legs and both updated piles.
#[derive(Debug, Clone)]
pub struct StockTransfer {
    pub outgoing: StockMovement,
    pub incoming: StockMovement,
    pub source: Stockpile,
    pub destination: Stockpile,
}

/// The weighing core's inbound boundary, transport-agnostic.
#[derive(Debug)]
pub struct WeighbridgeService<S, B> {
    store: S,
    bus: B,
    config: ServiceConfig,
}

impl<S, B> WeighbridgeService<S, B> {
    pub fn new(store: S, bus: B, config: ServiceConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> WeighbridgeService<S, B>
where
    S: WeighbridgeStore,
    B: EventBus<JsonEnvelope>,
{
    pub fn create_ticket(&self, req: CreateTicketRequest) -> Result<Ticket, ServiceError> {
        if let Some(order) = &req.order {
            if !order.accepts_tickets() {
                return Err(DomainError::validation(format!(
                    "order {} is not accepting tickets (status: {:?})",
                    order.order_number, order.status
                ))
                .into());
            }
            if order.product_id != req.product_id {
                return Err(
                    DomainError::validation("ticket product does not match order product").into(),
                );
            }
            if order.site_id != req.site_id {
                return Err(
                    DomainError::validation("ticket site does not match order site").into(),
                );
            }
        }

        let direction = req
            .direction
            .or(req.order.as_ref().map(|o| o.direction))
            .ok_or_else(|| {
                DomainError::validation("direction is required for tickets without an order")
            })?;
        let price_per_tonne = req
            .price_per_tonne
            .or(req.order.as_ref().map(|o| o.price_per_tonne))
            .unwrap_or(Money::ZERO);

        let now = Utc::now();
        let ticket_number = self
            .store
            .allocate_ticket_number(now.year())
            .map_err(ServiceError::from_store)?;
        let ticket_id = TicketId::new(AggregateId::new());

        let command = TicketCommand::Open(OpenTicket {
            ticket_id,
            ticket_number,
            order_id: req.order.as_ref().map(|o| o.id),
            site_id: req.site_id,
            vehicle_id: req.vehicle_id,
            driver_id: req.driver_id,
            product_id: req.product_id,
            direction,
            price_per_tonne,
            notes: req.notes,
            occurred_at: now,
        });

        let blank = Ticket::empty(ticket_id);
        let events = blank.handle(&command)?;
        let mut ticket = blank;
        for event in &events {
            ticket.apply(event);
        }

        self.store
            .insert_ticket(ticket.clone())
            .map_err(ServiceError::from_store)?;
        self.publish_ticket_events(&ticket, &events);

        tracing::info!(
            ticket_id = %ticket_id,
            ticket_number = %ticket.number(),
            direction = %direction,
            "ticket opened"
        );
        Ok(ticket)
    }

    pub fn capture_tare(&self, req: WeighingRequest) -> Result<Ticket, ServiceError> {
        let command = TicketCommand::CaptureTare(CaptureTare {
            ticket_id: req.ticket_id,
            weight_kg: req.weight_kg,
            weighbridge_id: req.weighbridge_id,
            operator_id: req.operator_id,
            photo_url: req.photo_url,
            occurred_at: Utc::now(),
        });
        let ticket = self.run_ticket_command(req.ticket_id, command)?;
        tracing::info!(ticket_id = %req.ticket_id, weight_kg = req.weight_kg.value(), "tare captured");
        Ok(ticket)
    }

    pub fn capture_gross(&self, req: WeighingRequest) -> Result<Ticket, ServiceError> {
        let command = TicketCommand::CaptureGross(CaptureGross {
            ticket_id: req.ticket_id,
            weight_kg: req.weight_kg,
            weighbridge_id: req.weighbridge_id,
            operator_id: req.operator_id,
            photo_url: req.photo_url,
            occurred_at: Utc::now(),
        });
        let ticket = self.run_ticket_command(req.ticket_id, command)?;
        tracing::info!(ticket_id = %req.ticket_id, weight_kg = req.weight_kg.value(), "gross captured");
        Ok(ticket)
    }

    pub fn void_ticket(&self, req: VoidRequest) -> Result<Ticket, ServiceError> {
        let command = TicketCommand::Void(VoidTicket {
            ticket_id: req.ticket_id,
            reason: req.reason,
            voided_by: req.voided_by,
            occurred_at: Utc::now(),
        });
        let ticket = self.run_ticket_command(req.ticket_id, command)?;
        tracing::info!(ticket_id = %req.ticket_id, "ticket voided");
        Ok(ticket)
    }

    /// Close the weighing and commit its effect on stock.
    ///
    /// The ticket transition and the ledger append are one commit: if the
    /// append is impossible (no target pile, balance floor), the ticket
    /// stays untouched in `gross_captured`.
    pub fn finalize_ticket(
        &self,
        req: FinalizeRequest,
    ) -> Result<(Ticket, StockMovement, Stockpile), ServiceError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let now = Utc::now();
            let ticket = self
                .store
                .ticket(req.ticket_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let ticket_expected = ExpectedVersion::Exact(ticket.version());

            let ticket_events = ticket.handle(&TicketCommand::Finalize(FinalizeTicket {
                ticket_id: req.ticket_id,
                quality: req.quality.clone(),
                occurred_at: now,
            }))?;
            let mut finalized = ticket.clone();
            for event in &ticket_events {
                finalized.apply(event);
            }
            let settlement = match finalized.settlement() {
                Some(s) => s.clone(),
                None => {
                    return Err(ServiceError::Store(StoreError::InvalidWrite(
                        "finalize produced no settlement".to_string(),
                    )));
                }
            };

            let stockpile = self
                .store
                .find_stockpile(finalized.site_id(), finalized.product_id())
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let stockpile_expected = ExpectedVersion::Exact(stockpile.version());

            // Inbound material grows the pile, outbound shrinks it. A
            // negative net flips the sign with it.
            let signed_quantity = match finalized.direction() {
                Direction::Inbound => settlement.net_weight_tonnes,
                Direction::Outbound => -settlement.net_weight_tonnes,
            };

            let stockpile_events = stockpile.handle(&StockpileCommand::Append(AppendMovement {
                stockpile_id: stockpile.id_typed(),
                movement_id: MovementId::new(AggregateId::new()),
                signed_quantity_tonnes: signed_quantity,
                provenance: MovementProvenance::Ticket {
                    ticket_id: req.ticket_id,
                    order_id: finalized.order_id(),
                },
                recorded_by: req.finalized_by,
                occurred_at: now,
            }))?;
            let mut updated_pile = stockpile.clone();
            for event in &stockpile_events {
                updated_pile.apply(event);
            }
            let movement = match extract_movement(&stockpile_events) {
                Some(m) => m,
                None => {
                    return Err(ServiceError::Store(StoreError::InvalidWrite(
                        "ledger append produced no movement".to_string(),
                    )));
                }
            };

            match self.store.settle_ticket(
                finalized.clone(),
                ticket_expected,
                updated_pile.clone(),
                stockpile_expected,
                movement.clone(),
            ) {
                Ok(()) => {
                    self.publish_ticket_events(&finalized, &ticket_events);
                    self.publish_stockpile_events(&updated_pile, &stockpile_events);
                    tracing::info!(
                        ticket_id = %req.ticket_id,
                        net_weight_kg = settlement.net_weight_kg.value(),
                        stockpile_id = %updated_pile.id_typed(),
                        "ticket finalized and settled"
                    );
                    self.alert_pass(updated_pile.id_typed());
                    return Ok((finalized, movement, updated_pile));
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, ticket_id = %req.ticket_id, %err, "settlement lost the race, retrying");
                }
                Err(err) => return Err(ServiceError::from_store(err)),
            }
        }

        Err(ServiceError::Contention {
            entity: "ticket settlement",
            attempts: self.config.max_commit_attempts,
        })
    }

    pub fn create_stockpile(&self, req: CreateStockpileRequest) -> Result<Stockpile, ServiceError> {
        if let Some(opening) = req.opening_quantity_tonnes {
            if opening.is_negative() {
                return Err(
                    DomainError::validation("opening quantity cannot be negative").into(),
                );
            }
        }

        let stockpile_id = StockpileId::new(AggregateId::new());
        let command = StockpileCommand::Create(CreateStockpile {
            stockpile_id,
            site_id: req.site_id,
            product_id: req.product_id,
            capacity_tonnes: req.capacity_tonnes,
            low_stock_threshold_tonnes: req.low_stock_threshold_tonnes,
            high_stock_threshold_tonnes: req.high_stock_threshold_tonnes,
            reserved_quantity_tonnes: req.reserved_quantity_tonnes,
            occurred_at: Utc::now(),
        });

        let blank = Stockpile::empty(stockpile_id);
        let events = blank.handle(&command)?;
        let mut stockpile = blank;
        for event in &events {
            stockpile.apply(event);
        }

        self.store
            .insert_stockpile(stockpile.clone())
            .map_err(ServiceError::from_store)?;
        self.publish_stockpile_events(&stockpile, &events);
        tracing::info!(stockpile_id = %stockpile_id, "stockpile registered");

        match req.opening_quantity_tonnes {
            Some(opening) if opening.is_positive() => {
                let (_, stocked) = self.create_adjustment(AdjustmentRequest {
                    stockpile_id,
                    signed_quantity_tonnes: opening,
                    reason: AdjustmentReason::PhysicalCount,
                    notes: Some("opening balance".to_string()),
                    recorded_by: req.recorded_by,
                })?;
                Ok(stocked)
            }
            _ => Ok(stockpile),
        }
    }

    pub fn create_adjustment(
        &self,
        req: AdjustmentRequest,
    ) -> Result<(StockMovement, Stockpile), ServiceError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let stockpile = self
                .store
                .stockpile(req.stockpile_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let expected = ExpectedVersion::Exact(stockpile.version());

            let events = stockpile.handle(&StockpileCommand::Append(AppendMovement {
                stockpile_id: req.stockpile_id,
                movement_id: MovementId::new(AggregateId::new()),
                signed_quantity_tonnes: req.signed_quantity_tonnes,
                provenance: MovementProvenance::Adjustment {
                    reason: req.reason,
                    notes: req.notes.clone(),
                },
                recorded_by: req.recorded_by,
                occurred_at: Utc::now(),
            }))?;
            let mut updated = stockpile.clone();
            for event in &events {
                updated.apply(event);
            }
            let movement = match extract_movement(&events) {
                Some(m) => m,
                None => {
                    return Err(ServiceError::Store(StoreError::InvalidWrite(
                        "ledger append produced no movement".to_string(),
                    )));
                }
            };

            match self
                .store
                .append_movement(updated.clone(), expected, movement.clone())
            {
                Ok(()) => {
                    self.publish_stockpile_events(&updated, &events);
                    tracing::info!(
                        stockpile_id = %req.stockpile_id,
                        reason = ?req.reason,
                        quantity = %req.signed_quantity_tonnes,
                        "adjustment recorded"
                    );
                    self.alert_pass(req.stockpile_id);
                    return Ok((movement, updated));
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, stockpile_id = %req.stockpile_id, %err, "adjustment lost the race, retrying");
                }
                Err(err) => return Err(ServiceError::from_store(err)),
            }
        }

        Err(ServiceError::Contention {
            entity: "stockpile",
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Move stock between two piles: two linked movements, one commit.
    pub fn transfer_stock(&self, req: TransferRequest) -> Result<StockTransfer, ServiceError> {
        if !req.quantity_tonnes.is_positive() {
            return Err(DomainError::validation("transfer quantity must be positive").into());
        }
        if req.source_stockpile_id == req.destination_stockpile_id {
            return Err(
                DomainError::validation("transfer source and destination must differ").into(),
            );
        }

        for attempt in 1..=self.config.max_commit_attempts {
            let now = Utc::now();
            let source = self
                .store
                .stockpile(req.source_stockpile_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let destination = self
                .store
                .stockpile(req.destination_stockpile_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;

            if source.product_id() != destination.product_id() {
                return Err(DomainError::validation(
                    "transfers must stay within a single product",
                )
                .into());
            }

            let out_events = source.handle(&StockpileCommand::Append(AppendMovement {
                stockpile_id: source.id_typed(),
                movement_id: MovementId::new(AggregateId::new()),
                signed_quantity_tonnes: -req.quantity_tonnes,
                provenance: MovementProvenance::Transfer {
                    counterpart_stockpile_id: destination.id_typed(),
                    leg: TransferLeg::Outgoing,
                },
                recorded_by: req.recorded_by,
                occurred_at: now,
            }))?;
            let in_events = destination.handle(&StockpileCommand::Append(AppendMovement {
                stockpile_id: destination.id_typed(),
                movement_id: MovementId::new(AggregateId::new()),
                signed_quantity_tonnes: req.quantity_tonnes,
                provenance: MovementProvenance::Transfer {
                    counterpart_stockpile_id: source.id_typed(),
                    leg: TransferLeg::Incoming,
                },
                recorded_by: req.recorded_by,
                occurred_at: now,
            }))?;

            let mut updated_source = source.clone();
            for event in &out_events {
                updated_source.apply(event);
            }
            let mut updated_destination = destination.clone();
            for event in &in_events {
                updated_destination.apply(event);
            }

            let (outgoing, incoming) =
                match (extract_movement(&out_events), extract_movement(&in_events)) {
                    (Some(out), Some(inc)) => (out, inc),
                    _ => {
                        return Err(ServiceError::Store(StoreError::InvalidWrite(
                            "transfer produced incomplete legs".to_string(),
                        )));
                    }
                };

            match self.store.commit_transfer(
                StockpileWrite {
                    stockpile: updated_source.clone(),
                    expected: ExpectedVersion::Exact(source.version()),
                    movement: outgoing.clone(),
                },
                StockpileWrite {
                    stockpile: updated_destination.clone(),
                    expected: ExpectedVersion::Exact(destination.version()),
                    movement: incoming.clone(),
                },
            ) {
                Ok(()) => {
                    self.publish_stockpile_events(&updated_source, &out_events);
                    self.publish_stockpile_events(&updated_destination, &in_events);
                    tracing::info!(
                        source = %req.source_stockpile_id,
                        destination = %req.destination_stockpile_id,
                        quantity = %req.quantity_tonnes,
                        "stock transferred"
                    );
                    self.alert_pass(req.source_stockpile_id);
                    self.alert_pass(req.destination_stockpile_id);
                    return Ok(StockTransfer {
                        outgoing,
                        incoming,
                        source: updated_source,
                        destination: updated_destination,
                    });
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, %err, "transfer lost the race, retrying");
                }
                Err(err) => return Err(ServiceError::from_store(err)),
            }
        }

        Err(ServiceError::Contention {
            entity: "stock transfer",
            attempts: self.config.max_commit_attempts,
        })
    }

    pub fn acknowledge_alert(
        &self,
        alert_id: AlertId,
        acknowledged_by: OperatorId,
    ) -> Result<StockAlert, ServiceError> {
        let mut alert = self
            .store
            .alert(alert_id)
            .map_err(ServiceError::from_store)?
            .ok_or(DomainError::NotFound)?;
        alert.acknowledge(acknowledged_by, Utc::now());
        self.store
            .update_alert(alert.clone())
            .map_err(ServiceError::from_store)?;
        tracing::info!(alert_id = %alert_id, "alert acknowledged");
        Ok(alert)
    }

    pub fn resolve_alert(
        &self,
        alert_id: AlertId,
        resolved_by: OperatorId,
        notes: Option<String>,
    ) -> Result<StockAlert, ServiceError> {
        let mut alert = self
            .store
            .alert(alert_id)
            .map_err(ServiceError::from_store)?
            .ok_or(DomainError::NotFound)?;
        alert.resolve(Some(resolved_by), Utc::now(), notes);
        self.store
            .update_alert(alert.clone())
            .map_err(ServiceError::from_store)?;
        tracing::info!(alert_id = %alert_id, "alert resolved");
        Ok(alert)
    }

    fn run_ticket_command(
        &self,
        ticket_id: TicketId,
        command: TicketCommand,
    ) -> Result<Ticket, ServiceError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let ticket = self
                .store
                .ticket(ticket_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let expected = ExpectedVersion::Exact(ticket.version());

            let events = ticket.handle(&command)?;
            let mut updated = ticket;
            for event in &events {
                updated.apply(event);
            }

            match self.store.update_ticket(updated.clone(), expected) {
                Ok(()) => {
                    self.publish_ticket_events(&updated, &events);
                    return Ok(updated);
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, ticket_id = %ticket_id, %err, "ticket write lost the race, retrying");
                }
                Err(err) => return Err(ServiceError::from_store(err)),
            }
        }

        Err(ServiceError::Contention {
            entity: "ticket",
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Threshold re-evaluation after a ledger append. Failures are logged,
    /// not surfaced: the commit already stands and the next append will
    /// re-run the pass.
    fn alert_pass(&self, stockpile_id: StockpileId) {
        let result: Result<(), ServiceError> = (|| {
            let stockpile = self
                .store
                .stockpile(stockpile_id)
                .map_err(ServiceError::from_store)?
                .ok_or(DomainError::NotFound)?;
            let active = self
                .store
                .active_alerts_for(stockpile_id)
                .map_err(ServiceError::from_store)?;

            for action in evaluate_alerts(&stockpile, &active, Utc::now()) {
                match action {
                    AlertAction::Raise(alert) => {
                        tracing::info!(
                            stockpile_id = %stockpile_id,
                            alert_type = ?alert.alert_type,
                            severity = ?alert.severity,
                            "stock alert raised"
                        );
                        self.store
                            .insert_alert(alert)
                            .map_err(ServiceError::from_store)?;
                    }
                    AlertAction::Resolve { alert_id } => {
                        if let Some(mut alert) = self
                            .store
                            .alert(alert_id)
                            .map_err(ServiceError::from_store)?
                        {
                            alert.resolve(
                                None,
                                Utc::now(),
                                Some("threshold condition cleared".to_string()),
                            );
                            self.store
                                .update_alert(alert)
                                .map_err(ServiceError::from_store)?;
                            tracing::info!(alert_id = %alert_id, "stock alert auto-resolved");
                        }
                    }
                }
            }
            Ok(())
        })();

        if let Err(err) = result {
            tracing::error!(stockpile_id = %stockpile_id, %err, "alert evaluation failed");
        }
    }

    fn publish_ticket_events(&self, ticket: &Ticket, events: &[TicketEvent]) {
        let base = ticket.version() - events.len() as u64;
        for (idx, event) in events.iter().enumerate() {
            self.publish(ticket.id_typed().0, "weighing.ticket", base + idx as u64 + 1, event);
        }
    }

    fn publish_stockpile_events(&self, stockpile: &Stockpile, events: &[StockpileEvent]) {
        let base = stockpile.version() - events.len() as u64;
        for (idx, event) in events.iter().enumerate() {
            self.publish(
                stockpile.id_typed().0,
                "stock.stockpile",
                base + idx as u64 + 1,
                event,
            );
        }
    }

    /// Best-effort publication after commit. The store is the source of
    /// truth; a lost publication is logged and read models catch up on the
    /// next rebuild.
    fn publish<E: Event + serde::Serialize>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        sequence_number: u64,
        event: &E,
    ) {
        match serde_json::to_value(event) {
            Ok(payload) => {
                let envelope = EventEnvelope::new(
                    Uuid::now_v7(),
                    aggregate_id,
                    aggregate_type,
                    sequence_number,
                    payload,
                );
                if let Err(err) = self.bus.publish(envelope) {
                    tracing::warn!(?err, event_type = event.event_type(), "event publication failed");
                } else {
                    tracing::debug!(event_type = event.event_type(), sequence_number, "event published");
                }
            }
            Err(err) => {
                tracing::warn!(%err, event_type = event.event_type(), "event serialization failed");
            }
        }
    }
}

fn extract_movement(events: &[StockpileEvent]) -> Option<StockMovement> {
    events.iter().find_map(|event| match event {
        StockpileEvent::MovementAppended(e) => Some(e.movement.clone()),
        StockpileEvent::Created(_) => None,
    })
}

/// In-memory wiring: store + bus + service + read-side projections.
pub struct WeighbridgeApp {
    pub service:
        WeighbridgeService<Arc<InMemoryWeighbridgeStore>, Arc<InMemoryEventBus<JsonEnvelope>>>,
    pub store: Arc<InMemoryWeighbridgeStore>,
    pub bus: Arc<InMemoryEventBus<JsonEnvelope>>,
    pub ticket_index: Arc<TicketIndexProjection>,
}

/// Build the in-memory application (dev/test): wires the bus into the
/// ticket index projection on a background thread, so reads are eventually
/// consistent with commits.
pub fn build_in_memory(config: ServiceConfig) -> WeighbridgeApp {
    let store = Arc::new(InMemoryWeighbridgeStore::new());
    let bus: Arc<InMemoryEventBus<JsonEnvelope>> = Arc::new(InMemoryEventBus::new());
    let ticket_index = Arc::new(TicketIndexProjection::new());

    // Background subscriber: bus -> projection. Exits when the bus is
    // dropped and the channel disconnects.
    {
        let subscription = bus.subscribe();
        let projection = ticket_index.clone();
        std::thread::spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                if let Err(err) = projection.apply_envelope(&envelope) {
                    tracing::error!(?err, "ticket index projection failed to apply event");
                }
            }
        });
    }

    let service = WeighbridgeService::new(store.clone(), bus.clone(), config);
    WeighbridgeApp {
        service,
        store,
        bus,
        ticket_index,
    }
}
