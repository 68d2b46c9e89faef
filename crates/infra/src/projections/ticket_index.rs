use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use weighpoint_core::{AggregateId, Direction, Money, ProductId, SiteId, Tonnes, VehicleId};
use weighpoint_events::EventEnvelope;
use weighpoint_orders::OrderId;
use weighpoint_tickets::{TicketEvent, TicketId, TicketNumber};

/// Queryable ticket row for list/filter screens.
///
/// Read models are disposable and rebuildable from the event stream; the
/// transactional ticket record stays id-only, so any display
/// denormalization (names, registrations) belongs here, resolved by the
/// reporting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketReadModel {
    pub ticket_id: TicketId,
    pub ticket_number: TicketNumber,
    pub order_id: Option<OrderId>,
    pub site_id: SiteId,
    pub vehicle_id: VehicleId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub status: String,
    pub net_weight_tonnes: Option<Tonnes>,
    pub total_value: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for the ticket list query. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub site_id: Option<SiteId>,
    pub order_id: Option<OrderId>,
    pub vehicle_id: Option<VehicleId>,
    pub status: Option<String>,
    /// Only tickets still moving through the state machine.
    pub active_only: bool,
}

#[derive(Debug, Error)]
pub enum TicketIndexError {
    #[error("failed to deserialize ticket event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Ticket index projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a queryable
/// ticket list. Idempotent for at-least-once delivery: replays at or below
/// the per-ticket cursor are ignored.
#[derive(Debug, Default)]
pub struct TicketIndexProjection {
    rows: RwLock<HashMap<TicketId, TicketReadModel>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl TicketIndexProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ticket_id: TicketId) -> Option<TicketReadModel> {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.get(&ticket_id).cloned())
    }

    /// List tickets matching the filter, newest first.
    pub fn list(&self, filter: &TicketFilter) -> Vec<TicketReadModel> {
        let Ok(rows) = self.rows.read() else {
            return Vec::new();
        };

        let mut matched: Vec<TicketReadModel> = rows
            .values()
            .filter(|row| filter.site_id.is_none_or(|s| row.site_id == s))
            .filter(|row| filter.order_id.is_none_or(|o| row.order_id == Some(o)))
            .filter(|row| filter.vehicle_id.is_none_or(|v| row.vehicle_id == v))
            .filter(|row| {
                filter
                    .status
                    .as_deref()
                    .is_none_or(|status| row.status == status)
            })
            .filter(|row| {
                !filter.active_only || !matches!(row.status.as_str(), "finalized" | "voided")
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Ignores envelopes for other aggregate types
    /// - Enforces monotonic sequence per ticket
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TicketIndexError> {
        if envelope.aggregate_type() != "weighing.ticket" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let (Ok(mut cursors), Ok(mut rows)) = (self.cursors.write(), self.rows.write()) else {
            return Ok(());
        };

        let last = *cursors.get(&aggregate_id).unwrap_or(&0);
        if seq == 0 {
            return Err(TicketIndexError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(TicketIndexError::NonMonotonicSequence { last, found: seq });
        }

        let event: TicketEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| TicketIndexError::Deserialize(e.to_string()))?;

        match event {
            TicketEvent::Opened(e) => {
                rows.insert(
                    e.ticket_id,
                    TicketReadModel {
                        ticket_id: e.ticket_id,
                        ticket_number: e.ticket_number,
                        order_id: e.order_id,
                        site_id: e.site_id,
                        vehicle_id: e.vehicle_id,
                        product_id: e.product_id,
                        direction: e.direction,
                        status: "open".to_string(),
                        net_weight_tonnes: None,
                        total_value: None,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            TicketEvent::TareCaptured(e) => {
                if let Some(row) = rows.get_mut(&e.ticket_id) {
                    row.status = "tare_captured".to_string();
                    row.updated_at = e.capture.captured_at;
                }
            }
            TicketEvent::GrossCaptured(e) => {
                if let Some(row) = rows.get_mut(&e.ticket_id) {
                    row.status = "gross_captured".to_string();
                    row.updated_at = e.capture.captured_at;
                }
            }
            TicketEvent::Finalized(e) => {
                if let Some(row) = rows.get_mut(&e.ticket_id) {
                    row.status = "finalized".to_string();
                    row.net_weight_tonnes = Some(e.settlement.net_weight_tonnes);
                    row.total_value = Some(e.settlement.total_value);
                    row.updated_at = e.settlement.finalized_at;
                }
            }
            TicketEvent::Voided(e) => {
                if let Some(row) = rows.get_mut(&e.ticket_id) {
                    row.status = "voided".to_string();
                    row.updated_at = e.void.voided_at;
                }
            }
        }

        // Advance cursor after successful apply.
        cursors.insert(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), TicketIndexError> {
        if let (Ok(mut cursors), Ok(mut rows)) = (self.cursors.write(), self.rows.write()) {
            cursors.clear();
            rows.clear();
        }

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
