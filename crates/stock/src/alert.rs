//! Stock alerts and the threshold evaluator.
//!
//! The evaluator is stateless: after every ledger append it compares the
//! stockpile's balance against its thresholds and decides which alerts to
//! raise or auto-resolve. Raising is idempotent: an equivalent active
//! alert suppresses a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weighpoint_core::{AggregateId, OperatorId, ProductId, SiteId, Tonnes};

use crate::stockpile::{Stockpile, StockpileId};

/// Alert identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub AggregateId);

impl AlertId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AlertId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    Overstock,
    /// Reservations exceed the physical balance.
    Discrepancy,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Who acknowledged the alert, and when. Acknowledging is independent of
/// resolving: an acknowledged alert stays active until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub by: OperatorId,
    pub at: DateTime<Utc>,
}

/// How the alert was closed. `by` is `None` when the evaluator resolved it
/// automatically because the condition cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub by: Option<OperatorId>,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A raised stock condition with its own acknowledge/resolve lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: AlertId,
    pub stockpile_id: StockpileId,
    pub site_id: SiteId,
    pub product_id: ProductId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    /// The threshold that tripped, where one applies.
    pub threshold_tonnes: Option<Tonnes>,
    pub observed_tonnes: Tonnes,
    pub is_active: bool,
    pub acknowledgement: Option<Acknowledgement>,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockAlert {
    fn raise(
        id: AlertId,
        stockpile: &Stockpile,
        alert_type: AlertType,
        raised_at: DateTime<Utc>,
    ) -> Self {
        let observed = stockpile.current_quantity_tonnes();
        let (severity, threshold, title) = match alert_type {
            AlertType::LowStock => (
                if observed.is_zero() {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                },
                Some(stockpile.low_stock_threshold_tonnes()),
                format!(
                    "balance {} below low-stock threshold {}",
                    observed,
                    stockpile.low_stock_threshold_tonnes()
                ),
            ),
            AlertType::Overstock => (
                if observed > stockpile.capacity_tonnes() {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                },
                Some(stockpile.high_stock_threshold_tonnes()),
                format!(
                    "balance {} above high-stock threshold {}",
                    observed,
                    stockpile.high_stock_threshold_tonnes()
                ),
            ),
            AlertType::Discrepancy => (
                AlertSeverity::Warning,
                None,
                format!(
                    "reserved {} exceeds physical balance {}",
                    stockpile.reserved_quantity_tonnes(),
                    observed
                ),
            ),
        };

        Self {
            id,
            stockpile_id: stockpile.id_typed(),
            site_id: stockpile.site_id(),
            product_id: stockpile.product_id(),
            alert_type,
            severity,
            title,
            threshold_tonnes: threshold,
            observed_tonnes: observed,
            is_active: true,
            acknowledgement: None,
            resolution: None,
            created_at: raised_at,
            updated_at: raised_at,
        }
    }

    pub fn acknowledge(&mut self, by: OperatorId, at: DateTime<Utc>) {
        self.acknowledgement = Some(Acknowledgement { by, at });
        self.updated_at = at;
    }

    pub fn resolve(&mut self, by: Option<OperatorId>, at: DateTime<Utc>, notes: Option<String>) {
        self.is_active = false;
        self.resolution = Some(Resolution { by, at, notes });
        self.updated_at = at;
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// What the evaluator decided after one pass over a stockpile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertAction {
    Raise(StockAlert),
    /// Auto-resolve: the condition behind an active alert no longer holds.
    Resolve { alert_id: AlertId },
}

/// Re-evaluate a stockpile's alert set after a balance change.
///
/// `active` must be the currently active alerts for this stockpile. The
/// pass is idempotent: running it twice in a row on unchanged state
/// produces no actions the second time.
pub fn evaluate_alerts(
    stockpile: &Stockpile,
    active: &[StockAlert],
    now: DateTime<Utc>,
) -> Vec<AlertAction> {
    let conditions = [
        (AlertType::LowStock, stockpile.is_low_stock()),
        (AlertType::Overstock, stockpile.is_overstock()),
        (
            AlertType::Discrepancy,
            stockpile.available_quantity_tonnes().is_negative(),
        ),
    ];

    let mut actions = Vec::new();
    for (alert_type, holds) in conditions {
        let existing = active
            .iter()
            .find(|a| a.alert_type == alert_type && a.is_active);

        match (holds, existing) {
            (true, None) => {
                actions.push(AlertAction::Raise(StockAlert::raise(
                    AlertId::new(AggregateId::new()),
                    stockpile,
                    alert_type,
                    now,
                )));
            }
            (false, Some(alert)) => {
                actions.push(AlertAction::Resolve { alert_id: alert.id });
            }
            // Condition still holds and is already flagged, or neither.
            _ => {}
        }
    }

    actions
}
