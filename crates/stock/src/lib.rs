//! `weighpoint-stock` — stockpiles, the movement ledger, and stock alerts.
//!
//! A stockpile's balance is a projection of its append-only movement
//! ledger: every balance change flows through exactly one movement record
//! carrying before/after snapshots. Alerts are derived from stockpile state
//! after each append.

pub mod alert;
pub mod movement;
pub mod stockpile;

pub use alert::{
    Acknowledgement, AlertAction, AlertId, AlertSeverity, AlertType, Resolution, StockAlert,
    evaluate_alerts,
};
pub use movement::{
    AdjustmentReason, MovementDirection, MovementId, MovementProvenance, MovementType,
    StockMovement, TransferLeg,
};
pub use stockpile::{
    AppendMovement, CreateStockpile, MovementAppended, Stockpile, StockpileCommand,
    StockpileCreated, StockpileEvent, StockpileId, StockpileStatus,
};
