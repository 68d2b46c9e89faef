//! `weighpoint-infra` — transactional store, application services, and
//! read-side projections.
//!
//! The store trait is the contract any backing store must honor:
//! per-entity compare-and-swap plus a handful of multi-entity commits that
//! are atomic (ticket settlement, transfers). The in-memory implementation
//! is the reference used by tests and edge deployments.

pub mod config;
pub mod projections;
pub mod services;
pub mod store;

pub use config::ServiceConfig;
pub use projections::{TicketFilter, TicketIndexProjection, TicketReadModel};
pub use services::{
    AdjustmentRequest, CreateStockpileRequest, CreateTicketRequest, FinalizeRequest, JsonEnvelope,
    ServiceError, StockTransfer, TransferRequest, VoidRequest, WeighbridgeApp,
    WeighbridgeService, WeighingRequest, build_in_memory,
};
pub use store::{InMemoryWeighbridgeStore, StockpileWrite, StoreError, WeighbridgeStore};
