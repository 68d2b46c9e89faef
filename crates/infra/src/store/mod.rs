//! Transactional store boundary.
//!
//! Defines the contract the weighing core requires of its store without
//! making storage assumptions; the in-memory implementation backs tests
//! and single-process edge deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryWeighbridgeStore;
pub use r#trait::{StockpileWrite, StoreError, WeighbridgeStore};
