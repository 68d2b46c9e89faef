//! `weighpoint-orders` — the commercial order collaborator.
//!
//! Orders are owned and mutated by an external order-management component;
//! the weighing core only reads them (pricing, direction, eligibility).

pub mod order;

pub use order::{Order, OrderId, OrderStatus};
