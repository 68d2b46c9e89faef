//! `weighpoint-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error taxonomy, aggregate execution
//! traits, fixed-precision weight/money units, and the offline-sync marker.

pub mod aggregate;
pub mod direction;
pub mod error;
pub mod id;
pub mod sync;
pub mod units;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use direction::Direction;
pub use error::{DomainError, DomainResult};
pub use id::{
    AggregateId, DriverId, OperatorId, ProductId, SiteId, VehicleId, WeighbridgeId,
};
pub use sync::SyncStatus;
pub use units::{Kilograms, Money, Tonnes};
