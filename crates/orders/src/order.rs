use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weighpoint_core::{
    AggregateId, Direction, DriverId, Money, ProductId, SiteId, Tonnes, VehicleId,
};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order lifecycle, as managed by the external order component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    CheckedIn,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

/// An approved commercial intent to move a quantity of one product in or
/// out of a site.
///
/// The weighing core never mutates an order; it reads pricing, direction
/// and eligibility at ticket creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub site_id: SiteId,
    pub product_id: ProductId,
    pub vehicle_id: Option<VehicleId>,
    pub driver_id: Option<DriverId>,
    pub direction: Direction,
    pub status: OrderStatus,
    pub price_per_tonne: Money,
    pub ordered_quantity_tonnes: Tonnes,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether weighing tickets may currently be raised against this order.
    ///
    /// Approved orders accept tickets through check-in and loading; a
    /// completed, rejected or cancelled order no longer does.
    pub fn accepts_tickets(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Approved | OrderStatus::CheckedIn | OrderStatus::InProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_status(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(AggregateId::new()),
            order_number: "ORD-2026-00001".to_string(),
            site_id: SiteId::new(),
            product_id: ProductId::new(),
            vehicle_id: None,
            driver_id: None,
            direction: Direction::Outbound,
            status,
            price_per_tonne: Money::from_whole(50),
            ordered_quantity_tonnes: Tonnes::from_whole(30),
            approved_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn approved_orders_accept_tickets() {
        for status in [
            OrderStatus::Approved,
            OrderStatus::CheckedIn,
            OrderStatus::InProgress,
        ] {
            assert!(order_with_status(status).accepts_tickets(), "{status:?}");
        }
    }

    #[test]
    fn closed_or_unapproved_orders_do_not_accept_tickets() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
        ] {
            assert!(!order_with_status(status).accepts_tickets(), "{status:?}");
        }
    }
}
