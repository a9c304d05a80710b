//! # Domain Types
//!
//! Core domain types used throughout the pharmacy service.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Warehouse    │◄──│      Drug       │   │     Patient     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  name           │   │  price_cents    │   │  name           │       │
//! │  │  capacity       │   │  stock          │   │  phone_number   │       │
//! │  └─────────────────┘   └────────▲────────┘   └────────▲────────┘       │
//! │                                 │ drug_id             │ patient_id      │
//! │  ┌─────────────────┐   ┌────────┴────────┐   ┌────────┴────────┐       │
//! │  │    Payment      │──►│    OrderLine    │◄──│      Order      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_id (1:1) │   │  quantity       │   │  total_cents    │       │
//! │  │  status         │   │  unit_price     │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! An [`Order`] exclusively owns its [`OrderLine`]s. Drugs and patients are
//! referenced by id and live independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Warehouse
// =============================================================================

/// A storage location that owns drug stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub address: String,
    /// Nominal number of units the warehouse can hold.
    pub capacity: i64,
}

/// Fields accepted when creating or replacing a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseInput {
    pub name: String,
    pub address: String,
    pub capacity: i64,
}

// =============================================================================
// Drug
// =============================================================================

/// A drug with a unit price and a stock counter.
///
/// ## Stock Invariant
/// `stock` is never negative. It changes only through the reservation
/// primitive (reserve / release) or an explicit restock delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Drug {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Units currently available.
    pub stock: i64,
    pub warehouse_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Drug {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if the current snapshot could cover `quantity`.
    ///
    /// Advisory only: a concurrent placement may consume the stock before
    /// the actual reservation runs.
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

/// Fields accepted when creating a drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDrug {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    /// Opening stock level.
    #[serde(default)]
    pub stock: i64,
    pub warehouse_id: i64,
}

/// A drug added to a known warehouse in bulk. The warehouse comes from the
/// request path, not the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDrugInput {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

impl WarehouseDrugInput {
    pub fn into_new_drug(self, warehouse_id: i64) -> NewDrug {
        NewDrug {
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            stock: self.stock,
            warehouse_id,
        }
    }
}

/// Fields accepted when updating a drug. Stock is not among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugUpdate {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub warehouse_id: i64,
}

// =============================================================================
// Patient
// =============================================================================

/// A patient that orders can be placed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone_number: String,
}

/// Fields accepted when creating or replacing a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInput {
    pub name: String,
    pub address: String,
    pub phone_number: String,
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ## State Machine
/// ```text
///              ┌──────────► Fulfilled (terminal)
///   Placed ────┤
///              └──────────► Cancelled (terminal)
/// ```
/// `Placed` is reachable only through a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock reserved and order durably recorded.
    #[default]
    Placed,
    /// Handed over to the patient.
    Fulfilled,
    /// Withdrawn by an external workflow.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if no further transitions are possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    /// Returns true if the state machine allows `self → next`.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Placed, OrderStatus::Fulfilled)
                | (OrderStatus::Placed, OrderStatus::Cancelled)
        )
    }

    /// Validates a transition and returns the new status.
    pub fn transition_to(self, next: OrderStatus) -> CoreResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true if a payment may be recorded against an order in this status.
    pub const fn accepts_payment(&self) -> bool {
        matches!(self, OrderStatus::Placed | OrderStatus::Fulfilled)
    }

    /// Lowercase name, matching the stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line of a placed order.
/// Uses snapshot pattern to freeze the unit price at reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub drug_id: i64,
    pub quantity: i64,
    /// Unit price in cents at time of reservation (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
}

impl OrderLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A priced line that has not been written to the ledger yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub drug_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl NewOrderLine {
    /// Prices a line from the unit price observed at reservation.
    pub fn priced(drug_id: i64, quantity: i64, unit_price: Money) -> CoreResult<Self> {
        let line_total = unit_price.checked_line_total(quantity)?;
        Ok(NewOrderLine {
            drug_id,
            quantity,
            unit_price_cents: unit_price.cents(),
            line_total_cents: line_total.cents(),
        })
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub ordered_at: DateTime<Utc>,
    pub patient_id: i64,
    /// Σ line totals, derived at placement.
    pub total_cents: i64,
    pub status: OrderStatus,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<OrderLine>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub payment: Option<Payment>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Recomputes Σ(quantity × unit price) from the lines, with the same
    /// overflow checks placement applies.
    pub fn lines_total(&self) -> CoreResult<Money> {
        self.lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.unit_price().checked_line_total(line.quantity)?)
        })
    }
}

/// An order ready to be appended to the ledger.
///
/// Built only through [`NewOrder::placed`], so the total always matches the
/// lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub patient_id: i64,
    pub ordered_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Creates a `Placed` order whose total is the sum of its line totals.
    pub fn placed(
        patient_id: i64,
        lines: Vec<NewOrderLine>,
        ordered_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let total = lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(Money::from_cents(line.line_total_cents))
        })?;

        Ok(NewOrder {
            patient_id,
            ordered_at,
            status: OrderStatus::Placed,
            total_cents: total.cents(),
            lines,
        })
    }

    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Placement Request
// =============================================================================

/// One requested (drug, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub drug_id: i64,
    pub quantity: i64,
}

/// A request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub patient_id: i64,
    pub lines: Vec<OrderLineRequest>,
}

// =============================================================================
// Reservation
// =============================================================================

/// Result of an atomic conditional stock decrement.
///
/// A decline is an expected business outcome, not an error; storage faults
/// travel separately as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveOutcome {
    /// Stock was decremented. Carries the price observed under the same
    /// atomic step.
    Reserved {
        unit_price_cents: i64,
        remaining_stock: i64,
    },
    /// Stock could not cover the quantity; nothing changed.
    Insufficient { available: i64 },
    /// The drug no longer exists.
    UnknownDrug,
}

impl ReserveOutcome {
    /// Returns true if stock was decremented.
    pub const fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved { .. })
    }
}

// =============================================================================
// Order Search
// =============================================================================

/// AND-composed order search filter. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub patient_id: Option<i64>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// Filter for a single patient's history.
    pub fn for_patient(patient_id: i64) -> Self {
        OrderFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    /// Returns true if the order satisfies every present criterion.
    pub fn matches(&self, order: &Order) -> bool {
        self.from.map_or(true, |from| order.ordered_at >= from)
            && self.to.map_or(true, |to| order.ordered_at <= to)
            && self.patient_id.map_or(true, |id| order.patient_id == id)
            && self.status.map_or(true, |status| order.status == status)
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// A payment for a placed order. At most one per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Fields accepted when recording a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub order_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(drug_id: i64, quantity: i64, unit_price_cents: i64) -> NewOrderLine {
        NewOrderLine::priced(drug_id, quantity, Money::from_cents(unit_price_cents)).unwrap()
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Placed);
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Fulfilled));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Cancelled));

        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Placed));
        assert!(!OrderStatus::Fulfilled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Placed));

        assert!(matches!(
            OrderStatus::Fulfilled.transition_to(OrderStatus::Placed),
            Err(CoreError::InvalidStatusTransition { .. })
        ));
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Cancelled.accepts_payment());
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Fulfilled).unwrap();
        assert_eq!(json, "\"fulfilled\"");
        let parsed: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn test_new_order_total_is_sum_of_lines() {
        let order = NewOrder::placed(1, vec![line(1, 4, 500), line(2, 3, 125)], Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total().cents(), 2000 + 375);
        assert_eq!(order.lines[0].line_total_cents, 2000);
    }

    #[test]
    fn test_new_order_total_overflow() {
        let lines = vec![line(1, 1, i64::MAX), line(2, 1, 1)];
        assert!(matches!(
            NewOrder::placed(1, lines, Utc::now()),
            Err(CoreError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_lines_total_is_checked() {
        let stored_line = |id: i64, quantity: i64, unit_price_cents: i64| OrderLine {
            id,
            order_id: 1,
            drug_id: id,
            quantity,
            unit_price_cents,
            line_total_cents: unit_price_cents.wrapping_mul(quantity),
        };
        let mut order = Order {
            id: 1,
            ordered_at: Utc::now(),
            patient_id: 1,
            total_cents: 2375,
            status: OrderStatus::Placed,
            lines: vec![stored_line(1, 4, 500), stored_line(2, 3, 125)],
            payment: None,
        };
        assert_eq!(order.lines_total().unwrap(), order.total());

        order.lines.push(stored_line(3, 3, i64::MAX / 2));
        assert!(matches!(order.lines_total(), Err(CoreError::AmountOverflow { .. })));
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let order = Order {
            id: 1,
            ordered_at: now,
            patient_id: 7,
            total_cents: 100,
            status: OrderStatus::Placed,
            lines: Vec::new(),
            payment: None,
        };

        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter::for_patient(7).matches(&order));
        assert!(!OrderFilter::for_patient(8).matches(&order));

        let bounded = OrderFilter {
            from: Some(now),
            to: Some(now),
            status: Some(OrderStatus::Placed),
            ..Default::default()
        };
        assert!(bounded.matches(&order));

        let later = OrderFilter {
            from: Some(now + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&order));
    }
}
