//! # Store Ports
//!
//! The three collaborators the engine talks to. Anything that implements
//! them can back a placement: the SQLite adapter in production, the
//! in-memory adapter in tests.
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ PatientDirectory │   │  InventoryStore  │   │   OrderLedger    │
//! │  get_patient     │   │  get_drug        │   │  append_order    │
//! │                  │   │  try_reserve  ◄──┼── atomic per drug  │
//! │                  │   │  release         │   │  get / search    │
//! │                  │   │                  │   │  update_status   │
//! └──────────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//!
//! ## Declines vs Faults
//! `try_reserve` reports "not enough stock" as `Ok(ReserveOutcome::Insufficient)`.
//! `Err(StoreError)` is reserved for the store itself misbehaving.

use async_trait::async_trait;
use thiserror::Error;

use pharmacy_core::{Drug, NewOrder, Order, OrderFilter, OrderStatus, Patient, ReserveOutcome};
use pharmacy_db::DbError;

// =============================================================================
// Store Error
// =============================================================================

/// A storage-layer fault reported by a port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or timed out. Worth retrying.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The record the operation targets does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// The store rejected the operation. Retrying won't help.
    #[error("Store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Returns true if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            err if err.is_transient() => StoreError::Unavailable(err.to_string()),
            err => StoreError::Rejected(err.to_string()),
        }
    }
}

/// Result type for port operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Ports
// =============================================================================

/// Read-only patient lookup.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn get_patient(&self, id: i64) -> StoreResult<Option<Patient>>;
}

/// Drug reads and the reservation primitive.
///
/// ## Contract
/// - `try_reserve` compares and decrements as one step per drug: concurrent
///   successful reservations never drive stock below zero.
/// - `release` adds the quantity back unconditionally. It exists only to
///   undo a reservation.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_drug(&self, id: i64) -> StoreResult<Option<Drug>>;

    async fn try_reserve(&self, drug_id: i64, quantity: i64) -> StoreResult<ReserveOutcome>;

    async fn release(&self, drug_id: i64, quantity: i64) -> StoreResult<()>;
}

/// Durable order storage.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Writes an order and all its lines atomically.
    async fn append_order(&self, order: &NewOrder) -> StoreResult<Order>;

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>>;

    /// A patient's orders, oldest first.
    async fn orders_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Order>>;

    /// Orders matching every criterion of `filter`, oldest first.
    async fn search_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;

    /// Sets `to` if the order is still in `from`. `Ok(false)` when it is not.
    async fn update_status(&self, id: i64, from: OrderStatus, to: OrderStatus)
        -> StoreResult<bool>;
}
