//! # Placement and Query Errors
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category        Variants                          Net stock change    │
//! │  ─────────────   ───────────────────────────────   ───────────────     │
//! │  Validation      InvalidRequest                    none                │
//! │                  PatientNotFound, DrugNotFound                         │
//! │  Decline         InsufficientStock                 zero (compensated)  │
//! │  Fault           Storage, Pricing, Interrupted     zero (compensated)  │
//! │  Alarm           CompensationFailed                LEAKED, see list    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use pharmacy_core::{CoreError, OrderStatus, ValidationError};

use crate::compensation::UnreleasedReservation;
use crate::ports::StoreError;

// =============================================================================
// Placement Error
// =============================================================================

/// Why a placement did not produce an order.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The request itself is malformed (empty, bad quantity, duplicate drug).
    #[error("Invalid order request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("Patient not found: {0}")]
    PatientNotFound(i64),

    #[error("Drug not found: {0}")]
    DrugNotFound(i64),

    /// Stock could not cover a line when its reservation ran.
    #[error("Insufficient stock for drug {drug_id}: requested {requested}, available {available}")]
    InsufficientStock {
        drug_id: i64,
        requested: i64,
        available: i64,
    },

    /// Computing the order total failed (amount overflow).
    #[error("Pricing failed: {0}")]
    Pricing(#[source] CoreError),

    /// A store call failed. The caller may retry the whole placement when
    /// [`PlacementError::is_retryable`] says so.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Rolling back reservations failed after retries were exhausted.
    ///
    /// The listed stock is leaked until an operator releases it.
    #[error("Compensation failed: {} reservation(s) could not be released", .unreleased.len())]
    CompensationFailed {
        unreleased: Vec<UnreleasedReservation>,
        #[source]
        cause: Box<PlacementError>,
    },

    /// The placement task panicked or was torn down by the runtime.
    #[error("Placement was interrupted")]
    Interrupted,
}

impl PlacementError {
    /// Caller-fixable input problems.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlacementError::InvalidRequest(_)
                | PlacementError::PatientNotFound(_)
                | PlacementError::DrugNotFound(_)
        )
    }

    /// An expected business outcome, not a defect.
    pub fn is_decline(&self) -> bool {
        matches!(self, PlacementError::InsufficientStock { .. })
    }

    /// Transient storage trouble; the whole placement can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlacementError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Stock was leaked and needs operator attention.
    pub fn is_alarm(&self) -> bool {
        matches!(self, PlacementError::CompensationFailed { .. })
    }
}

/// Result type for placements.
pub type PlacementResult<T> = Result<T, PlacementError>;

// =============================================================================
// Query Error
// =============================================================================

/// Errors from the order query layer.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid order filter: {0}")]
    InvalidFilter(#[from] ValidationError),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order changed status between read and update.
    #[error("Order {id} is no longer {expected}")]
    StatusConflict { id: i64, expected: OrderStatus },

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl QueryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Storage(err) if err.is_retryable())
    }
}

/// Result type for query-layer operations.
pub type QueryResult<T> = Result<T, QueryError>;
