//! Domain errors.
//!
//! [`ValidationError`] is always the caller's to fix and is raised before
//! anything is read or written. [`CoreError`] covers rule violations found
//! while working on valid input. Storage, placement and HTTP errors wrap
//! these in their own crates.

use thiserror::Error;

use crate::types::OrderStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Terminal orders stay put, and no order returns to `Placed`.
    #[error("Order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Amount overflow while computing {context}")]
    AmountOverflow { context: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Malformed phone numbers, inverted date ranges and the like.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same drug on two lines of one request.
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// The value has to match the referenced record, e.g. a payment amount.
    #[error("{field} must equal {expected}")]
    Mismatch { field: String, expected: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
