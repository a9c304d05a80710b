//! # Validation Module
//!
//! Input validation for the pharmacy service.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractors (axum)                                       │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rule validation (no side effects)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0) constraints                                    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmacy_core::validation::{validate_order_request, validate_quantity};
//! use pharmacy_core::{OrderLineRequest, PlaceOrderRequest};
//!
//! validate_quantity(5).unwrap();
//!
//! let request = PlaceOrderRequest {
//!     patient_id: 1,
//!     lines: vec![OrderLineRequest { drug_id: 3, quantity: 2 }],
//! };
//! validate_order_request(&request).unwrap();
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{
    DrugUpdate, NewDrug, Order, OrderFilter, PatientInput, PlaceOrderRequest, WarehouseInput,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a drug name (1-100 characters).
pub fn validate_drug_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 100)
}

/// Validates an optional drug description (at most 500 characters).
pub fn validate_description(description: Option<&str>) -> ValidationResult<()> {
    match description {
        Some(text) if text.chars().count() > 500 => Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        }),
        _ => Ok(()),
    }
}

/// Validates a phone number.
///
/// ## Rules
/// - Must not be empty
/// - Digits, spaces, `+`, `-`, `(`, `)` only
/// - At least 5 digits
pub fn validate_phone_number(phone: &str) -> ValidationResult<()> {
    validate_text("phone_number", phone, 30)?;

    let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
    if !phone.trim().chars().all(allowed) {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "must contain only digits, spaces, and + - ( )".to_string(),
        });
    }

    if phone.chars().filter(char::is_ascii_digit).count() < 5 {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "must contain at least 5 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a store-assigned identifier.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity. Any positive count is accepted; whether the
/// stock covers it is the reservation's call.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed.
///
/// ```rust
/// use pharmacy_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("price", cents)
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    validate_non_negative("stock", stock)
}

/// Validates a restock delta. Must add at least one unit.
pub fn validate_restock_quantity(delta: i64) -> ValidationResult<()> {
    if delta <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "restock quantity".to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

pub fn validate_new_drug(drug: &NewDrug) -> ValidationResult<()> {
    validate_drug_name(&drug.name)?;
    validate_description(drug.description.as_deref())?;
    validate_price_cents(drug.price_cents)?;
    validate_stock(drug.stock)?;
    validate_id("warehouse_id", drug.warehouse_id)
}

pub fn validate_drug_update(drug: &DrugUpdate) -> ValidationResult<()> {
    validate_drug_name(&drug.name)?;
    validate_description(drug.description.as_deref())?;
    validate_price_cents(drug.price_cents)?;
    validate_id("warehouse_id", drug.warehouse_id)
}

pub fn validate_warehouse(warehouse: &WarehouseInput) -> ValidationResult<()> {
    validate_text("name", &warehouse.name, 200)?;
    validate_text("address", &warehouse.address, 200)?;
    validate_non_negative("capacity", warehouse.capacity)
}

pub fn validate_patient(patient: &PatientInput) -> ValidationResult<()> {
    validate_text("name", &patient.name, 200)?;
    validate_text("address", &patient.address, 200)?;
    validate_phone_number(&patient.phone_number)
}

// =============================================================================
// Order Validators
// =============================================================================

/// Validates a placement request before any store is touched.
///
/// ## Rules
/// ```text
/// patient_id > 0
/// lines non-empty
/// every line: drug_id > 0, quantity > 0
/// no drug_id appears on two lines (rejected, never merged)
/// ```
pub fn validate_order_request(request: &PlaceOrderRequest) -> ValidationResult<()> {
    validate_id("patient_id", request.patient_id)?;

    if request.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(request.lines.len());
    for line in &request.lines {
        validate_id("drug_id", line.drug_id)?;
        validate_quantity(line.quantity)?;

        if !seen.insert(line.drug_id) {
            return Err(ValidationError::Duplicate {
                field: "drug_id".to_string(),
                value: line.drug_id.to_string(),
            });
        }
    }

    Ok(())
}

/// Validates an order search filter.
pub fn validate_order_filter(filter: &OrderFilter) -> ValidationResult<()> {
    if let Some(patient_id) = filter.patient_id {
        validate_id("patient_id", patient_id)?;
    }

    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "date range".to_string(),
                reason: "from must not be after to".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates a payment amount against the order it pays for.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must equal the order total
pub fn validate_payment_amount(cents: i64, order: &Order) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    if cents != order.total_cents {
        return Err(ValidationError::Mismatch {
            field: "payment amount".to_string(),
            expected: order.total().to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
