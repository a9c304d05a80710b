//! Error types for API handlers.
//!
//! Every failure leaves a handler as an [`ApiError`], rendered as
//! `{"code": "...", "message": "..."}` with a matching status.
//!
//! ## Status Mapping
//! ```text
//! ┌────────────────────────────────┬────────┬──────────────────────────┐
//! │  Failure                       │ Status │ Code                     │
//! ├────────────────────────────────┼────────┼──────────────────────────┤
//! │  bad input, unparsable request │  400   │ VALIDATION_ERROR         │
//! │  unknown patient/drug/order    │  404   │ *_NOT_FOUND              │
//! │  stock could not cover a line  │  409   │ INSUFFICIENT_STOCK       │
//! │  duplicate / state conflict    │  409   │ CONFLICT, ...            │
//! │  store down (retryable)        │  503   │ SERVICE_UNAVAILABLE      │
//! │  rollback failed, stock leaked │  500   │ COMPENSATION_FAILED      │
//! │  anything else                 │  500   │ INTERNAL_ERROR           │
//! └────────────────────────────────┴────────┴──────────────────────────┘
//! ```
//!
//! Storage details are logged, never returned to the client.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use pharmacy_core::CoreError;
use pharmacy_db::DbError;
use pharmacy_orders::{PlacementError, QueryError, StoreError};

const UNAVAILABLE_MESSAGE: &str = "Storage is temporarily unavailable, retry the request";
const INTERNAL_MESSAGE: &str = "Internal server error";
const REFERENCE_MESSAGE: &str =
    "The record is referenced by, or refers to, a record that does not allow this change";
const CHECK_MESSAGE: &str = "A value is outside the range the record allows";

/// An HTTP-ready error.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            UNAVAILABLE_MESSAGE,
        )
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE,
        )
    }

    fn from_store(err: &StoreError) -> Self {
        error!(error = %err, "Storage failure");
        if err.is_retryable() {
            Self::unavailable()
        } else {
            Self::internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            details: self.details.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Conversions
// =============================================================================

impl From<PlacementError> for ApiError {
    fn from(err: PlacementError) -> Self {
        match &err {
            PlacementError::InvalidRequest(e) => ApiError::bad_request(e.to_string()),
            PlacementError::PatientNotFound(_) => {
                ApiError::not_found("PATIENT_NOT_FOUND", err.to_string())
            }
            PlacementError::DrugNotFound(_) => {
                ApiError::not_found("DRUG_NOT_FOUND", err.to_string())
            }
            PlacementError::InsufficientStock {
                drug_id,
                requested,
                available,
            } => ApiError::conflict("INSUFFICIENT_STOCK", err.to_string()).with_details(json!({
                "drug_id": drug_id,
                "requested": requested,
                "available": available,
            })),
            PlacementError::Pricing(e) => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "PRICING_FAILED",
                e.to_string(),
            ),
            PlacementError::Storage(e) => ApiError::from_store(e),
            PlacementError::CompensationFailed { unreleased, cause } => {
                error!(
                    unreleased = unreleased.len(),
                    cause = %cause,
                    "ALARM: placement left reserved stock behind"
                );
                let leaked: Vec<Value> = unreleased
                    .iter()
                    .map(|r| json!({ "drug_id": r.drug_id, "quantity": r.quantity }))
                    .collect();
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMPENSATION_FAILED",
                    "Order failed and reserved stock could not be fully released",
                )
                .with_details(json!({ "unreleased": leaked }))
            }
            PlacementError::Interrupted => {
                error!("Placement interrupted");
                ApiError::internal()
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match &err {
            QueryError::InvalidFilter(e) => ApiError::bad_request(e.to_string()),
            QueryError::OrderNotFound(_) => ApiError::not_found("ORDER_NOT_FOUND", err.to_string()),
            QueryError::InvalidTransition { .. } => {
                ApiError::conflict("INVALID_TRANSITION", err.to_string())
            }
            QueryError::StatusConflict { .. } => {
                ApiError::conflict("STATUS_CONFLICT", err.to_string())
            }
            QueryError::Storage(e) => ApiError::from_store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::NotFound { .. } => ApiError::not_found("NOT_FOUND", err.to_string()),
            DbError::Invalid(e) => ApiError::bad_request(e.to_string()),
            DbError::CheckViolation { .. } => {
                warn!(error = %err, "Write rejected by a check constraint");
                ApiError::bad_request(CHECK_MESSAGE)
            }
            DbError::Domain(CoreError::InvalidStatusTransition { .. }) => {
                ApiError::conflict("INVALID_TRANSITION", err.to_string())
            }
            DbError::Domain(e) => ApiError::bad_request(e.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict("DUPLICATE", err.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                warn!(error = %err, "Write rejected by a foreign key");
                ApiError::conflict("REFERENCE_CONFLICT", REFERENCE_MESSAGE)
            }
            DbError::Conflict { .. } => ApiError::conflict("CONFLICT", err.to_string()),
            _ if err.is_transient() => {
                error!(error = %err, "Transient database failure");
                ApiError::unavailable()
            }
            _ => {
                error!(error = %err, "Database failure");
                ApiError::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmacy_core::ValidationError;
    use pharmacy_orders::UnreleasedReservation;

    #[test]
    fn test_placement_mapping() {
        let declined = ApiError::from(PlacementError::InsufficientStock {
            drug_id: 4,
            requested: 5,
            available: 3,
        });
        assert_eq!(declined.status, StatusCode::CONFLICT);
        assert_eq!(declined.code, "INSUFFICIENT_STOCK");
        assert_eq!(declined.details.unwrap()["available"], 3);

        let invalid = ApiError::from(PlacementError::InvalidRequest(ValidationError::Required {
            field: "lines".to_string(),
        }));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

        let missing = ApiError::from(PlacementError::PatientNotFound(9));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_detail_is_not_leaked() {
        let err = ApiError::from(PlacementError::Storage(StoreError::Unavailable(
            "disk I/O error at /var/lib/pharmacy.db".to_string(),
        )));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("/var/lib"));

        let rejected = ApiError::from(PlacementError::Storage(StoreError::Rejected(
            "constraint".to_string(),
        )));
        assert_eq!(rejected.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rejected.code, "INTERNAL_ERROR");
    }

    #[test]
    fn test_compensation_failure_is_distinct() {
        let err = ApiError::from(PlacementError::CompensationFailed {
            unreleased: vec![UnreleasedReservation {
                drug_id: 2,
                quantity: 6,
                last_error: "down".to_string(),
            }],
            cause: Box::new(PlacementError::Interrupted),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "COMPENSATION_FAILED");
        assert_eq!(err.details.unwrap()["unreleased"][0]["quantity"], 6);
    }

    #[test]
    fn test_db_mapping() {
        assert_eq!(
            ApiError::from(DbError::not_found("Drug", 1)).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DbError::duplicate("payment for order", 3)).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::PoolExhausted).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(DbError::MigrationFailed("bad".to_string())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_constraint_text_stays_in_the_log() {
        let reference = ApiError::from(DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string(),
        });
        assert_eq!(reference.status, StatusCode::CONFLICT);
        assert_eq!(reference.code, "REFERENCE_CONFLICT");
        assert!(!reference.message.contains("FOREIGN KEY"));

        let check = ApiError::from(DbError::CheckViolation {
            message: "CHECK constraint failed: stock >= 0".to_string(),
        });
        assert_eq!(check.status, StatusCode::BAD_REQUEST);
        assert!(!check.message.contains("CHECK"));
        assert!(!check.message.contains("stock >= 0"));
    }
}
