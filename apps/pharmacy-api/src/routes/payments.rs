//! Payment routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use pharmacy_core::{NewPayment, Payment};
use pharmacy_db::DbError;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(record_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/refund", post(refund_payment))
}

async fn record_payment(
    State(state): State<AppState>,
    ApiJson(payment): ApiJson<NewPayment>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let recorded = state.db.payments().record(&payment).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

async fn get_payment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Payment>> {
    let payment = state
        .db
        .payments()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Payment", id))?;
    Ok(Json(payment))
}

async fn refund_payment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.db.payments().refund(id).await?))
}
