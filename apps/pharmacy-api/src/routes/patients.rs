//! Patient routes. Order history lives in [`super::orders`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use pharmacy_core::{Patient, PatientInput};
use pharmacy_db::DbError;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Vec<Patient>>> {
    Ok(Json(state.db.patients().list().await?))
}

async fn create_patient(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PatientInput>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let created = state.db.patients().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Patient>> {
    let patient = state
        .db
        .patients()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Patient", id))?;
    Ok(Json(patient))
}

async fn update_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PatientInput>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.db.patients().update(id, &input).await?))
}

async fn delete_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.db.patients().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
