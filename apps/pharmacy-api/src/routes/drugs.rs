//! Drug catalogue routes.
//!
//! Stock is never set through these routes except by `restock`, which adds
//! a positive delta.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use pharmacy_core::{Drug, DrugUpdate, NewDrug};
use pharmacy_db::DbError;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/drugs", get(list_drugs).post(create_drug))
        .route(
            "/drugs/{id}",
            get(get_drug).put(update_drug).delete(delete_drug),
        )
        .route("/drugs/{id}/restock", post(restock_drug))
}

#[derive(Debug, Deserialize)]
pub struct Restock {
    pub quantity: i64,
}

async fn list_drugs(State(state): State<AppState>) -> ApiResult<Json<Vec<Drug>>> {
    Ok(Json(state.db.drugs().list().await?))
}

async fn create_drug(
    State(state): State<AppState>,
    ApiJson(drug): ApiJson<NewDrug>,
) -> ApiResult<(StatusCode, Json<Drug>)> {
    let created = state.db.drugs().insert(&drug).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_drug(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Drug>> {
    let drug = state
        .db
        .drugs()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Drug", id))?;
    Ok(Json(drug))
}

async fn update_drug(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<DrugUpdate>,
) -> ApiResult<Json<Drug>> {
    Ok(Json(state.db.drugs().update(id, &update).await?))
}

async fn delete_drug(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.db.drugs().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restock_drug(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(restock): ApiJson<Restock>,
) -> ApiResult<Json<Drug>> {
    Ok(Json(state.db.drugs().restock(id, restock.quantity).await?))
}
