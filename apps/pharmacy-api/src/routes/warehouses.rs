//! Warehouse routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use pharmacy_core::{Drug, Warehouse, WarehouseDrugInput, WarehouseInput};
use pharmacy_db::DbError;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route(
            "/warehouses/{id}",
            get(get_warehouse)
                .put(update_warehouse)
                .delete(delete_warehouse),
        )
        .route(
            "/warehouses/{id}/drugs",
            get(warehouse_drugs)
                .post(add_warehouse_drugs)
                .delete(remove_warehouse_drugs),
        )
}

async fn list_warehouses(State(state): State<AppState>) -> ApiResult<Json<Vec<Warehouse>>> {
    Ok(Json(state.db.warehouses().list().await?))
}

async fn create_warehouse(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<WarehouseInput>,
) -> ApiResult<(StatusCode, Json<Warehouse>)> {
    let created = state.db.warehouses().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_warehouse(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Warehouse>> {
    let warehouse = state
        .db
        .warehouses()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Warehouse", id))?;
    Ok(Json(warehouse))
}

async fn update_warehouse(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<WarehouseInput>,
) -> ApiResult<Json<Warehouse>> {
    Ok(Json(state.db.warehouses().update(id, &input).await?))
}

async fn delete_warehouse(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.db.warehouses().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn warehouse_drugs(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Drug>>> {
    if state.db.warehouses().get_by_id(id).await?.is_none() {
        return Err(DbError::not_found("Warehouse", id).into());
    }
    Ok(Json(state.db.drugs().list_by_warehouse(id).await?))
}

/// Body: an array of drugs to create in this warehouse.
async fn add_warehouse_drugs(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(drugs): ApiJson<Vec<WarehouseDrugInput>>,
) -> ApiResult<(StatusCode, Json<Vec<Drug>>)> {
    let added = state.db.warehouses().add_drugs(id, drugs).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// Body: an array of drug ids. Ids stored elsewhere are ignored.
async fn remove_warehouse_drugs(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(drug_ids): ApiJson<Vec<i64>>,
) -> ApiResult<StatusCode> {
    state.db.warehouses().remove_drugs(id, &drug_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}
