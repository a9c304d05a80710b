//! Order placement, search, history and status routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use pharmacy_core::{Order, OrderFilter, OrderStatus, PlaceOrderRequest};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(place_order).get(search_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", patch(update_status))
        .route("/patients/{id}/orders", get(order_history))
}

/// Query string of `GET /orders`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct OrderSearchParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub patient_id: Option<i64>,
    pub status: Option<OrderStatus>,
}

impl From<OrderSearchParams> for OrderFilter {
    fn from(params: OrderSearchParams) -> Self {
        OrderFilter {
            from: params.from,
            to: params.to,
            patient_id: params.patient_id,
            status: params.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

async fn place_order(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.engine.place_order(request).await?;
    info!(order_id = order.id, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}

async fn search_orders(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<OrderSearchParams>,
) -> ApiResult<Json<Vec<Order>>> {
    let filter = OrderFilter::from(params);
    Ok(Json(state.engine.search_orders(&filter).await?))
}

async fn get_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.queries().get_order(id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.queries().update_status(id, update.status).await?))
}

async fn order_history(
    State(state): State<AppState>,
    ApiPath(patient_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.engine.order_history(patient_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::{add_drug, seed, send, send_raw, test_app};

    #[tokio::test]
    async fn test_place_and_read_back() {
        let (app, _) = test_app().await;
        let (_, patient_id, drug_id) = seed(&app, 500, 10).await;

        let (status, order) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({ "patient_id": patient_id, "lines": [{ "drug_id": drug_id, "quantity": 4 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["total_cents"], 2000);
        assert_eq!(order["status"], "placed");

        let order_id = order["id"].as_i64().unwrap();
        let (status, fetched) = send(&app, Method::GET, &format!("/orders/{order_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["lines"][0]["unit_price_cents"], 500);

        let (_, drug) = send(&app, Method::GET, &format!("/drugs/{drug_id}"), None).await;
        assert_eq!(drug["stock"], 6);

        let (_, history) = send(
            &app,
            Method::GET,
            &format!("/patients/{patient_id}/orders"),
            None,
        )
        .await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decline_is_conflict_and_leaves_stock() {
        let (app, _) = test_app().await;
        let (warehouse_id, patient_id, drug_id) = seed(&app, 500, 5).await;
        let scarce = add_drug(&app, warehouse_id, "Codeine", 900, 1).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({
                "patient_id": patient_id,
                "lines": [
                    { "drug_id": drug_id, "quantity": 2 },
                    { "drug_id": scarce, "quantity": 5 }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["details"]["available"], 1);

        let (_, drug) = send(&app, Method::GET, &format!("/drugs/{drug_id}"), None).await;
        assert_eq!(drug["stock"], 5);
    }

    #[tokio::test]
    async fn test_placement_validation_and_lookup_errors() {
        let (app, _) = test_app().await;
        let (_, patient_id, drug_id) = seed(&app, 500, 5).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({ "patient_id": patient_id, "lines": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({ "patient_id": 777, "lines": [{ "drug_id": drug_id, "quantity": 1 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PATIENT_NOT_FOUND");

        let (status, _) = send(&app, Method::GET, "/orders/424242", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_updates_and_search() {
        let (app, _) = test_app().await;
        let (_, patient_id, drug_id) = seed(&app, 500, 10).await;

        let mut ids = Vec::new();
        for _ in 0..2 {
            let (_, order) = send(
                &app,
                Method::POST,
                "/orders",
                Some(json!({ "patient_id": patient_id, "lines": [{ "drug_id": drug_id, "quantity": 1 }] })),
            )
            .await;
            ids.push(order["id"].as_i64().unwrap());
        }

        let (status, updated) = send(
            &app,
            Method::PATCH,
            &format!("/orders/{}/status", ids[0]),
            Some(json!({ "status": "fulfilled" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "fulfilled");

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/orders/{}/status", ids[0]),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");

        let (status, placed) = send(
            &app,
            Method::GET,
            &format!("/orders?patient_id={patient_id}&status=placed"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let placed = placed.as_array().unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0]["id"], ids[1]);

        let (status, body) = send(
            &app,
            Method::GET,
            "/orders?from=2024-02-01T00:00:00Z&to=2024-01-01T00:00:00Z",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unparsable_requests_get_error_body() {
        let (app, _) = test_app().await;

        let (status, body) = send_raw(
            &app,
            Method::POST,
            "/orders",
            Some("application/json"),
            "{ \"patient_id\": 1, \"lines\": [".to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send_raw(
            &app,
            Method::POST,
            "/orders",
            None,
            json!({ "patient_id": 1, "lines": [] }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(&app, Method::GET, "/orders?status=shipped", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(&app, Method::GET, "/orders/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().is_some());
    }
}
