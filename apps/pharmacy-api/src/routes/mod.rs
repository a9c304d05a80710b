//! # HTTP Routes
//!
//! ```text
//! /health                         GET
//! /orders                         GET (search)  POST (place)
//! /orders/{id}                    GET
//! /orders/{id}/status             PATCH
//! /patients/{id}/orders           GET (history)
//! /drugs[/{id}]                   CRUD, POST /drugs/{id}/restock
//! /warehouses[/{id}]              CRUD, GET /warehouses/{id}/drugs
//! /patients[/{id}]                CRUD
//! /payments                       POST
//! /payments/{id}                  GET, POST /payments/{id}/refund
//! ```

use axum::Router;

use crate::state::AppState;

pub mod drugs;
pub mod health;
pub mod orders;
pub mod patients;
pub mod payments;
pub mod warehouses;

/// All routes, unbound from state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(drugs::router())
        .merge(warehouses::router())
        .merge(patients::router())
        .merge(payments::router())
}
