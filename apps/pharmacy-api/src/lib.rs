//! # Pharmacy API
//!
//! HTTP server for order placement and the pharmacy catalogue.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pharmacy API Server                             │
//! │                                                                         │
//! │  Client ───► HTTP (8080) ───► routes ───► OrderEngine ───► SQLite      │
//! │                                   │                          ▲          │
//! │                                   └──► repositories (CRUD) ──┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PHARMACY_HTTP_PORT` - HTTP port (default: 8080)
//! - `PHARMACY_DATABASE_PATH` - SQLite file (default: ./pharmacy.db)
//! - `PHARMACY_DB_MAX_CONNECTIONS` - pool size (default: 5)
//! - `PHARMACY_COMPENSATION_INITIAL_BACKOFF_MS` - first release retry delay (default: 50)
//! - `PHARMACY_COMPENSATION_MAX_BACKOFF_MS` - longest retry delay (default: 2000)
//! - `PHARMACY_COMPENSATION_MAX_ELAPSED_SECS` - retry budget, 0 = forever (default: 60)
//! - `RUST_LOG` - log filter

use axum::Router;

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the full router bound to `state`.
pub fn app(state: AppState) -> Router {
    routes::router().with_state(state)
}
