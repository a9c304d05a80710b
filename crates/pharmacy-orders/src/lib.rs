//! # pharmacy-orders: Order Placement Engine
//!
//! Places orders against shared drug stock without ever overselling, and
//! undoes partial work when a placement fails.
//!
//! ## Placement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OrderEngine::place_order                        │
//! │                                                                         │
//! │  PlaceOrderRequest { patient_id, lines }                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. validate request          (no store touched)   ──► InvalidRequest  │
//! │       │                                                                 │
//! │       ▼  ── spawned task from here on: caller drop can't abort it ──   │
//! │  2. PatientDirectory::get_patient                  ──► PatientNotFound │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. InventoryStore::get_drug      (every line)     ──► DrugNotFound    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. InventoryStore::try_reserve   (caller order)   ──► InsufficientStock│
//! │       │                                  │                              │
//! │       ▼                                  └── release applied lines in  │
//! │  5. price lines, Σ total                     reverse order (retried)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  6. OrderLedger::append_order     (one transaction) ──► Storage        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Order { id, status: Placed, total, lines }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ports`] - Store traits the engine depends on
//! - [`engine`] - [`OrderEngine`], the placement orchestration
//! - [`compensation`] - Reservation rollback with exponential backoff
//! - [`query`] - Order history, search and status updates
//! - [`adapters`] - SQLite and in-memory implementations of the ports
//! - [`error`] - Placement and query errors

pub mod adapters;
pub mod compensation;
pub mod engine;
pub mod error;
pub mod ports;
pub mod query;

pub use adapters::memory::MemoryStores;
pub use adapters::sqlite::SqliteStores;
pub use compensation::{CompensationPolicy, UnreleasedReservation};
pub use engine::OrderEngine;
pub use error::{PlacementError, PlacementResult, QueryError, QueryResult};
pub use ports::{InventoryStore, OrderLedger, PatientDirectory, StoreError, StoreResult};
pub use query::OrderQueries;
