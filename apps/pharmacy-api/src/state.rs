//! Shared application state.

use pharmacy_db::Database;
use pharmacy_orders::{CompensationPolicy, OrderEngine, OrderQueries, SqliteStores};

/// Handles every route needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: OrderEngine,
}

impl AppState {
    /// Wires the engine to the same database the CRUD routes use.
    pub fn new(db: Database, policy: CompensationPolicy) -> Self {
        let engine = SqliteStores::new(db.clone()).into_engine(policy);
        AppState { db, engine }
    }

    pub fn queries(&self) -> OrderQueries {
        self.engine.queries()
    }
}
