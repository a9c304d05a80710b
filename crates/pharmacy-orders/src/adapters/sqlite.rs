//! # SQLite Stores
//!
//! Implements the ports over a [`Database`] handle. Every call maps one to
//! one onto a repository method; `DbError`s become `StoreError`s.

use std::sync::Arc;

use async_trait::async_trait;

use pharmacy_core::{Drug, NewOrder, Order, OrderFilter, OrderStatus, Patient, ReserveOutcome};
use pharmacy_db::Database;

use crate::compensation::CompensationPolicy;
use crate::engine::OrderEngine;
use crate::ports::{InventoryStore, OrderLedger, PatientDirectory, StoreResult};

/// All three ports backed by one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStores {
    db: Database,
}

impl SqliteStores {
    pub fn new(db: Database) -> Self {
        SqliteStores { db }
    }

    /// Builds an engine whose every port is this database.
    pub fn into_engine(self, policy: CompensationPolicy) -> OrderEngine {
        let stores = Arc::new(self);
        OrderEngine::new(stores.clone(), stores.clone(), stores).with_compensation_policy(policy)
    }
}

#[async_trait]
impl PatientDirectory for SqliteStores {
    async fn get_patient(&self, id: i64) -> StoreResult<Option<Patient>> {
        Ok(self.db.patients().get_by_id(id).await?)
    }
}

#[async_trait]
impl InventoryStore for SqliteStores {
    async fn get_drug(&self, id: i64) -> StoreResult<Option<Drug>> {
        Ok(self.db.drugs().get_by_id(id).await?)
    }

    async fn try_reserve(&self, drug_id: i64, quantity: i64) -> StoreResult<ReserveOutcome> {
        Ok(self.db.drugs().try_reserve(drug_id, quantity).await?)
    }

    async fn release(&self, drug_id: i64, quantity: i64) -> StoreResult<()> {
        Ok(self.db.drugs().release(drug_id, quantity).await?)
    }
}

#[async_trait]
impl OrderLedger for SqliteStores {
    async fn append_order(&self, order: &NewOrder) -> StoreResult<Order> {
        Ok(self.db.orders().append(order).await?)
    }

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.db.orders().get_by_id(id).await?)
    }

    async fn orders_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().for_patient(patient_id).await?)
    }

    async fn search_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().search(filter).await?)
    }

    async fn update_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        Ok(self.db.orders().update_status(id, from, to).await?)
    }
}
