//! # In-Memory Stores
//!
//! A process-local implementation of all three ports, used by the engine
//! tests and for running the engine without a database.
//!
//! ## Locking
//! ```text
//! drugs: RwLock<HashMap<id, Arc<Mutex<Drug>>>>
//!          │                      │
//!          │ read lock: find row  └── per-drug lock held across
//!          │ (many at once)           compare + decrement
//!          ▼
//! reservations on different drugs run in parallel,
//! reservations on the same drug serialize on its Mutex
//! ```
//!
//! ## Failure Injection
//! Tests can make releases fail transiently or permanently, make
//! reservations fault for a drug, and make ledger appends fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use pharmacy_core::{
    Drug, NewOrder, Order, OrderFilter, OrderLine, OrderStatus, Patient, ReserveOutcome,
};

use crate::ports::{InventoryStore, OrderLedger, PatientDirectory, StoreError, StoreResult};

/// In-memory patient directory, inventory and ledger.
#[derive(Debug, Default)]
pub struct MemoryStores {
    patients: RwLock<HashMap<i64, Patient>>,
    drugs: RwLock<HashMap<i64, Arc<Mutex<Drug>>>>,
    orders: RwLock<BTreeMap<i64, Order>>,

    next_id: AtomicI64,
    next_line_id: AtomicI64,

    drug_reads: AtomicUsize,
    release_attempts: AtomicU32,

    failing_releases: AtomicU32,
    broken_releases: StdMutex<HashSet<i64>>,
    broken_reservations: StdMutex<HashSet<i64>>,
    failing_appends: AtomicBool,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    pub async fn add_patient(&self, name: &str) -> Patient {
        let patient = Patient {
            id: self.allocate_id(),
            name: name.to_string(),
            address: "1 Test Street".to_string(),
            phone_number: "555-0100".to_string(),
        };
        self.patients
            .write()
            .await
            .insert(patient.id, patient.clone());
        patient
    }

    pub async fn add_drug(&self, name: &str, price_cents: i64, stock: i64) -> Drug {
        let now = Utc::now();
        let drug = Drug {
            id: self.allocate_id(),
            name: name.to_string(),
            description: None,
            price_cents,
            stock,
            warehouse_id: 1,
            created_at: now,
            updated_at: now,
        };
        self.drugs
            .write()
            .await
            .insert(drug.id, Arc::new(Mutex::new(drug.clone())));
        drug
    }

    pub async fn remove_drug(&self, id: i64) {
        self.drugs.write().await.remove(&id);
    }

    /// Changes a drug's price, as a concurrent catalogue update would.
    pub async fn set_price(&self, id: i64, price_cents: i64) {
        if let Some(drug) = self.drug(id).await {
            drug.lock().await.price_cents = price_cents;
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub async fn stock_of(&self, id: i64) -> Option<i64> {
        match self.drug(id).await {
            Some(drug) => Some(drug.lock().await.stock),
            None => None,
        }
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Number of `get_drug` and `try_reserve` calls served.
    pub fn drug_reads(&self) -> usize {
        self.drug_reads.load(Ordering::SeqCst)
    }

    /// Number of `release` calls served, failed ones included.
    pub fn release_attempts(&self) -> u32 {
        self.release_attempts.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// The next `n` releases fail with a retryable error.
    pub fn fail_next_releases(&self, n: u32) {
        self.failing_releases.store(n, Ordering::SeqCst);
    }

    /// Every release of `drug_id` fails with a retryable error.
    pub fn fail_releases_for(&self, drug_id: i64) {
        self.broken_releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(drug_id);
    }

    /// Every reservation of `drug_id` fails with a retryable error.
    pub fn fail_reservations_for(&self, drug_id: i64) {
        self.broken_reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(drug_id);
    }

    /// Makes ledger appends fail until switched off.
    pub fn fail_appends(&self, fail: bool) {
        self.failing_appends.store(fail, Ordering::SeqCst);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn drug(&self, id: i64) -> Option<Arc<Mutex<Drug>>> {
        self.drugs.read().await.get(&id).cloned()
    }

    fn is_broken(set: &StdMutex<HashSet<i64>>, id: i64) -> bool {
        set.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn take_failing_release(&self) -> bool {
        self.failing_releases
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// =============================================================================
// Ports
// =============================================================================

#[async_trait]
impl PatientDirectory for MemoryStores {
    async fn get_patient(&self, id: i64) -> StoreResult<Option<Patient>> {
        Ok(self.patients.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryStore for MemoryStores {
    async fn get_drug(&self, id: i64) -> StoreResult<Option<Drug>> {
        self.drug_reads.fetch_add(1, Ordering::SeqCst);

        match self.drug(id).await {
            Some(drug) => Ok(Some(drug.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn try_reserve(&self, drug_id: i64, quantity: i64) -> StoreResult<ReserveOutcome> {
        self.drug_reads.fetch_add(1, Ordering::SeqCst);

        if Self::is_broken(&self.broken_reservations, drug_id) {
            return Err(StoreError::Unavailable(format!(
                "injected reservation failure for drug {drug_id}"
            )));
        }

        let Some(drug) = self.drug(drug_id).await else {
            return Ok(ReserveOutcome::UnknownDrug);
        };

        let mut drug = drug.lock().await;
        if drug.stock < quantity {
            return Ok(ReserveOutcome::Insufficient {
                available: drug.stock,
            });
        }

        // Let other tasks run while the row is held
        tokio::task::yield_now().await;

        drug.stock -= quantity;
        drug.updated_at = Utc::now();
        debug!(drug_id, quantity, remaining = drug.stock, "Reserved in memory");

        Ok(ReserveOutcome::Reserved {
            unit_price_cents: drug.price_cents,
            remaining_stock: drug.stock,
        })
    }

    async fn release(&self, drug_id: i64, quantity: i64) -> StoreResult<()> {
        self.release_attempts.fetch_add(1, Ordering::SeqCst);

        if self.take_failing_release() || Self::is_broken(&self.broken_releases, drug_id) {
            return Err(StoreError::Unavailable(format!(
                "injected release failure for drug {drug_id}"
            )));
        }

        let drug = self.drug(drug_id).await.ok_or_else(|| StoreError::NotFound {
            entity: "Drug".to_string(),
            id: drug_id.to_string(),
        })?;

        let mut drug = drug.lock().await;
        drug.stock += quantity;
        drug.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for MemoryStores {
    async fn append_order(&self, order: &NewOrder) -> StoreResult<Order> {
        if self.failing_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected append failure".to_string()));
        }

        let id = self.allocate_id();
        let lines = order
            .lines
            .iter()
            .map(|line| OrderLine {
                id: self.next_line_id.fetch_add(1, Ordering::SeqCst) + 1,
                order_id: id,
                drug_id: line.drug_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total_cents,
            })
            .collect();

        let persisted = Order {
            id,
            ordered_at: order.ordered_at,
            patient_id: order.patient_id,
            total_cents: order.total_cents,
            status: order.status,
            lines,
            payment: None,
        };

        self.orders.write().await.insert(id, persisted.clone());
        Ok(persisted)
    }

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn orders_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Order>> {
        self.search_orders(&OrderFilter::for_patient(patient_id)).await
    }

    async fn search_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();

        found.sort_by_key(|order| (order.ordered_at, order.id));
        Ok(found)
    }

    async fn update_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "Order".to_string(),
            id: id.to_string(),
        })?;

        if order.status != from {
            return Ok(false);
        }

        order.status = to;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let stores = MemoryStores::new();
        let drug = stores.add_drug("Aspirin", 250, 5).await;

        assert_eq!(
            stores.try_reserve(drug.id, 5).await.unwrap(),
            ReserveOutcome::Reserved {
                unit_price_cents: 250,
                remaining_stock: 0
            }
        );
        assert_eq!(
            stores.try_reserve(drug.id, 1).await.unwrap(),
            ReserveOutcome::Insufficient { available: 0 }
        );

        stores.release(drug.id, 5).await.unwrap();
        assert_eq!(stores.stock_of(drug.id).await, Some(5));
        assert_eq!(
            stores.try_reserve(drug.id + 100, 1).await.unwrap(),
            ReserveOutcome::UnknownDrug
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let stores = MemoryStores::new();
        let drug = stores.add_drug("Aspirin", 250, 5).await;

        stores.fail_next_releases(1);
        assert!(stores.release(drug.id, 1).await.unwrap_err().is_retryable());
        assert!(stores.release(drug.id, 1).await.is_ok());

        stores.fail_reservations_for(drug.id);
        assert!(stores.try_reserve(drug.id, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let stores = MemoryStores::new();
        let order = stores
            .append_order(&NewOrder::placed(1, Vec::new(), Utc::now()).unwrap())
            .await
            .unwrap();

        assert!(stores
            .update_status(order.id, OrderStatus::Placed, OrderStatus::Fulfilled)
            .await
            .unwrap());
        assert!(!stores
            .update_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled)
            .await
            .unwrap());
    }
}
