//! # Repository Module
//!
//! One thin data-access type per entity, each wrapping a clone of the pool.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler / SqliteStores adapter                                    │
//! │       │                                                                 │
//! │       │  db.drugs().try_reserve(3, 4)                                   │
//! │       ▼                                                                 │
//! │  DrugRepository                                                        │
//! │  ├── get_by_id / list / insert / update / delete                       │
//! │  ├── try_reserve   (atomic conditional decrement)                      │
//! │  ├── release       (unconditional increment, compensation only)        │
//! │  └── restock       (explicit positive delta)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DrugRepository`](drug::DrugRepository) - Drug CRUD and the reservation primitive
//! - [`WarehouseRepository`](warehouse::WarehouseRepository) - Warehouse CRUD
//! - [`PatientRepository`](patient::PatientRepository) - Patient CRUD
//! - [`OrderRepository`](order::OrderRepository) - Order ledger (append, lookups, search, status)
//! - [`PaymentRepository`](payment::PaymentRepository) - Payments for placed orders

pub mod drug;
pub mod order;
pub mod patient;
pub mod payment;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for repository tests.

    use pharmacy_core::{NewDrug, PatientInput, WarehouseInput};

    use crate::{Database, DbConfig};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn warehouse(db: &Database) -> i64 {
        db.warehouses()
            .insert(&WarehouseInput {
                name: "Central".to_string(),
                address: "1 Depot Road".to_string(),
                capacity: 10_000,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn drug(db: &Database, warehouse_id: i64, price_cents: i64, stock: i64) -> i64 {
        db.drugs()
            .insert(&NewDrug {
                name: format!("Drug {price_cents}/{stock}"),
                description: None,
                price_cents,
                stock,
                warehouse_id,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn patient(db: &Database) -> i64 {
        db.patients()
            .insert(&PatientInput {
                name: "Grace Hopper".to_string(),
                address: "9 Navy Yard".to_string(),
                phone_number: "555-0100".to_string(),
            })
            .await
            .unwrap()
            .id
    }
}
