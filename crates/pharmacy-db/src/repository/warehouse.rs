//! # Warehouse Repository
//!
//! CRUD over warehouses, plus attaching and detaching drugs in bulk. Drugs
//! in a warehouse are listed through
//! [`DrugRepository::list_by_warehouse`](super::drug::DrugRepository::list_by_warehouse).
//!
//! Bulk changes run in one transaction: either every drug in the request is
//! added (or removed) or none is.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::drug::DRUG_COLUMNS;
use pharmacy_core::validation::{validate_id, validate_new_drug, validate_warehouse};
use pharmacy_core::{Drug, NewDrug, Warehouse, WarehouseDrugInput, WarehouseInput};

/// Repository for warehouse database operations.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
}

impl WarehouseRepository {
    /// Creates a new WarehouseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WarehouseRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, address, capacity FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn list(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, address, capacity FROM warehouses ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    pub async fn insert(&self, warehouse: &WarehouseInput) -> DbResult<Warehouse> {
        validate_warehouse(warehouse)?;
        debug!(name = %warehouse.name, "Inserting warehouse");

        let inserted = sqlx::query_as::<_, Warehouse>(
            r#"
            INSERT INTO warehouses (name, address, capacity)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, address, capacity
            "#,
        )
        .bind(warehouse.name.trim())
        .bind(warehouse.address.trim())
        .bind(warehouse.capacity)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    pub async fn update(&self, id: i64, warehouse: &WarehouseInput) -> DbResult<Warehouse> {
        validate_warehouse(warehouse)?;
        debug!(id = id, "Updating warehouse");

        let updated = sqlx::query_as::<_, Warehouse>(
            r#"
            UPDATE warehouses
            SET name = ?2, address = ?3, capacity = ?4
            WHERE id = ?1
            RETURNING id, name, address, capacity
            "#,
        )
        .bind(id)
        .bind(warehouse.name.trim())
        .bind(warehouse.address.trim())
        .bind(warehouse.capacity)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Warehouse", id))
    }

    /// Deletes an empty warehouse. Fails with a foreign key violation while
    /// drugs are still stored in it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting warehouse");

        let result = sqlx::query("DELETE FROM warehouses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        Ok(())
    }

    // =========================================================================
    // Stocked drugs
    // =========================================================================

    /// Creates every drug in `drugs` inside warehouse `id`.
    ///
    /// All inputs are validated before anything is written. An unknown
    /// warehouse is `NotFound` and leaves the drug table untouched.
    pub async fn add_drugs(&self, id: i64, drugs: Vec<WarehouseDrugInput>) -> DbResult<Vec<Drug>> {
        validate_id("warehouse_id", id)?;
        let drugs: Vec<NewDrug> = drugs.into_iter().map(|d| d.into_new_drug(id)).collect();
        for drug in &drugs {
            validate_new_drug(drug)?;
        }

        let mut tx = self.begin().await?;
        ensure_exists(&mut tx, id).await?;

        let now = Utc::now();
        let mut added = Vec::with_capacity(drugs.len());
        for drug in &drugs {
            let inserted = sqlx::query_as::<_, Drug>(&format!(
                r#"
                INSERT INTO drugs (name, description, price_cents, stock, warehouse_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                RETURNING {DRUG_COLUMNS}
                "#
            ))
            .bind(drug.name.trim())
            .bind(drug.description.as_deref())
            .bind(drug.price_cents)
            .bind(drug.stock)
            .bind(id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            added.push(inserted);
        }

        commit(tx).await?;
        info!(warehouse_id = id, count = added.len(), "Drugs added to warehouse");
        Ok(added)
    }

    /// Deletes the listed drugs from warehouse `id` and returns how many went.
    ///
    /// Ids that belong to another warehouse, or to no drug, are skipped. A
    /// drug that already appears on an order cannot be removed; that fails
    /// the whole call with a foreign key violation.
    pub async fn remove_drugs(&self, id: i64, drug_ids: &[i64]) -> DbResult<u64> {
        validate_id("warehouse_id", id)?;

        let mut tx = self.begin().await?;
        ensure_exists(&mut tx, id).await?;

        let mut removed = 0;
        for &drug_id in drug_ids {
            removed += sqlx::query("DELETE FROM drugs WHERE id = ?1 AND warehouse_id = ?2")
                .bind(drug_id)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        commit(tx).await?;
        info!(
            warehouse_id = id,
            requested = drug_ids.len(),
            removed,
            "Drugs removed from warehouse"
        );
        Ok(removed)
    }

    async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

async fn ensure_exists(tx: &mut Transaction<'static, Sqlite>, id: i64) -> DbResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM warehouses WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| DbError::not_found("Warehouse", id))
}

async fn commit(tx: Transaction<'static, Sqlite>) -> DbResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))
}
