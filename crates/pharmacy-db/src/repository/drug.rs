//! # Drug Repository
//!
//! Database operations for drugs, including the stock reservation primitive.
//!
//! ## Stock Mutations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  The only ways `stock` changes                          │
//! │                                                                         │
//! │  try_reserve(id, qty)                                                  │
//! │    UPDATE drugs SET stock = stock - qty                                │
//! │    WHERE id = ? AND stock >= qty          ← compare and write in ONE   │
//! │    RETURNING price_cents, stock             statement                  │
//! │                                                                         │
//! │    row returned   → Reserved { unit_price, remaining }                 │
//! │    no row, exists → Insufficient { available }                         │
//! │    no row at all  → UnknownDrug                                        │
//! │                                                                         │
//! │  release(id, qty)    stock = stock + qty   (compensation only)         │
//! │  restock(id, delta)  stock = stock + delta (delta > 0)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite runs each statement under the database write lock, so two
//! placements racing for the same row are serialized and the loser's
//! `WHERE stock >= qty` sees the winner's decrement. A plain read followed
//! by a write would let both succeed.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use pharmacy_core::validation::{
    validate_drug_update, validate_id, validate_new_drug, validate_quantity,
    validate_restock_quantity,
};
use pharmacy_core::{Drug, DrugUpdate, NewDrug, ReserveOutcome};

pub(crate) const DRUG_COLUMNS: &str =
    "id, name, description, price_cents, stock, warehouse_id, created_at, updated_at";

/// Repository for drug database operations.
#[derive(Debug, Clone)]
pub struct DrugRepository {
    pool: SqlitePool,
}

impl DrugRepository {
    /// Creates a new DrugRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DrugRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a drug by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Drug))` - Drug found
    /// * `Ok(None)` - Drug not found
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Drug>> {
        let drug = sqlx::query_as::<_, Drug>(&format!(
            "SELECT {DRUG_COLUMNS} FROM drugs WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drug)
    }

    /// Lists all drugs sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Drug>> {
        let drugs = sqlx::query_as::<_, Drug>(&format!(
            "SELECT {DRUG_COLUMNS} FROM drugs ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(drugs)
    }

    /// Lists the drugs stored in one warehouse.
    pub async fn list_by_warehouse(&self, warehouse_id: i64) -> DbResult<Vec<Drug>> {
        let drugs = sqlx::query_as::<_, Drug>(&format!(
            "SELECT {DRUG_COLUMNS} FROM drugs WHERE warehouse_id = ?1 ORDER BY name, id"
        ))
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(drugs)
    }

    /// Counts drugs (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drugs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Inserts a new drug with its opening stock.
    pub async fn insert(&self, drug: &NewDrug) -> DbResult<Drug> {
        validate_new_drug(drug)?;
        debug!(name = %drug.name, warehouse_id = drug.warehouse_id, "Inserting drug");

        let now = Utc::now();

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
        .bind(drug.warehouse_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    /// Updates a drug's descriptive fields and price. Stock is left alone.
    pub async fn update(&self, id: i64, drug: &DrugUpdate) -> DbResult<Drug> {
        validate_drug_update(drug)?;
        debug!(id = id, "Updating drug");

        let now = Utc::now();

        let updated = sqlx::query_as::<_, Drug>(&format!(
            r#"
            UPDATE drugs
            SET name = ?2, description = ?3, price_cents = ?4, warehouse_id = ?5, updated_at = ?6
            WHERE id = ?1
            RETURNING {DRUG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(drug.name.trim())
        .bind(drug.description.as_deref())
        .bind(drug.price_cents)
        .bind(drug.warehouse_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Drug", id))
    }

    /// Deletes a drug. Fails with a foreign key violation while order lines
    /// still reference it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting drug");

        let result = sqlx::query("DELETE FROM drugs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Drug", id));
        }

        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Atomically decrements stock by `quantity` if enough is available.
    ///
    /// A decline is `Ok(Insufficient)` or `Ok(UnknownDrug)`; `Err` is kept
    /// for storage faults.
    pub async fn try_reserve(&self, id: i64, quantity: i64) -> DbResult<ReserveOutcome> {
        validate_id("drug_id", id)?;
        validate_quantity(quantity)?;

        let now = Utc::now();

        let reserved: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE drugs
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            RETURNING price_cents, stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((unit_price_cents, remaining_stock)) = reserved {
            debug!(id = id, quantity = quantity, remaining = remaining_stock, "Stock reserved");
            return Ok(ReserveOutcome::Reserved {
                unit_price_cents,
                remaining_stock,
            });
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM drugs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match available {
            Some(available) => {
                debug!(id = id, quantity = quantity, available = available, "Reservation declined");
                ReserveOutcome::Insufficient { available }
            }
            None => {
                warn!(id = id, "Reservation against a missing drug");
                ReserveOutcome::UnknownDrug
            }
        })
    }

    /// Adds `quantity` back to a drug's stock. Used only to undo a
    /// reservation.
    pub async fn release(&self, id: i64, quantity: i64) -> DbResult<()> {
        validate_quantity(quantity)?;
        debug!(id = id, quantity = quantity, "Releasing reserved stock");

        self.add_stock(id, quantity).await.map(|_| ())
    }

    /// Adds a positive delta to a drug's stock and returns the updated drug.
    pub async fn restock(&self, id: i64, delta: i64) -> DbResult<Drug> {
        validate_restock_quantity(delta)?;
        debug!(id = id, delta = delta, "Restocking drug");

        self.add_stock(id, delta).await
    }

    async fn add_stock(&self, id: i64, delta: i64) -> DbResult<Drug> {
        let now = Utc::now();

        let updated = sqlx::query_as::<_, Drug>(&format!(
            r#"
            UPDATE drugs
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING {DRUG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Drug", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{drug, test_db, warehouse};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let wh = warehouse(&db).await;

        let created = db
            .drugs()
            .insert(&NewDrug {
                name: "  Ibuprofen 200mg ".to_string(),
                description: Some("Tablets".to_string()),
                price_cents: 499,
                stock: 12,
                warehouse_id: wh,
            })
            .await
            .unwrap();

        assert_eq!(created.name, "Ibuprofen 200mg");
        let fetched = db.drugs().get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(db.drugs().get_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_warehouse() {
        let db = test_db().await;

        let err = db
            .drugs()
            .insert(&NewDrug {
                name: "Orphan".to_string(),
                description: None,
                price_cents: 100,
                stock: 1,
                warehouse_id: 999,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_reports_price() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let id = drug(&db, wh, 500, 10).await;

        let outcome = db.drugs().try_reserve(id, 4).await.unwrap();
        assert_eq!(
            outcome,
            ReserveOutcome::Reserved {
                unit_price_cents: 500,
                remaining_stock: 6
            }
        );
        assert_eq!(db.drugs().get_by_id(id).await.unwrap().unwrap().stock, 6);
    }

    #[tokio::test]
    async fn test_reserve_declines_without_side_effects() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let id = drug(&db, wh, 500, 3).await;

        let outcome = db.drugs().try_reserve(id, 5).await.unwrap();
        assert_eq!(outcome, ReserveOutcome::Insufficient { available: 3 });
        assert_eq!(db.drugs().get_by_id(id).await.unwrap().unwrap().stock, 3);

        assert_eq!(
            db.drugs().try_reserve(id + 1, 1).await.unwrap(),
            ReserveOutcome::UnknownDrug
        );
    }

    #[tokio::test]
    async fn test_reserve_exact_stock_reaches_zero() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let id = drug(&db, wh, 250, 2).await;

        assert!(db.drugs().try_reserve(id, 2).await.unwrap().is_reserved());
        assert_eq!(
            db.drugs().try_reserve(id, 1).await.unwrap(),
            ReserveOutcome::Insufficient { available: 0 }
        );
    }

    #[tokio::test]
    async fn test_release_and_restock() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let id = drug(&db, wh, 100, 5).await;

        db.drugs().try_reserve(id, 5).await.unwrap();
        db.drugs().release(id, 5).await.unwrap();
        assert_eq!(db.drugs().get_by_id(id).await.unwrap().unwrap().stock, 5);

        let restocked = db.drugs().restock(id, 20).await.unwrap();
        assert_eq!(restocked.stock, 25);

        assert!(matches!(
            db.drugs().restock(id, 0).await,
            Err(DbError::Invalid(_))
        ));
        assert!(matches!(
            db.drugs().release(id + 1, 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let id = drug(&db, wh, 100, 7).await;

        let updated = db
            .drugs()
            .update(
                id,
                &DrugUpdate {
                    name: "Renamed".to_string(),
                    description: None,
                    price_cents: 150,
                    warehouse_id: wh,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.price_cents, 150);
        assert_eq!(updated.stock, 7);
    }

    #[tokio::test]
    async fn test_list_by_warehouse_and_delete() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let other = warehouse(&db).await;
        let a = drug(&db, wh, 100, 1).await;
        drug(&db, other, 200, 1).await;

        let in_wh = db.drugs().list_by_warehouse(wh).await.unwrap();
        assert_eq!(in_wh.len(), 1);
        assert_eq!(in_wh[0].id, a);

        db.drugs().delete(a).await.unwrap();
        assert_eq!(db.drugs().count().await.unwrap(), 1);
        assert!(matches!(
            db.drugs().delete(a).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
