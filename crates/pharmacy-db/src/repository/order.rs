//! # Order Repository (Ledger)
//!
//! Durable store of orders and their lines.
//!
//! ## Append Is One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT INTO orders (...)      RETURNING id    ──► order_id           │
//! │    INSERT INTO order_lines (order_id, ...)       ×  lines.len()         │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure before COMMIT rolls the whole thing back (the transaction │
//! │  is dropped), so no reader ever sees an order without all its lines.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reads
//! Every returned [`Order`] carries its lines and, if one was recorded, its
//! payment. Details for a batch of orders are loaded with one `IN (...)`
//! query per table instead of one query per order.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacy_core::validation::validate_order_filter;
use pharmacy_core::{NewOrder, Order, OrderFilter, OrderLine, OrderStatus, Payment, ValidationError};

const ORDER_COLUMNS: &str = "id, ordered_at, patient_id, total_cents, status";

const LINE_COLUMNS: &str = "id, order_id, drug_id, quantity, unit_price_cents, line_total_cents";

const PAYMENT_COLUMNS: &str = "id, order_id, amount_cents, method, status, paid_at";

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const DETAIL_BATCH: usize = 500;

/// Repository for the order ledger.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends an order and all of its lines in a single transaction.
    ///
    /// ## Returns
    /// The persisted order with its assigned id and line ids.
    pub async fn append(&self, order: &NewOrder) -> DbResult<Order> {
        if order.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }

        debug!(
            patient_id = order.patient_id,
            lines = order.lines.len(),
            total_cents = order.total_cents,
            "Appending order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut persisted = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (ordered_at, patient_id, total_cents, status)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.ordered_at)
        .bind(order.patient_id)
        .bind(order.total_cents)
        .bind(order.status)
        .fetch_one(&mut *tx)
        .await?;

        for line in &order.lines {
            let line = sqlx::query_as::<_, OrderLine>(&format!(
                r#"
                INSERT INTO order_lines (order_id, drug_id, quantity, unit_price_cents, line_total_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                RETURNING {LINE_COLUMNS}
                "#
            ))
            .bind(persisted.id)
            .bind(line.drug_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .fetch_one(&mut *tx)
            .await?;

            persisted.lines.push(line);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id = persisted.id, "Order appended");
        Ok(persisted)
    }

    /// Moves an order from `from` to `to` if it is still in `from`.
    ///
    /// ## Returns
    /// * `Ok(true)` - Status changed
    /// * `Ok(false)` - The order exists but is no longer in `from`
    /// * `Err(NotFound)` - No such order
    /// * `Err(Domain)` - `from → to` is not an allowed transition
    pub async fn update_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        from.transition_to(to)?;
        debug!(id = id, from = %from, to = %to, "Updating order status");

        let result = sqlx::query("UPDATE orders SET status = ?3 WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Ok(false),
            None => Err(DbError::not_found("Order", id)),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order with its lines and payment.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match order {
            Some(order) => {
                let mut orders = vec![order];
                self.attach_details(&mut orders).await?;
                Ok(orders.pop())
            }
            None => Ok(None),
        }
    }

    /// All orders of one patient, oldest first.
    pub async fn for_patient(&self, patient_id: i64) -> DbResult<Vec<Order>> {
        self.search(&OrderFilter::for_patient(patient_id)).await
    }

    /// Orders matching every present criterion of `filter`, oldest first.
    ///
    /// Date bounds are inclusive and compared as instants, not as text.
    pub async fn search(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        validate_order_filter(filter)?;
        debug!(?filter, "Searching orders");

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1 = 1"));

        if let Some(from) = filter.from {
            query
                .push(" AND julianday(ordered_at) >= julianday(")
                .push_bind(from)
                .push(")");
        }
        if let Some(to) = filter.to {
            query
                .push(" AND julianday(ordered_at) <= julianday(")
                .push_bind(to)
                .push(")");
        }
        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query.push(" ORDER BY julianday(ordered_at), id");

        let mut orders = query
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_details(&mut orders).await?;

        debug!(count = orders.len(), "Order search returned");
        Ok(orders)
    }

    /// Counts orders (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Details
    // =========================================================================

    async fn attach_details(&self, orders: &mut [Order]) -> DbResult<()> {
        if orders.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let mut lines: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        let mut payments: HashMap<i64, Payment> = HashMap::new();

        for chunk in ids.chunks(DETAIL_BATCH) {
            let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id IN ("
            ));
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY order_id, id");

            for line in query
                .build_query_as::<OrderLine>()
                .fetch_all(&self.pool)
                .await?
            {
                lines.entry(line.order_id).or_default().push(line);
            }

            let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id IN ("
            ));
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            for payment in query
                .build_query_as::<Payment>()
                .fetch_all(&self.pool)
                .await?
            {
                payments.insert(payment.order_id, payment);
            }
        }

        for order in orders.iter_mut() {
            order.lines = lines.remove(&order.id).unwrap_or_default();
            order.payment = payments.remove(&order.id);
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{drug, patient, test_db, warehouse};
    use chrono::{Duration, Utc};
    use pharmacy_core::{Money, NewOrderLine};

    fn new_order(patient_id: i64, lines: &[(i64, i64, i64)]) -> NewOrder {
        let lines = lines
            .iter()
            .map(|&(drug_id, qty, price)| {
                NewOrderLine::priced(drug_id, qty, Money::from_cents(price)).unwrap()
            })
            .collect();
        NewOrder::placed(patient_id, lines, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let d1 = drug(&db, wh, 500, 10).await;
        let d2 = drug(&db, wh, 125, 10).await;
        let p = patient(&db).await;

        let order = db
            .orders()
            .append(&new_order(p, &[(d1, 4, 500), (d2, 2, 125)]))
            .await
            .unwrap();

        assert!(order.id > 0);
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total_cents, 2250);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines_total().unwrap(), order.total());

        let fetched = db.orders().get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(fetched.lines, order.lines);
        assert_eq!(fetched.total_cents, 2250);
        assert!(fetched.payment.is_none());
    }

    #[tokio::test]
    async fn test_failed_append_leaves_nothing_behind() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let d1 = drug(&db, wh, 500, 10).await;
        let p = patient(&db).await;

        // Second line references a missing drug: the FK fails mid-transaction
        let err = db
            .orders()
            .append(&new_order(p, &[(d1, 1, 500), (d1 + 50, 1, 100)]))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(db.orders().count().await.unwrap(), 0);

        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_lines")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(lines, 0);
    }

    #[tokio::test]
    async fn test_search_filters_are_and_composed() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let d = drug(&db, wh, 100, 100).await;
        let alice = patient(&db).await;
        let bob = patient(&db).await;

        let a1 = db.orders().append(&new_order(alice, &[(d, 1, 100)])).await.unwrap();
        let a2 = db.orders().append(&new_order(alice, &[(d, 2, 100)])).await.unwrap();
        let b1 = db.orders().append(&new_order(bob, &[(d, 3, 100)])).await.unwrap();

        db.orders()
            .update_status(a2.id, OrderStatus::Placed, OrderStatus::Fulfilled)
            .await
            .unwrap();

        let history = db.orders().for_patient(alice).await.unwrap();
        assert_eq!(
            history.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![a1.id, a2.id]
        );

        let placed_for_alice = db
            .orders()
            .search(&OrderFilter {
                patient_id: Some(alice),
                status: Some(OrderStatus::Placed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(placed_for_alice.len(), 1);
        assert_eq!(placed_for_alice[0].id, a1.id);

        let all = db.orders().search(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].id, b1.id);
        assert_eq!(all[2].lines.len(), 1);
    }

    #[tokio::test]
    async fn test_search_date_bounds_are_inclusive() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let d = drug(&db, wh, 100, 100).await;
        let p = patient(&db).await;

        let order = db.orders().append(&new_order(p, &[(d, 1, 100)])).await.unwrap();

        let exact = OrderFilter {
            from: Some(order.ordered_at),
            to: Some(order.ordered_at),
            ..Default::default()
        };
        assert_eq!(db.orders().search(&exact).await.unwrap().len(), 1);

        let future = OrderFilter {
            from: Some(order.ordered_at + Duration::hours(1)),
            ..Default::default()
        };
        assert!(db.orders().search(&future).await.unwrap().is_empty());

        let inverted = OrderFilter {
            from: Some(order.ordered_at),
            to: Some(order.ordered_at - Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            db.orders().search(&inverted).await,
            Err(DbError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_update_status_is_compare_and_set() {
        let db = test_db().await;
        let wh = warehouse(&db).await;
        let d = drug(&db, wh, 100, 100).await;
        let p = patient(&db).await;
        let order = db.orders().append(&new_order(p, &[(d, 1, 100)])).await.unwrap();

        assert!(db
            .orders()
            .update_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled)
            .await
            .unwrap());

        // Already cancelled: the conditional update matches nothing
        assert!(!db
            .orders()
            .update_status(order.id, OrderStatus::Placed, OrderStatus::Fulfilled)
            .await
            .unwrap());

        assert!(matches!(
            db.orders()
                .update_status(order.id, OrderStatus::Cancelled, OrderStatus::Placed)
                .await,
            Err(DbError::Domain(_))
        ));
        assert!(matches!(
            db.orders()
                .update_status(order.id + 9, OrderStatus::Placed, OrderStatus::Fulfilled)
                .await,
            Err(DbError::NotFound { .. })
        ));
    }
}
