//! # Payment Repository
//!
//! Payments are recorded only after an order has been placed, and never
//! take part in placement itself.
//!
//! ## Rules
//! ```text
//! record(order_id, amount, method)
//!   ├── order must exist                       else NotFound
//!   ├── order status must accept payment       else Conflict (cancelled)
//!   ├── amount must equal the order total      else Invalid
//!   └── at most one payment per order          else UniqueViolation
//!
//! refund(id):  completed ──► refunded          else Conflict
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use pharmacy_core::validation::validate_payment_amount;
use pharmacy_core::{NewPayment, Order, Payment, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, order_id, amount_cents, method, status, paid_at";

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn get_for_order(&self, order_id: i64) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Records a completed payment for a placed order.
    pub async fn record(&self, payment: &NewPayment) -> DbResult<Payment> {
        debug!(
            order_id = payment.order_id,
            amount_cents = payment.amount_cents,
            "Recording payment"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let order = sqlx::query_as::<_, Order>(
            "SELECT id, ordered_at, patient_id, total_cents, status FROM orders WHERE id = ?1",
        )
        .bind(payment.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Order", payment.order_id))?;

        if !order.status.accepts_payment() {
            return Err(DbError::conflict(format!(
                "order {} is {} and cannot be paid",
                order.id, order.status
            )));
        }

        validate_payment_amount(payment.amount_cents, &order)?;

        let recorded = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (order_id, amount_cents, method, status, paid_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.order_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(PaymentStatus::Completed)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("payment for order", payment.order_id)
            }
            other => other,
        })?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(id = recorded.id, order_id = recorded.order_id, "Payment recorded");
        Ok(recorded)
    }

    /// Marks a completed payment as refunded.
    pub async fn refund(&self, id: i64) -> DbResult<Payment> {
        debug!(id = id, "Refunding payment");

        let refunded = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = ?2
            WHERE id = ?1 AND status = ?3
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(PaymentStatus::Refunded)
        .bind(PaymentStatus::Completed)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(payment) = refunded {
            info!(id = id, order_id = payment.order_id, "Payment refunded");
            return Ok(payment);
        }

        match self.get_by_id(id).await? {
            Some(existing) => Err(DbError::conflict(format!(
                "payment {} is {:?} and cannot be refunded",
                id, existing.status
            ))),
            None => Err(DbError::not_found("Payment", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{drug, patient, test_db, warehouse};
    use crate::Database;
    use pharmacy_core::{Money, NewOrder, NewOrderLine, OrderStatus, PaymentMethod};

    async fn placed_order(db: &Database) -> Order {
        let wh = warehouse(db).await;
        let d = drug(db, wh, 500, 10).await;
        let p = patient(db).await;
        let line = NewOrderLine::priced(d, 4, Money::from_cents(500)).unwrap();
        db.orders()
            .append(&NewOrder::placed(p, vec![line], Utc::now()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_and_refund() {
        let db = test_db().await;
        let order = placed_order(&db).await;

        let payment = db
            .payments()
            .record(&NewPayment {
                order_id: order.id,
                amount_cents: 2000,
                method: PaymentMethod::Card,
            })
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        let with_payment = db.orders().get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(with_payment.payment.as_ref().map(|p| p.id), Some(payment.id));

        let refunded = db.payments().refund(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(matches!(
            db.payments().refund(payment.id).await,
            Err(DbError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_one_payment_per_order() {
        let db = test_db().await;
        let order = placed_order(&db).await;
        let payment = NewPayment {
            order_id: order.id,
            amount_cents: 2000,
            method: PaymentMethod::Cash,
        };

        db.payments().record(&payment).await.unwrap();
        assert!(matches!(
            db.payments().record(&payment).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_amount_must_match_and_order_must_be_payable() {
        let db = test_db().await;
        let order = placed_order(&db).await;

        let short = NewPayment {
            order_id: order.id,
            amount_cents: 1999,
            method: PaymentMethod::Insurance,
        };
        assert!(matches!(
            db.payments().record(&short).await,
            Err(DbError::Invalid(_))
        ));

        db.orders()
            .update_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled)
            .await
            .unwrap();
        let full = NewPayment {
            amount_cents: 2000,
            ..short
        };
        assert!(matches!(
            db.payments().record(&full).await,
            Err(DbError::Conflict { .. })
        ));

        assert!(matches!(
            db.payments()
                .record(&NewPayment {
                    order_id: order.id + 1,
                    ..full
                })
                .await,
            Err(DbError::NotFound { .. })
        ));
    }
}
