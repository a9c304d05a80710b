//! # Order Queries
//!
//! Read side of the ledger plus the status state machine.
//!
//! ```text
//!            fulfil
//!   Placed ──────────► Fulfilled
//!     │
//!     │ cancel
//!     ▼
//!   Cancelled
//! ```
//!
//! Status changes are compare-and-set: the update only applies while the
//! order is still in the status that was read, so two concurrent updates
//! cannot both win.

use std::sync::Arc;

use tracing::{debug, info, warn};

use pharmacy_core::validation::{validate_id, validate_order_filter};
use pharmacy_core::{Order, OrderFilter, OrderStatus};

use crate::error::{QueryError, QueryResult};
use crate::ports::{OrderLedger, StoreError};

/// Queries and status updates over an [`OrderLedger`].
#[derive(Clone)]
pub struct OrderQueries {
    ledger: Arc<dyn OrderLedger>,
}

impl OrderQueries {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        OrderQueries { ledger }
    }

    /// A patient's orders, oldest first. Empty for unknown patients.
    pub async fn order_history(&self, patient_id: i64) -> QueryResult<Vec<Order>> {
        validate_id("patient_id", patient_id)?;

        let orders = self.ledger.orders_for_patient(patient_id).await?;
        debug!(patient_id, count = orders.len(), "Loaded order history");
        Ok(orders)
    }

    /// Orders matching every present criterion, oldest first.
    pub async fn search_orders(&self, filter: &OrderFilter) -> QueryResult<Vec<Order>> {
        validate_order_filter(filter)?;

        let orders = self.ledger.search_orders(filter).await?;
        debug!(count = orders.len(), "Order search");
        Ok(orders)
    }

    pub async fn get_order(&self, id: i64) -> QueryResult<Order> {
        validate_id("order_id", id)?;

        self.ledger
            .get_order(id)
            .await?
            .ok_or(QueryError::OrderNotFound(id))
    }

    /// Moves an order to `to`, returning the updated order.
    ///
    /// ## Errors
    /// - `OrderNotFound` - no such order
    /// - `InvalidTransition` - the state machine forbids the move
    /// - `StatusConflict` - another update changed the status first
    pub async fn update_status(&self, id: i64, to: OrderStatus) -> QueryResult<Order> {
        let mut order = self.get_order(id).await?;
        let from = order.status;

        from.transition_to(to)
            .map_err(|_| QueryError::InvalidTransition { from, to })?;

        let applied = match self.ledger.update_status(id, from, to).await {
            Ok(applied) => applied,
            Err(StoreError::NotFound { .. }) => return Err(QueryError::OrderNotFound(id)),
            Err(err) => return Err(err.into()),
        };

        if !applied {
            warn!(order_id = id, expected = %from, "Status changed concurrently");
            return Err(QueryError::StatusConflict { id, expected: from });
        }

        info!(order_id = id, from = %from, to = %to, "Order status updated");
        order.status = to;
        Ok(order)
    }

    /// `Placed → Fulfilled`.
    pub async fn fulfil(&self, id: i64) -> QueryResult<Order> {
        self.update_status(id, OrderStatus::Fulfilled).await
    }

    /// `Placed → Cancelled`.
    pub async fn cancel(&self, id: i64) -> QueryResult<Order> {
        self.update_status(id, OrderStatus::Cancelled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pharmacy_core::{Money, NewOrder, NewOrderLine};

    use crate::adapters::memory::MemoryStores;

    async fn placed(stores: &MemoryStores, patient_id: i64, days_ago: i64) -> Order {
        let line = NewOrderLine::priced(1, 2, Money::from_cents(300)).unwrap();
        let new_order =
            NewOrder::placed(patient_id, vec![line], Utc::now() - Duration::days(days_ago))
                .unwrap();
        stores.append_order(&new_order).await.unwrap()
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_scoped() {
        let stores = Arc::new(MemoryStores::new());
        let newer = placed(&stores, 7, 1).await;
        let older = placed(&stores, 7, 5).await;
        placed(&stores, 8, 2).await;

        let queries = OrderQueries::new(stores.clone());
        let history = queries.order_history(7).await.unwrap();

        let ids: Vec<i64> = history.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
        assert!(queries.order_history(99).await.unwrap().is_empty());
        assert!(matches!(
            queries.order_history(0).await,
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_search_by_range_and_status() {
        let stores = Arc::new(MemoryStores::new());
        let recent = placed(&stores, 7, 1).await;
        placed(&stores, 7, 10).await;
        let queries = OrderQueries::new(stores.clone());

        let filter = OrderFilter {
            from: Some(Utc::now() - Duration::days(3)),
            ..OrderFilter::for_patient(7)
        };
        let found = queries.search_orders(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, recent.id);

        queries.cancel(recent.id).await.unwrap();
        let placed_only = OrderFilter {
            status: Some(OrderStatus::Placed),
            ..OrderFilter::for_patient(7)
        };
        assert_eq!(queries.search_orders(&placed_only).await.unwrap().len(), 1);

        let inverted = OrderFilter {
            from: Some(Utc::now()),
            to: Some(Utc::now() - Duration::days(1)),
            ..OrderFilter::for_patient(7)
        };
        assert!(matches!(
            queries.search_orders(&inverted).await,
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_status_machine() {
        let stores = Arc::new(MemoryStores::new());
        let order = placed(&stores, 7, 0).await;
        let queries = OrderQueries::new(stores.clone());

        let fulfilled = queries.fulfil(order.id).await.unwrap();
        assert_eq!(fulfilled.status, OrderStatus::Fulfilled);

        assert!(matches!(
            queries.cancel(order.id).await,
            Err(QueryError::InvalidTransition {
                from: OrderStatus::Fulfilled,
                to: OrderStatus::Cancelled
            })
        ));
        assert!(matches!(
            queries.fulfil(4_040).await,
            Err(QueryError::OrderNotFound(4_040))
        ));
        assert_eq!(
            queries.get_order(order.id).await.unwrap().status,
            OrderStatus::Fulfilled
        );
    }
}
