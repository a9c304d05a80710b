//! # Order Placement Engine
//!
//! Orchestrates patient lookup, drug reads, stock reservation and the ledger
//! append for one placement, and rolls back on any failure after the first
//! reservation.
//!
//! ## Phases
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────┐   ┌──────────┐
//! │  validate  │──►│  patient   │──►│ read drugs  │──►│ reserve  │──►│  commit  │
//! │  request   │   │  lookup    │   │ (all lines) │   │ in order │   │ (ledger) │
//! └────────────┘   └────────────┘   └─────────────┘   └────┬─────┘   └────┬─────┘
//!   no effects       no effects       no effects           │              │
//!                                                          ▼              ▼
//!                                              failure ──► compensate ◄── failure
//! ```
//!
//! ## Invariants
//! - A reservation exists only while its line is headed for, or part of, a
//!   committed order.
//! - Order total = Σ(unit price returned by the reservation × quantity).
//! - Once any reservation is applied, the caller going away does not stop
//!   the placement: it runs on its own task until it commits or compensates.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use pharmacy_core::validation::validate_order_request;
use pharmacy_core::{
    Money, NewOrder, NewOrderLine, Order, OrderFilter, PlaceOrderRequest, ReserveOutcome,
};

use crate::compensation::{compensate, CompensationPolicy, Reservation};
use crate::error::{PlacementError, PlacementResult, QueryResult};
use crate::ports::{InventoryStore, OrderLedger, PatientDirectory};
use crate::query::OrderQueries;

// =============================================================================
// Engine
// =============================================================================

/// Places orders against shared stock.
///
/// Cheap to clone; clones share the same stores.
///
/// ## Usage
/// ```rust,ignore
/// let engine = SqliteStores::new(db).into_engine(CompensationPolicy::default());
///
/// match engine.place_order(request).await {
///     Ok(order) => println!("placed #{} for {}", order.id, order.total()),
///     Err(e) if e.is_decline() => println!("declined: {e}"),
///     Err(e) => return Err(e.into()),
/// }
/// ```
#[derive(Clone)]
pub struct OrderEngine {
    patients: Arc<dyn PatientDirectory>,
    inventory: Arc<dyn InventoryStore>,
    ledger: Arc<dyn OrderLedger>,
    policy: CompensationPolicy,
}

impl OrderEngine {
    pub fn new(
        patients: Arc<dyn PatientDirectory>,
        inventory: Arc<dyn InventoryStore>,
        ledger: Arc<dyn OrderLedger>,
    ) -> Self {
        OrderEngine {
            patients,
            inventory,
            ledger,
            policy: CompensationPolicy::default(),
        }
    }

    /// Replaces the retry budget used for compensation releases.
    pub fn with_compensation_policy(mut self, policy: CompensationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn compensation_policy(&self) -> &CompensationPolicy {
        &self.policy
    }

    /// Read side over the same ledger.
    pub fn queries(&self) -> OrderQueries {
        OrderQueries::new(self.ledger.clone())
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Places an order, or rejects it with no net stock change.
    ///
    /// ## Errors
    /// - `InvalidRequest` - empty lines, bad quantity, repeated drug
    /// - `PatientNotFound` - checked before any drug is read
    /// - `DrugNotFound` - a line names a missing drug
    /// - `InsufficientStock` - a reservation was declined
    /// - `Storage` / `Pricing` - a fault after which every applied
    ///   reservation was released
    /// - `CompensationFailed` - releases failed past the retry budget
    pub async fn place_order(&self, request: PlaceOrderRequest) -> PlacementResult<Order> {
        validate_order_request(&request)?;

        let placement_id = Uuid::new_v4();
        let span = info_span!(
            "place_order",
            placement_id = %placement_id,
            patient_id = request.patient_id
        );

        let placement = Placement {
            patients: self.patients.clone(),
            inventory: self.inventory.clone(),
            ledger: self.ledger.clone(),
            policy: self.policy.clone(),
            request,
        };

        // Detached: dropping this future leaves the task running to the end
        let task = tokio::spawn(placement.run().instrument(span));

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                error!(
                    placement_id = %placement_id,
                    error = %join_error,
                    "Placement task did not complete"
                );
                Err(PlacementError::Interrupted)
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A patient's orders, oldest first.
    pub async fn order_history(&self, patient_id: i64) -> QueryResult<Vec<Order>> {
        self.queries().order_history(patient_id).await
    }

    /// Orders matching every present criterion of `filter`.
    pub async fn search_orders(&self, filter: &OrderFilter) -> QueryResult<Vec<Order>> {
        self.queries().search_orders(filter).await
    }
}

// =============================================================================
// Placement Task
// =============================================================================

/// Everything one placement needs, owned so it can run on its own task.
struct Placement {
    patients: Arc<dyn PatientDirectory>,
    inventory: Arc<dyn InventoryStore>,
    ledger: Arc<dyn OrderLedger>,
    policy: CompensationPolicy,
    request: PlaceOrderRequest,
}

impl Placement {
    async fn run(self) -> PlacementResult<Order> {
        let patient_id = self.request.patient_id;
        info!(lines = self.request.lines.len(), "Placing order");

        // ---------------------------------------------------------------------
        // Validation phase (read-only)
        // ---------------------------------------------------------------------
        if self.patients.get_patient(patient_id).await?.is_none() {
            warn!("Unknown patient");
            return Err(PlacementError::PatientNotFound(patient_id));
        }

        for line in &self.request.lines {
            if self.inventory.get_drug(line.drug_id).await?.is_none() {
                warn!(drug_id = line.drug_id, "Unknown drug");
                return Err(PlacementError::DrugNotFound(line.drug_id));
            }
        }

        // ---------------------------------------------------------------------
        // Reservation phase
        // ---------------------------------------------------------------------
        let mut reserved: Vec<Reservation> = Vec::with_capacity(self.request.lines.len());

        for line in &self.request.lines {
            let outcome = match self.inventory.try_reserve(line.drug_id, line.quantity).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(drug_id = line.drug_id, error = %err, "Reservation fault");
                    return self.abort(&reserved, PlacementError::Storage(err)).await;
                }
            };

            match outcome {
                ReserveOutcome::Reserved {
                    unit_price_cents, ..
                } => reserved.push(Reservation {
                    drug_id: line.drug_id,
                    quantity: line.quantity,
                    unit_price: Money::from_cents(unit_price_cents),
                }),
                ReserveOutcome::Insufficient { available } => {
                    warn!(
                        drug_id = line.drug_id,
                        requested = line.quantity,
                        available,
                        "Insufficient stock, declining"
                    );
                    let decline = PlacementError::InsufficientStock {
                        drug_id: line.drug_id,
                        requested: line.quantity,
                        available,
                    };
                    return self.abort(&reserved, decline).await;
                }
                ReserveOutcome::UnknownDrug => {
                    // Deleted after the validation read
                    warn!(drug_id = line.drug_id, "Drug vanished before reservation");
                    return self
                        .abort(&reserved, PlacementError::DrugNotFound(line.drug_id))
                        .await;
                }
            }
        }

        // ---------------------------------------------------------------------
        // Commit phase
        // ---------------------------------------------------------------------
        let new_order = match price_order(patient_id, &reserved) {
            Ok(order) => order,
            Err(err) => return self.abort(&reserved, err).await,
        };

        match self.ledger.append_order(&new_order).await {
            Ok(order) => {
                info!(
                    order_id = order.id,
                    total_cents = order.total_cents,
                    "Order placed"
                );
                Ok(order)
            }
            Err(err) => {
                warn!(error = %err, "Ledger append failed");
                self.abort(&reserved, PlacementError::Storage(err)).await
            }
        }
    }

    /// Releases everything reserved so far, then reports `cause`.
    async fn abort(&self, reserved: &[Reservation], cause: PlacementError) -> PlacementResult<Order> {
        if reserved.is_empty() {
            return Err(cause);
        }

        match compensate(self.inventory.as_ref(), reserved, &self.policy).await {
            Ok(()) => Err(cause),
            Err(unreleased) => Err(PlacementError::CompensationFailed {
                unreleased,
                cause: Box::new(cause),
            }),
        }
    }
}

/// Builds the `Placed` order from the reserved lines.
fn price_order(patient_id: i64, reserved: &[Reservation]) -> PlacementResult<NewOrder> {
    let lines = reserved
        .iter()
        .map(|r| NewOrderLine::priced(r.drug_id, r.quantity, r.unit_price))
        .collect::<Result<Vec<_>, _>>()
        .map_err(PlacementError::Pricing)?;

    NewOrder::placed(patient_id, lines, Utc::now()).map_err(PlacementError::Pricing)
}

// =============================================================================
// Unit Tests
// =============================================================================
