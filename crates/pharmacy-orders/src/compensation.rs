//! # Compensation
//!
//! Undoes the reservations a failed placement already applied.
//!
//! ## Rollback
//! ```text
//! applied:   reserve(D, 2) ──► reserve(E, 1) ──► reserve(F, 5) ✗ declined
//!
//! rollback:                    release(E, 1) ◄── release(D, 2)   (reverse)
//!                                   │
//!                  Unavailable? ────┴──► wait 50ms, 100ms, 200ms ... retry
//!                  NotFound / Rejected ──► give up on this line at once
//! ```
//!
//! A release that still fails once the policy's budget is spent is an
//! alarm: it is logged at `error!`, the remaining lines are still released,
//! and the placement reports [`CompensationFailed`](crate::PlacementError::CompensationFailed)
//! listing every leaked (drug, quantity).

use std::fmt;
use std::time::Duration;

use backoff::ExponentialBackoff;
use tracing::{error, info, warn};

use pharmacy_core::Money;

use crate::ports::{InventoryStore, StoreError};

// =============================================================================
// Policy
// =============================================================================

/// Retry budget for compensation releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationPolicy {
    /// Delay before the first retry.
    pub initial_backoff: Duration,

    /// Upper bound for a single delay.
    pub max_backoff: Duration,

    /// Total time spent retrying one release. `None` retries forever.
    pub max_elapsed: Option<Duration>,
}

impl Default for CompensationPolicy {
    fn default() -> Self {
        CompensationPolicy {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            max_elapsed: Some(Duration::from_secs(60)),
        }
    }
}

impl CompensationPolicy {
    /// Retries each release until it succeeds.
    pub fn unbounded() -> Self {
        CompensationPolicy {
            max_elapsed: None,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: self.max_elapsed,
            ..Default::default()
        }
    }
}

// =============================================================================
// Reservations
// =============================================================================

/// A stock decrement applied on behalf of one line of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub drug_id: i64,
    pub quantity: i64,
    /// Price returned by the reserving call.
    pub unit_price: Money,
}

/// Stock that could not be handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreleasedReservation {
    pub drug_id: i64,
    pub quantity: i64,
    pub last_error: String,
}

impl fmt::Display for UnreleasedReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drug {} × {} ({})", self.drug_id, self.quantity, self.last_error)
    }
}

// =============================================================================
// Rollback
// =============================================================================

/// Releases `reservations` in reverse order of application.
///
/// Returns every reservation that could not be released.
pub(crate) async fn compensate(
    inventory: &dyn InventoryStore,
    reservations: &[Reservation],
    policy: &CompensationPolicy,
) -> Result<(), Vec<UnreleasedReservation>> {
    info!(count = reservations.len(), "Compensating reservations");

    let mut unreleased = Vec::new();

    for reservation in reservations.iter().rev() {
        if let Err(err) = release_with_retry(inventory, reservation, policy).await {
            error!(
                drug_id = reservation.drug_id,
                quantity = reservation.quantity,
                error = %err,
                "ALARM: compensation release failed, stock leaked"
            );
            unreleased.push(UnreleasedReservation {
                drug_id: reservation.drug_id,
                quantity: reservation.quantity,
                last_error: err.to_string(),
            });
        }
    }

    if unreleased.is_empty() {
        info!("Compensation complete");
        Ok(())
    } else {
        let leaked: Vec<String> = unreleased.iter().map(ToString::to_string).collect();
        error!(
            unreleased = unreleased.len(),
            leaked = ?leaked,
            "ALARM: compensation incomplete, operator action required"
        );
        Err(unreleased)
    }
}

async fn release_with_retry(
    inventory: &dyn InventoryStore,
    reservation: &Reservation,
    policy: &CompensationPolicy,
) -> Result<(), StoreError> {
    let mut attempt = 0u32;

    backoff::future::retry(policy.backoff(), || {
        attempt += 1;
        let attempt = attempt;

        async move {
            inventory
                .release(reservation.drug_id, reservation.quantity)
                .await
                .map_err(|err| {
                    if err.is_retryable() {
                        warn!(
                            drug_id = reservation.drug_id,
                            attempt = attempt,
                            error = %err,
                            "Release failed, retrying"
                        );
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
        }
    })
    .await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStores;

    fn fast_policy(max_elapsed: Option<Duration>) -> CompensationPolicy {
        CompensationPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_elapsed,
        }
    }

    fn reservation(drug_id: i64, quantity: i64) -> Reservation {
        Reservation {
            drug_id,
            quantity,
            unit_price: Money::from_cents(100),
        }
    }

    #[tokio::test]
    async fn test_transient_release_failures_are_retried() {
        let stores = MemoryStores::new();
        let drug = stores.add_drug("Aspirin", 100, 0).await;
        stores.fail_next_releases(3);

        let result = compensate(
            &stores,
            &[reservation(drug.id, 4)],
            &fast_policy(Some(Duration::from_secs(5))),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(stores.stock_of(drug.id).await, Some(4));
        assert_eq!(stores.release_attempts(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_budget_reports_every_leak_and_keeps_going() {
        let stores = MemoryStores::new();
        let a = stores.add_drug("A", 100, 0).await;
        let b = stores.add_drug("B", 100, 0).await;
        // B is released first (reverse order) and keeps failing
        stores.fail_releases_for(b.id);

        let result = compensate(
            &stores,
            &[reservation(a.id, 2), reservation(b.id, 3)],
            &fast_policy(Some(Duration::from_millis(30))),
        )
        .await;

        let unreleased = result.unwrap_err();
        assert_eq!(unreleased.len(), 1);
        assert_eq!(unreleased[0].drug_id, b.id);
        assert_eq!(unreleased[0].quantity, 3);
        assert_eq!(stores.stock_of(a.id).await, Some(2));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let stores = MemoryStores::new();
        let drug = stores.add_drug("Gone", 100, 0).await;
        stores.remove_drug(drug.id).await;

        let result = compensate(&stores, &[reservation(drug.id, 1)], &fast_policy(None)).await;

        assert_eq!(result.unwrap_err().len(), 1);
        assert_eq!(stores.release_attempts(), 1);
    }

    #[test]
    fn test_default_policy() {
        let policy = CompensationPolicy::default();
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
        assert_eq!(CompensationPolicy::unbounded().max_elapsed, None);
    }
}
