//! Counter Synchronization Engine
//!
//! Applies a `CounterPlan` through a `CounterStore`. Counter writes are
//! best-effort side effects of a vendor mutation: a failed batch is logged
//! and reported, never propagated, and the vendor write is not rolled back.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::MembershipSnapshot;

use super::policy::{plan_counter_changes, CounterPlan, Transition};
use super::store::{CounterStore, CounterTarget};

/// A batch of counter updates that could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSyncFailure {
    pub target: CounterTarget,
    pub ids: Vec<Uuid>,
    pub delta: i64,
    pub reason: String,
}

/// What a sync did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub transition: Transition,
    /// Number of (id, delta) updates the store accepted
    pub applied: usize,
    pub failures: Vec<CounterSyncFailure>,
}

impl SyncOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reconciles category/subcategory/bundle counters after vendor mutations.
///
/// The store is injected at construction; nothing is looked up by name.
#[derive(Clone)]
pub struct CounterSyncEngine {
    store: Arc<dyn CounterStore>,
}

impl CounterSyncEngine {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Reconcile counters for one vendor mutation.
    ///
    /// `prev` is the persisted state before the write (`None` for a new
    /// vendor), `next` the persisted state after it (`None` after a delete).
    pub async fn sync(
        &self,
        vendor_id: Uuid,
        prev: Option<&MembershipSnapshot>,
        next: Option<&MembershipSnapshot>,
    ) -> SyncOutcome {
        let (transition, plan) = plan_counter_changes(prev, next);

        if plan.is_empty() {
            tracing::debug!(
                vendor_id = %vendor_id,
                transition = transition.as_str(),
                "No counter changes required"
            );
            return SyncOutcome {
                transition,
                applied: 0,
                failures: Vec::new(),
            };
        }

        // Disjoint documents, so the three collections are updated concurrently
        let (categories, sub_categories, bundles) = tokio::join!(
            self.apply_target(vendor_id, CounterTarget::Category, &plan),
            self.apply_target(vendor_id, CounterTarget::SubCategory, &plan),
            self.apply_target(vendor_id, CounterTarget::Bundle, &plan),
        );

        let mut outcome = SyncOutcome {
            transition,
            applied: 0,
            failures: Vec::new(),
        };
        for (applied, failures) in [categories, sub_categories, bundles] {
            outcome.applied += applied;
            outcome.failures.extend(failures);
        }

        if outcome.is_clean() {
            tracing::info!(
                vendor_id = %vendor_id,
                transition = transition.as_str(),
                applied = outcome.applied,
                "Vendor counters synchronized"
            );
        } else {
            tracing::error!(
                vendor_id = %vendor_id,
                transition = transition.as_str(),
                applied = outcome.applied,
                failed_batches = outcome.failures.len(),
                "Vendor counters partially synchronized; a recount will repair drift"
            );
        }

        outcome
    }

    async fn apply_target(
        &self,
        vendor_id: Uuid,
        target: CounterTarget,
        plan: &CounterPlan,
    ) -> (usize, Vec<CounterSyncFailure>) {
        let mut applied = 0;
        let mut failures = Vec::new();

        for (delta, ids) in plan.batches(target) {
            match self.store.increment(target, &ids, delta).await {
                Ok(states) => {
                    applied += states.len();

                    if states.len() < ids.len() {
                        tracing::warn!(
                            vendor_id = %vendor_id,
                            target = target.as_str(),
                            requested = ids.len(),
                            updated = states.len(),
                            "Counter update skipped missing documents"
                        );
                    }

                    for state in states.iter().filter(|s| s.is_over_ceiling()) {
                        tracing::warn!(
                            vendor_id = %vendor_id,
                            bundle_id = %state.id,
                            subscribers = state.count,
                            max_vendors = ?state.ceiling,
                            "Bundle is over capacity"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        vendor_id = %vendor_id,
                        target = target.as_str(),
                        delta = delta,
                        ids = ?ids,
                        error = %e,
                        "Counter sync failed"
                    );
                    failures.push(CounterSyncFailure {
                        target,
                        ids,
                        delta,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (applied, failures)
    }
}
