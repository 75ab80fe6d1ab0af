//! Full recount
//!
//! Rebuilds every counter from scratch out of the approved vendors. Used
//! to repair drift left by failed or racing counter syncs.

use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::MembershipSnapshot;

use super::store::{CounterStore, CounterSyncError, CounterTarget};

/// Expected counter values per target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterTotals {
    pub categories: HashMap<Uuid, i64>,
    pub sub_categories: HashMap<Uuid, i64>,
    pub bundles: HashMap<Uuid, i64>,
}

impl CounterTotals {
    pub fn for_target(&self, target: CounterTarget) -> &HashMap<Uuid, i64> {
        match target {
            CounterTarget::Category => &self.categories,
            CounterTarget::SubCategory => &self.sub_categories,
            CounterTarget::Bundle => &self.bundles,
        }
    }

    /// Expected value for one id
    pub fn get(&self, target: CounterTarget, id: Uuid) -> i64 {
        self.for_target(target).get(&id).copied().unwrap_or(0)
    }
}

/// Count approved memberships; each vendor counts once per id
pub fn expected_counts<'a>(
    memberships: impl IntoIterator<Item = &'a MembershipSnapshot>,
) -> CounterTotals {
    let mut totals = CounterTotals::default();

    for membership in memberships.into_iter().filter(|m| m.is_approved()) {
        for id in membership.main_categories.iter().collect::<BTreeSet<_>>() {
            *totals.categories.entry(*id).or_insert(0) += 1;
        }
        for id in membership.sub_categories.iter().collect::<BTreeSet<_>>() {
            *totals.sub_categories.entry(*id).or_insert(0) += 1;
        }
        if let Some(bundle) = membership.selected_bundle {
            *totals.bundles.entry(bundle).or_insert(0) += 1;
        }
    }

    totals
}

/// Rows written per target by a recount
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecountReport {
    pub vendors_counted: usize,
    pub categories_written: u64,
    pub sub_categories_written: u64,
    pub bundles_written: u64,
}

/// Overwrite all counters with values computed from `memberships`
pub async fn apply_recount(
    store: &dyn CounterStore,
    memberships: &[MembershipSnapshot],
) -> Result<RecountReport, CounterSyncError> {
    let totals = expected_counts(memberships);

    let mut report = RecountReport {
        vendors_counted: memberships.iter().filter(|m| m.is_approved()).count(),
        ..Default::default()
    };

    for target in CounterTarget::ALL {
        let written = store.overwrite(target, totals.for_target(target)).await?;
        match target {
            CounterTarget::Category => report.categories_written = written,
            CounterTarget::SubCategory => report.sub_categories_written = written,
            CounterTarget::Bundle => report.bundles_written = written,
        }
    }

    tracing::info!(
        vendors = report.vendors_counted,
        categories = report.categories_written,
        sub_categories = report.sub_categories_written,
        bundles = report.bundles_written,
        "Counters recomputed from approved vendors"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VendorStatus;

    #[test]
    fn test_only_approved_vendors_count() {
        let (cat, sub, bundle) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let approved = MembershipSnapshot {
            status: VendorStatus::Approved,
            main_categories: vec![cat, cat],
            sub_categories: vec![sub],
            selected_bundle: Some(bundle),
        };
        let pending = MembershipSnapshot {
            status: VendorStatus::Pending,
            ..approved.clone()
        };
        let expired = MembershipSnapshot {
            status: VendorStatus::Expired,
            ..approved.clone()
        };

        let totals = expected_counts(&[approved.clone(), approved, pending, expired]);

        assert_eq!(totals.get(CounterTarget::Category, cat), 2);
        assert_eq!(totals.get(CounterTarget::SubCategory, sub), 2);
        assert_eq!(totals.get(CounterTarget::Bundle, bundle), 2);
        assert_eq!(totals.get(CounterTarget::Bundle, Uuid::new_v4()), 0);
    }
}
