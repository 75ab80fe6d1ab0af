//! Transition policy
//!
//! Pure diff between the persisted membership before a mutation and the
//! membership after it. No I/O happens here.

use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::domain::{MembershipSnapshot, VendorStatus};

use super::store::CounterTarget;

/// Which case of the transition table a mutation fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Not approved before, approved now (includes brand-new approved vendors)
    NewlyApproved,
    /// Approved before, pending or rejected now
    LostApproval,
    /// Approved before, expired now
    ExpiredFromApproved,
    /// Approved before, deleted now
    Removed,
    /// Approved before and after; membership may have moved
    RemainedApproved,
    /// Not approved before or after
    RemainedUnapproved,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::NewlyApproved => "newly_approved",
            Transition::LostApproval => "lost_approval",
            Transition::ExpiredFromApproved => "expired_from_approved",
            Transition::Removed => "removed",
            Transition::RemainedApproved => "remained_approved",
            Transition::RemainedUnapproved => "remained_unapproved",
        }
    }
}

/// Classify a mutation. `None` means "no persisted document" (before a
/// create, after a delete). Cases are checked in order; first match wins.
pub fn classify(prev: Option<VendorStatus>, next: Option<VendorStatus>) -> Transition {
    let was_approved = prev.map_or(false, |s| s.is_approved());
    let is_approved = next.map_or(false, |s| s.is_approved());

    match (was_approved, is_approved, next) {
        (false, true, _) => Transition::NewlyApproved,
        (true, false, Some(VendorStatus::Expired)) => Transition::ExpiredFromApproved,
        (true, false, Some(_)) => Transition::LostApproval,
        (true, false, None) => Transition::Removed,
        (true, true, _) => Transition::RemainedApproved,
        (false, false, _) => Transition::RemainedUnapproved,
    }
}

/// Net counter deltas per target and id. Zero deltas are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterPlan {
    categories: BTreeMap<Uuid, i64>,
    sub_categories: BTreeMap<Uuid, i64>,
    bundles: BTreeMap<Uuid, i64>,
}

impl CounterPlan {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.sub_categories.is_empty() && self.bundles.is_empty()
    }

    /// Deltas for one target
    pub fn deltas(&self, target: CounterTarget) -> &BTreeMap<Uuid, i64> {
        match target {
            CounterTarget::Category => &self.categories,
            CounterTarget::SubCategory => &self.sub_categories,
            CounterTarget::Bundle => &self.bundles,
        }
    }

    /// Delta for one id (0 when untouched)
    pub fn delta(&self, target: CounterTarget, id: Uuid) -> i64 {
        self.deltas(target).get(&id).copied().unwrap_or(0)
    }

    /// Ids of one target grouped by delta, so each group is a single
    /// "increment by N where id in (...)" statement
    pub fn batches(&self, target: CounterTarget) -> BTreeMap<i64, Vec<Uuid>> {
        let mut batches: BTreeMap<i64, Vec<Uuid>> = BTreeMap::new();
        for (id, delta) in self.deltas(target) {
            batches.entry(*delta).or_default().push(*id);
        }
        batches
    }

    fn bump(&mut self, target: CounterTarget, id: Uuid, delta: i64) {
        let map = match target {
            CounterTarget::Category => &mut self.categories,
            CounterTarget::SubCategory => &mut self.sub_categories,
            CounterTarget::Bundle => &mut self.bundles,
        };
        let entry = map.entry(id).or_insert(0);
        *entry += delta;
        if *entry == 0 {
            map.remove(&id);
        }
    }

    /// Count (delta = 1) or uncount (delta = -1) a whole membership
    fn bump_membership(&mut self, membership: &MembershipSnapshot, delta: i64) {
        for id in unique(&membership.main_categories) {
            self.bump(CounterTarget::Category, id, delta);
        }
        for id in unique(&membership.sub_categories) {
            self.bump(CounterTarget::SubCategory, id, delta);
        }
        if let Some(bundle) = membership.selected_bundle {
            self.bump(CounterTarget::Bundle, bundle, delta);
        }
    }

    /// +1 for ids only in `next`, -1 for ids only in `prev`
    fn bump_difference(&mut self, target: CounterTarget, prev: &[Uuid], next: &[Uuid]) {
        let prev = unique(prev);
        let next = unique(next);
        for id in next.difference(&prev) {
            self.bump(target, *id, 1);
        }
        for id in prev.difference(&next) {
            self.bump(target, *id, -1);
        }
    }
}

/// Compute the transition and the counter changes it requires.
///
/// Losing approval (by status change, expiry or deletion) uncounts the
/// *previous* membership, which is what was counted when the vendor was
/// approved.
pub fn plan_counter_changes(
    prev: Option<&MembershipSnapshot>,
    next: Option<&MembershipSnapshot>,
) -> (Transition, CounterPlan) {
    let transition = classify(prev.map(|p| p.status), next.map(|n| n.status));
    let mut plan = CounterPlan::default();

    match (transition, prev, next) {
        (Transition::NewlyApproved, _, Some(next)) => plan.bump_membership(next, 1),
        (
            Transition::LostApproval | Transition::ExpiredFromApproved | Transition::Removed,
            Some(prev),
            _,
        ) => plan.bump_membership(prev, -1),
        (Transition::RemainedApproved, Some(prev), Some(next)) => {
            plan.bump_difference(
                CounterTarget::Category,
                &prev.main_categories,
                &next.main_categories,
            );
            plan.bump_difference(
                CounterTarget::SubCategory,
                &prev.sub_categories,
                &next.sub_categories,
            );
            if prev.selected_bundle != next.selected_bundle {
                if let Some(old) = prev.selected_bundle {
                    plan.bump(CounterTarget::Bundle, old, -1);
                }
                if let Some(new) = next.selected_bundle {
                    plan.bump(CounterTarget::Bundle, new, 1);
                }
            }
        }
        _ => {}
    }

    (transition, plan)
}

fn unique(ids: &[Uuid]) -> BTreeSet<Uuid> {
    ids.iter().copied().collect()
}
