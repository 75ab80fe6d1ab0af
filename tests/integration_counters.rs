//! Counter Synchronization Integration Tests
//!
//! Exercise every vendor mutation path against the in-memory backend and
//! check the stored counters against the approved vendors.

use chrono::{Duration, Utc};

use vendor_hub::domain::{compute_end_date, Period, VendorFilter, VendorPatch, VendorStatus};
use vendor_hub::handlers::{
    DeleteVendorHandler, UpdateProfileCommand, UpdateProfileHandler, UpdateSubscriptionCommand,
    UpdateSubscriptionHandler,
};
use vendor_hub::jobs::{expire_lapsed_subscriptions, recount_counters, JobScheduler};
use vendor_hub::sync::{CounterTarget, Transition};

mod common;

// =========================================================================
// Invariant
// =========================================================================

#[tokio::test]
async fn test_counters_follow_mixed_mutation_sequence() {
    let env = common::setup().await;
    let store = env.state.vendor_store();

    let a = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    let b = env.register("Beta Hall", vec![env.category_a, env.category_b], env.bundle_y).await;
    let c = env.register("Gamma Hall", vec![env.category_b], env.bundle_z).await;
    env.assert_counters_consistent().await;

    env.set_status(a, VendorStatus::Approved).await;
    env.set_status(b, VendorStatus::Approved).await;
    env.set_status(c, VendorStatus::Approved).await;
    env.assert_counters_consistent().await;

    env.set_status(b, VendorStatus::Rejected).await;
    env.assert_counters_consistent().await;

    UpdateProfileHandler::new(&env.state)
        .execute(
            UpdateProfileCommand::new(c)
                .with_main_categories(vec![env.category_a, env.category_a2]),
            &env.admin,
        )
        .await
        .unwrap();
    env.assert_counters_consistent().await;

    store
        .update_where(&VendorFilter::ids(vec![a, b]), &VendorPatch::status(VendorStatus::Pending))
        .await
        .unwrap();
    env.assert_counters_consistent().await;

    store.delete(c).await.unwrap();
    env.assert_counters_consistent().await;

    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);
}

// =========================================================================
// Re-save and symmetry
// =========================================================================

#[tokio::test]
async fn test_resave_without_membership_change_is_noop() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    let store = env.state.vendor_store();
    let mut vendor = store.find(id).await.unwrap();
    vendor.website = Some("https://alpha.example.com".to_string());
    let written = store.save(vendor).await.unwrap();

    assert_eq!(written.sync.transition, Transition::RemainedApproved);
    assert_eq!(written.sync.applied, 0);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 1);
}

#[tokio::test]
async fn test_approve_then_reject_nets_zero() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a, env.category_b], env.bundle_y).await;

    env.set_status(id, VendorStatus::Approved).await;
    assert_eq!(env.count(CounterTarget::Category, env.category_b).await, 1);

    env.set_status(id, VendorStatus::Rejected).await;
    for category in [env.category_a, env.category_b] {
        assert_eq!(env.count(CounterTarget::Category, category).await, 0);
    }
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_y).await, 0);
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_new_approval_counts_and_dates() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);

    let before = Utc::now();
    env.set_status(id, VendorStatus::Approved).await;
    let vendor = env.state.vendor_store().find(id).await.unwrap();

    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 1);

    let start = vendor.subscription_start_date.unwrap();
    assert!(start >= before && start <= Utc::now());
    let expected_end =
        compute_end_date(start, &Period::months(1), Some(&Period::days(10))).unwrap();
    assert_eq!(vendor.subscription_end_date, Some(expected_end));
}

#[tokio::test]
async fn test_category_reassignment_while_approved() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    let written = UpdateProfileHandler::new(&env.state)
        .execute(
            UpdateProfileCommand::new(id).with_main_categories(vec![env.category_a2]),
            &env.admin,
        )
        .await
        .unwrap();

    assert_eq!(written.sync.transition, Transition::RemainedApproved);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 0);
    assert_eq!(env.count(CounterTarget::Category, env.category_a2).await, 1);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 1);
}

#[tokio::test]
async fn test_deleting_approved_vendor_decrements_everything() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a, env.category_b], env.bundle_y).await;
    env.set_status(id, VendorStatus::Approved).await;

    let removed = DeleteVendorHandler::new(&env.state)
        .execute(id, &env.admin)
        .await
        .unwrap();

    assert_eq!(removed.sync.transition, Transition::Removed);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 0);
    assert_eq!(env.count(CounterTarget::Category, env.category_b).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_y).await, 0);
}

#[tokio::test]
async fn test_deleting_pending_vendor_touches_nothing() {
    let env = common::setup().await;
    let approved = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(approved, VendorStatus::Approved).await;
    let pending = env.register("Beta Hall", vec![env.category_a], env.bundle_z).await;

    let removed = env.state.vendor_store().delete(pending).await.unwrap();

    assert_eq!(removed.sync.applied, 0);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 1);
}

// =========================================================================
// Mutation paths
// =========================================================================

#[tokio::test]
async fn test_vendor_created_as_approved_is_counted() {
    let env = common::setup().await;
    let mut vendor = env
        .registration("Alpha Hall", vec![env.category_a], env.bundle_z)
        .into_vendor()
        .unwrap();
    vendor.status = VendorStatus::Approved;

    let written = env.state.vendor_store().create(vendor).await.unwrap();

    assert_eq!(written.sync.transition, Transition::NewlyApproved);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
}

#[tokio::test]
async fn test_delete_by_filter_uses_state_at_deletion() {
    let env = common::setup().await;
    let a = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    let b = env.register("Beta Hall", vec![env.category_b], env.bundle_z).await;
    env.set_status(a, VendorStatus::Approved).await;
    env.set_status(b, VendorStatus::Approved).await;
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 2);

    let outcome = env
        .state
        .vendor_store()
        .delete_where(&VendorFilter::default().with_status(VendorStatus::Approved))
        .await
        .unwrap();

    assert_eq!(outcome.count(), 2);
    assert!(outcome.counter_failures.is_empty());
    env.assert_counters_consistent().await;
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);
}

#[tokio::test]
async fn test_bundle_reassignment_while_approved() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    UpdateSubscriptionHandler::new(&env.state)
        .execute(UpdateSubscriptionCommand::new(id).with_bundle(env.bundle_y), &env.admin)
        .await
        .unwrap();

    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_y).await, 1);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test]
async fn test_expiry_sweep_decrements_by_previous_membership() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    let store = env.state.vendor_store();
    let expired = expire_lapsed_subscriptions(&store, Utc::now() + Duration::days(90))
        .await
        .unwrap();

    assert_eq!(expired, 1);
    assert_eq!(store.find(id).await.unwrap().status, VendorStatus::Expired);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);

    // Still running subscriptions are left alone
    let other = env.register("Beta Hall", vec![env.category_a], env.bundle_y).await;
    env.set_status(other, VendorStatus::Approved).await;
    assert_eq!(expire_lapsed_subscriptions(&store, Utc::now()).await.unwrap(), 0);
}

// =========================================================================
// Failure isolation and repair
// =========================================================================

#[tokio::test]
async fn test_counter_failure_does_not_fail_the_write() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;

    env.backend.fail_counter_target(CounterTarget::Bundle).await;
    let store = env.state.vendor_store();
    let mut vendor = store.find(id).await.unwrap();
    vendor.status = VendorStatus::Approved;
    let written = store.save(vendor).await.unwrap();
    env.backend.restore_counter_target(CounterTarget::Bundle).await;

    // The vendor write and the other targets went through
    assert_eq!(store.find(id).await.unwrap().status, VendorStatus::Approved);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 0);

    assert_eq!(written.sync.failures.len(), 1);
    assert_eq!(written.sync.failures[0].target, CounterTarget::Bundle);
    assert_eq!(written.sync.failures[0].delta, 1);
}

#[tokio::test]
async fn test_recount_repairs_drift() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    env.backend.set_counter(CounterTarget::Category, env.category_a, 5).await;
    env.backend.set_counter(CounterTarget::Category, env.category_b, 3).await;
    env.backend.set_counter(CounterTarget::Bundle, env.bundle_z, 0).await;

    let report = recount_counters(env.state.vendors.as_ref(), env.state.counters.as_ref())
        .await
        .unwrap();

    assert_eq!(report.vendors_counted, 1);
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 1);
    assert_eq!(env.count(CounterTarget::Category, env.category_b).await, 0);
    assert_eq!(env.count(CounterTarget::Bundle, env.bundle_z).await, 1);
    env.assert_counters_consistent().await;
}

#[tokio::test]
async fn test_scheduler_run_all_once() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;
    env.backend.set_counter(CounterTarget::Category, env.category_b, 9).await;

    let report = JobScheduler::new(env.state.clone()).run_all_once().await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.subscriptions_expired, 0);
    assert_eq!(report.recount.map(|r| r.vendors_counted), Some(1));
    env.assert_counters_consistent().await;
}

/// Two writers that both read the vendor before either writes diff
/// against the same previous state. Nothing serializes them, so the
/// counters drift until a recount. This pins that behavior down.
#[tokio::test]
async fn test_stale_previous_state_drifts_until_recount() {
    let env = common::setup().await;
    let id = env.register("Alpha Hall", vec![env.category_a], env.bundle_z).await;
    env.set_status(id, VendorStatus::Approved).await;

    let store = env.state.vendor_store();
    let stale = store.find(id).await.unwrap();

    // Another process demotes the vendor without going through this store
    let mut demoted = stale.clone();
    demoted.status = VendorStatus::Pending;
    env.backend.put_vendor_unsynced(demoted).await;

    // This writer still believes the vendor is approved and re-saves it
    let mut resaved = stale;
    resaved.status = VendorStatus::Approved;
    store.save(resaved).await.unwrap();

    // pending -> approved was applied on top of a count nobody decremented
    assert_eq!(env.count(CounterTarget::Category, env.category_a).await, 2);
    assert_eq!(env.expected(CounterTarget::Category, env.category_a).await, 1);

    recount_counters(env.state.vendors.as_ref(), env.state.counters.as_ref())
        .await
        .unwrap();
    env.assert_counters_consistent().await;
}
