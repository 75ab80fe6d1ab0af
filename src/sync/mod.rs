//! Counter synchronization
//!
//! Keeps `vendor_count` on categories/subcategories and `subscribers_count`
//! on bundles equal to the number of approved vendors referencing them.
//!
//! Consistency is per statement only: the vendor write and the counter
//! writes are separate round-trips with no transaction around them, so two
//! racing mutations of the same vendor can diff against a stale previous
//! state and drift the counters. `recount` repairs that.

pub mod engine;
pub mod policy;
pub mod recount;
pub mod store;

pub use engine::{CounterSyncEngine, CounterSyncFailure, SyncOutcome};
pub use policy::{classify, plan_counter_changes, CounterPlan, Transition};
pub use recount::{apply_recount, expected_counts, CounterTotals, RecountReport};
pub use store::{CounterState, CounterStore, CounterSyncError, CounterTarget};
