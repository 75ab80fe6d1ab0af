//! Counter store seam
//!
//! The engine only needs atomic "increment by N" and "overwrite" on the
//! three counter collections, so that is all this trait exposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Collection holding a denormalized counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterTarget {
    /// `categories.vendor_count`
    Category,
    /// `sub_categories.vendor_count`
    SubCategory,
    /// `bundles.subscribers_count`
    Bundle,
}

impl CounterTarget {
    pub const ALL: [CounterTarget; 3] = [
        CounterTarget::Category,
        CounterTarget::SubCategory,
        CounterTarget::Bundle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterTarget::Category => "category",
            CounterTarget::SubCategory => "sub_category",
            CounterTarget::Bundle => "bundle",
        }
    }
}

impl fmt::Display for CounterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counter value after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub id: Uuid,
    pub count: i64,
    /// `max_vendors` for bundles, `None` elsewhere
    pub ceiling: Option<i64>,
}

impl CounterState {
    pub fn is_over_ceiling(&self) -> bool {
        matches!(self.ceiling, Some(max) if self.count > max)
    }
}

/// Counter write failures
#[derive(Debug, thiserror::Error)]
pub enum CounterSyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic counter operations on Category / SubCategory / Bundle
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `delta` to the counter of every id in `ids` in one atomic
    /// statement. Counts never drop below zero. Unknown ids are skipped;
    /// the returned states cover the rows that were touched.
    async fn increment(
        &self,
        target: CounterTarget,
        ids: &[Uuid],
        delta: i64,
    ) -> Result<Vec<CounterState>, CounterSyncError>;

    /// Replace every counter of `target` with the value in `counts`,
    /// zeroing ids that are absent. Returns rows written.
    async fn overwrite(
        &self,
        target: CounterTarget,
        counts: &HashMap<Uuid, i64>,
    ) -> Result<u64, CounterSyncError>;
}
