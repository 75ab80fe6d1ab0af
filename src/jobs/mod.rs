//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance: expiring lapsed
//! subscriptions and repairing counter drift.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::interval;

use crate::domain::{VendorFilter, VendorPatch, VendorStatus};
use crate::repository::{RepositoryError, VendorRepository};
use crate::state::AppState;
use crate::sync::{apply_recount, CounterStore, CounterSyncError, RecountReport};
use crate::vendor_store::{VendorStore, VendorStoreError};

// =========================================================================
// Subscription Expiry Sweep
// =========================================================================

/// Move approved vendors whose subscription ended before `now` to expired.
///
/// Goes through the update-by-filter path, so each vendor is decremented
/// from the counters by its membership at expiry.
pub async fn expire_lapsed_subscriptions(
    store: &VendorStore,
    now: DateTime<Utc>,
) -> Result<u64, JobError> {
    let filter = VendorFilter::default()
        .with_status(VendorStatus::Approved)
        .with_subscription_ended_before(now);

    let outcome = store
        .update_where(&filter, &VendorPatch::status(VendorStatus::Expired))
        .await?;

    let expired = outcome.count() as u64;
    if expired > 0 {
        tracing::info!(
            expired = expired,
            counter_failures = outcome.counter_failures.len(),
            "Expired lapsed vendor subscriptions"
        );
    }

    Ok(expired)
}

// =========================================================================
// Counter Recount
// =========================================================================

/// Recompute every counter from the approved vendors and overwrite it
pub async fn recount_counters(
    vendors: &dyn VendorRepository,
    counters: &dyn CounterStore,
) -> Result<RecountReport, JobError> {
    let memberships = vendors.memberships().await?;
    Ok(apply_recount(counters, &memberships).await?)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for the subscription expiry sweep (default: 1 hour)
    pub expiry_sweep_interval: Duration,
    /// Interval for the full counter recount (default: 24 hours)
    pub recount_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval: Duration::from_secs(3600),
            recount_interval: Duration::from_secs(24 * 3600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    state: AppState,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(state: AppState, config: JobSchedulerConfig) -> Self {
        Self { state, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let store = self.state.vendor_store();
        let mut expiry_interval = interval(self.config.expiry_sweep_interval);
        let mut recount_interval = interval(self.config.recount_interval);

        loop {
            tokio::select! {
                _ = expiry_interval.tick() => {
                    if let Err(e) = expire_lapsed_subscriptions(&store, Utc::now()).await {
                        tracing::error!(error = %e, "Subscription expiry sweep failed");
                    }
                }
                _ = recount_interval.tick() => {
                    if let Err(e) = recount_counters(
                        self.state.vendors.as_ref(),
                        self.state.counters.as_ref(),
                    ).await {
                        tracing::error!(error = %e, "Counter recount failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        // Expire first so the recount sees the final statuses
        match expire_lapsed_subscriptions(&self.state.vendor_store(), Utc::now()).await {
            Ok(count) => report.subscriptions_expired = count,
            Err(e) => report.errors.push(format!("Expiry sweep: {}", e)),
        }

        match recount_counters(self.state.vendors.as_ref(), self.state.counters.as_ref()).await {
            Ok(recount) => report.recount = Some(recount),
            Err(e) => report.errors.push(format!("Recount: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub subscriptions_expired: u64,
    pub recount: Option<RecountReport>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Vendor store error: {0}")]
    Store(#[from] VendorStoreError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Counter store error: {0}")]
    Counters(#[from] CounterSyncError),
}

// =========================================================================
// Tests
// =========================================================================
