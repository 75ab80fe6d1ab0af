//! Vendor Status Handlers
//!
//! The admin approval workflow. Deciding when a vendor is approved lives
//! here; the store and the sync engine only react to the persisted change.

use chrono::Utc;

use std::sync::Arc;

use crate::domain::{DomainError, OperationContext, VendorFilter, VendorPatch, VendorStatus};
use crate::error::AppError;
use crate::repository::CatalogRepository;
use crate::state::AppState;
use crate::vendor_store::{BatchOutcome, VendorStore, VendorWrite};

use super::duration::DurationResolver;
use super::references::ensure_seat_available;
use super::{BulkStatusCommand, ChangeStatusCommand};

fn parse_status(raw: &str) -> Result<VendorStatus, AppError> {
    Ok(raw.trim().to_lowercase().parse::<VendorStatus>()?)
}

// =========================================================================
// ChangeStatusHandler
// =========================================================================

/// Handler for a single vendor status change
pub struct ChangeStatusHandler {
    store: VendorStore,
    catalog: Arc<dyn CatalogRepository>,
    resolver: DurationResolver,
}

impl ChangeStatusHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
            catalog: state.catalog.clone(),
            resolver: DurationResolver::new(state.catalog.clone()),
        }
    }

    pub async fn execute(
        &self,
        command: ChangeStatusCommand,
        context: &OperationContext,
    ) -> Result<VendorWrite, AppError> {
        let status = parse_status(&command.status)?;
        let mut vendor = self.store.find(command.vendor_id).await?;
        let previous = vendor.status;

        if status.is_approved() && !previous.is_approved() {
            ensure_seat_available(self.catalog.as_ref(), vendor.selected_bundle).await?;
            self.resolver.start_subscription(&mut vendor, Utc::now()).await?;
        }

        vendor.rejection_reason = match status {
            VendorStatus::Rejected => command.rejection_reason.filter(|r| !r.trim().is_empty()),
            _ => None,
        };
        vendor.status = status;

        let written = self.store.save(vendor).await?;

        tracing::info!(
            vendor_id = %written.vendor.id,
            actor = context.actor.as_str(),
            correlation_id = ?context.correlation_id,
            from = %previous,
            to = %status,
            subscription_end_date = ?written.vendor.subscription_end_date,
            "Vendor status changed"
        );

        Ok(written)
    }
}

// =========================================================================
// BulkStatusHandler
// =========================================================================

/// Handler for status changes across many vendors (update-by-filter path)
pub struct BulkStatusHandler {
    store: VendorStore,
}

impl BulkStatusHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
        }
    }

    pub async fn execute(
        &self,
        command: BulkStatusCommand,
        context: &OperationContext,
    ) -> Result<BatchOutcome, AppError> {
        let status = parse_status(&command.status)?;

        if command.vendor_ids.is_empty() {
            return Err(AppError::InvalidRequest("vendorIds cannot be empty".to_string()));
        }
        // Approval needs per-vendor subscription dates
        if status.is_approved() {
            return Err(DomainError::BusinessRuleViolation(
                "vendors must be approved individually".to_string(),
            )
            .into());
        }

        let reason = match status {
            VendorStatus::Rejected => command.rejection_reason.filter(|r| !r.trim().is_empty()),
            _ => None,
        };
        let patch = VendorPatch {
            rejection_reason: Some(reason),
            ..VendorPatch::status(status)
        };

        let outcome = self
            .store
            .update_where(&VendorFilter::ids(command.vendor_ids), &patch)
            .await?;

        tracing::info!(
            actor = context.actor.as_str(),
            correlation_id = ?context.correlation_id,
            status = %status,
            updated = outcome.count(),
            "Bulk vendor status change"
        );

        Ok(outcome)
    }
}
