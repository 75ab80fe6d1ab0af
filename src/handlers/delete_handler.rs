//! Vendor Deletion Handlers

use uuid::Uuid;

use crate::domain::{OperationContext, VendorFilter};
use crate::error::AppError;
use crate::state::AppState;
use crate::vendor_store::{BatchOutcome, VendorStore, VendorWrite};

use super::PurgeVendorsCommand;

/// Handler for deleting one vendor
pub struct DeleteVendorHandler {
    store: VendorStore,
}

impl DeleteVendorHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
        }
    }

    pub async fn execute(
        &self,
        vendor_id: Uuid,
        context: &OperationContext,
    ) -> Result<VendorWrite, AppError> {
        let removed = self.store.delete(vendor_id).await?;

        tracing::info!(
            vendor_id = %vendor_id,
            actor = context.actor.as_str(),
            correlation_id = ?context.correlation_id,
            was_counted = removed.vendor.status.is_approved(),
            "Vendor removed"
        );

        Ok(removed)
    }
}

/// Handler for deleting vendors by criteria (delete-by-filter path)
pub struct PurgeVendorsHandler {
    store: VendorStore,
}

impl PurgeVendorsHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
        }
    }

    pub async fn execute(
        &self,
        command: PurgeVendorsCommand,
        context: &OperationContext,
    ) -> Result<BatchOutcome, AppError> {
        if !command.has_criteria() {
            return Err(AppError::InvalidRequest(
                "purge requires a status or createdBefore criterion".to_string(),
            ));
        }

        let mut filter = VendorFilter::default();
        if let Some(status) = command.status {
            filter = filter.with_status(status);
        }
        if let Some(cutoff) = command.created_before {
            filter = filter.with_created_before(cutoff);
        }

        let outcome = self.store.delete_where(&filter).await?;

        tracing::info!(
            actor = context.actor.as_str(),
            correlation_id = ?context.correlation_id,
            deleted = outcome.count(),
            "Vendors purged"
        );

        Ok(outcome)
    }
}
