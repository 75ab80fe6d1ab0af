//! Subscription Handlers

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::repository::CatalogRepository;
use crate::state::AppState;
use crate::vendor_store::{VendorStore, VendorWrite};

use super::duration::DurationResolver;
use super::references::{ensure_bundle, ensure_seat_available};
use super::{SubscriptionView, UpdateSubscriptionCommand};

// =========================================================================
// UpdateSubscriptionHandler
// =========================================================================

/// Handler for admin edits of bundle, custom duration and custom features
pub struct UpdateSubscriptionHandler {
    store: VendorStore,
    catalog: Arc<dyn CatalogRepository>,
    resolver: DurationResolver,
}

impl UpdateSubscriptionHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
            catalog: state.catalog.clone(),
            resolver: DurationResolver::new(state.catalog.clone()),
        }
    }

    pub async fn execute(
        &self,
        command: UpdateSubscriptionCommand,
        context: &OperationContext,
    ) -> Result<VendorWrite, AppError> {
        if command.is_empty() {
            return Err(AppError::InvalidRequest("no subscription changes given".to_string()));
        }

        let mut vendor = self.store.find(command.vendor_id).await?;
        let mut duration_changed = false;

        if let Some(bundle_id) = command.selected_bundle {
            ensure_bundle(self.catalog.as_ref(), bundle_id).await?;
            if vendor.status.is_approved() && vendor.selected_bundle != bundle_id {
                ensure_seat_available(self.catalog.as_ref(), bundle_id).await?;
            }
            duration_changed |= vendor.selected_bundle != bundle_id;
            vendor.selected_bundle = bundle_id;
        }
        if let Some(custom) = command.custom_duration {
            duration_changed |= vendor.custom_duration != custom;
            vendor.custom_duration = custom;
        }
        if let Some(features) = command.custom_features {
            vendor.custom_features = features.into_iter().map(|f| f.trim().to_string()).collect();
        }

        vendor.validate()?;

        if duration_changed && vendor.status.is_approved() {
            self.resolver.recompute_end_date(&mut vendor).await?;
        }

        let written = self.store.save(vendor).await?;

        tracing::info!(
            vendor_id = %written.vendor.id,
            actor = context.actor.as_str(),
            correlation_id = ?context.correlation_id,
            duration_changed = duration_changed,
            subscription_end_date = ?written.vendor.subscription_end_date,
            "Vendor subscription updated"
        );

        Ok(written)
    }
}

// =========================================================================
// SubscriptionQuery
// =========================================================================

/// Read-side view of a vendor's subscription
pub struct SubscriptionQuery {
    store: VendorStore,
    catalog: Arc<dyn CatalogRepository>,
    resolver: DurationResolver,
}

impl SubscriptionQuery {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
            catalog: state.catalog.clone(),
            resolver: DurationResolver::new(state.catalog.clone()),
        }
    }

    pub async fn execute(&self, vendor_id: Uuid) -> Result<SubscriptionView, AppError> {
        let vendor = self.store.find(vendor_id).await?;
        let bundle = self.catalog.find_bundle(vendor.selected_bundle).await?;
        let duration = self.resolver.resolve(&vendor).await?;

        Ok(SubscriptionView {
            vendor_id: vendor.id,
            status: vendor.status,
            selected_bundle: vendor.selected_bundle,
            bundle_name: bundle.as_ref().map(|b| b.name.clone()),
            subscription_start_date: vendor.subscription_start_date,
            subscription_end_date: vendor.subscription_end_date,
            duration,
            features: vendor.effective_features(bundle.as_ref()),
            custom_duration: vendor.custom_duration,
        })
    }
}
