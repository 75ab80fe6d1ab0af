//! Vendor Registration and Profile Handlers

use std::sync::Arc;

use crate::domain::{normalize_email, DomainError, OperationContext, Password};
use crate::error::AppError;
use crate::repository::CatalogRepository;
use crate::state::AppState;
use crate::vendor_store::{VendorStore, VendorWrite};

use super::references::{ensure_bundle, ensure_memberships};
use super::{RegisterVendorCommand, UpdateProfileCommand};

// =========================================================================
// RegisterVendorHandler
// =========================================================================

/// Handler for vendor registration
pub struct RegisterVendorHandler {
    store: VendorStore,
    catalog: Arc<dyn CatalogRepository>,
}

impl RegisterVendorHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
            catalog: state.catalog.clone(),
        }
    }

    /// Validate, check references and persist a pending vendor
    pub async fn execute(
        &self,
        command: RegisterVendorCommand,
        context: &OperationContext,
    ) -> Result<VendorWrite, AppError> {
        let vendor = command.registration.into_vendor()?;

        ensure_memberships(
            self.catalog.as_ref(),
            &vendor.main_categories,
            &vendor.sub_categories,
        )
        .await?;
        ensure_bundle(self.catalog.as_ref(), vendor.selected_bundle).await?;

        let written = self.store.create(vendor).await?;

        tracing::info!(
            vendor_id = %written.vendor.id,
            correlation_id = ?context.correlation_id,
            "Vendor registered"
        );

        Ok(written)
    }
}

// =========================================================================
// UpdateProfileHandler
// =========================================================================

/// Handler for vendor self-service profile edits
pub struct UpdateProfileHandler {
    store: VendorStore,
    catalog: Arc<dyn CatalogRepository>,
}

impl UpdateProfileHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.vendor_store(),
            catalog: state.catalog.clone(),
        }
    }

    pub async fn execute(
        &self,
        command: UpdateProfileCommand,
        context: &OperationContext,
    ) -> Result<VendorWrite, AppError> {
        let mut vendor = self.store.find(command.vendor_id).await?;

        if let Some(new_password) = &command.new_password {
            let current = command.current_password.as_deref().unwrap_or_default();
            let stored = vendor.password.clone();
            let matches = tokio::task::spawn_blocking({
                let current = current.to_string();
                move || stored.verify(&current)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

            if !matches {
                tracing::warn!(
                    vendor_id = %vendor.id,
                    correlation_id = ?context.correlation_id,
                    "Password change rejected"
                );
                return Err(DomainError::Unauthorized(
                    "current password is incorrect".to_string(),
                )
                .into());
            }
            vendor.password = Password::plain(new_password.clone());
        }

        if command.changes_membership() {
            let main = command
                .main_categories
                .clone()
                .unwrap_or_else(|| vendor.main_categories.clone());
            let subs = command
                .sub_categories
                .clone()
                .unwrap_or_else(|| vendor.sub_categories.clone());
            ensure_memberships(self.catalog.as_ref(), &main, &subs).await?;
        }

        let UpdateProfileCommand {
            owner_name,
            email,
            phone,
            business_name,
            business_logo,
            business_description,
            website,
            address,
            main_categories,
            sub_categories,
            ..
        } = command;

        if let Some(owner_name) = owner_name {
            vendor.owner_name = owner_name.trim().to_string();
        }
        if let Some(email) = email {
            vendor.email = normalize_email(&email);
        }
        if let Some(phone) = phone {
            vendor.phone = phone.trim().to_string();
        }
        if let Some(business_name) = business_name {
            vendor.business_name = business_name.trim().to_string();
        }
        if let Some(logo) = business_logo {
            vendor.business_logo = logo;
        }
        if let Some(description) = business_description {
            vendor.business_description = description;
        }
        if let Some(website) = website {
            vendor.website = Some(website).filter(|w| !w.trim().is_empty());
        }
        if let Some(address) = address {
            vendor.address = address;
        }
        if let Some(main) = main_categories {
            vendor.main_categories = crate::domain::dedup(main);
        }
        if let Some(subs) = sub_categories {
            vendor.sub_categories = crate::domain::dedup(subs);
        }

        let written = self.store.save(vendor).await?;

        tracing::info!(
            vendor_id = %written.vendor.id,
            correlation_id = ?context.correlation_id,
            transition = written.sync.transition.as_str(),
            "Vendor profile updated"
        );

        Ok(written)
    }
}
