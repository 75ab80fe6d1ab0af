//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Address, BundleChanges, CustomDuration, NewBundle, NewCategory, NewSubCategory, NewVendor,
    ResolvedDuration, VendorStatus,
};

// =========================================================================
// Vendor registration
// =========================================================================

/// Command to register a new vendor (always starts pending)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterVendorCommand {
    pub registration: NewVendor,
}

impl RegisterVendorCommand {
    pub fn new(registration: NewVendor) -> Self {
        Self { registration }
    }
}

// =========================================================================
// Vendor profile
// =========================================================================

/// Self-service profile edit. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileCommand {
    pub vendor_id: Uuid,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub business_logo: Option<String>,
    pub business_description: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
    pub main_categories: Option<Vec<Uuid>>,
    pub sub_categories: Option<Vec<Uuid>>,
    /// Required whenever `new_password` is set
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

impl UpdateProfileCommand {
    pub fn new(vendor_id: Uuid) -> Self {
        Self {
            vendor_id,
            ..Default::default()
        }
    }

    pub fn with_business_name(mut self, business_name: String) -> Self {
        self.business_name = Some(business_name);
        self
    }

    pub fn with_main_categories(mut self, main_categories: Vec<Uuid>) -> Self {
        self.main_categories = Some(main_categories);
        self
    }

    pub fn with_sub_categories(mut self, sub_categories: Vec<Uuid>) -> Self {
        self.sub_categories = Some(sub_categories);
        self
    }

    pub fn with_password_change(mut self, current: String, new: String) -> Self {
        self.current_password = Some(current);
        self.new_password = Some(new);
        self
    }

    /// Whether the edit touches counted membership
    pub fn changes_membership(&self) -> bool {
        self.main_categories.is_some() || self.sub_categories.is_some()
    }
}

// =========================================================================
// Admin status workflow
// =========================================================================

/// Command to move one vendor to a new status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStatusCommand {
    pub vendor_id: Uuid,
    /// Raw status value; validated by the handler
    pub status: String,
    pub rejection_reason: Option<String>,
}

impl ChangeStatusCommand {
    pub fn new(vendor_id: Uuid, status: impl Into<String>) -> Self {
        Self {
            vendor_id,
            status: status.into(),
            rejection_reason: None,
        }
    }

    pub fn with_rejection_reason(mut self, reason: String) -> Self {
        self.rejection_reason = Some(reason);
        self
    }
}

/// Command to move many vendors to one status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStatusCommand {
    pub vendor_ids: Vec<Uuid>,
    pub status: String,
    pub rejection_reason: Option<String>,
}

impl BulkStatusCommand {
    pub fn new(vendor_ids: Vec<Uuid>, status: impl Into<String>) -> Self {
        Self {
            vendor_ids,
            status: status.into(),
            rejection_reason: None,
        }
    }

    pub fn with_rejection_reason(mut self, reason: String) -> Self {
        self.rejection_reason = Some(reason);
        self
    }
}

// =========================================================================
// Subscription
// =========================================================================

/// Admin edit of a vendor's subscription terms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscriptionCommand {
    pub vendor_id: Uuid,
    pub selected_bundle: Option<Uuid>,
    /// `Some(None)` removes the override
    pub custom_duration: Option<Option<CustomDuration>>,
    pub custom_features: Option<Vec<String>>,
}

impl UpdateSubscriptionCommand {
    pub fn new(vendor_id: Uuid) -> Self {
        Self {
            vendor_id,
            ..Default::default()
        }
    }

    pub fn with_bundle(mut self, bundle_id: Uuid) -> Self {
        self.selected_bundle = Some(bundle_id);
        self
    }

    pub fn with_custom_duration(mut self, custom: Option<CustomDuration>) -> Self {
        self.custom_duration = Some(custom);
        self
    }

    pub fn with_custom_features(mut self, features: Vec<String>) -> Self {
        self.custom_features = Some(features);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selected_bundle.is_none()
            && self.custom_duration.is_none()
            && self.custom_features.is_none()
    }
}

/// Subscription as seen by the vendor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub vendor_id: Uuid,
    pub status: VendorStatus,
    pub selected_bundle: Uuid,
    pub bundle_name: Option<String>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub duration: Option<ResolvedDuration>,
    pub custom_duration: Option<CustomDuration>,
    pub features: Vec<String>,
}

// =========================================================================
// Deletion
// =========================================================================

/// Command to delete every vendor matching the criteria.
///
/// At least one criterion is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeVendorsCommand {
    pub status: Option<VendorStatus>,
    pub created_before: Option<DateTime<Utc>>,
}

impl PurgeVendorsCommand {
    pub fn with_status(mut self, status: VendorStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn has_criteria(&self) -> bool {
        self.status.is_some() || self.created_before.is_some()
    }
}

// =========================================================================
// Catalog
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryCommand {
    pub category: NewCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubCategoryCommand {
    pub sub_category: NewSubCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBundleCommand {
    pub bundle: NewBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBundleCommand {
    pub bundle_id: Uuid,
    pub changes: BundleChanges,
}
