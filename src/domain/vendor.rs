//! Vendor entity
//!
//! The aggregate root of the marketplace: registration data, approval
//! status, category membership and subscription state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::catalog::Bundle;
use super::password::{Password, MIN_PASSWORD_LENGTH};
use super::subscription::CustomDuration;
use super::validation::ValidationErrors;
use super::DomainError;

const DESCRIPTION_MIN_CHARS: usize = 50;
const DESCRIPTION_MAX_CHARS: usize = 1500;

/// Approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl VendorStatus {
    pub const ALL: [VendorStatus; 4] = [
        VendorStatus::Pending,
        VendorStatus::Approved,
        VendorStatus::Rejected,
        VendorStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Pending => "pending",
            VendorStatus::Approved => "approved",
            VendorStatus::Rejected => "rejected",
            VendorStatus::Expired => "expired",
        }
    }

    pub fn is_approved(&self) -> bool {
        *self == VendorStatus::Approved
    }
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VendorStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VendorStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidStatus(s.to_string()))
    }
}

/// Postal address; city and country are mandatory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub country: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Fields with a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    BusinessName,
    TradeLicenseNumber,
    Slug,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::BusinessName => "businessName",
            UniqueField::TradeLicenseNumber => "tradeLicenseNumber",
            UniqueField::Slug => "slug",
        }
    }
}

/// The parts of a vendor the denormalized counters depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub status: VendorStatus,
    pub main_categories: Vec<Uuid>,
    pub sub_categories: Vec<Uuid>,
    pub selected_bundle: Option<Uuid>,
}

impl MembershipSnapshot {
    pub fn is_approved(&self) -> bool {
        self.status.is_approved()
    }
}

/// Vendor aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Vendor {
    pub id: Uuid,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub password: Password,
    pub business_name: String,
    pub slug: String,
    pub business_logo: String,
    pub business_description: String,
    pub website: Option<String>,
    pub is_international: bool,
    pub trade_license_number: Option<String>,
    pub emirates_id: Option<String>,
    pub address: Address,
    pub main_categories: Vec<Uuid>,
    pub sub_categories: Vec<Uuid>,
    pub selected_bundle: Uuid,
    pub status: VendorStatus,
    pub rejection_reason: Option<String>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub custom_duration: Option<CustomDuration>,
    pub custom_features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    /// Counter-relevant view of this vendor
    pub fn membership(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            status: self.status,
            main_categories: self.main_categories.clone(),
            sub_categories: self.sub_categories.clone(),
            selected_bundle: Some(self.selected_bundle),
        }
    }

    /// Field-level validation run before every write
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = ValidationErrors::new();

        errors.require("ownerName", &self.owner_name);
        if !is_valid_email(&self.email) {
            errors.add("email", "email must be a valid address");
        }
        if !is_valid_phone(&self.phone) {
            errors.add("phone", "phone must contain 7 to 15 digits");
        }
        match &self.password {
            Password::Plain(plain) if plain.chars().count() < MIN_PASSWORD_LENGTH => {
                errors.add(
                    "password",
                    format!("password must be at least {} characters", MIN_PASSWORD_LENGTH),
                );
            }
            Password::Hashed(hash) if hash.is_empty() => {
                errors.add("password", "password is required");
            }
            _ => {}
        }

        errors.require("businessName", &self.business_name);
        errors.require("businessLogo", &self.business_logo);

        let description_len = self.business_description.trim().chars().count();
        if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
            errors.add(
                "businessDescription",
                format!(
                    "businessDescription must be between {} and {} characters",
                    DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS
                ),
            );
        }

        if self.main_categories.is_empty() {
            errors.add("mainCategory", "at least one main category is required");
        }

        errors.require("address.city", &self.address.city);
        errors.require("address.country", &self.address.country);

        if !self.is_international {
            errors.require_present("tradeLicenseNumber", self.trade_license_number.as_deref());
            errors.require_present("emiratesId", self.emirates_id.as_deref());
        }

        if let Some(custom) = &self.custom_duration {
            if custom.value == Some(0) {
                errors.add("customDuration.value", "customDuration.value must be at least 1");
            }
        }
        if self.custom_features.iter().any(|f| f.trim().is_empty()) {
            errors.add("customFeatures", "customFeatures cannot contain blank entries");
        }

        errors.into_result()
    }

    /// Bundle features followed by custom features, without duplicates
    pub fn effective_features(&self, bundle: Option<&Bundle>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        bundle
            .map(|b| b.features.iter())
            .into_iter()
            .flatten()
            .chain(self.custom_features.iter())
            .filter(|feature| seen.insert(feature.as_str()))
            .cloned()
            .collect()
    }
}

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVendor {
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub business_name: String,
    pub business_logo: String,
    pub business_description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub is_international: bool,
    #[serde(default)]
    pub trade_license_number: Option<String>,
    #[serde(default)]
    pub emirates_id: Option<String>,
    pub address: Address,
    #[serde(default)]
    pub main_category: Vec<Uuid>,
    #[serde(default)]
    pub sub_categories: Vec<Uuid>,
    #[serde(default)]
    pub selected_bundle: Option<Uuid>,
}

impl NewVendor {
    /// Build a pending vendor; fails when the bundle is missing or a field is invalid.
    ///
    /// The slug is provisional until the store resolves collisions.
    pub fn into_vendor(self) -> Result<Vendor, DomainError> {
        let selected_bundle = match self.selected_bundle {
            Some(bundle) => bundle,
            None => {
                let mut errors = ValidationErrors::new();
                errors.add("selectedBundle", "selectedBundle is required");
                return Err(errors.into());
            }
        };

        let now = Utc::now();
        let business_name = self.business_name.trim().to_string();
        let vendor = Vendor {
            id: Uuid::new_v4(),
            owner_name: self.owner_name.trim().to_string(),
            email: normalize_email(&self.email),
            phone: self.phone.trim().to_string(),
            password: Password::plain(self.password),
            slug: slugify(&business_name),
            business_name,
            business_logo: self.business_logo,
            business_description: self.business_description,
            website: self.website,
            is_international: self.is_international,
            trade_license_number: normalize_optional(self.trade_license_number),
            emirates_id: normalize_optional(self.emirates_id),
            address: self.address,
            main_categories: dedup(self.main_category),
            sub_categories: dedup(self.sub_categories),
            selected_bundle,
            status: VendorStatus::Pending,
            rejection_reason: None,
            subscription_start_date: None,
            subscription_end_date: None,
            custom_duration: None,
            custom_features: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        vendor.validate()?;
        Ok(vendor)
    }
}

/// Field changes applied to every vendor matched by an update-by-filter.
///
/// `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorPatch {
    pub status: Option<VendorStatus>,
    pub main_categories: Option<Vec<Uuid>>,
    pub sub_categories: Option<Vec<Uuid>>,
    pub selected_bundle: Option<Uuid>,
    pub rejection_reason: Option<Option<String>>,
    pub subscription_start_date: Option<Option<DateTime<Utc>>>,
    pub subscription_end_date: Option<Option<DateTime<Utc>>>,
    pub custom_duration: Option<Option<CustomDuration>>,
}

impl VendorPatch {
    pub fn status(status: VendorStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, vendor: &mut Vendor) {
        if let Some(status) = self.status {
            vendor.status = status;
        }
        if let Some(categories) = &self.main_categories {
            vendor.main_categories = dedup(categories.clone());
        }
        if let Some(subs) = &self.sub_categories {
            vendor.sub_categories = dedup(subs.clone());
        }
        if let Some(bundle) = self.selected_bundle {
            vendor.selected_bundle = bundle;
        }
        if let Some(reason) = &self.rejection_reason {
            vendor.rejection_reason = reason.clone();
        }
        if let Some(start) = self.subscription_start_date {
            vendor.subscription_start_date = start;
        }
        if let Some(end) = self.subscription_end_date {
            vendor.subscription_end_date = end;
        }
        if let Some(custom) = &self.custom_duration {
            vendor.custom_duration = custom.clone();
        }
    }
}

/// Selection criteria for update-by-filter and delete-by-filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorFilter {
    pub ids: Option<Vec<Uuid>>,
    pub status: Option<VendorStatus>,
    pub selected_bundle: Option<Uuid>,
    pub subscription_ended_before: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl VendorFilter {
    pub fn ids(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: VendorStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_subscription_ended_before(mut self, at: DateTime<Utc>) -> Self {
        self.subscription_ended_before = Some(at);
        self
    }

    pub fn with_created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// In-process evaluation, mirroring the SQL the repository builds
    pub fn matches(&self, vendor: &Vendor) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&vendor.id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if vendor.status != status {
                return false;
            }
        }
        if let Some(bundle) = self.selected_bundle {
            if vendor.selected_bundle != bundle {
                return false;
            }
        }
        if let Some(cutoff) = self.subscription_ended_before {
            match vendor.subscription_end_date {
                Some(end) if end < cutoff => {}
                _ => return false,
            }
        }
        if let Some(cutoff) = self.created_before {
            if vendor.created_at >= cutoff {
                return false;
            }
        }
        true
    }
}

/// Derive a URL slug: lowercase, `&` becomes `and`, runs of other
/// non-alphanumerics collapse to one hyphen, no leading/trailing hyphens.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', "and");
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "vendor".to_string()
    } else {
        slug
    }
}

/// Candidate for the n-th collision attempt: `base`, `base-1`, `base-2`, ...
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drop repeated ids, keeping first occurrence order
pub fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    allowed && (7..=15).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewVendor {
        NewVendor {
            owner_name: "Layla Haddad".to_string(),
            email: " Layla@Example.COM ".to_string(),
            phone: "+971 50 123 4567".to_string(),
            password: "s3cure-pass".to_string(),
            business_name: "Sun & Sand Events".to_string(),
            business_logo: "https://cdn.example.com/logo.png".to_string(),
            business_description: "Full service event planning for weddings, corporate retreats and private parties.".to_string(),
            website: None,
            is_international: false,
            trade_license_number: Some("TL-1001".to_string()),
            emirates_id: Some("784-1990-1234567-1".to_string()),
            address: Address {
                city: "Dubai".to_string(),
                country: "UAE".to_string(),
                ..Default::default()
            },
            main_category: vec![Uuid::new_v4()],
            sub_categories: vec![],
            selected_bundle: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sun & Sand Events"), "sun-and-sand-events");
        assert_eq!(slugify("  Café -- Royale!! "), "caf-royale");
        assert_eq!(slugify("***"), "vendor");
    }

    #[test]
    fn test_slug_candidates() {
        assert_eq!(slug_candidate("acme", 0), "acme");
        assert_eq!(slug_candidate("acme", 2), "acme-2");
    }

    #[test]
    fn test_registration_builds_pending_vendor() {
        let vendor = registration().into_vendor().unwrap();

        assert_eq!(vendor.status, VendorStatus::Pending);
        assert_eq!(vendor.email, "layla@example.com");
        assert_eq!(vendor.slug, "sun-and-sand-events");
        assert!(vendor.subscription_start_date.is_none());
        assert!(vendor.subscription_end_date.is_none());
        assert!(!vendor.password.is_hashed());
    }

    #[test]
    fn test_missing_bundle_is_a_validation_error() {
        let mut input = registration();
        input.selected_bundle = None;

        match input.into_vendor() {
            Err(DomainError::Validation(errors)) => assert!(errors.has("selectedBundle")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_domestic_vendor_requires_license_fields() {
        let mut input = registration();
        input.trade_license_number = None;
        input.emirates_id = Some("  ".to_string());

        match input.into_vendor() {
            Err(DomainError::Validation(errors)) => {
                assert!(errors.has("tradeLicenseNumber"));
                assert!(errors.has("emiratesId"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_international_vendor_is_exempt() {
        let mut input = registration();
        input.is_international = true;
        input.trade_license_number = None;
        input.emirates_id = None;

        assert!(input.into_vendor().is_ok());
    }

    #[test]
    fn test_collects_every_field_error() {
        let mut input = registration();
        input.email = "not-an-email".to_string();
        input.business_description = "too short".to_string();
        input.main_category.clear();
        input.password = "short".to_string();
        input.address.city.clear();

        match input.into_vendor() {
            Err(DomainError::Validation(errors)) => {
                assert!(errors.has("email"));
                assert!(errors.has("businessDescription"));
                assert!(errors.has("mainCategory"));
                assert!(errors.has("password"));
                assert!(errors.has("address.city"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<VendorStatus>().unwrap(), VendorStatus::Approved);
        assert!(matches!(
            "archived".parse::<VendorStatus>(),
            Err(DomainError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_patch_and_filter() {
        let mut vendor = registration().into_vendor().unwrap();
        let filter = VendorFilter::ids(vec![vendor.id]).with_status(VendorStatus::Pending);
        assert!(filter.matches(&vendor));

        VendorPatch::status(VendorStatus::Rejected).apply(&mut vendor);
        assert_eq!(vendor.status, VendorStatus::Rejected);
        assert!(!filter.matches(&vendor));
    }

    #[test]
    fn test_effective_features_are_additive() {
        let mut vendor = registration().into_vendor().unwrap();
        vendor.custom_features = vec!["Priority support".to_string(), "Listing".to_string()];

        let bundle = Bundle {
            id: vendor.selected_bundle,
            name: "Basic".to_string(),
            description: None,
            price: rust_decimal::Decimal::ZERO,
            duration: crate::domain::Period::months(1),
            bonus_period: None,
            features: vec!["Listing".to_string(), "Analytics".to_string()],
            subscribers_count: 0,
            max_vendors: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            vendor.effective_features(Some(&bundle)),
            vec!["Listing", "Analytics", "Priority support"]
        );
    }
}
