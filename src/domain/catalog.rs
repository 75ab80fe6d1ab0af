//! Catalog entities
//!
//! Categories, subcategories and subscription bundles. Their counters
//! (`vendor_count`, `subscribers_count`) are owned by the counter sync
//! engine and never accepted from input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::{Period, PeriodSpec};
use super::validation::ValidationErrors;
use super::DomainError;

/// Top-level marketplace category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub vendor_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category nested under exactly one main category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    pub id: Uuid,
    pub name: String,
    pub main_category: Uuid,
    pub vendor_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription tier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration: Period,
    pub bonus_period: Option<PeriodSpec>,
    pub features: Vec<String>,
    pub subscribers_count: i64,
    pub max_vendors: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bundle {
    /// Whether the subscriber count has passed the ceiling
    pub fn is_over_capacity(&self) -> bool {
        matches!(self.max_vendors, Some(max) if self.subscribers_count > max)
    }

    /// Reject a bundle whose subscriber count exceeds its ceiling.
    ///
    /// Run before persisting a bundle. Concurrent vendor approvals are not
    /// reserved against this ceiling.
    pub fn check_capacity(&self) -> Result<(), DomainError> {
        match self.max_vendors {
            Some(max) if self.subscribers_count > max => Err(DomainError::BundleCapacityExceeded {
                bundle_id: self.id,
                subscribers: self.subscribers_count,
                max_vendors: max,
            }),
            _ => Ok(()),
        }
    }
}

/// Payload for a new category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn into_category(self) -> Result<Category, DomainError> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()?;

        let now = Utc::now();
        Ok(Category {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            vendor_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Payload for a new subcategory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubCategory {
    pub name: String,
    pub main_category: Uuid,
}

impl NewSubCategory {
    pub fn into_sub_category(self) -> Result<SubCategory, DomainError> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()?;

        let now = Utc::now();
        Ok(SubCategory {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            main_category: self.main_category,
            vendor_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Payload for a new bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBundle {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub duration: Period,
    #[serde(default)]
    pub bonus_period: Option<PeriodSpec>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub max_vendors: Option<i64>,
}

impl NewBundle {
    pub fn into_bundle(self) -> Result<Bundle, DomainError> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        validate_bundle_terms(
            &mut errors,
            self.price,
            &self.duration,
            self.max_vendors,
            &self.features,
        );
        errors.into_result()?;

        let now = Utc::now();
        Ok(Bundle {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            duration: self.duration,
            bonus_period: self.bonus_period,
            features: self.features,
            subscribers_count: 0,
            max_vendors: self.max_vendors,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a bundle's terms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub duration: Option<Period>,
    #[serde(default)]
    pub bonus_period: Option<PeriodSpec>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub max_vendors: Option<i64>,
}

impl BundleChanges {
    /// Apply to `bundle`, validate, then run the capacity check
    pub fn apply(self, bundle: &mut Bundle) -> Result<(), DomainError> {
        if let Some(name) = self.name {
            bundle.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            bundle.description = Some(description);
        }
        if let Some(price) = self.price {
            bundle.price = price;
        }
        if let Some(duration) = self.duration {
            bundle.duration = duration;
        }
        if let Some(bonus) = self.bonus_period {
            bundle.bonus_period = Some(bonus);
        }
        if let Some(features) = self.features {
            bundle.features = features;
        }
        if let Some(max) = self.max_vendors {
            bundle.max_vendors = Some(max);
        }

        let mut errors = ValidationErrors::new();
        errors.require("name", &bundle.name);
        validate_bundle_terms(
            &mut errors,
            bundle.price,
            &bundle.duration,
            bundle.max_vendors,
            &bundle.features,
        );
        errors.into_result()?;

        bundle.updated_at = Utc::now();
        bundle.check_capacity()
    }
}

fn validate_bundle_terms(
    errors: &mut ValidationErrors,
    price: Decimal,
    duration: &Period,
    max_vendors: Option<i64>,
    features: &[String],
) {
    if price < Decimal::ZERO {
        errors.add("price", "price cannot be negative");
    }
    if duration.value == 0 {
        errors.add("duration", "duration must be at least 1");
    }
    if matches!(max_vendors, Some(max) if max < 0) {
        errors.add("maxVendors", "maxVendors cannot be negative");
    }
    if features.iter().any(|f| f.trim().is_empty()) {
        errors.add("features", "features cannot contain blank entries");
    }
}
