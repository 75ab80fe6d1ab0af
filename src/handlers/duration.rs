//! Subscription Duration Resolver
//!
//! Loads the vendor's bundle when needed and turns the effective duration
//! into concrete subscription dates.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{resolve_duration, DomainError, ResolvedDuration, Vendor};
use crate::error::AppError;
use crate::repository::CatalogRepository;

#[derive(Clone)]
pub struct DurationResolver {
    catalog: Arc<dyn CatalogRepository>,
}

impl DurationResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Effective (base, bonus) for `vendor`; the custom override wins.
    /// `None` when there is no override and the bundle cannot be loaded.
    pub async fn resolve(&self, vendor: &Vendor) -> Result<Option<ResolvedDuration>, AppError> {
        if let Some(custom) = vendor.custom_duration.as_ref().filter(|c| c.is_set()) {
            return Ok(resolve_duration(Some(custom), None));
        }

        let bundle = self.catalog.find_bundle(vendor.selected_bundle).await?;
        Ok(resolve_duration(None, bundle.as_ref()))
    }

    /// Resolve or fail: approval needs a duration
    pub async fn require(&self, vendor: &Vendor) -> Result<ResolvedDuration, AppError> {
        self.resolve(vendor).await?.ok_or_else(|| {
            DomainError::BusinessRuleViolation(format!(
                "vendor {} has no custom duration and bundle {} cannot be resolved",
                vendor.id, vendor.selected_bundle
            ))
            .into()
        })
    }

    /// Set subscription dates for a transition into approved.
    ///
    /// A fresh start (no start date yet, or the previous period already
    /// ended) begins at `now`; otherwise the running period is kept.
    pub async fn start_subscription(
        &self,
        vendor: &mut Vendor,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let running = matches!(
            (vendor.subscription_start_date, vendor.subscription_end_date),
            (Some(_), Some(end)) if end > now
        );
        if running {
            return Ok(());
        }

        let duration = self.require(vendor).await?;
        vendor.subscription_start_date = Some(now);
        vendor.subscription_end_date = Some(duration.end_date_from(now)?);
        Ok(())
    }

    /// Recompute the end date from the existing start date, if any
    pub async fn recompute_end_date(&self, vendor: &mut Vendor) -> Result<(), AppError> {
        let Some(start) = vendor.subscription_start_date else {
            return Ok(());
        };

        let duration = self.require(vendor).await?;
        vendor.subscription_end_date = Some(duration.end_date_from(start)?);
        Ok(())
    }
}
