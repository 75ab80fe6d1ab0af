//! Reference checks
//!
//! Vendors may only point at categories, subcategories and bundles that
//! exist, and a subcategory must sit under one of the vendor's main
//! categories.

use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{Bundle, DomainError, ValidationErrors};
use crate::error::AppError;
use crate::repository::CatalogRepository;

/// Fail with NotFound for the first unknown id, then check nesting
pub async fn ensure_memberships(
    catalog: &dyn CatalogRepository,
    main_categories: &[Uuid],
    sub_categories: &[Uuid],
) -> Result<(), AppError> {
    let categories = catalog.find_categories(main_categories).await?;
    let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    if let Some(missing) = main_categories.iter().find(|id| !known.contains(*id)) {
        return Err(DomainError::not_found("Category", missing).into());
    }

    if sub_categories.is_empty() {
        return Ok(());
    }

    let subs = catalog.find_sub_categories(sub_categories).await?;
    let known_subs: HashSet<Uuid> = subs.iter().map(|s| s.id).collect();
    if let Some(missing) = sub_categories.iter().find(|id| !known_subs.contains(*id)) {
        return Err(DomainError::not_found("SubCategory", missing).into());
    }

    let mut errors = ValidationErrors::new();
    for sub in subs.iter().filter(|s| !known.contains(&s.main_category)) {
        errors.add(
            "subCategories",
            format!("subcategory {} does not belong to a selected main category", sub.id),
        );
    }
    errors.into_result()?;

    Ok(())
}

/// Load a bundle or fail with NotFound
pub async fn ensure_bundle(
    catalog: &dyn CatalogRepository,
    bundle_id: Uuid,
) -> Result<Bundle, AppError> {
    catalog
        .find_bundle(bundle_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Bundle", bundle_id).into())
}

/// Refuse to add one more subscriber to a bundle that is already full.
///
/// A check against the current count only; concurrent approvals can still
/// overshoot, which the sync engine logs.
pub async fn ensure_seat_available(
    catalog: &dyn CatalogRepository,
    bundle_id: Uuid,
) -> Result<(), AppError> {
    let bundle = ensure_bundle(catalog, bundle_id).await?;
    match bundle.max_vendors {
        Some(max) if bundle.subscribers_count >= max => {
            tracing::warn!(
                bundle_id = %bundle.id,
                subscribers = bundle.subscribers_count,
                max_vendors = max,
                "Bundle is full"
            );
            Err(DomainError::BundleCapacityExceeded {
                bundle_id: bundle.id,
                subscribers: bundle.subscribers_count + 1,
                max_vendors: max,
            }
            .into())
        }
        _ => Ok(()),
    }
}
