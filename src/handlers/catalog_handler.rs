//! Catalog Handler
//!
//! Categories, subcategories and bundles. Counter fields are owned by the
//! sync engine and are never taken from input.

use std::sync::Arc;

use crate::domain::{Bundle, Category, DomainError, OperationContext, SubCategory};
use crate::error::AppError;
use crate::repository::CatalogRepository;
use crate::state::AppState;

use super::references::ensure_bundle;
use super::{
    CreateBundleCommand, CreateCategoryCommand, CreateSubCategoryCommand, UpdateBundleCommand,
};

pub struct CatalogHandler {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogHandler {
    pub fn new(state: &AppState) -> Self {
        Self {
            catalog: state.catalog.clone(),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.catalog.list_categories().await?)
    }

    pub async fn list_bundles(&self) -> Result<Vec<Bundle>, AppError> {
        Ok(self.catalog.list_bundles().await?)
    }

    pub async fn create_category(
        &self,
        command: CreateCategoryCommand,
        context: &OperationContext,
    ) -> Result<Category, AppError> {
        let category = command.category.into_category()?;
        self.catalog.insert_category(&category).await?;

        tracing::info!(
            category_id = %category.id,
            correlation_id = ?context.correlation_id,
            "Category created"
        );
        Ok(category)
    }

    pub async fn create_sub_category(
        &self,
        command: CreateSubCategoryCommand,
        context: &OperationContext,
    ) -> Result<SubCategory, AppError> {
        let sub_category = command.sub_category.into_sub_category()?;

        let parents = self
            .catalog
            .find_categories(&[sub_category.main_category])
            .await?;
        if parents.is_empty() {
            return Err(DomainError::not_found("Category", sub_category.main_category).into());
        }

        self.catalog.insert_sub_category(&sub_category).await?;

        tracing::info!(
            sub_category_id = %sub_category.id,
            main_category = %sub_category.main_category,
            correlation_id = ?context.correlation_id,
            "Subcategory created"
        );
        Ok(sub_category)
    }

    pub async fn create_bundle(
        &self,
        command: CreateBundleCommand,
        context: &OperationContext,
    ) -> Result<Bundle, AppError> {
        let bundle = command.bundle.into_bundle()?;
        self.catalog.insert_bundle(&bundle).await?;

        tracing::info!(
            bundle_id = %bundle.id,
            duration = %bundle.duration,
            correlation_id = ?context.correlation_id,
            "Bundle created"
        );
        Ok(bundle)
    }

    /// Apply changes, then reject the result if it is over capacity
    pub async fn update_bundle(
        &self,
        command: UpdateBundleCommand,
        context: &OperationContext,
    ) -> Result<Bundle, AppError> {
        let mut bundle = ensure_bundle(self.catalog.as_ref(), command.bundle_id).await?;

        command.changes.apply(&mut bundle)?;
        self.catalog.update_bundle(&bundle).await?;

        tracing::info!(
            bundle_id = %bundle.id,
            subscribers = bundle.subscribers_count,
            max_vendors = ?bundle.max_vendors,
            correlation_id = ?context.correlation_id,
            "Bundle updated"
        );
        Ok(bundle)
    }
}
