//! Repositories
//!
//! Persistence seams for vendors and the catalog. PostgreSQL is the
//! production backend; `MemoryBackend` keeps everything in-process for
//! tests and local runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Bundle, Category, MembershipSnapshot, SubCategory, UniqueField, Vendor, VendorFilter,
};

pub mod catalog;
pub mod counters;
pub mod memory;
pub mod vendor;

pub use catalog::PgCatalogRepository;
pub use counters::PgCounterStore;
pub use memory::MemoryBackend;
pub use vendor::PgVendorRepository;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Unique constraint violated; carries the field name
    #[error("Duplicate value for {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be mapped back into a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Vendor persistence
#[async_trait]
pub trait VendorRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Vendor>, RepositoryError>;

    /// Every vendor matching `filter`, oldest first
    async fn find_matching(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, RepositoryError>;

    async fn insert(&self, vendor: &Vendor) -> Result<(), RepositoryError>;

    /// Replace the stored vendor with `vendor`; returns false when no
    /// stored vendor has its id
    async fn update(&self, vendor: &Vendor) -> Result<bool, RepositoryError>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// First unique field another vendor already holds
    async fn find_conflict(&self, vendor: &Vendor) -> Result<Option<UniqueField>, RepositoryError>;

    /// Whether a vendor other than `exclude` holds `slug`
    async fn slug_taken(&self, slug: &str, exclude: Uuid) -> Result<bool, RepositoryError>;

    /// Membership of every vendor, for a full recount
    async fn memberships(&self) -> Result<Vec<MembershipSnapshot>, RepositoryError>;
}

/// Category, subcategory and bundle persistence.
///
/// Writes here never touch counters; those belong to `CounterStore`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepositoryError>;

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn insert_category(&self, category: &Category) -> Result<(), RepositoryError>;

    async fn find_sub_categories(&self, ids: &[Uuid]) -> Result<Vec<SubCategory>, RepositoryError>;

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> Result<(), RepositoryError>;

    async fn find_bundle(&self, id: Uuid) -> Result<Option<Bundle>, RepositoryError>;

    async fn list_bundles(&self) -> Result<Vec<Bundle>, RepositoryError>;

    async fn insert_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError>;

    /// Persist bundle terms; `subscribers_count` is left untouched
    async fn update_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError>;
}

/// Map a Postgres unique violation (23505) to `Conflict`
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    field_for: fn(&str) -> &'static str,
) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let field = field_for(db_err.constraint().unwrap_or_default());
            return RepositoryError::Conflict(field.to_string());
        }
    }
    RepositoryError::Database(err)
}
