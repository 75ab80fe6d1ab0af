//! Vendor Store
//!
//! The only write path for vendors. Each of the four mutation paths loads
//! the persisted state first, writes, then hands (previous, next) to the
//! counter sync engine:
//!
//! 1. `create` / `save` - document creation or load-mutate-save
//! 2. `update_where` - update every vendor matching a filter
//! 3. `delete` - delete one vendor
//! 4. `delete_where` - delete every vendor matching a filter
//!
//! Nothing outside this module calls `VendorRepository` write methods.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    slug_candidate, slugify, DomainError, MembershipSnapshot, Password, Vendor, VendorFilter,
    VendorPatch,
};
use crate::repository::{RepositoryError, VendorRepository};
use crate::sync::{CounterSyncEngine, CounterSyncFailure, SyncOutcome};

/// Upper bound on `name-N` suffixes tried before giving up
const MAX_SLUG_ATTEMPTS: u32 = 1000;

/// Vendor store errors
#[derive(Debug, thiserror::Error)]
pub enum VendorStoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<RepositoryError> for VendorStoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(field) => Self::Domain(DomainError::conflict(field)),
            other => Self::Repository(other),
        }
    }
}

/// A persisted vendor and the counter sync it triggered
#[derive(Debug, Clone)]
pub struct VendorWrite {
    pub vendor: Vendor,
    pub sync: SyncOutcome,
}

/// Result of an update-by-filter or delete-by-filter
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Vendors written or deleted, in processing order
    pub affected: Vec<Uuid>,
    pub counter_failures: Vec<CounterSyncFailure>,
}

impl BatchOutcome {
    pub fn count(&self) -> usize {
        self.affected.len()
    }

    fn record(&mut self, id: Uuid, sync: SyncOutcome) {
        self.affected.push(id);
        self.counter_failures.extend(sync.failures);
    }
}

/// Load-before-write vendor persistence with counter synchronization
#[derive(Clone)]
pub struct VendorStore {
    vendors: Arc<dyn VendorRepository>,
    engine: CounterSyncEngine,
    password_cost: u32,
}

impl VendorStore {
    pub fn new(
        vendors: Arc<dyn VendorRepository>,
        engine: CounterSyncEngine,
        password_cost: u32,
    ) -> Self {
        Self {
            vendors,
            engine,
            password_cost,
        }
    }

    /// Load one vendor
    pub async fn find(&self, id: Uuid) -> Result<Vendor, VendorStoreError> {
        self.vendors
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vendor", id).into())
    }

    pub async fn find_matching(
        &self,
        filter: &VendorFilter,
    ) -> Result<Vec<Vendor>, VendorStoreError> {
        Ok(self.vendors.find_matching(filter).await?)
    }

    /// Persist a brand-new vendor. The previous state is treated as absent,
    /// so a vendor created directly as approved is counted.
    pub async fn create(&self, vendor: Vendor) -> Result<VendorWrite, VendorStoreError> {
        let vendor = self.prepare(vendor, None).await?;
        self.vendors.insert(&vendor).await?;

        tracing::info!(
            vendor_id = %vendor.id,
            slug = %vendor.slug,
            status = %vendor.status,
            "Vendor created"
        );

        let sync = self.engine.sync(vendor.id, None, Some(&vendor.membership())).await;
        Ok(VendorWrite { vendor, sync })
    }

    /// Persist changes to an existing vendor
    pub async fn save(&self, vendor: Vendor) -> Result<VendorWrite, VendorStoreError> {
        let previous = self.find(vendor.id).await?;
        let vendor = self.prepare(vendor, Some(&previous)).await?;

        // Deleted since it was loaded; nothing was written, so nothing to sync
        if !self.vendors.update(&vendor).await? {
            return Err(DomainError::not_found("Vendor", vendor.id).into());
        }

        tracing::info!(
            vendor_id = %vendor.id,
            previous_status = %previous.status,
            status = %vendor.status,
            "Vendor saved"
        );

        let sync = self
            .engine
            .sync(vendor.id, Some(&previous.membership()), Some(&vendor.membership()))
            .await;
        Ok(VendorWrite { vendor, sync })
    }

    /// Apply `patch` to every vendor matching `filter`.
    ///
    /// Every patched vendor is validated before any is written, so an
    /// invalid patch changes nothing. Vendors removed after the match are
    /// skipped.
    ///
    /// Writes are not transactional: if the repository fails partway, the
    /// vendors before the failing one stay written and synced. The error is
    /// returned and the applied count is logged.
    pub async fn update_where(
        &self,
        filter: &VendorFilter,
        patch: &VendorPatch,
    ) -> Result<BatchOutcome, VendorStoreError> {
        let matched = self.vendors.find_matching(filter).await?;
        let now = Utc::now();

        let mut pending = Vec::with_capacity(matched.len());
        for previous in matched {
            let mut next = previous.clone();
            patch.apply(&mut next);
            next.updated_at = now;
            next.validate()?;
            pending.push((previous.membership(), next));
        }

        let mut outcome = BatchOutcome::default();
        for (previous, next) in pending {
            match self.vendors.update(&next).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        applied = outcome.count(),
                        failed_vendor_id = %next.id,
                        error = %e,
                        "Update by filter stopped partway"
                    );
                    return Err(e.into());
                }
            }
            let sync = self
                .engine
                .sync(next.id, Some(&previous), Some(&next.membership()))
                .await;
            outcome.record(next.id, sync);
        }

        tracing::info!(
            updated = outcome.count(),
            counter_failures = outcome.counter_failures.len(),
            "Vendors updated by filter"
        );

        Ok(outcome)
    }

    /// Delete one vendor, decrementing counters by its state at deletion
    pub async fn delete(&self, id: Uuid) -> Result<VendorWrite, VendorStoreError> {
        let previous = self.find(id).await?;

        if !self.vendors.delete(id).await? {
            return Err(DomainError::not_found("Vendor", id).into());
        }

        tracing::info!(vendor_id = %id, status = %previous.status, "Vendor deleted");

        let sync = self.engine.sync(id, Some(&previous.membership()), None).await;
        Ok(VendorWrite {
            vendor: previous,
            sync,
        })
    }

    /// Delete every vendor matching `filter`
    pub async fn delete_where(
        &self,
        filter: &VendorFilter,
    ) -> Result<BatchOutcome, VendorStoreError> {
        let matched = self.vendors.find_matching(filter).await?;

        let mut outcome = BatchOutcome::default();
        for previous in matched {
            // Removed concurrently; nothing left to decrement for it here
            if !self.vendors.delete(previous.id).await? {
                continue;
            }
            let membership: MembershipSnapshot = previous.membership();
            let sync = self.engine.sync(previous.id, Some(&membership), None).await;
            outcome.record(previous.id, sync);
        }

        tracing::info!(
            deleted = outcome.count(),
            counter_failures = outcome.counter_failures.len(),
            "Vendors deleted by filter"
        );

        Ok(outcome)
    }

    /// Validate, resolve the slug, hash a new password and check unique fields
    async fn prepare(
        &self,
        mut vendor: Vendor,
        previous: Option<&Vendor>,
    ) -> Result<Vendor, VendorStoreError> {
        vendor.validate()?;

        let name_changed = previous.map_or(true, |p| p.business_name != vendor.business_name);
        if name_changed {
            vendor.slug = self.resolve_slug(&vendor).await?;
        }

        if let Some(field) = self.vendors.find_conflict(&vendor).await? {
            return Err(DomainError::conflict(field.as_str()).into());
        }

        if !vendor.password.is_hashed() {
            vendor.password = self.hash_password(vendor.password).await?;
        }

        vendor.updated_at = Utc::now();
        Ok(vendor)
    }

    async fn resolve_slug(&self, vendor: &Vendor) -> Result<String, VendorStoreError> {
        let base = slugify(&vendor.business_name);

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = slug_candidate(&base, attempt);
            if !self.vendors.slug_taken(&candidate, vendor.id).await? {
                return Ok(candidate);
            }
        }

        Err(DomainError::conflict("slug").into())
    }

    async fn hash_password(&self, password: Password) -> Result<Password, VendorStoreError> {
        let cost = self.password_cost;
        tokio::task::spawn_blocking(move || password.into_hashed(cost))
            .await
            .map_err(|e| VendorStoreError::Hashing(e.to_string()))?
            .map_err(|e| VendorStoreError::Hashing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, NewCategory, VendorStatus, MIN_HASH_COST};
    use crate::domain::UniqueField;
    use crate::repository::{CatalogRepository, MemoryBackend};
    use crate::sync::{CounterTarget, Transition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// How `FlakyVendors::update` misbehaves
    enum UpdateFault {
        /// Another writer deletes the vendor just before our update lands
        DeletedConcurrently,
        /// The write fails once `n` updates have gone through
        FailAfter(usize),
    }

    /// Memory backend whose vendor updates misbehave on demand
    struct FlakyVendors {
        inner: MemoryBackend,
        fault: UpdateFault,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl VendorRepository for FlakyVendors {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Vendor>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_matching(
            &self,
            filter: &VendorFilter,
        ) -> Result<Vec<Vendor>, RepositoryError> {
            self.inner.find_matching(filter).await
        }

        async fn insert(&self, vendor: &Vendor) -> Result<(), RepositoryError> {
            self.inner.insert(vendor).await
        }

        async fn update(&self, vendor: &Vendor) -> Result<bool, RepositoryError> {
            let done = self.updates.fetch_add(1, Ordering::SeqCst);
            match self.fault {
                UpdateFault::DeletedConcurrently => {
                    self.inner.delete(vendor.id).await?;
                }
                UpdateFault::FailAfter(n) if done >= n => {
                    return Err(RepositoryError::Unavailable("connection reset".to_string()));
                }
                UpdateFault::FailAfter(_) => {}
            }
            self.inner.update(vendor).await
        }

        async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
            self.inner.delete(id).await
        }

        async fn find_conflict(
            &self,
            vendor: &Vendor,
        ) -> Result<Option<UniqueField>, RepositoryError> {
            self.inner.find_conflict(vendor).await
        }

        async fn slug_taken(&self, slug: &str, exclude: Uuid) -> Result<bool, RepositoryError> {
            self.inner.slug_taken(slug, exclude).await
        }

        async fn memberships(&self) -> Result<Vec<MembershipSnapshot>, RepositoryError> {
            self.inner.memberships().await
        }
    }

    fn flaky_store(fx: &Fixture, fault: UpdateFault) -> VendorStore {
        let vendors = FlakyVendors {
            inner: fx.backend.clone(),
            fault,
            updates: AtomicUsize::new(0),
        };
        let engine = CounterSyncEngine::new(Arc::new(fx.backend.clone()));
        VendorStore::new(Arc::new(vendors), engine, MIN_HASH_COST)
    }

    struct Fixture {
        backend: MemoryBackend,
        store: VendorStore,
        category: Uuid,
        bundle: Uuid,
    }

    async fn fixture() -> Fixture {
        let backend = MemoryBackend::new();
        let category = NewCategory {
            name: "Photography".to_string(),
        }
        .into_category()
        .unwrap();
        backend.insert_category(&category).await.unwrap();

        let bundle = crate::domain::NewBundle {
            name: "Silver".to_string(),
            description: None,
            price: rust_decimal::Decimal::new(19900, 2),
            duration: crate::domain::Period::months(6),
            bonus_period: None,
            features: vec!["Listing".to_string()],
            max_vendors: None,
        }
        .into_bundle()
        .unwrap();
        backend.insert_bundle(&bundle).await.unwrap();

        let engine = CounterSyncEngine::new(Arc::new(backend.clone()));
        let store = VendorStore::new(Arc::new(backend.clone()), engine, MIN_HASH_COST);

        Fixture {
            backend,
            store,
            category: category.id,
            bundle: bundle.id,
        }
    }

    fn vendor(fx: &Fixture, business_name: &str, email: &str) -> Vendor {
        crate::domain::NewVendor {
            owner_name: "Omar Saleh".to_string(),
            email: email.to_string(),
            phone: "+971501234567".to_string(),
            password: "open-sesame".to_string(),
            business_name: business_name.to_string(),
            business_logo: "https://cdn.example.com/logo.png".to_string(),
            business_description: "Wedding and portrait photography across the Emirates, studio and on location.".to_string(),
            website: None,
            is_international: true,
            trade_license_number: None,
            emirates_id: None,
            address: Address {
                city: "Abu Dhabi".to_string(),
                country: "UAE".to_string(),
                ..Default::default()
            },
            main_category: vec![fx.category],
            sub_categories: vec![],
            selected_bundle: Some(fx.bundle),
        }
        .into_vendor()
        .unwrap()
    }

    fn domestic(fx: &Fixture, business_name: &str, email: &str, license: &str) -> Vendor {
        let mut vendor = vendor(fx, business_name, email);
        vendor.is_international = false;
        vendor.trade_license_number = Some(license.to_string());
        vendor.emirates_id = Some("784-1990-1234567-1".to_string());
        vendor
    }

    fn conflict_field(err: VendorStoreError) -> String {
        match err {
            VendorStoreError::Domain(DomainError::Conflict { field }) => field,
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_hashes_password_and_counts_nothing_while_pending() {
        let fx = fixture().await;

        let written = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();

        assert!(written.vendor.password.is_hashed());
        assert!(written.vendor.password.verify("open-sesame"));
        assert_eq!(written.sync.transition, Transition::RemainedUnapproved);
        assert_eq!(fx.backend.counter(CounterTarget::Category, fx.category).await, Some(0));
    }

    #[tokio::test]
    async fn test_create_directly_approved_is_counted() {
        let fx = fixture().await;
        let mut approved = vendor(&fx, "Lens Works", "a@example.com");
        approved.status = VendorStatus::Approved;

        let written = fx.store.create(approved).await.unwrap();

        assert_eq!(written.sync.transition, Transition::NewlyApproved);
        assert_eq!(fx.backend.counter(CounterTarget::Category, fx.category).await, Some(1));
        assert_eq!(fx.backend.counter(CounterTarget::Bundle, fx.bundle).await, Some(1));
    }

    #[tokio::test]
    async fn test_slug_collisions_get_numeric_suffix() {
        let fx = fixture().await;

        let first = fx.store.create(vendor(&fx, "Lens & Light", "a@example.com")).await.unwrap();
        let second = fx.store.create(vendor(&fx, "Lens and Light", "b@example.com")).await.unwrap();
        let third = fx.store.create(vendor(&fx, "Lens and Light!", "c@example.com")).await.unwrap();

        assert_eq!(first.vendor.slug, "lens-and-light");
        assert_eq!(second.vendor.slug, "lens-and-light-1");
        assert_eq!(third.vendor.slug, "lens-and-light-2");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let fx = fixture().await;
        fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();

        let err = fx
            .store
            .create(vendor(&fx, "Other Studio", "A@example.com"))
            .await
            .unwrap_err();

        match err {
            VendorStoreError::Domain(DomainError::Conflict { field }) => assert_eq!(field, "email"),
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rename_regenerates_slug() {
        let fx = fixture().await;
        let mut saved = fx
            .store
            .create(vendor(&fx, "Lens Works", "a@example.com"))
            .await
            .unwrap()
            .vendor;

        saved.business_name = "Frame Factory".to_string();
        let saved = fx.store.save(saved).await.unwrap().vendor;

        assert_eq!(saved.slug, "frame-factory");
    }

    #[tokio::test]
    async fn test_save_unknown_vendor_is_not_found() {
        let fx = fixture().await;
        let orphan = vendor(&fx, "Lens Works", "a@example.com");

        assert!(matches!(
            fx.store.save(orphan).await,
            Err(VendorStoreError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_patch_writes_nothing() {
        let fx = fixture().await;
        let saved = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();

        let patch = VendorPatch {
            main_categories: Some(vec![]),
            ..Default::default()
        };
        let result = fx
            .store
            .update_where(&VendorFilter::ids(vec![saved.vendor.id]), &patch)
            .await;

        assert!(matches!(result, Err(VendorStoreError::Domain(DomainError::Validation(_)))));
        let stored = fx.store.find(saved.vendor.id).await.unwrap();
        assert_eq!(stored.main_categories, vec![fx.category]);
    }

    #[tokio::test]
    async fn test_duplicate_trade_license_is_a_conflict() {
        let fx = fixture().await;
        fx.store
            .create(domestic(&fx, "Lens Works", "a@example.com", "TL-1001"))
            .await
            .unwrap();

        let err = fx
            .store
            .create(domestic(&fx, "Frame Factory", "b@example.com", "TL-1001"))
            .await
            .unwrap_err();

        assert_eq!(conflict_field(err), "tradeLicenseNumber");
    }

    #[tokio::test]
    async fn test_vendors_without_trade_license_coexist() {
        let fx = fixture().await;

        let first = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();
        let second = fx.store.create(vendor(&fx, "Frame Factory", "b@example.com")).await.unwrap();

        assert!(first.vendor.trade_license_number.is_none());
        assert!(second.vendor.trade_license_number.is_none());
        assert_eq!(fx.store.find_matching(&VendorFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_business_name_is_a_conflict() {
        let fx = fixture().await;
        fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();

        let err = fx
            .store
            .create(vendor(&fx, "Lens Works", "b@example.com"))
            .await
            .unwrap_err();

        assert_eq!(conflict_field(err), "businessName");
    }

    #[tokio::test]
    async fn test_save_of_concurrently_deleted_vendor_counts_nothing() {
        let fx = fixture().await;
        let created = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();
        let store = flaky_store(&fx, UpdateFault::DeletedConcurrently);

        let mut approved = created.vendor;
        approved.status = VendorStatus::Approved;
        let result = store.save(approved).await;

        assert!(matches!(
            result,
            Err(VendorStoreError::Domain(DomainError::NotFound { .. }))
        ));
        assert!(fx.store.find_matching(&VendorFilter::default()).await.unwrap().is_empty());
        assert_eq!(fx.backend.counter(CounterTarget::Category, fx.category).await, Some(0));
        assert_eq!(fx.backend.counter(CounterTarget::Bundle, fx.bundle).await, Some(0));
    }

    #[tokio::test]
    async fn test_update_where_skips_concurrently_deleted_vendor() {
        let fx = fixture().await;
        let created = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();
        let store = flaky_store(&fx, UpdateFault::DeletedConcurrently);

        let outcome = store
            .update_where(
                &VendorFilter::ids(vec![created.vendor.id]),
                &VendorPatch::status(VendorStatus::Approved),
            )
            .await
            .unwrap();

        assert_eq!(outcome.count(), 0);
        assert_eq!(fx.backend.counter(CounterTarget::Category, fx.category).await, Some(0));
        assert_eq!(fx.backend.counter(CounterTarget::Bundle, fx.bundle).await, Some(0));
    }

    #[tokio::test]
    async fn test_update_where_failure_keeps_earlier_writes() {
        let fx = fixture().await;
        let first = fx.store.create(vendor(&fx, "Lens Works", "a@example.com")).await.unwrap();
        let second = fx.store.create(vendor(&fx, "Frame Factory", "b@example.com")).await.unwrap();
        let store = flaky_store(&fx, UpdateFault::FailAfter(1));

        let result = store
            .update_where(
                &VendorFilter::ids(vec![first.vendor.id, second.vendor.id]),
                &VendorPatch::status(VendorStatus::Approved),
            )
            .await;

        assert!(matches!(result, Err(VendorStoreError::Repository(_))));
        let statuses: Vec<VendorStatus> = fx
            .store
            .find_matching(&VendorFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.status)
            .collect();
        assert_eq!(
            statuses.iter().filter(|s| **s == VendorStatus::Approved).count(),
            1
        );
        // The one written vendor is counted, the failed one is not
        assert_eq!(fx.backend.counter(CounterTarget::Category, fx.category).await, Some(1));
    }
}
