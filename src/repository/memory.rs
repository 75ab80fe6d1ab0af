//! In-process backend
//!
//! One shared state implementing `VendorRepository`, `CatalogRepository`
//! and `CounterStore`, so tests and local runs need no database. Each
//! trait call takes the lock once, which gives the same per-call atomicity
//! the SQL statements have.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Bundle, Category, MembershipSnapshot, SubCategory, UniqueField, Vendor, VendorFilter,
};
use crate::sync::{CounterState, CounterStore, CounterSyncError, CounterTarget};

use super::{CatalogRepository, RepositoryError, VendorRepository};

#[derive(Debug, Default)]
struct MemoryState {
    vendors: HashMap<Uuid, Vendor>,
    categories: HashMap<Uuid, Category>,
    sub_categories: HashMap<Uuid, SubCategory>,
    bundles: HashMap<Uuid, Bundle>,
    failing_targets: HashSet<CounterTarget>,
}

impl MemoryState {
    fn unique_conflict(&self, vendor: &Vendor) -> Option<UniqueField> {
        let others: Vec<&Vendor> = self
            .vendors
            .values()
            .filter(|other| other.id != vendor.id)
            .collect();

        if others.iter().any(|other| other.email == vendor.email) {
            return Some(UniqueField::Email);
        }
        if others.iter().any(|other| other.business_name == vendor.business_name) {
            return Some(UniqueField::BusinessName);
        }
        if let Some(license) = &vendor.trade_license_number {
            if others
                .iter()
                .any(|other| other.trade_license_number.as_ref() == Some(license))
            {
                return Some(UniqueField::TradeLicenseNumber);
            }
        }
        if others.iter().any(|other| other.slug == vendor.slug) {
            return Some(UniqueField::Slug);
        }
        None
    }

    fn counter_mut(&mut self, target: CounterTarget, id: Uuid) -> Option<(&mut i64, Option<i64>)> {
        match target {
            CounterTarget::Category => self.categories.get_mut(&id).map(|c| {
                c.updated_at = Utc::now();
                (&mut c.vendor_count, None)
            }),
            CounterTarget::SubCategory => self.sub_categories.get_mut(&id).map(|s| {
                s.updated_at = Utc::now();
                (&mut s.vendor_count, None)
            }),
            CounterTarget::Bundle => self.bundles.get_mut(&id).map(|b| {
                b.updated_at = Utc::now();
                (&mut b.subscribers_count, b.max_vendors)
            }),
        }
    }

    fn counter_ids(&self, target: CounterTarget) -> Vec<Uuid> {
        match target {
            CounterTarget::Category => self.categories.keys().copied().collect(),
            CounterTarget::SubCategory => self.sub_categories.keys().copied().collect(),
            CounterTarget::Bundle => self.bundles.keys().copied().collect(),
        }
    }

    fn check_target(&self, target: CounterTarget) -> Result<(), CounterSyncError> {
        if self.failing_targets.contains(&target) {
            return Err(CounterSyncError::Unavailable(format!(
                "{} counters are failing",
                target
            )));
        }
        Ok(())
    }
}

/// Shared in-memory store; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every counter write against `target` fail until restored
    pub async fn fail_counter_target(&self, target: CounterTarget) {
        self.state.write().await.failing_targets.insert(target);
    }

    pub async fn restore_counter_target(&self, target: CounterTarget) {
        self.state.write().await.failing_targets.remove(&target);
    }

    /// Current counter value, `None` for an unknown id
    pub async fn counter(&self, target: CounterTarget, id: Uuid) -> Option<i64> {
        let state = self.state.read().await;
        match target {
            CounterTarget::Category => state.categories.get(&id).map(|c| c.vendor_count),
            CounterTarget::SubCategory => state.sub_categories.get(&id).map(|s| s.vendor_count),
            CounterTarget::Bundle => state.bundles.get(&id).map(|b| b.subscribers_count),
        }
    }

    /// Force a counter to a value, bypassing the sync engine
    pub async fn set_counter(&self, target: CounterTarget, id: Uuid, value: i64) {
        let mut state = self.state.write().await;
        if let Some((count, _)) = state.counter_mut(target, id) {
            *count = value;
        }
    }

    /// Replace a vendor without running any counter sync
    pub async fn put_vendor_unsynced(&self, vendor: Vendor) {
        self.state.write().await.vendors.insert(vendor.id, vendor);
    }

    pub async fn vendor_total(&self) -> usize {
        self.state.read().await.vendors.len()
    }
}

#[async_trait]
impl VendorRepository for MemoryBackend {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Vendor>, RepositoryError> {
        Ok(self.state.read().await.vendors.get(&id).cloned())
    }

    async fn find_matching(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, RepositoryError> {
        let state = self.state.read().await;
        let mut vendors: Vec<Vendor> = state
            .vendors
            .values()
            .filter(|vendor| filter.matches(vendor))
            .cloned()
            .collect();
        vendors.sort_by_key(|vendor| (vendor.created_at, vendor.id));
        Ok(vendors)
    }

    async fn insert(&self, vendor: &Vendor) -> Result<(), RepositoryError> {
        if !vendor.password.is_hashed() {
            return Err(RepositoryError::Corrupt(format!(
                "vendor {} has an unhashed password",
                vendor.id
            )));
        }

        let mut state = self.state.write().await;
        if state.vendors.contains_key(&vendor.id) {
            return Err(RepositoryError::Conflict("id".to_string()));
        }
        if let Some(field) = state.unique_conflict(vendor) {
            return Err(RepositoryError::Conflict(field.as_str().to_string()));
        }
        state.vendors.insert(vendor.id, vendor.clone());
        Ok(())
    }

    async fn update(&self, vendor: &Vendor) -> Result<bool, RepositoryError> {
        if !vendor.password.is_hashed() {
            return Err(RepositoryError::Corrupt(format!(
                "vendor {} has an unhashed password",
                vendor.id
            )));
        }

        let mut state = self.state.write().await;
        if let Some(field) = state.unique_conflict(vendor) {
            return Err(RepositoryError::Conflict(field.as_str().to_string()));
        }
        match state.vendors.get_mut(&vendor.id) {
            Some(stored) => {
                *stored = vendor.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.state.write().await.vendors.remove(&id).is_some())
    }

    async fn find_conflict(&self, vendor: &Vendor) -> Result<Option<UniqueField>, RepositoryError> {
        let conflict = self.state.read().await.unique_conflict(vendor);
        // Slug collisions are resolved by suffixing, not reported
        Ok(conflict.filter(|field| *field != UniqueField::Slug))
    }

    async fn slug_taken(&self, slug: &str, exclude: Uuid) -> Result<bool, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .vendors
            .values()
            .any(|vendor| vendor.id != exclude && vendor.slug == slug))
    }

    async fn memberships(&self) -> Result<Vec<MembershipSnapshot>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .vendors
            .values()
            .map(Vendor::membership)
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for MemoryBackend {
    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.categories.get(id).cloned())
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> =
            self.state.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(RepositoryError::Conflict("name".to_string()));
        }
        let mut stored = category.clone();
        stored.vendor_count = 0;
        state.categories.insert(stored.id, stored);
        Ok(())
    }

    async fn find_sub_categories(&self, ids: &[Uuid]) -> Result<Vec<SubCategory>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.sub_categories.get(id).cloned())
            .collect())
    }

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .sub_categories
            .values()
            .any(|s| s.main_category == sub_category.main_category && s.name == sub_category.name)
        {
            return Err(RepositoryError::Conflict("name".to_string()));
        }
        let mut stored = sub_category.clone();
        stored.vendor_count = 0;
        state.sub_categories.insert(stored.id, stored);
        Ok(())
    }

    async fn find_bundle(&self, id: Uuid) -> Result<Option<Bundle>, RepositoryError> {
        Ok(self.state.read().await.bundles.get(&id).cloned())
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>, RepositoryError> {
        let mut bundles: Vec<Bundle> = self.state.read().await.bundles.values().cloned().collect();
        bundles.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(bundles)
    }

    async fn insert_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.bundles.values().any(|b| b.name == bundle.name) {
            return Err(RepositoryError::Conflict("name".to_string()));
        }
        let mut stored = bundle.clone();
        stored.subscribers_count = 0;
        state.bundles.insert(stored.id, stored);
        Ok(())
    }

    async fn update_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .bundles
            .values()
            .any(|b| b.id != bundle.id && b.name == bundle.name)
        {
            return Err(RepositoryError::Conflict("name".to_string()));
        }
        if let Some(stored) = state.bundles.get_mut(&bundle.id) {
            let subscribers = stored.subscribers_count;
            *stored = bundle.clone();
            stored.subscribers_count = subscribers;
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryBackend {
    async fn increment(
        &self,
        target: CounterTarget,
        ids: &[Uuid],
        delta: i64,
    ) -> Result<Vec<CounterState>, CounterSyncError> {
        let mut state = self.state.write().await;
        state.check_target(target)?;

        let mut touched = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((count, ceiling)) = state.counter_mut(target, *id) {
                *count = (*count + delta).max(0);
                touched.push(CounterState {
                    id: *id,
                    count: *count,
                    ceiling,
                });
            }
        }
        Ok(touched)
    }

    async fn overwrite(
        &self,
        target: CounterTarget,
        counts: &HashMap<Uuid, i64>,
    ) -> Result<u64, CounterSyncError> {
        let mut state = self.state.write().await;
        state.check_target(target)?;

        let mut written = 0;
        for id in state.counter_ids(target) {
            let listed = counts.get(&id).copied();
            if let Some((count, _)) = state.counter_mut(target, id) {
                if listed.is_some() || *count != 0 {
                    *count = listed.unwrap_or(0);
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}
