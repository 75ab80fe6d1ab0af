//! Application state
//!
//! Wires repositories and the counter store together once at startup.
//! Everything downstream receives its collaborators from here.

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{digest_key, Config};
use crate::repository::{
    CatalogRepository, MemoryBackend, PgCatalogRepository, PgCounterStore, PgVendorRepository,
    VendorRepository,
};
use crate::sync::{CounterStore, CounterSyncEngine};
use crate::vendor_store::VendorStore;

/// Settings consulted by request handling
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub password_hash_cost: u32,
    /// SHA-256 hex digest of the admin API key
    pub admin_key_digest: String,
}

impl SecuritySettings {
    pub fn new(password_hash_cost: u32, admin_key: &str) -> Self {
        Self {
            password_hash_cost,
            admin_key_digest: digest_key(admin_key),
        }
    }
}

/// Shared state handed to every route and job
#[derive(Clone)]
pub struct AppState {
    pub vendors: Arc<dyn VendorRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub counters: Arc<dyn CounterStore>,
    pub security: SecuritySettings,
}

impl AppState {
    /// PostgreSQL-backed state
    pub fn postgres(pool: PgPool, config: &Config) -> Self {
        Self {
            vendors: Arc::new(PgVendorRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            counters: Arc::new(PgCounterStore::new(pool)),
            security: SecuritySettings {
                password_hash_cost: config.password_hash_cost,
                admin_key_digest: config.admin_key_digest.clone(),
            },
        }
    }

    /// State backed entirely by one in-memory backend
    pub fn in_memory(backend: MemoryBackend, security: SecuritySettings) -> Self {
        Self {
            vendors: Arc::new(backend.clone()),
            catalog: Arc::new(backend.clone()),
            counters: Arc::new(backend),
            security,
        }
    }

    pub fn counter_engine(&self) -> CounterSyncEngine {
        CounterSyncEngine::new(self.counters.clone())
    }

    pub fn vendor_store(&self) -> VendorStore {
        VendorStore::new(
            self.vendors.clone(),
            self.counter_engine(),
            self.security.password_hash_cost,
        )
    }
}
