//! vendor_hub Library
//!
//! Vendor marketplace backend: vendor lifecycle, approval workflow,
//! subscription periods and denormalized counter maintenance.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod jobs;
pub mod repository;
pub mod state;
pub mod sync;
pub mod vendor_store;

pub use config::Config;
pub use domain::{DomainError, OperationContext, Vendor, VendorStatus};
pub use error::{AppError, AppResult, ErrorResponse};
pub use state::{AppState, SecuritySettings};
pub use vendor_store::{VendorStore, VendorStoreError};
