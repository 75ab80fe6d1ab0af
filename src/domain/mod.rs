//! Domain module
//!
//! Core domain types and business logic.

pub mod catalog;
pub mod context;
pub mod error;
pub mod password;
pub mod subscription;
pub mod validation;
pub mod vendor;

pub use catalog::{
    Bundle, BundleChanges, Category, NewBundle, NewCategory, NewSubCategory, SubCategory,
};
pub use context::{Actor, OperationContext};
pub use error::DomainError;
pub use password::{Password, DEFAULT_HASH_COST, MAX_HASH_COST, MIN_HASH_COST};
pub use subscription::{
    compute_end_date, resolve_duration, CustomDuration, DurationUnit, Period, PeriodSpec,
    ResolvedDuration,
};
pub use validation::{FieldError, ValidationErrors};
pub use vendor::{
    dedup, normalize_email, slug_candidate, slugify, Address, MembershipSnapshot, NewVendor,
    UniqueField, Vendor, VendorFilter, VendorPatch, VendorStatus,
};
