//! Command Handlers module
//!
//! Handlers that orchestrate vendor and catalog operations. Each one
//! validates input, checks references and goes through `VendorStore` for
//! every vendor write.

mod catalog_handler;
mod commands;
mod delete_handler;
mod duration;
mod references;
mod status_handler;
mod subscription_handler;
mod vendor_handler;


pub use catalog_handler::CatalogHandler;
pub use commands::*;
pub use delete_handler::{DeleteVendorHandler, PurgeVendorsHandler};
pub use duration::DurationResolver;
pub use references::{ensure_bundle, ensure_memberships, ensure_seat_available};
pub use status_handler::{BulkStatusHandler, ChangeStatusHandler};
pub use subscription_handler::{SubscriptionQuery, UpdateSubscriptionHandler};
pub use vendor_handler::{RegisterVendorHandler, UpdateProfileHandler};
