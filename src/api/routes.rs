//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::{
    Address, Bundle, BundleChanges, Category, CustomDuration, NewBundle, NewCategory,
    NewSubCategory, NewVendor, OperationContext, SubCategory, Vendor, VendorStatus,
};
use crate::error::AppError;
use crate::handlers::{
    BulkStatusCommand, BulkStatusHandler, CatalogHandler, ChangeStatusCommand,
    ChangeStatusHandler, CreateBundleCommand, CreateCategoryCommand, CreateSubCategoryCommand,
    DeleteVendorHandler, PurgeVendorsCommand, PurgeVendorsHandler, RegisterVendorCommand,
    RegisterVendorHandler, SubscriptionQuery, SubscriptionView, UpdateBundleCommand,
    UpdateProfileCommand, UpdateProfileHandler, UpdateSubscriptionCommand,
    UpdateSubscriptionHandler,
};
use crate::jobs::{expire_lapsed_subscriptions, recount_counters};
use crate::state::AppState;
use crate::sync::SyncOutcome;
use crate::vendor_store::{BatchOutcome, VendorWrite};

use super::middleware::admin_auth_middleware;

// =========================================================================
// Request/Response types
// =========================================================================

/// Distinguish an absent field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Vendor as returned by the API; the password hash is never included
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorResponse {
    pub id: Uuid,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub business_name: String,
    pub slug: String,
    pub business_logo: String,
    pub business_description: String,
    pub website: Option<String>,
    pub is_international: bool,
    pub trade_license_number: Option<String>,
    pub emirates_id: Option<String>,
    pub address: Address,
    pub main_category: Vec<Uuid>,
    pub sub_categories: Vec<Uuid>,
    pub selected_bundle: Uuid,
    pub vendor_status: VendorStatus,
    pub rejection_reason: Option<String>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub custom_duration: Option<CustomDuration>,
    pub custom_features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Vendor> for VendorResponse {
    fn from(vendor: Vendor) -> Self {
        Self {
            id: vendor.id,
            owner_name: vendor.owner_name,
            email: vendor.email,
            phone: vendor.phone,
            business_name: vendor.business_name,
            slug: vendor.slug,
            business_logo: vendor.business_logo,
            business_description: vendor.business_description,
            website: vendor.website,
            is_international: vendor.is_international,
            trade_license_number: vendor.trade_license_number,
            emirates_id: vendor.emirates_id,
            address: vendor.address,
            main_category: vendor.main_categories,
            sub_categories: vendor.sub_categories,
            selected_bundle: vendor.selected_bundle,
            vendor_status: vendor.status,
            rejection_reason: vendor.rejection_reason,
            subscription_start_date: vendor.subscription_start_date,
            subscription_end_date: vendor.subscription_end_date,
            custom_duration: vendor.custom_duration,
            custom_features: vendor.custom_features,
            created_at: vendor.created_at,
            updated_at: vendor.updated_at,
        }
    }
}

/// Summary of the counter side effects of one write
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSyncSummary {
    pub transition: &'static str,
    pub applied: usize,
    pub failed_batches: usize,
}

impl From<&SyncOutcome> for CounterSyncSummary {
    fn from(outcome: &SyncOutcome) -> Self {
        Self {
            transition: outcome.transition.as_str(),
            applied: outcome.applied,
            failed_batches: outcome.failures.len(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorWriteResponse {
    pub vendor: VendorResponse,
    pub counter_sync: CounterSyncSummary,
}

impl From<VendorWrite> for VendorWriteResponse {
    fn from(write: VendorWrite) -> Self {
        Self {
            counter_sync: CounterSyncSummary::from(&write.sync),
            vendor: write.vendor.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub affected: usize,
    pub vendor_ids: Vec<Uuid>,
    pub failed_counter_batches: usize,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            affected: outcome.count(),
            failed_counter_batches: outcome.counter_failures.len(),
            vendor_ids: outcome.affected,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_logo: Option<String>,
    #[serde(default)]
    pub business_description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub main_category: Option<Vec<Uuid>>,
    #[serde(default)]
    pub sub_categories: Option<Vec<Uuid>>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub vendor_ids: Vec<Uuid>,
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    #[serde(default)]
    pub selected_bundle: Option<Uuid>,
    /// `null` removes the override; absent leaves it unchanged
    #[serde(default, deserialize_with = "double_option")]
    pub custom_duration: Option<Option<CustomDuration>>,
    #[serde(default)]
    pub custom_features: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    #[serde(default)]
    pub status: Option<VendorStatus>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecountResponse {
    pub vendors_counted: usize,
    pub categories_written: u64,
    pub sub_categories_written: u64,
    pub bundles_written: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireResponse {
    pub expired: u64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router. Admin routes require `X-Admin-Key`.
pub fn create_router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/vendors", post(register_vendor))
        .route("/vendors/:vendor_id", get(get_vendor).patch(update_profile))
        .route("/vendors/:vendor_id/subscription", get(get_subscription))
        .route("/categories", get(list_categories))
        .route("/bundles", get(list_bundles));

    let admin = Router::new()
        .route("/vendors/:vendor_id/status", patch(change_status))
        .route("/vendors/:vendor_id/subscription", patch(update_subscription))
        .route("/vendors/:vendor_id", delete(delete_vendor))
        .route("/vendors/bulk-status", post(bulk_status))
        .route("/vendors/purge", post(purge_vendors))
        .route("/categories", post(create_category))
        .route("/subcategories", post(create_sub_category))
        .route("/bundles", post(create_bundle))
        .route("/bundles/:bundle_id", patch(update_bundle))
        .route("/maintenance/recount", post(run_recount))
        .route("/maintenance/expire", post(run_expiry))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    public.nest("/admin", admin)
}

// =========================================================================
// Vendor endpoints
// =========================================================================

/// POST /vendors
async fn register_vendor(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<NewVendor>,
) -> Result<(StatusCode, Json<VendorWriteResponse>), AppError> {
    let handler = RegisterVendorHandler::new(&state);
    let written = handler
        .execute(RegisterVendorCommand::new(request), &context)
        .await?;

    Ok((StatusCode::CREATED, Json(written.into())))
}

/// GET /vendors/:vendor_id
async fn get_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<VendorResponse>, AppError> {
    let vendor = state.vendor_store().find(vendor_id).await?;
    Ok(Json(vendor.into()))
}

/// PATCH /vendors/:vendor_id
async fn update_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<VendorWriteResponse>, AppError> {
    let command = UpdateProfileCommand {
        vendor_id,
        owner_name: request.owner_name,
        email: request.email,
        phone: request.phone,
        business_name: request.business_name,
        business_logo: request.business_logo,
        business_description: request.business_description,
        website: request.website,
        address: request.address,
        main_categories: request.main_category,
        sub_categories: request.sub_categories,
        current_password: request.current_password,
        new_password: request.new_password,
    };

    let written = UpdateProfileHandler::new(&state)
        .execute(command, &context)
        .await?;
    Ok(Json(written.into()))
}

/// GET /vendors/:vendor_id/subscription
async fn get_subscription(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<SubscriptionView>, AppError> {
    let view = SubscriptionQuery::new(&state).execute(vendor_id).await?;
    Ok(Json(view))
}

// =========================================================================
// Catalog endpoints
// =========================================================================

/// GET /categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CatalogHandler::new(&state).list_categories().await?))
}

/// GET /bundles
async fn list_bundles(State(state): State<AppState>) -> Result<Json<Vec<Bundle>>, AppError> {
    Ok(Json(CatalogHandler::new(&state).list_bundles().await?))
}

/// POST /admin/categories
async fn create_category(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = CatalogHandler::new(&state)
        .create_category(CreateCategoryCommand { category: request }, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// POST /admin/subcategories
async fn create_sub_category(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<NewSubCategory>,
) -> Result<(StatusCode, Json<SubCategory>), AppError> {
    let sub_category = CatalogHandler::new(&state)
        .create_sub_category(CreateSubCategoryCommand { sub_category: request }, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(sub_category)))
}

/// POST /admin/bundles
async fn create_bundle(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<NewBundle>,
) -> Result<(StatusCode, Json<Bundle>), AppError> {
    let bundle = CatalogHandler::new(&state)
        .create_bundle(CreateBundleCommand { bundle: request }, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(bundle)))
}

/// PATCH /admin/bundles/:bundle_id
async fn update_bundle(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(bundle_id): Path<Uuid>,
    Json(changes): Json<BundleChanges>,
) -> Result<Json<Bundle>, AppError> {
    let bundle = CatalogHandler::new(&state)
        .update_bundle(UpdateBundleCommand { bundle_id, changes }, &context)
        .await?;
    Ok(Json(bundle))
}

// =========================================================================
// Admin vendor endpoints
// =========================================================================

/// PATCH /admin/vendors/:vendor_id/status
async fn change_status(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<VendorWriteResponse>, AppError> {
    let mut command = ChangeStatusCommand::new(vendor_id, request.status);
    if let Some(reason) = request.rejection_reason {
        command = command.with_rejection_reason(reason);
    }

    let written = ChangeStatusHandler::new(&state)
        .execute(command, &context)
        .await?;
    Ok(Json(written.into()))
}

/// PATCH /admin/vendors/:vendor_id/subscription
async fn update_subscription(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Result<Json<VendorWriteResponse>, AppError> {
    let command = UpdateSubscriptionCommand {
        vendor_id,
        selected_bundle: request.selected_bundle,
        custom_duration: request.custom_duration,
        custom_features: request.custom_features,
    };

    let written = UpdateSubscriptionHandler::new(&state)
        .execute(command, &context)
        .await?;
    Ok(Json(written.into()))
}

/// DELETE /admin/vendors/:vendor_id
async fn delete_vendor(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<VendorWriteResponse>, AppError> {
    let removed = DeleteVendorHandler::new(&state)
        .execute(vendor_id, &context)
        .await?;
    Ok(Json(removed.into()))
}

/// POST /admin/vendors/bulk-status
async fn bulk_status(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let mut command = BulkStatusCommand::new(request.vendor_ids, request.status);
    if let Some(reason) = request.rejection_reason {
        command = command.with_rejection_reason(reason);
    }

    let outcome = BulkStatusHandler::new(&state)
        .execute(command, &context)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /admin/vendors/purge
async fn purge_vendors(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<PurgeRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let command = PurgeVendorsCommand {
        status: request.status,
        created_before: request.created_before,
    };

    let outcome = PurgeVendorsHandler::new(&state)
        .execute(command, &context)
        .await?;
    Ok(Json(outcome.into()))
}

// =========================================================================
// Maintenance endpoints
// =========================================================================

/// POST /admin/maintenance/recount
async fn run_recount(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<RecountResponse>, AppError> {
    let report = recount_counters(state.vendors.as_ref(), state.counters.as_ref()).await?;

    tracing::info!(
        correlation_id = ?context.correlation_id,
        vendors = report.vendors_counted,
        "Manual recount finished"
    );

    Ok(Json(RecountResponse {
        vendors_counted: report.vendors_counted,
        categories_written: report.categories_written,
        sub_categories_written: report.sub_categories_written,
        bundles_written: report.bundles_written,
    }))
}

/// POST /admin/maintenance/expire
async fn run_expiry(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ExpireResponse>, AppError> {
    let expired = expire_lapsed_subscriptions(&state.vendor_store(), Utc::now()).await?;

    tracing::info!(
        correlation_id = ?context.correlation_id,
        expired = expired,
        "Manual expiry sweep finished"
    );

    Ok(Json(ExpireResponse { expired }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_duration_null_vs_absent() {
        let absent: UpdateSubscriptionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.custom_duration, None);

        let cleared: UpdateSubscriptionRequest =
            serde_json::from_str(r#"{"customDuration": null}"#).unwrap();
        assert_eq!(cleared.custom_duration, Some(None));

        let set: UpdateSubscriptionRequest =
            serde_json::from_str(r#"{"customDuration": {"value": 6, "unit": "months"}}"#).unwrap();
        assert!(matches!(set.custom_duration, Some(Some(ref c)) if c.value == Some(6)));
    }

    #[test]
    fn test_sync_summary_counts_failures() {
        use crate::sync::Transition;

        let outcome = SyncOutcome {
            transition: Transition::NewlyApproved,
            applied: 3,
            failures: Vec::new(),
        };
        let summary = CounterSyncSummary::from(&outcome);
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.failed_batches, 0);
    }
}
