//! Common test utilities
//!
//! Everything runs on the in-memory backend, so no database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use vendor_hub::domain::{
    Actor, Address, DurationUnit, NewBundle, NewCategory, NewSubCategory, NewVendor,
    OperationContext, Period, PeriodSpec, VendorStatus, MIN_HASH_COST,
};
use vendor_hub::handlers::{
    CatalogHandler, ChangeStatusCommand, ChangeStatusHandler, CreateBundleCommand,
    CreateCategoryCommand, CreateSubCategoryCommand, RegisterVendorCommand,
    RegisterVendorHandler,
};
use vendor_hub::repository::MemoryBackend;
use vendor_hub::sync::CounterTarget;
use vendor_hub::{AppState, SecuritySettings};

pub const ADMIN_KEY: &str = "test_admin_key_123";

/// Seeded catalog: categories A, A2, B; subcategory S under A; bundles Z and Y
pub struct TestEnv {
    pub backend: MemoryBackend,
    pub state: AppState,
    pub admin: OperationContext,
    pub category_a: Uuid,
    pub category_a2: Uuid,
    pub category_b: Uuid,
    pub sub_category: Uuid,
    /// One month plus ten days of bonus
    pub bundle_z: Uuid,
    /// One year, no bonus
    pub bundle_y: Uuid,
}

pub async fn setup() -> TestEnv {
    let backend = MemoryBackend::new();
    let state = AppState::in_memory(
        backend.clone(),
        SecuritySettings::new(MIN_HASH_COST, ADMIN_KEY),
    );
    let admin = OperationContext::new().with_actor(Actor::Admin);
    let catalog = CatalogHandler::new(&state);

    let mut categories = Vec::new();
    for name in ["Venues", "Catering", "Photography"] {
        let category = catalog
            .create_category(
                CreateCategoryCommand {
                    category: NewCategory { name: name.to_string() },
                },
                &admin,
            )
            .await
            .unwrap();
        categories.push(category.id);
    }

    let sub_category = catalog
        .create_sub_category(
            CreateSubCategoryCommand {
                sub_category: NewSubCategory {
                    name: "Rooftops".to_string(),
                    main_category: categories[0],
                },
            },
            &admin,
        )
        .await
        .unwrap();

    let bundle_z = catalog
        .create_bundle(
            CreateBundleCommand {
                bundle: NewBundle {
                    name: "Starter".to_string(),
                    description: None,
                    price: dec!(99.00),
                    duration: Period::months(1),
                    bonus_period: Some(PeriodSpec::new(Some(10), DurationUnit::Days)),
                    features: vec!["Listing".to_string()],
                    max_vendors: None,
                },
            },
            &admin,
        )
        .await
        .unwrap();

    let bundle_y = catalog
        .create_bundle(
            CreateBundleCommand {
                bundle: NewBundle {
                    name: "Annual".to_string(),
                    description: Some("A full year".to_string()),
                    price: dec!(999.00),
                    duration: Period::years(1),
                    bonus_period: None,
                    features: vec!["Listing".to_string(), "Featured".to_string()],
                    max_vendors: Some(50),
                },
            },
            &admin,
        )
        .await
        .unwrap();

    TestEnv {
        backend,
        state,
        admin,
        category_a: categories[0],
        category_a2: categories[1],
        category_b: categories[2],
        sub_category: sub_category.id,
        bundle_z: bundle_z.id,
        bundle_y: bundle_y.id,
    }
}

impl TestEnv {
    pub fn router(&self) -> Router {
        vendor_hub::api::build_router(self.state.clone())
    }

    pub fn registration(
        &self,
        business_name: &str,
        main_category: Vec<Uuid>,
        bundle: Uuid,
    ) -> NewVendor {
        let local = business_name.to_lowercase().replace(' ', ".");
        NewVendor {
            owner_name: "Layla Haddad".to_string(),
            email: format!("{}@example.com", local),
            phone: "+971 50 123 4567".to_string(),
            password: "correct-horse-battery".to_string(),
            business_name: business_name.to_string(),
            business_logo: "https://cdn.example.com/logo.png".to_string(),
            business_description: "Full-service event venue with indoor and outdoor spaces for up to 400 guests.".to_string(),
            website: None,
            is_international: true,
            trade_license_number: None,
            emirates_id: None,
            address: Address {
                city: "Abu Dhabi".to_string(),
                country: "UAE".to_string(),
                ..Default::default()
            },
            main_category,
            sub_categories: Vec::new(),
            selected_bundle: Some(bundle),
        }
    }

    pub async fn register(
        &self,
        business_name: &str,
        main_category: Vec<Uuid>,
        bundle: Uuid,
    ) -> Uuid {
        RegisterVendorHandler::new(&self.state)
            .execute(
                RegisterVendorCommand::new(self.registration(business_name, main_category, bundle)),
                &self.admin,
            )
            .await
            .unwrap()
            .vendor
            .id
    }

    pub async fn set_status(&self, vendor_id: Uuid, status: VendorStatus) {
        ChangeStatusHandler::new(&self.state)
            .execute(ChangeStatusCommand::new(vendor_id, status.as_str()), &self.admin)
            .await
            .unwrap();
    }

    pub async fn count(&self, target: CounterTarget, id: Uuid) -> i64 {
        self.backend.counter(target, id).await.unwrap()
    }

    /// Approved vendors referencing `id`, computed from the vendor rows
    pub async fn expected(&self, target: CounterTarget, id: Uuid) -> i64 {
        use vendor_hub::repository::VendorRepository;

        let memberships = self.backend.memberships().await.unwrap();
        vendor_hub::sync::expected_counts(&memberships).get(target, id)
    }

    /// Every counter matches the approved vendors
    pub async fn assert_counters_consistent(&self) {
        for id in [self.category_a, self.category_a2, self.category_b] {
            assert_eq!(
                self.count(CounterTarget::Category, id).await,
                self.expected(CounterTarget::Category, id).await,
                "category {} drifted",
                id
            );
        }
        assert_eq!(
            self.count(CounterTarget::SubCategory, self.sub_category).await,
            self.expected(CounterTarget::SubCategory, self.sub_category).await,
        );
        for id in [self.bundle_z, self.bundle_y] {
            assert_eq!(
                self.count(CounterTarget::Bundle, id).await,
                self.expected(CounterTarget::Bundle, id).await,
                "bundle {} drifted",
                id
            );
        }
    }
}

/// Send one request through the router and decode the JSON body
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    admin_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = admin_key {
        builder = builder.header("X-Admin-Key", key);
    }

    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };

    (status, value)
}

pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_days()
}
