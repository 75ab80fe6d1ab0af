//! PostgreSQL catalog repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Bundle, Category, DurationUnit, Period, PeriodSpec, SubCategory};

use super::{map_unique_violation, CatalogRepository, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    vendor_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            vendor_count: row.vendor_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubCategoryRow {
    id: Uuid,
    name: String,
    main_category: Uuid,
    vendor_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubCategoryRow> for SubCategory {
    fn from(row: SubCategoryRow) -> Self {
        SubCategory {
            id: row.id,
            name: row.name,
            main_category: row.main_category,
            vendor_count: row.vendor_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BundleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    duration_value: i32,
    duration_unit: String,
    bonus_period: Option<Json<PeriodSpec>>,
    features: Vec<String>,
    subscribers_count: i64,
    max_vendors: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BundleRow> for Bundle {
    type Error = RepositoryError;

    fn try_from(row: BundleRow) -> Result<Self, Self::Error> {
        let unit: DurationUnit = row
            .duration_unit
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("bundle {}: {}", row.id, e)))?;
        let value = u32::try_from(row.duration_value).map_err(|_| {
            RepositoryError::Corrupt(format!("bundle {}: negative duration", row.id))
        })?;

        Ok(Bundle {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            duration: Period::new(value, unit),
            bonus_period: row.bonus_period.map(|json| json.0),
            features: row.features,
            subscribers_count: row.subscribers_count,
            max_vendors: row.max_vendors,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BUNDLE_COLUMNS: &str = r#"
    id, name, description, price, duration_value, duration_unit, bonus_period,
    features, subscribers_count, max_vendors, created_at, updated_at
"#;

fn field_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        "categories_name_key" | "sub_categories_name_key" | "bundles_name_key" => "name",
        _ => "catalog",
    }
}

fn duration_value(bundle: &Bundle) -> Result<i32, RepositoryError> {
    i32::try_from(bundle.duration.value)
        .map_err(|_| RepositoryError::Corrupt(format!("bundle {}: duration too large", bundle.id)))
}

/// Catalog repository backed by `categories`, `sub_categories` and `bundles`
#[derive(Debug, Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, vendor_count, created_at, updated_at FROM categories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, vendor_count, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn insert_category(&self, category: &Category) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, vendor_count, created_at, updated_at)
            VALUES ($1, $2, 0, $3, $4)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(())
    }

    async fn find_sub_categories(&self, ids: &[Uuid]) -> Result<Vec<SubCategory>, RepositoryError> {
        let rows: Vec<SubCategoryRow> = sqlx::query_as(
            r#"
            SELECT id, name, main_category, vendor_count, created_at, updated_at
            FROM sub_categories
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubCategory::from).collect())
    }

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sub_categories (id, name, main_category, vendor_count, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            "#,
        )
        .bind(sub_category.id)
        .bind(&sub_category.name)
        .bind(sub_category.main_category)
        .bind(sub_category.created_at)
        .bind(sub_category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(())
    }

    async fn find_bundle(&self, id: Uuid) -> Result<Option<Bundle>, RepositoryError> {
        let row: Option<BundleRow> =
            sqlx::query_as(&format!("SELECT {} FROM bundles WHERE id = $1", BUNDLE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Bundle::try_from).transpose()
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>, RepositoryError> {
        let rows: Vec<BundleRow> =
            sqlx::query_as(&format!("SELECT {} FROM bundles ORDER BY price, name", BUNDLE_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Bundle::try_from).collect()
    }

    async fn insert_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bundles (
                id, name, description, price, duration_value, duration_unit, bonus_period,
                features, subscribers_count, max_vendors, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11)
            "#,
        )
        .bind(bundle.id)
        .bind(&bundle.name)
        .bind(&bundle.description)
        .bind(bundle.price)
        .bind(duration_value(bundle)?)
        .bind(bundle.duration.unit.as_str())
        .bind(bundle.bonus_period.as_ref().map(Json))
        .bind(&bundle.features)
        .bind(bundle.max_vendors)
        .bind(bundle.created_at)
        .bind(bundle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(())
    }

    async fn update_bundle(&self, bundle: &Bundle) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE bundles SET
                name = $2,
                description = $3,
                price = $4,
                duration_value = $5,
                duration_unit = $6,
                bonus_period = $7,
                features = $8,
                max_vendors = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(bundle.id)
        .bind(&bundle.name)
        .bind(&bundle.description)
        .bind(bundle.price)
        .bind(duration_value(bundle)?)
        .bind(bundle.duration.unit.as_str())
        .bind(bundle.bonus_period.as_ref().map(Json))
        .bind(&bundle.features)
        .bind(bundle.max_vendors)
        .bind(bundle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(())
    }
}
