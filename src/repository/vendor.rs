//! PostgreSQL vendor repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    Address, CustomDuration, MembershipSnapshot, Password, UniqueField, Vendor, VendorFilter,
    VendorStatus,
};

use super::{map_unique_violation, RepositoryError, VendorRepository};

const VENDOR_COLUMNS: &str = r#"
    id, owner_name, email, phone, password_hash, business_name, slug,
    business_logo, business_description, website, is_international,
    trade_license_number, emirates_id, address, main_categories, sub_categories,
    selected_bundle, vendor_status, rejection_reason, subscription_start_date,
    subscription_end_date, custom_duration, custom_features, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    id: Uuid,
    owner_name: String,
    email: String,
    phone: String,
    password_hash: String,
    business_name: String,
    slug: String,
    business_logo: String,
    business_description: String,
    website: Option<String>,
    is_international: bool,
    trade_license_number: Option<String>,
    emirates_id: Option<String>,
    address: Json<Address>,
    main_categories: Vec<Uuid>,
    sub_categories: Vec<Uuid>,
    selected_bundle: Uuid,
    vendor_status: String,
    rejection_reason: Option<String>,
    subscription_start_date: Option<DateTime<Utc>>,
    subscription_end_date: Option<DateTime<Utc>>,
    custom_duration: Option<Json<CustomDuration>>,
    custom_features: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VendorRow> for Vendor {
    type Error = RepositoryError;

    fn try_from(row: VendorRow) -> Result<Self, Self::Error> {
        let status = row
            .vendor_status
            .parse::<VendorStatus>()
            .map_err(|e| RepositoryError::Corrupt(format!("vendor {}: {}", row.id, e)))?;

        Ok(Vendor {
            id: row.id,
            owner_name: row.owner_name,
            email: row.email,
            phone: row.phone,
            password: Password::hashed(row.password_hash),
            business_name: row.business_name,
            slug: row.slug,
            business_logo: row.business_logo,
            business_description: row.business_description,
            website: row.website,
            is_international: row.is_international,
            trade_license_number: row.trade_license_number,
            emirates_id: row.emirates_id,
            address: row.address.0,
            main_categories: row.main_categories,
            sub_categories: row.sub_categories,
            selected_bundle: row.selected_bundle,
            status,
            rejection_reason: row.rejection_reason,
            subscription_start_date: row.subscription_start_date,
            subscription_end_date: row.subscription_end_date,
            custom_duration: row.custom_duration.map(|json| json.0),
            custom_features: row.custom_features,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn field_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        "vendors_email_key" => UniqueField::Email.as_str(),
        "vendors_business_name_key" => UniqueField::BusinessName.as_str(),
        "vendors_trade_license_number_key" => UniqueField::TradeLicenseNumber.as_str(),
        "vendors_slug_key" => UniqueField::Slug.as_str(),
        _ => "vendor",
    }
}

fn password_hash(vendor: &Vendor) -> Result<&str, RepositoryError> {
    vendor
        .password
        .as_hash()
        .ok_or_else(|| {
            RepositoryError::Corrupt(format!("vendor {} has an unhashed password", vendor.id))
        })
}

/// Vendor repository backed by the `vendors` table
#[derive(Debug, Clone)]
pub struct PgVendorRepository {
    pool: PgPool,
}

impl PgVendorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VendorRepository for PgVendorRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Vendor>, RepositoryError> {
        let row: Option<VendorRow> =
            sqlx::query_as(&format!("SELECT {} FROM vendors WHERE id = $1", VENDOR_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Vendor::try_from).transpose()
    }

    async fn find_matching(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM vendors WHERE TRUE", VENDOR_COLUMNS));

        if let Some(ids) = &filter.ids {
            query.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(status) = filter.status {
            query.push(" AND vendor_status = ").push_bind(status.as_str());
        }
        if let Some(bundle) = filter.selected_bundle {
            query.push(" AND selected_bundle = ").push_bind(bundle);
        }
        if let Some(cutoff) = filter.subscription_ended_before {
            query
                .push(" AND subscription_end_date < ")
                .push_bind(cutoff);
        }
        if let Some(cutoff) = filter.created_before {
            query.push(" AND created_at < ").push_bind(cutoff);
        }
        query.push(" ORDER BY created_at, id");

        let rows: Vec<VendorRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Vendor::try_from).collect()
    }

    async fn insert(&self, vendor: &Vendor) -> Result<(), RepositoryError> {
        let hash = password_hash(vendor)?;

        sqlx::query(
            r#"
            INSERT INTO vendors (
                id, owner_name, email, phone, password_hash, business_name, slug,
                business_logo, business_description, website, is_international,
                trade_license_number, emirates_id, address, main_categories, sub_categories,
                selected_bundle, vendor_status, rejection_reason, subscription_start_date,
                subscription_end_date, custom_duration, custom_features, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            "#,
        )
        .bind(vendor.id)
        .bind(&vendor.owner_name)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .bind(hash)
        .bind(&vendor.business_name)
        .bind(&vendor.slug)
        .bind(&vendor.business_logo)
        .bind(&vendor.business_description)
        .bind(&vendor.website)
        .bind(vendor.is_international)
        .bind(&vendor.trade_license_number)
        .bind(&vendor.emirates_id)
        .bind(Json(&vendor.address))
        .bind(&vendor.main_categories)
        .bind(&vendor.sub_categories)
        .bind(vendor.selected_bundle)
        .bind(vendor.status.as_str())
        .bind(&vendor.rejection_reason)
        .bind(vendor.subscription_start_date)
        .bind(vendor.subscription_end_date)
        .bind(vendor.custom_duration.as_ref().map(Json))
        .bind(&vendor.custom_features)
        .bind(vendor.created_at)
        .bind(vendor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(())
    }

    async fn update(&self, vendor: &Vendor) -> Result<bool, RepositoryError> {
        let hash = password_hash(vendor)?;

        let result = sqlx::query(
            r#"
            UPDATE vendors SET
                owner_name = $2,
                email = $3,
                phone = $4,
                password_hash = $5,
                business_name = $6,
                slug = $7,
                business_logo = $8,
                business_description = $9,
                website = $10,
                is_international = $11,
                trade_license_number = $12,
                emirates_id = $13,
                address = $14,
                main_categories = $15,
                sub_categories = $16,
                selected_bundle = $17,
                vendor_status = $18,
                rejection_reason = $19,
                subscription_start_date = $20,
                subscription_end_date = $21,
                custom_duration = $22,
                custom_features = $23,
                updated_at = $24
            WHERE id = $1
            "#,
        )
        .bind(vendor.id)
        .bind(&vendor.owner_name)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .bind(hash)
        .bind(&vendor.business_name)
        .bind(&vendor.slug)
        .bind(&vendor.business_logo)
        .bind(&vendor.business_description)
        .bind(&vendor.website)
        .bind(vendor.is_international)
        .bind(&vendor.trade_license_number)
        .bind(&vendor.emirates_id)
        .bind(Json(&vendor.address))
        .bind(&vendor.main_categories)
        .bind(&vendor.sub_categories)
        .bind(vendor.selected_bundle)
        .bind(vendor.status.as_str())
        .bind(&vendor.rejection_reason)
        .bind(vendor.subscription_start_date)
        .bind(vendor.subscription_end_date)
        .bind(vendor.custom_duration.as_ref().map(Json))
        .bind(&vendor.custom_features)
        .bind(vendor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, field_for_constraint))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM vendors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_conflict(&self, vendor: &Vendor) -> Result<Option<UniqueField>, RepositoryError> {
        let (email, business_name, trade_license): (bool, bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM vendors WHERE email = $1 AND id <> $4),
                EXISTS (SELECT 1 FROM vendors WHERE business_name = $2 AND id <> $4),
                EXISTS (
                    SELECT 1 FROM vendors
                    WHERE $3::text IS NOT NULL AND trade_license_number = $3 AND id <> $4
                )
            "#,
        )
        .bind(&vendor.email)
        .bind(&vendor.business_name)
        .bind(&vendor.trade_license_number)
        .bind(vendor.id)
        .fetch_one(&self.pool)
        .await?;

        let conflict = if email {
            Some(UniqueField::Email)
        } else if business_name {
            Some(UniqueField::BusinessName)
        } else if trade_license {
            Some(UniqueField::TradeLicenseNumber)
        } else {
            None
        };

        Ok(conflict)
    }

    async fn slug_taken(&self, slug: &str, exclude: Uuid) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM vendors WHERE slug = $1 AND id <> $2)",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn memberships(&self) -> Result<Vec<MembershipSnapshot>, RepositoryError> {
        let rows: Vec<(String, Vec<Uuid>, Vec<Uuid>, Uuid)> = sqlx::query_as(
            r#"
            SELECT vendor_status, main_categories, sub_categories, selected_bundle
            FROM vendors
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, main_categories, sub_categories, bundle)| {
                Ok(MembershipSnapshot {
                    status: status.parse().map_err(|e: crate::domain::DomainError| {
                        RepositoryError::Corrupt(e.to_string())
                    })?,
                    main_categories,
                    sub_categories,
                    selected_bundle: Some(bundle),
                })
            })
            .collect()
    }
}
