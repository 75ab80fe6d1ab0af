//! Database module
//!
//! Connectivity and schema checks. The schema itself lives in the raw SQL
//! files under `migrations/`.

use sqlx::PgPool;

/// Tables the service reads and writes
pub const REQUIRED_TABLES: [&str; 4] = ["categories", "sub_categories", "bundles", "vendors"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    // The partial index is what lets international vendors share a NULL license
    let partial_index: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM pg_indexes
            WHERE tablename = 'vendors' AND indexname = 'vendors_trade_license_number_key'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !partial_index {
        tracing::error!("Index 'vendors_trade_license_number_key' does not exist");
        return Ok(false);
    }

    tracing::info!("Database schema verified");
    Ok(true)
}
