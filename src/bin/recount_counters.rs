//! Counter Recount Tool
//!
//! Recomputes every category, subcategory and bundle counter from the
//! approved vendors and overwrites the stored values.
//!
//! Run with: cargo run --bin recount_counters -- [--dry-run]

use std::time::Instant;

use sqlx::postgres::PgPoolOptions;

use vendor_hub::db;
use vendor_hub::repository::{PgCounterStore, PgVendorRepository, VendorRepository};
use vendor_hub::sync::{expected_counts, CounterTarget};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendor_hub=info".into()),
        )
        .init();

    let dry_run = std::env::args().any(|a| a == "--dry-run");
    let database_url = std::env::var("DATABASE_URL")?;

    println!("Counter recount{}", if dry_run { " (dry run)" } else { "" });
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    db::verify_connection(&pool).await?;

    let start = Instant::now();
    let vendors = PgVendorRepository::new(pool.clone());

    if dry_run {
        let memberships = vendors.memberships().await?;
        let totals = expected_counts(&memberships);
        for target in CounterTarget::ALL {
            let rows = totals.for_target(target);
            let total: i64 = rows.values().sum();
            println!("{:<14} {:>6} rows {:>8} references", target.as_str(), rows.len(), total);
        }
    } else {
        let counters = PgCounterStore::new(pool.clone());
        let report = vendor_hub::jobs::recount_counters(&vendors, &counters).await?;

        println!();
        println!("=== Recount Results ===");
        println!("Approved vendors:     {}", report.vendors_counted);
        println!("Categories written:   {}", report.categories_written);
        println!("Subcategories written: {}", report.sub_categories_written);
        println!("Bundles written:      {}", report.bundles_written);
    }

    println!("Elapsed:              {:.2?}", start.elapsed());
    pool.close().await;

    Ok(())
}
