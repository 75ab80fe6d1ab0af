//! PostgreSQL counter store
//!
//! Every increment is one `UPDATE ... SET n = n + $delta` statement, so
//! concurrent syncs never lose updates on the same row.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::sync::{CounterState, CounterStore, CounterSyncError, CounterTarget};

/// Table, counter column and ceiling expression for a target
fn layout(target: CounterTarget) -> (&'static str, &'static str, &'static str) {
    match target {
        CounterTarget::Category => ("categories", "vendor_count", "NULL::bigint"),
        CounterTarget::SubCategory => ("sub_categories", "vendor_count", "NULL::bigint"),
        CounterTarget::Bundle => ("bundles", "subscribers_count", "max_vendors"),
    }
}

#[derive(Debug, Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment(
        &self,
        target: CounterTarget,
        ids: &[Uuid],
        delta: i64,
    ) -> Result<Vec<CounterState>, CounterSyncError> {
        if ids.is_empty() || delta == 0 {
            return Ok(Vec::new());
        }

        let (table, column, ceiling) = layout(target);
        let sql = format!(
            r#"
            UPDATE {table}
            SET {column} = GREATEST({column} + $2, 0), updated_at = NOW()
            WHERE id = ANY($1)
            RETURNING id, {column}, {ceiling}
            "#
        );

        let rows: Vec<(Uuid, i64, Option<i64>)> = sqlx::query_as(&sql)
            .bind(ids)
            .bind(delta)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count, ceiling)| CounterState { id, count, ceiling })
            .collect())
    }

    async fn overwrite(
        &self,
        target: CounterTarget,
        counts: &HashMap<Uuid, i64>,
    ) -> Result<u64, CounterSyncError> {
        let (table, column, _) = layout(target);
        let (ids, values): (Vec<Uuid>, Vec<i64>) = counts.iter().map(|(id, n)| (*id, *n)).unzip();

        let mut tx = self.pool.begin().await?;

        let zeroed = sqlx::query(&format!(
            "UPDATE {table} SET {column} = 0, updated_at = NOW() WHERE {column} <> 0 AND NOT (id = ANY($1))"
        ))
        .bind(&ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let written = sqlx::query(&format!(
            r#"
            UPDATE {table} AS t
            SET {column} = data.n, updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::bigint[]) AS data(id, n)
            WHERE t.id = data.id
            "#
        ))
        .bind(&ids)
        .bind(&values)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(
            target_table = table,
            zeroed = zeroed,
            written = written,
            "Counters overwritten"
        );

        Ok(zeroed + written)
    }
}
