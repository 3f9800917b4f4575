use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Records one feed sync attempt, successful or not.
pub async fn record_sync_run(
    pool: &sqlx::PgPool,
    started_at: DateTime<Utc>,
    status: &str,
    fetched: i64,
    inserted: i64,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO stock_sync_runs (id, started_at, finished_at, status, fetched, inserted, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .persistent(false)
    .bind(id)
    .bind(started_at)
    .bind(finished_at)
    .bind(status)
    .bind(fetched)
    .bind(inserted)
    .bind(error)
    .execute(pool)
    .await
    .context("insert stock_sync_runs failed")?;

    Ok(id)
}
