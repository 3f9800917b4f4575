pub mod client;
pub mod types;

use crate::storage;
use anyhow::Context;
use chrono::Utc;
use client::StockFeed;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub fetched: usize,
    pub inserted: u64,
    pub run_id: Uuid,
}

/// Pulls every page from the feed and stores the events, recording one
/// `stock_sync_runs` row per attempt (the failure row is best-effort: a
/// broken database should surface the original error, not the audit one).
pub async fn sync_stock_events(
    pool: &sqlx::PgPool,
    feed: &dyn StockFeed,
) -> anyhow::Result<SyncOutcome> {
    let started_at = Utc::now();
    tracing::info!(feed = feed.feed_name(), "starting stock sync");

    let events = match feed.fetch_all_events().await {
        Ok(events) => events,
        Err(err) => {
            let _ = storage::sync_runs::record_sync_run(
                pool,
                started_at,
                "error",
                0,
                0,
                Some(&format!("{err:#}")),
            )
            .await;
            return Err(err.context("fetch stock events failed"));
        }
    };
    tracing::info!(fetched = events.len(), "fetched stock events from feed");

    let inserted = match storage::stocks::insert_batch(pool, &events).await {
        Ok(inserted) => inserted,
        Err(err) => {
            let _ = storage::sync_runs::record_sync_run(
                pool,
                started_at,
                "error",
                events.len() as i64,
                0,
                Some(&format!("{err:#}")),
            )
            .await;
            return Err(err.context("store stock events failed"));
        }
    };

    let run_id = storage::sync_runs::record_sync_run(
        pool,
        started_at,
        "success",
        events.len() as i64,
        inserted as i64,
        None,
    )
    .await?;

    tracing::info!(
        fetched = events.len(),
        inserted,
        %run_id,
        elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
        "stock sync completed"
    );

    Ok(SyncOutcome {
        fetched: events.len(),
        inserted,
        run_id,
    })
}
