//! Stock event persistence. Reads join the catalog tables back into flat
//! name fields; the list/count queries deduplicate to the latest event per
//! ticker so updated ratings don't surface twice.

use crate::domain::stock::{Stock, StockEvent, StockFilter};
use crate::storage::catalog;
use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;

const DEFAULT_INSERT_BATCH: usize = 200;

const STOCK_COLUMNS: &str = "s.id, s.ticker, s.company, \
     s.action_id, COALESCE(a.name, '') AS action, \
     s.brokerage_id, COALESCE(b.name, '') AS brokerage, \
     s.rating_from_id, COALESCE(rf.term, '') AS rating_from, \
     s.rating_to_id, COALESCE(rt.term, '') AS rating_to, \
     s.target_from, s.target_to, s.time, s.created_at, s.updated_at";

const STOCK_JOINS: &str = "FROM stocks s \
     LEFT JOIN actions a ON s.action_id = a.id \
     LEFT JOIN brokerages b ON s.brokerage_id = b.id \
     LEFT JOIN ratings rf ON s.rating_from_id = rf.id \
     LEFT JOIN ratings rt ON s.rating_to_id = rt.id";

fn latest_stocks_cte() -> String {
    format!(
        "WITH latest_stocks AS ( \
             SELECT DISTINCT ON (s.ticker) {STOCK_COLUMNS} {STOCK_JOINS} \
             ORDER BY s.ticker, s.time DESC \
         ) "
    )
}

/// Inserts feed events in transactional chunks, resolving catalog names to
/// ids on the way in (blank names become NULL foreign keys). Re-delivered
/// events are skipped via the (ticker, company, time) unique key; returns
/// the number of rows actually inserted.
pub async fn insert_batch(pool: &PgPool, events: &[StockEvent]) -> anyhow::Result<u64> {
    if events.is_empty() {
        return Ok(0);
    }

    let chunk_size: usize = std::env::var("STOCK_INSERT_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_INSERT_BATCH);
    anyhow::ensure!(chunk_size >= 1, "STOCK_INSERT_BATCH must be >= 1");

    // Catalog ids are cached across the whole call; feeds repeat the same
    // handful of actions, brokerages and rating terms thousands of times.
    let mut action_ids: HashMap<String, i64> = HashMap::new();
    let mut brokerage_ids: HashMap<String, i64> = HashMap::new();
    let mut rating_ids: HashMap<String, i64> = HashMap::new();

    let mut inserted: u64 = 0;
    let mut batch_idx: usize = 0;
    for chunk in events.chunks(chunk_size) {
        batch_idx += 1;
        let t0 = std::time::Instant::now();
        let mut tx = pool.begin().await.context("begin transaction failed")?;

        for event in chunk {
            let action_id = resolve_action(&mut tx, &mut action_ids, &event.action).await?;
            let brokerage_id =
                resolve_brokerage(&mut tx, &mut brokerage_ids, &event.brokerage).await?;
            let rating_from_id = resolve_rating(&mut tx, &mut rating_ids, &event.rating_from).await?;
            let rating_to_id = resolve_rating(&mut tx, &mut rating_ids, &event.rating_to).await?;

            let res = sqlx::query(
                "INSERT INTO stocks \
                     (ticker, company, target_from, target_to, \
                      action_id, brokerage_id, rating_from_id, rating_to_id, time) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (ticker, company, time) DO NOTHING",
            )
            .bind(event.ticker.trim())
            .bind(event.company.trim())
            .bind(&event.target_from)
            .bind(&event.target_to)
            .bind(action_id)
            .bind(brokerage_id)
            .bind(rating_from_id)
            .bind(rating_to_id)
            .bind(event.time)
            .execute(&mut *tx)
            .await
            .context("insert stock failed")?;

            inserted += res.rows_affected();
        }

        tx.commit().await.context("commit transaction failed")?;

        tracing::debug!(
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "stocks batch insert"
        );
    }

    Ok(inserted)
}

async fn resolve_action(
    tx: &mut Transaction<'_, Postgres>,
    cache: &mut HashMap<String, i64>,
    raw: &str,
) -> anyhow::Result<Option<i64>> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(id) = cache.get(name) {
        return Ok(Some(*id));
    }
    let id = catalog::get_or_create_action(&mut **tx, name).await?;
    cache.insert(name.to_string(), id);
    Ok(Some(id))
}

async fn resolve_brokerage(
    tx: &mut Transaction<'_, Postgres>,
    cache: &mut HashMap<String, i64>,
    raw: &str,
) -> anyhow::Result<Option<i64>> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(id) = cache.get(name) {
        return Ok(Some(*id));
    }
    let id = catalog::get_or_create_brokerage(&mut **tx, name).await?;
    cache.insert(name.to_string(), id);
    Ok(Some(id))
}

async fn resolve_rating(
    tx: &mut Transaction<'_, Postgres>,
    cache: &mut HashMap<String, i64>,
    raw: &str,
) -> anyhow::Result<Option<i64>> {
    let term = raw.trim();
    if term.is_empty() {
        return Ok(None);
    }
    if let Some(id) = cache.get(term) {
        return Ok(Some(*id));
    }
    let id = catalog::get_or_create_rating(&mut **tx, term).await?;
    cache.insert(term.to_string(), id);
    Ok(Some(id))
}

/// Latest event per ticker, filtered, sorted and paginated.
pub async fn find_all(pool: &PgPool, filter: &StockFilter) -> anyhow::Result<Vec<Stock>> {
    let mut qb = QueryBuilder::<Postgres>::new(latest_stocks_cte());
    qb.push(
        "SELECT id, ticker, company, action_id, action, brokerage_id, brokerage, \
             rating_from_id, rating_from, rating_to_id, rating_to, \
             target_from, target_to, time, created_at, updated_at \
         FROM latest_stocks WHERE 1=1",
    );
    push_filters(&mut qb, filter);

    qb.push(format!(
        " ORDER BY {} {}",
        sort_column(filter.sort_by.as_deref()),
        sort_direction(filter.sort_order.as_deref())
    ));

    if filter.limit > 0 {
        qb.push(" LIMIT ").push_bind(filter.limit);
    }
    if filter.offset > 0 {
        qb.push(" OFFSET ").push_bind(filter.offset);
    }

    qb.build_query_as::<Stock>()
        .persistent(false)
        .fetch_all(pool)
        .await
        .context("query stocks failed")
}

/// Number of unique tickers (latest event each) matching the filter.
pub async fn count(pool: &PgPool, filter: &StockFilter) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new(latest_stocks_cte());
    qb.push("SELECT COUNT(*) FROM latest_stocks WHERE 1=1");
    push_filters(&mut qb, filter);

    qb.build_query_scalar::<i64>()
        .persistent(false)
        .fetch_one(pool)
        .await
        .context("count stocks failed")
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> anyhow::Result<Option<Stock>> {
    let sql = format!("SELECT {STOCK_COLUMNS} {STOCK_JOINS} WHERE s.id = $1");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("query stock id={id} failed"))
}

/// All historical events for a ticker, newest first.
pub async fn find_by_ticker(pool: &PgPool, ticker: &str) -> anyhow::Result<Vec<Stock>> {
    let sql = format!("SELECT {STOCK_COLUMNS} {STOCK_JOINS} WHERE s.ticker = $1 ORDER BY s.time DESC");
    sqlx::query_as(&sql)
        .bind(ticker)
        .fetch_all(pool)
        .await
        .with_context(|| format!("query stocks for ticker {ticker:?} failed"))
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &StockFilter) {
    if let Some(ticker) = &filter.ticker {
        qb.push(" AND ticker = ").push_bind(ticker.clone());
    }
    if let Some(company) = &filter.company {
        // ILIKE for substring matches plus trigram similarity for typos.
        qb.push(" AND (company ILIKE ")
            .push_bind(format!("%{company}%"))
            .push(" OR company % ")
            .push_bind(company.clone())
            .push(")");
    }
    if let Some(brokerage) = &filter.brokerage {
        qb.push(" AND (brokerage ILIKE ")
            .push_bind(format!("%{brokerage}%"))
            .push(" OR brokerage % ")
            .push_bind(brokerage.clone())
            .push(")");
    }
    if let Some(action) = &filter.action {
        qb.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(rating_from) = &filter.rating_from {
        qb.push(" AND rating_from = ").push_bind(rating_from.clone());
    }
    if let Some(rating_to) = &filter.rating_to {
        qb.push(" AND rating_to = ").push_bind(rating_to.clone());
    }
}

// Sort input is whitelisted to column names; anything else falls back to
// time so user input never reaches the ORDER BY clause verbatim.
fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("ticker") => "ticker",
        Some("company") => "company",
        Some("action") => "action",
        Some("brokerage") => "brokerage",
        Some("rating_to") => "rating_to",
        Some("target_to") => "target_to",
        _ => "time",
    }
}

fn sort_direction(sort_order: Option<&str>) -> &'static str {
    match sort_order {
        Some("asc") | Some("ASC") => "ASC",
        _ => "DESC",
    }
}

#[cfg(test)]
mod tests {
    use super::{sort_column, sort_direction};

    #[test]
    fn sort_column_only_admits_whitelisted_fields() {
        assert_eq!(sort_column(Some("ticker")), "ticker");
        assert_eq!(sort_column(Some("target_to")), "target_to");
        assert_eq!(sort_column(Some("time")), "time");
        // Injection attempts and unknown fields fall back to time.
        assert_eq!(sort_column(Some("time; DROP TABLE stocks")), "time");
        assert_eq!(sort_column(Some("created_at")), "time");
        assert_eq!(sort_column(None), "time");
    }

    #[test]
    fn sort_direction_defaults_to_descending() {
        assert_eq!(sort_direction(Some("asc")), "ASC");
        assert_eq!(sort_direction(Some("ASC")), "ASC");
        assert_eq!(sort_direction(Some("desc")), "DESC");
        assert_eq!(sort_direction(Some("sideways")), "DESC");
        assert_eq!(sort_direction(None), "DESC");
    }
}
