//! Lookup-table storage for actions, brokerages and rating terms. The
//! get-or-create helpers upsert on the unique name so callers always get an
//! id back, whether the row existed or not.

use crate::domain::catalog::{Action, Brokerage, Rating};
use anyhow::Context;
use sqlx::PgExecutor;

pub async fn get_or_create_action<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
) -> anyhow::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO actions (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET updated_at = now() \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(executor)
    .await
    .with_context(|| format!("get-or-create action {name:?} failed"))
}

pub async fn get_or_create_brokerage<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
) -> anyhow::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO brokerages (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET updated_at = now() \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(executor)
    .await
    .with_context(|| format!("get-or-create brokerage {name:?} failed"))
}

pub async fn get_or_create_rating<'e>(
    executor: impl PgExecutor<'e>,
    term: &str,
) -> anyhow::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO ratings (term) VALUES ($1) \
         ON CONFLICT (term) DO UPDATE SET updated_at = now() \
         RETURNING id",
    )
    .bind(term)
    .fetch_one(executor)
    .await
    .with_context(|| format!("get-or-create rating {term:?} failed"))
}

pub async fn list_actions(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Action>> {
    sqlx::query_as("SELECT id, name, created_at, updated_at FROM actions ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("query actions failed")
}

pub async fn find_action_by_id(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Action>> {
    sqlx::query_as("SELECT id, name, created_at, updated_at FROM actions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("query action id={id} failed"))
}

pub async fn list_brokerages(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Brokerage>> {
    sqlx::query_as("SELECT id, name, created_at, updated_at FROM brokerages ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("query brokerages failed")
}

pub async fn find_brokerage_by_id(
    pool: &sqlx::PgPool,
    id: i64,
) -> anyhow::Result<Option<Brokerage>> {
    sqlx::query_as("SELECT id, name, created_at, updated_at FROM brokerages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("query brokerage id={id} failed"))
}

pub async fn list_ratings(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Rating>> {
    sqlx::query_as("SELECT id, term, created_at, updated_at FROM ratings ORDER BY term ASC")
        .fetch_all(pool)
        .await
        .context("query ratings failed")
}

pub async fn find_rating_by_id(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Rating>> {
    sqlx::query_as("SELECT id, term, created_at, updated_at FROM ratings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("query rating id={id} failed"))
}
