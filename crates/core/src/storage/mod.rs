use anyhow::Context;

pub mod catalog;
pub mod lock;
pub mod stocks;
pub mod sync_runs;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
