use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockrank_core::ingest::client::{HttpStockFeed, StockFeed};

#[derive(Debug, Parser)]
#[command(name = "stockrank_worker")]
struct Args {
    /// Fetch the feed and report what would be stored, without writing to
    /// the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockrank_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let feed = HttpStockFeed::from_settings(&settings)?;

    if args.dry_run {
        let events = feed.fetch_all_events().await?;
        tracing::info!(
            dry_run = true,
            fetched = events.len(),
            "dry run: fetched stock events, skipping database writes"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockrank_core::storage::migrate(&pool).await?;

    let Some(lock) = stockrank_core::storage::lock::try_acquire_sync_lock(&pool).await? else {
        tracing::warn!("sync lock not acquired; another sync in progress");
        return Ok(());
    };

    let result = stockrank_core::ingest::sync_stock_events(&pool, &feed).await;

    match &result {
        Ok(outcome) => {
            tracing::info!(
                fetched = outcome.fetched,
                inserted = outcome.inserted,
                run_id = %outcome.run_id,
                "stock sync run finished"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(error = %err, "stock sync run failed");
        }
    }

    if let Err(err) = lock.release().await {
        tracing::warn!(error = %err, "failed to release sync lock");
    }

    result.map(|_| ())
}

fn init_sentry(settings: &stockrank_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
