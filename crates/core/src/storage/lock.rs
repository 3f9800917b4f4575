use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

// Advisory locks are scoped to the Postgres session, so acquire and release
// must happen on the same connection. The guard checks one out of the pool
// and holds it until released (or dropped, which closes the session and
// frees the lock server-side).
const SYNC_LOCK_KEY: i64 = 0x5354_4F43_4B53; // "STOCKS" as hex-ish namespace.

/// Holds the sync advisory lock together with the pooled connection that
/// owns it. Guards against concurrent feed syncs (worker run racing the API
/// sync endpoint, or two workers).
pub struct SyncLock {
    conn: PoolConnection<Postgres>,
}

/// Returns `None` when another session already holds the lock.
pub async fn try_acquire_sync_lock(pool: &PgPool) -> anyhow::Result<Option<SyncLock>> {
    let mut conn = pool
        .acquire()
        .await
        .context("failed to check out a connection for the sync lock")?;

    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(SYNC_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire sync advisory lock (key={SYNC_LOCK_KEY})"))?;

    Ok(acquired.0.then_some(SyncLock { conn }))
}

impl SyncLock {
    /// Unlocks on the same connection that acquired, then returns it to the
    /// pool.
    pub async fn release(mut self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(SYNC_LOCK_KEY)
            .execute(&mut *self.conn)
            .await
            .with_context(|| {
                format!("failed to release sync advisory lock (key={SYNC_LOCK_KEY})")
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SyncLock;

    #[test]
    fn release_consumes_the_lock() {
        // Compile-time contract: release takes the guard (and its
        // connection) by value, so the unlock cannot run on a different
        // pooled connection and a released lock cannot be reused.
        fn release_takes_ownership(
            lock: SyncLock,
        ) -> impl std::future::Future<Output = anyhow::Result<()>> {
            lock.release()
        }
        let _ = release_takes_ownership;
    }
}
