//! Recomputes the derived fields of every persisted user record.
//!
//! Run after changing `WALLET_ROLLUP` or the badge bonus rules so stored
//! `walletScore`, `badges` and `totalScore` match the current policy.

use fomo_score::config::Config;
use fomo_score::db::{self, Database};
use fomo_score::db_storage::PgUserStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let db = Database::new(database_url).await?;
    db::ensure_schema(&db.pool).await?;
    tracing::info!(
        "Connected to database. Rescoring users with {:?} wallet rollup...",
        config.wallet_rollup
    );

    let store = PgUserStore::new(db.pool.clone(), config.wallet_rollup);
    let rescored = store.rescore_all().await?;

    tracing::info!("Rescore complete. Rewrote {} user records.", rescored);

    Ok(())
}
