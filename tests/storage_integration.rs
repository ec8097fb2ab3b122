use serde_json::json;
use std::env;
use uuid::Uuid;

use fomo_score::data::db_storage::PgUserStore;
use fomo_score::db::{self, Database};
use fomo_score::models::{ScoreUpdate, UserRecord, WalletEntry, WalletRollup};
use fomo_score::store::UserStore;

async fn connect() -> anyhow::Result<PgUserStore> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db::ensure_schema(&db.pool).await?;
    Ok(PgUserStore::new(db.pool.clone(), WalletRollup::Sum))
}

/// Round trip through the Postgres store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn user_record_round_trip() -> anyhow::Result<()> {
    let store = connect().await?;
    store.ping().await?;

    // Unique id to avoid conflicts on repeated runs.
    let id = format!("test-{}", Uuid::new_v4());

    assert!(store.find_user(&id).await?.is_none());

    let mut record = UserRecord::new(&id);
    record.username = Some("round-trip".to_string());
    record.twitter_score = 3.0;
    let saved = store.save_user(&record).await?;
    assert_eq!(saved.total_score, 3.0);

    let found = store
        .find_user(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record not found"))?;
    assert_eq!(found.username.as_deref(), Some("round-trip"));
    assert_eq!(found.twitter_score, 3.0);
    assert_eq!(found.created_at, saved.created_at);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn wallet_updates_upsert_by_address() -> anyhow::Result<()> {
    let store = connect().await?;
    let id = format!("test-{}", Uuid::new_v4());

    store
        .apply_update(
            &id,
            &ScoreUpdate::wallet(WalletEntry::new("0xABC", 2.0, json!({"chain": "eth"}))),
        )
        .await?;
    let updated = store
        .apply_update(
            &id,
            &ScoreUpdate::wallet(WalletEntry::new("0xabc", 4.0, json!({"chain": "base"}))),
        )
        .await?;
    assert_eq!(updated.wallets.len(), 1);
    assert_eq!(updated.wallet_score, 4.0);

    let updated = store
        .apply_update(&id, &ScoreUpdate::wallet(WalletEntry::new("0xdef", 1.0, json!(null))))
        .await?;
    assert_eq!(updated.wallets.len(), 2);
    assert_eq!(updated.wallet_score, 5.0);

    let all = store.all_users().await?;
    assert!(all.iter().any(|u| u.id == id));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn concurrent_updates_do_not_lose_wallets() -> anyhow::Result<()> {
    let store = std::sync::Arc::new(connect().await?);
    let id = format!("test-{}", Uuid::new_v4());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store
                .apply_update(
                    &id,
                    &ScoreUpdate::wallet(WalletEntry::new(format!("0x{}", i), 1.0, json!(null))),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let record = store
        .find_user(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record not found"))?;
    assert_eq!(record.wallets.len(), 8);
    assert_eq!(record.wallet_score, 8.0);

    Ok(())
}
