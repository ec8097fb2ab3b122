use crate::models::{
    AggregationMode, ScoreUpdate, TwitterSnapshot, UserRecord, VeridaMetadata, WalletEntry,
    WalletRollup,
};
use crate::store::{StoreError, UserStore};
use crate::db;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SELECT_COLUMNS: &str = r#"
    SELECT id, username, twitter_score, twitter, wallet_score, wallets, fomo_score,
           verida, mode, total_score, badges, created_at, updated_at
    FROM user_scores
"#;

/// Row shape of `user_scores`; nested data lives in JSONB columns.
#[derive(Debug, sqlx::FromRow)]
struct UserScoreRow {
    id: String,
    username: Option<String>,
    twitter_score: f64,
    twitter: Option<Json<TwitterSnapshot>>,
    wallet_score: f64,
    wallets: Json<Vec<WalletEntry>>,
    fomo_score: f64,
    verida: Option<Json<VeridaMetadata>>,
    mode: String,
    total_score: f64,
    badges: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserScoreRow> for UserRecord {
    fn from(row: UserScoreRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            twitter_score: row.twitter_score,
            twitter: row.twitter.map(|j| j.0),
            wallet_score: row.wallet_score,
            wallets: row.wallets.0,
            fomo_score: row.fomo_score,
            verida: row.verida.map(|j| j.0),
            mode: AggregationMode::parse(&row.mode),
            total_score: row.total_score,
            badges: row.badges.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed user score storage.
///
/// Each mutation runs in one transaction: the row is created if missing,
/// locked with `FOR UPDATE`, updated in Rust, and written back. Dropping the
/// future before commit rolls the whole write back.
///
/// The first successful ping also creates the `user_scores` table, so a
/// database that was down at startup is bootstrapped on reconnect.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    rollup: WalletRollup,
    schema_ready: Arc<AtomicBool>,
}

impl PgUserStore {
    pub fn new(pool: PgPool, rollup: WalletRollup) -> Self {
        Self {
            pool,
            rollup,
            schema_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Locks (creating if needed) the user's row and returns its current record.
    async fn lock_record(conn: &mut PgConnection, id: &str) -> Result<UserRecord, sqlx::Error> {
        sqlx::query("INSERT INTO user_scores (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let row: UserScoreRow =
            sqlx::query_as(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_COLUMNS))
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(row.into())
    }

    async fn write_record(conn: &mut PgConnection, record: &UserRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_scores
            SET username = $2,
                twitter_score = $3,
                twitter = $4,
                wallet_score = $5,
                wallets = $6,
                fomo_score = $7,
                verida = $8,
                mode = $9,
                total_score = $10,
                badges = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(&record.id)
        .bind(&record.username)
        .bind(record.twitter_score)
        .bind(record.twitter.as_ref().map(Json))
        .bind(record.wallet_score)
        .bind(Json(&record.wallets))
        .bind(record.fomo_score)
        .bind(record.verida.as_ref().map(Json))
        .bind(record.mode.as_str())
        .bind(record.total_score)
        .bind(Json(&record.badges))
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Recomputes derived fields of every stored record and writes them back.
    ///
    /// Returns the number of records rewritten.
    pub async fn rescore_all(&self) -> Result<usize, StoreError> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM user_scores ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        for (id,) in &ids {
            let mut tx = self.pool.begin().await?;
            let mut record = Self::lock_record(&mut tx, id).await?;
            record.recompute(self.rollup);
            Self::write_record(&mut tx, &record).await?;
            tx.commit().await?;
        }

        Ok(ids.len())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        if !self.schema_ready.load(Ordering::Acquire) {
            db::ensure_schema(&self.pool).await?;
            self.schema_ready.store(true, Ordering::Release);
            tracing::info!("user_scores schema ensured");
        }
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserScoreRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn save_user(&self, incoming: &UserRecord) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::lock_record(&mut tx, &incoming.id).await?;
        record.merge(incoming, self.rollup);
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::debug!("Saved user {} to postgres", record.id);
        Ok(record)
    }

    async fn apply_update(
        &self,
        id: &str,
        update: &ScoreUpdate,
    ) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::lock_record(&mut tx, id).await?;
        record.apply(update, self.rollup);
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows: Vec<UserScoreRow> = sqlx::query_as(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}
