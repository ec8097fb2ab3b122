use crate::models::{ScoreUpdate, UserRecord, WalletRollup};
use crate::store::{StoreError, UserStore};
use async_trait::async_trait;
use moka::future::Cache;

/// In-process user store.
///
/// Backed by a `moka` cache with no capacity bound or TTL so entries are never
/// evicted. Writes go through `entry().and_upsert_with`, which serializes
/// concurrent updates of the same key, so racing wallet updates cannot drop
/// each other.
#[derive(Clone)]
pub struct MemoryStore {
    users: Cache<String, UserRecord>,
    rollup: WalletRollup,
}

impl MemoryStore {
    pub fn new(rollup: WalletRollup) -> Self {
        Self {
            users: Cache::builder().build(),
            rollup,
        }
    }

    /// Overwrites the stored copy with an already-computed record.
    ///
    /// Used to mirror successful durable writes so a later failover starts warm.
    pub async fn replace(&self, record: UserRecord) {
        self.users.insert(record.id.clone(), record).await;
    }

    pub async fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.get(id).await
    }

    pub async fn upsert(&self, id: &str, update: &ScoreUpdate) -> UserRecord {
        let rollup = self.rollup;
        let update = update.clone();
        let key = id.to_string();

        self.users
            .entry(key.clone())
            .and_upsert_with(|existing| {
                let mut record = existing
                    .map(|entry| entry.into_value())
                    .unwrap_or_else(|| UserRecord::new(key));
                record.apply(&update, rollup);
                std::future::ready(record)
            })
            .await
            .into_value()
    }

    pub async fn merge(&self, incoming: &UserRecord) -> UserRecord {
        let rollup = self.rollup;
        let incoming = incoming.clone();

        self.users
            .entry(incoming.id.clone())
            .and_upsert_with(|existing| {
                let record = match existing {
                    Some(entry) => {
                        let mut record = entry.into_value();
                        record.merge(&incoming, rollup);
                        record
                    }
                    None => {
                        let mut record = incoming;
                        record.recompute(rollup);
                        record
                    }
                };
                std::future::ready(record)
            })
            .await
            .into_value()
    }

    pub fn snapshot(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.users.iter().map(|(_, record)| record).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.get(id).await)
    }

    async fn save_user(&self, record: &UserRecord) -> Result<UserRecord, StoreError> {
        Ok(self.merge(record).await)
    }

    async fn apply_update(
        &self,
        id: &str,
        update: &ScoreUpdate,
    ) -> Result<UserRecord, StoreError> {
        Ok(self.upsert(id, update).await)
    }

    async fn all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.snapshot())
    }
}
