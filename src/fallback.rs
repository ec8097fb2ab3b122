use crate::errors::{require_user_id, AppError};
use crate::health::{self, BackendHealth, ProbePolicy};
use crate::memory_store::MemoryStore;
use crate::models::{ScoreUpdate, UserRecord, VeridaMetadata, WalletEntry};
use crate::store::{StoreError, UserStore};
use std::future::Future;
use std::sync::Arc;

/// Routes store operations to the durable backend while it is healthy and to
/// the in-memory backend otherwise.
///
/// - Connection-level failures (including timeouts) trigger a bounded
///   reconnect and one retry. If that fails, the durable backend stays
///   unavailable until [`FallbackCoordinator::reconnect`] succeeds.
/// - Query-level failures fall back to memory for that call only.
/// - Successful durable writes are mirrored into memory so a later failover
///   starts warm.
pub struct FallbackCoordinator {
    durable: Option<Arc<dyn UserStore>>,
    memory: MemoryStore,
    health: Arc<BackendHealth>,
    policy: ProbePolicy,
}

impl FallbackCoordinator {
    pub fn new(
        durable: Option<Arc<dyn UserStore>>,
        memory: MemoryStore,
        health: Arc<BackendHealth>,
        policy: ProbePolicy,
    ) -> Self {
        Self {
            durable,
            memory,
            health,
            policy,
        }
    }

    pub fn health(&self) -> &Arc<BackendHealth> {
        &self.health
    }

    /// Name of the backend the next operation will target.
    pub fn active_backend(&self) -> &'static str {
        match self.active_durable() {
            Some(store) => store.name(),
            None => self.memory.name(),
        }
    }

    fn active_durable(&self) -> Option<&Arc<dyn UserStore>> {
        self.durable.as_ref().filter(|_| self.health.is_available())
    }

    /// Runs `call` under the operation timeout, mapping a timeout to
    /// [`StoreError::Unavailable`].
    async fn timed<T, Fut>(&self, op: &str, call: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{} timed out after {:?}",
                op, self.policy.timeout
            ))),
        }
    }

    /// Runs one durable operation.
    ///
    /// A connection-level failure triggers a bounded reconnect of `store`; if
    /// it succeeds the operation is issued once more. Returns `None`
    /// when the caller should use memory instead.
    async fn attempt<T, F, Fut>(&self, store: &dyn UserStore, op: &str, call: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut error = match self.timed(op, call()).await {
            Ok(value) => return Some(value),
            Err(e) => e,
        };

        if error.is_connection_level() {
            tracing::warn!("{} lost {} store, reconnecting: {}", op, store.name(), error);
            if health::probe(store, &self.health, self.policy).await {
                match self.timed(op, call()).await {
                    Ok(value) => return Some(value),
                    Err(e) => error = e,
                }
            }
        }

        let reason = error.to_string();
        if error.is_connection_level() {
            self.health.mark_unavailable(&reason);
        }
        self.health.record_fallback(&reason);
        tracing::warn!("{} failed on durable store, using memory: {}", op, reason);
        None
    }

    pub async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        let id = require_user_id(Some(id))?;

        if let Some(store) = self.active_durable() {
            let call = || store.find_user(id);
            if let Some(found) = self.attempt(store.as_ref(), "find_user", call).await {
                return Ok(found);
            }
        }

        Ok(self.memory.get(id).await)
    }

    pub async fn save_user(&self, record: &UserRecord) -> Result<UserRecord, AppError> {
        require_user_id(Some(&record.id))?;

        if let Some(store) = self.active_durable() {
            let call = || store.save_user(record);
            if let Some(saved) = self.attempt(store.as_ref(), "save_user", call).await {
                self.memory.replace(saved.clone()).await;
                return Ok(saved);
            }
        }

        Ok(self.memory.merge(record).await)
    }

    /// Applies one atomic update to the user's record, creating it if needed.
    pub async fn apply_update(
        &self,
        id: &str,
        update: &ScoreUpdate,
    ) -> Result<UserRecord, AppError> {
        let id = require_user_id(Some(id))?;

        if let Some(store) = self.active_durable() {
            let call = || store.apply_update(id, update);
            if let Some(record) = self.attempt(store.as_ref(), "apply_update", call).await {
                self.memory.replace(record.clone()).await;
                tracing::debug!("Updated user {} on {}", id, store.name());
                return Ok(record);
            }
        }

        let record = self.memory.upsert(id, update).await;
        tracing::debug!("Updated user {} in memory", id);
        Ok(record)
    }

    pub async fn update_twitter_score(&self, id: &str, score: f64) -> Result<UserRecord, AppError> {
        self.apply_update(id, &ScoreUpdate::twitter_score(score)).await
    }

    pub async fn update_wallet_score(
        &self,
        id: &str,
        address: &str,
        score: f64,
        details: serde_json::Value,
    ) -> Result<UserRecord, AppError> {
        if address.trim().is_empty() {
            return Err(AppError::BadRequest("Wallet address is required".to_string()));
        }
        let entry = WalletEntry::new(address.trim(), score, details);
        self.apply_update(id, &ScoreUpdate::wallet(entry)).await
    }

    pub async fn update_verida_score(
        &self,
        id: &str,
        metadata: VeridaMetadata,
    ) -> Result<UserRecord, AppError> {
        self.apply_update(id, &ScoreUpdate::verida(metadata)).await
    }

    pub async fn update_fomo_score(&self, id: &str, score: f64) -> Result<UserRecord, AppError> {
        self.apply_update(id, &ScoreUpdate::fomo_score(score)).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<UserRecord>, AppError> {
        if let Some(store) = self.active_durable() {
            let call = || store.all_users();
            if let Some(users) = self.attempt(store.as_ref(), "get_all_users", call).await {
                return Ok(users);
            }
        }

        Ok(self.memory.snapshot())
    }

    /// Explicit reconnect attempt against the durable backend.
    ///
    /// Returns whether the durable backend is usable afterwards.
    pub async fn reconnect(&self) -> bool {
        match &self.durable {
            Some(store) => health::probe(store.as_ref(), &self.health, self.policy).await,
            None => {
                tracing::info!("No durable store configured, staying in memory mode");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WalletRollup;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
    use std::time::Duration;

    const HEALTHY: u8 = 0;
    const DOWN: u8 = 1;
    const QUERY_ERRORS: u8 = 2;
    const HANGING: u8 = 3;
    const FLAKY_ONCE: u8 = 4;

    /// Durable stand-in whose failure mode can be switched mid-test.
    struct ScriptedStore {
        inner: MemoryStore,
        mode: AtomicU8,
        calls: AtomicU32,
    }

    impl ScriptedStore {
        fn new(mode: u8) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(WalletRollup::Average),
                mode: AtomicU8::new(mode),
                calls: AtomicU32::new(0),
            })
        }

        fn set_mode(&self, mode: u8) {
            self.mode.store(mode, Ordering::SeqCst);
        }

        async fn gate(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode.load(Ordering::SeqCst) {
                DOWN => Err(StoreError::Unavailable("connection refused".into())),
                QUERY_ERRORS => Err(StoreError::Query("syntax error".into())),
                HANGING => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
                FLAKY_ONCE => {
                    self.set_mode(HEALTHY);
                    Err(StoreError::Unavailable("pool timed out".into()))
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl UserStore for ScriptedStore {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.gate().await
        }

        async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
            self.gate().await?;
            self.inner.find_user(id).await
        }

        async fn save_user(&self, record: &UserRecord) -> Result<UserRecord, StoreError> {
            self.gate().await?;
            self.inner.save_user(record).await
        }

        async fn apply_update(
            &self,
            id: &str,
            update: &ScoreUpdate,
        ) -> Result<UserRecord, StoreError> {
            self.gate().await?;
            self.inner.apply_update(id, update).await
        }

        async fn all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
            self.gate().await?;
            self.inner.all_users().await
        }
    }

    fn policy() -> ProbePolicy {
        ProbePolicy {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        }
    }

    async fn coordinator(durable: Arc<ScriptedStore>) -> FallbackCoordinator {
        let coordinator = FallbackCoordinator::new(
            Some(durable as Arc<dyn UserStore>),
            MemoryStore::new(WalletRollup::Average),
            Arc::new(BackendHealth::new()),
            policy(),
        );
        coordinator.reconnect().await;
        coordinator
    }

    #[tokio::test]
    async fn test_healthy_writes_are_mirrored_to_memory() {
        let durable = ScriptedStore::new(HEALTHY);
        let coordinator = coordinator(durable.clone()).await;
        assert_eq!(coordinator.active_backend(), "scripted");

        let record = coordinator.update_twitter_score("u1", 4.0).await.unwrap();
        assert_eq!(record.total_score, 4.0);
        assert!(durable.inner.get("u1").await.is_some());

        // Memory copy is warm: a later outage still serves the user.
        durable.set_mode(DOWN);
        let found = coordinator.find_user("u1").await.unwrap().unwrap();
        assert_eq!(found.twitter_score, 4.0);
        assert!(!coordinator.health().is_available());
        assert_eq!(coordinator.active_backend(), "memory");
    }

    #[tokio::test]
    async fn test_failed_startup_routes_everything_to_memory() {
        let durable = ScriptedStore::new(DOWN);
        let coordinator = coordinator(durable.clone()).await;
        assert!(!coordinator.health().is_available());
        assert_eq!(durable.calls.load(Ordering::SeqCst), 3);

        let mut record = UserRecord::new("u2");
        record.fomo_score = 3.0;
        let saved = coordinator.save_user(&record).await.unwrap();
        assert_eq!(saved.total_score, 3.0);

        let found = coordinator.find_user("u2").await.unwrap().unwrap();
        assert_eq!(found.fomo_score, 3.0);
        assert_eq!(coordinator.get_all_users().await.unwrap().len(), 1);

        // Standing unavailability: no per-call retries against durable.
        assert_eq!(durable.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_query_error_falls_back_once_without_flipping_health() {
        let durable = ScriptedStore::new(HEALTHY);
        let coordinator = coordinator(durable.clone()).await;

        durable.set_mode(QUERY_ERRORS);
        let record = coordinator.update_fomo_score("u3", 2.5).await.unwrap();
        assert_eq!(record.fomo_score, 2.5);
        assert!(coordinator.health().is_available());
        assert_eq!(coordinator.health().snapshot().fallback_count, 1);

        durable.set_mode(HEALTHY);
        coordinator.update_fomo_score("u3", 6.0).await.unwrap();
        assert_eq!(durable.inner.get("u3").await.unwrap().fomo_score, 6.0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_connection_failure() {
        let durable = ScriptedStore::new(HEALTHY);
        let coordinator = coordinator(durable.clone()).await;

        durable.set_mode(HANGING);
        let record = coordinator
            .update_wallet_score("u4", "0xAbC", 7.0, json!({"chains": 2}))
            .await
            .unwrap();
        assert_eq!(record.wallets.len(), 1);
        assert!(!coordinator.health().is_available());
    }

    #[tokio::test]
    async fn test_transient_connection_error_keeps_durable_routing() {
        let durable = ScriptedStore::new(HEALTHY);
        let coordinator = coordinator(durable.clone()).await;

        durable.set_mode(FLAKY_ONCE);
        for i in 0..6 {
            coordinator
                .update_twitter_score(&format!("u{}", i), 1.0)
                .await
                .unwrap();
        }

        for i in 0..6 {
            assert!(durable.inner.get(&format!("u{}", i)).await.is_some());
        }
        assert!(coordinator.health().is_available());
        assert_eq!(coordinator.active_backend(), "scripted");
        assert_eq!(coordinator.health().snapshot().fallback_count, 0);
    }

    #[tokio::test]
    async fn test_failed_reconnect_switches_to_memory() {
        let durable = ScriptedStore::new(HEALTHY);
        let coordinator = coordinator(durable.clone()).await;
        let before = durable.calls.load(Ordering::SeqCst);

        durable.set_mode(DOWN);
        coordinator.update_twitter_score("u8", 2.0).await.unwrap();

        // One failed write plus three reconnect attempts, no retry.
        assert_eq!(durable.calls.load(Ordering::SeqCst), before + 4);
        assert!(!coordinator.health().is_available());
        assert_eq!(coordinator.health().snapshot().fallback_count, 1);
        assert_eq!(coordinator.find_user("u8").await.unwrap().unwrap().twitter_score, 2.0);
    }

    #[tokio::test]
    async fn test_reconnect_restores_durable_routing() {
        let durable = ScriptedStore::new(DOWN);
        let coordinator = coordinator(durable.clone()).await;
        assert!(!coordinator.health().is_available());

        durable.set_mode(HEALTHY);
        assert!(coordinator.reconnect().await);

        coordinator.update_twitter_score("u5", 1.0).await.unwrap();
        assert!(durable.inner.get("u5").await.is_some());
    }

    #[tokio::test]
    async fn test_memory_only_without_durable() {
        let coordinator = FallbackCoordinator::new(
            None,
            MemoryStore::new(WalletRollup::Sum),
            Arc::new(BackendHealth::new()),
            policy(),
        );
        assert!(!coordinator.reconnect().await);

        coordinator
            .update_wallet_score("u6", "0x1", 3.0, json!({}))
            .await
            .unwrap();
        let record = coordinator
            .update_wallet_score("u6", "0X1", 4.0, json!({"v": 2}))
            .await
            .unwrap();
        assert_eq!(record.wallets.len(), 1);
        assert_eq!(record.wallet_score, 4.0);
    }

    #[tokio::test]
    async fn test_blank_id_is_rejected() {
        let coordinator = coordinator(ScriptedStore::new(HEALTHY)).await;
        let result = coordinator.update_twitter_score("  ", 1.0).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(matches!(
            coordinator.update_wallet_score("u7", "", 1.0, json!({})).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
