use crate::store::{StoreError, UserStore};
use failsafe::backoff;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use utoipa::ToSchema;

/// Shared view of whether the durable backend is usable.
///
/// Owned by the fallback coordinator and read by the health endpoint. Starts
/// out unavailable until a probe succeeds.
#[derive(Debug, Default)]
pub struct BackendHealth {
    durable_available: AtomicBool,
    fallback_count: AtomicU64,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub durable_available: bool,
    pub fallback_count: u64,
    pub last_error: Option<String>,
}

impl BackendHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.durable_available.load(Ordering::SeqCst)
    }

    pub fn mark_available(&self) {
        if !self.durable_available.swap(true, Ordering::SeqCst) {
            tracing::info!("Durable store available");
        }
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Flips to memory-only mode until the next successful probe.
    pub fn mark_unavailable(&self, reason: &str) {
        if self.durable_available.swap(false, Ordering::SeqCst) {
            tracing::warn!("Durable store marked unavailable: {}", reason);
        }
        self.record_error(reason);
    }

    /// Counts one call served from memory instead of the durable store.
    pub fn record_fallback(&self, reason: &str) {
        self.fallback_count.fetch_add(1, Ordering::Relaxed);
        self.record_error(reason);
    }

    fn record_error(&self, reason: &str) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            durable_available: self.is_available(),
            fallback_count: self.fallback_count.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Connection retry policy for the durable store.
#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

/// Pings `store` up to `policy.attempts` times with a constant delay between
/// tries, updating `health` with the outcome.
pub async fn probe(store: &dyn UserStore, health: &BackendHealth, policy: ProbePolicy) -> bool {
    let mut delays = backoff::constant(policy.retry_delay);
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.timeout, store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "ping timed out after {:?}",
                policy.timeout
            ))),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Connected to {} store (attempt {}/{})",
                    store.name(),
                    attempt,
                    attempts
                );
                health.mark_available();
                return true;
            }
            Err(e) => {
                tracing::warn!(
                    "{} store connection attempt {}/{} failed: {}",
                    store.name(),
                    attempt,
                    attempts,
                    e
                );
                health.mark_unavailable(&e.to_string());
                if attempt < attempts {
                    if let Some(delay) = delays.next() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    tracing::error!(
        "{} store unreachable after {} attempts, serving from memory",
        store.name(),
        attempts
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreUpdate, UserRecord};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Fails the first `fail_times` pings.
    struct FlakyStore {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl UserStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn ping(&self) -> Result<(), StoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(StoreError::Unavailable("refused".into()))
            } else {
                Ok(())
            }
        }

        async fn find_user(&self, _id: &str) -> Result<Option<UserRecord>, StoreError> {
            Ok(None)
        }

        async fn save_user(&self, record: &UserRecord) -> Result<UserRecord, StoreError> {
            Ok(record.clone())
        }

        async fn apply_update(
            &self,
            id: &str,
            _update: &ScoreUpdate,
        ) -> Result<UserRecord, StoreError> {
            Ok(UserRecord::new(id))
        }

        async fn all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn policy(attempts: u32) -> ProbePolicy {
        ProbePolicy {
            attempts,
            retry_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_probe_retries_until_success() {
        let store = FlakyStore {
            fail_times: 2,
            calls: AtomicU32::new(0),
        };
        let health = BackendHealth::new();

        assert!(probe(&store, &health, policy(3)).await);
        assert!(health.is_available());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert!(health.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_probe_gives_up_after_attempts() {
        let store = FlakyStore {
            fail_times: 10,
            calls: AtomicU32::new(0),
        };
        let health = BackendHealth::new();

        assert!(!probe(&store, &health, policy(2)).await);
        assert!(!health.is_available());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert!(health.snapshot().last_error.is_some());
    }

    #[test]
    fn test_fallback_counter() {
        let health = BackendHealth::new();
        health.record_fallback("query failed");
        health.record_fallback("query failed");
        let snap = health.snapshot();
        assert_eq!(snap.fallback_count, 2);
        assert!(!snap.durable_available);
    }
}
