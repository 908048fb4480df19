use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::Storage;

/// Bounded-attempt strategy used at startup and when a disconnected store is
/// touched on demand.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("document store unavailable: {reason}")]
pub struct StoreUnavailable {
    pub reason: String,
}

/// Explicit "is the store connected" state, shared by everything that reads or
/// writes through the store.
pub struct StoreConnection {
    database_url: Option<String>,
    policy: ReconnectPolicy,
    storage: RwLock<Option<Storage>>,
    reconnecting: Mutex<()>,
}

impl StoreConnection {
    /// Runs the startup reconnect strategy. Never fails: when every attempt is
    /// exhausted the connection starts out disconnected.
    pub async fn connect(database_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let connection = Self::disconnected(database_url, policy);
        connection.reconnect_with_attempts(policy.attempts.max(1)).await;
        connection
    }

    pub fn disconnected(database_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            database_url: Some(database_url.into()),
            policy,
            storage: RwLock::new(None),
            reconnecting: Mutex::new(()),
        }
    }

    /// Wraps an already opened store. There is nothing to reconnect to if it is lost.
    pub fn from_storage(storage: Storage) -> Self {
        Self {
            database_url: None,
            policy: ReconnectPolicy::default(),
            storage: RwLock::new(Some(storage)),
            reconnecting: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Returns the live store, making one on-demand reconnect attempt while disconnected.
    pub async fn storage(&self) -> Result<Storage, StoreUnavailable> {
        if let Some(storage) = self.storage.read().await.as_ref() {
            return Ok(storage.clone());
        }

        if self.reconnect_with_attempts(1).await {
            if let Some(storage) = self.storage.read().await.as_ref() {
                return Ok(storage.clone());
            }
        }

        Err(StoreUnavailable {
            reason: "no connection to the document store".to_string(),
        })
    }

    /// Cheap liveness check; does not trigger a reconnect.
    pub async fn is_connected(&self) -> bool {
        let storage = self.storage.read().await.clone();
        match storage {
            Some(storage) => storage.health_check().await.is_ok(),
            None => false,
        }
    }

    /// Runs the full reconnect strategy on demand. Returns whether a store is live afterwards.
    pub async fn reconnect(&self) -> bool {
        self.reconnect_with_attempts(self.policy.attempts.max(1))
            .await
    }

    async fn reconnect_with_attempts(&self, attempts: u32) -> bool {
        let Some(database_url) = self.database_url.as_deref() else {
            return self.storage.read().await.is_some();
        };

        // Another task is already reconnecting; don't pile on.
        let Ok(_guard) = self.reconnecting.try_lock() else {
            return false;
        };

        if self.storage.read().await.is_some() {
            return true;
        }

        for attempt in 1..=attempts {
            match Storage::with_timeout(database_url, self.policy.timeout).await {
                Ok(storage) => {
                    info!(%database_url, attempt, "connected to document store");
                    *self.storage.write().await = Some(storage);
                    return true;
                }
                Err(error) => {
                    warn!(%database_url, attempt, attempts, %error, "document store connection attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
