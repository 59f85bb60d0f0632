//! In-process mutual exclusion keyed by id (job, section or document).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// A registry of async mutexes created on demand. Entries are dropped once
/// nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    registry: Registry,
}

/// Held while the keyed work runs. Releases on drop.
pub struct KeyGuard {
    key: String,
    registry: Registry,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = match self.registry.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Waits until the lock for `key` is free.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let guard = self.entry(key).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            registry: Arc::clone(&self.registry),
            guard: Some(guard),
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `wait`.
    pub async fn acquire_timeout(&self, key: &str, wait: Duration) -> Option<KeyGuard> {
        let mutex = self.entry(key);
        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Some(KeyGuard {
                key: key.to_string(),
                registry: Arc::clone(&self.registry),
                guard: Some(guard),
            }),
            Err(_) => {
                prune(&self.registry, key);
                None
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.registry.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes the entry for `key` when the registry holds the only reference.
fn prune(registry: &Registry, key: &str) {
    let mut map = match registry.lock() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    if map.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
        map.remove(key);
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.registry, &self.key);
    }
}
