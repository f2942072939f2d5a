// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key mutual exclusion.
//!
//! Credential mutation is serialized per subject and dispatch per
//! idempotency key. There is no global lock: unrelated keys never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created async mutexes, one per key.
#[derive(Debug, Default, Clone)]
pub struct KeyedLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Guard held while a key is locked. Dropping it releases the key.
pub struct KeyGuard {
    key: String,
    locks: KeyedLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.inner
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits until `key` is free and locks it.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let guard = self.slot(key).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    /// Locks `key` only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        let guard = self.slot(key).try_lock_owned().ok()?;
        Some(KeyGuard {
            key: key.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        })
    }

    /// Number of keys with a live mutex entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Evict the entry when this was the last user, keeping the map
        // bounded by the number of keys currently in use.
        self.locks
            .inner
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
