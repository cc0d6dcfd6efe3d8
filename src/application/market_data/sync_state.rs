//! Tracks how far market-data ingestion has progressed per symbol/
//! timeframe/source, and guards against two syncs running concurrently for
//! the same key.

use crate::domain::market::timeframe::Timeframe;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub source: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncStateError {
    #[error("sync already in progress for {symbol}/{timeframe}/{source}")]
    AlreadySyncing {
        symbol: String,
        timeframe: Timeframe,
        source: String,
    },
}

#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn get_cursor(&self, key: &SyncKey) -> Option<i64>;
    async fn set_cursor(&self, key: &SyncKey, last_synced_timestamp: i64);
}

pub struct InMemorySyncStateRepository {
    cursors: RwLock<HashMap<SyncKey, i64>>,
}

impl InMemorySyncStateRepository {
    pub fn new() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySyncStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncStateRepository for InMemorySyncStateRepository {
    async fn get_cursor(&self, key: &SyncKey) -> Option<i64> {
        self.cursors.read().unwrap().get(key).copied()
    }

    async fn set_cursor(&self, key: &SyncKey, last_synced_timestamp: i64) {
        self.cursors
            .write()
            .unwrap()
            .insert(key.clone(), last_synced_timestamp);
    }
}

/// In-process mutual exclusion for sync keys, separate from the persisted
/// cursor so a crashed process doesn't leave a key permanently locked.
#[derive(Default)]
pub struct SyncGuard {
    in_flight: RwLock<HashSet<SyncKey>>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, key: SyncKey) -> Result<SyncLease<'_>, SyncStateError> {
        let mut in_flight = self.in_flight.write().unwrap();
        if !in_flight.insert(key.clone()) {
            return Err(SyncStateError::AlreadySyncing {
                symbol: key.symbol,
                timeframe: key.timeframe,
                source: key.source,
            });
        }
        Ok(SyncLease { guard: self, key })
    }
}

pub struct SyncLease<'a> {
    guard: &'a SyncGuard,
    key: SyncKey,
}

impl Drop for SyncLease<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.write().unwrap().remove(&self.key);
    }
}
