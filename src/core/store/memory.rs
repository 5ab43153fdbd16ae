// src/core/store/memory.rs

//! An in-memory `Store` backend: a fixed number of shards, each an
//! `IndexMap` behind its own mutex, hashed into by key so unrelated keys
//! never contend on the same lock.

use super::Store;
use crate::core::clock::{Ordering as ClockOrdering, Versioned, VectorClock};
use crate::core::errors::RingError;
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;

const NUM_SHARDS: usize = 16;

type ShardMap = IndexMap<Bytes, Vec<Versioned<Bytes>>>;

/// A volatile, process-local store. Data does not survive a restart; this
/// is the backend used for the default inner store, the slop queue, and
/// tests.
pub struct MemoryStore {
    name: String,
    shards: Vec<Arc<Mutex<ShardMap>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| Arc::new(Mutex::new(IndexMap::new())))
            .collect();
        Self {
            name: name.into(),
            shards,
        }
    }

    fn shard_index(&self, key: &Bytes) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    fn shard(&self, key: &Bytes) -> &Arc<Mutex<ShardMap>> {
        &self.shards[self.shard_index(key)]
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &Bytes) -> Result<Vec<Versioned<Bytes>>, RingError> {
        let shard = self.shard(key).lock().await;
        Ok(shard.get(key).cloned().unwrap_or_default())
    }

    async fn put(&self, key: Bytes, value: Versioned<Bytes>) -> Result<(), RingError> {
        let shard_lock = self.shard(&key).clone();
        let mut shard = shard_lock.lock().await;
        let versions = shard.entry(key).or_default();

        for existing in versions.iter() {
            match existing.version.compare(&value.version) {
                ClockOrdering::After | ClockOrdering::Equal => {
                    return Err(RingError::ObsoleteVersion);
                }
                ClockOrdering::Before | ClockOrdering::Concurrently => {}
            }
        }

        versions.retain(|existing| {
            existing.version.compare(&value.version) != ClockOrdering::Before
        });
        versions.push(value);
        Ok(())
    }

    async fn delete(&self, key: &Bytes, version: &VectorClock) -> Result<bool, RingError> {
        let mut shard = self.shard(key).lock().await;
        let Some(versions) = shard.get_mut(key) else {
            return Ok(false);
        };
        let before_len = versions.len();
        versions.retain(|existing| {
            !matches!(
                existing.version.compare(version),
                ClockOrdering::Before | ClockOrdering::Equal
            )
        });
        Ok(versions.len() != before_len)
    }

    async fn entries(&self) -> Result<Vec<(Bytes, Vec<Versioned<Bytes>>)>, RingError> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().await;
            out.extend(shard.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(out)
    }

    async fn close(&self) -> Result<(), RingError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
