// src/core/store/mod.rs

//! The uniform byte-key/byte-value store interface every storage backend
//! (and the metadata and slop-detecting stores built atop it) implements.

pub mod memory;

use crate::core::clock::{Versioned, VectorClock};
use crate::core::errors::RingError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// A uniform get/put/delete/iterate interface over a byte-key, byte-value
/// store with vector-clock versioned values.
///
/// `put` semantics: if any existing version is AFTER or EQUAL to the
/// incoming one, fails with [`RingError::ObsoleteVersion`]. Versions that
/// are BEFORE the incoming one are replaced; versions CONCURRENT with it
/// are kept as siblings alongside the new value. `put` is atomic with
/// respect to concurrent readers of the same key.
#[async_trait]
pub trait Store: Send + Sync {
    /// All live versions of `key`, or an empty list if absent.
    async fn get(&self, key: &Bytes) -> Result<Vec<Versioned<Bytes>>, RingError>;

    /// `get` over many keys at once; keys with no entries are omitted.
    async fn get_all(
        &self,
        keys: &[Bytes],
    ) -> Result<HashMap<Bytes, Vec<Versioned<Bytes>>>, RingError> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let versions = self.get(key).await?;
            if !versions.is_empty() {
                out.insert(key.clone(), versions);
            }
        }
        Ok(out)
    }

    async fn put(&self, key: Bytes, value: Versioned<Bytes>) -> Result<(), RingError>;

    /// Removes all versions at `key` dominated by `version`. Returns `true`
    /// iff at least one version was removed.
    async fn delete(&self, key: &Bytes, version: &VectorClock) -> Result<bool, RingError>;

    /// A snapshot of every `(key, versions)` pair currently in the store.
    /// Backends that cannot enumerate their contents fail with
    /// [`RingError::NotSupported`].
    async fn entries(&self) -> Result<Vec<(Bytes, Vec<Versioned<Bytes>>)>, RingError>;

    async fn close(&self) -> Result<(), RingError>;

    fn name(&self) -> &str;
}
