// src/core/metadata/mod.rs

//! Versioned, validated persistence of cluster topology, store definitions,
//! and server lifecycle state, built atop a small inner key/value store.

pub mod model;
pub mod xml;

use crate::core::clock::{Ordering as ClockOrdering, Versioned, VectorClock};
use crate::core::errors::RingError;
use crate::core::store::Store;
use bytes::Bytes;
use model::{Cluster, ServerState, StoreDefinition};
use tokio::sync::Mutex as AsyncMutex;

pub const CLUSTER_XML_KEY: &str = "cluster.xml";
pub const STORES_XML_KEY: &str = "stores.xml";
pub const SERVER_STATE_KEY: &str = "server.state";
pub const OLD_CLUSTER_XML_KEY: &str = "old.cluster.xml";

/// Wraps an inner [`Store`] with the reserved-key invariants spec'd for
/// cluster metadata: single-writer critical section on `put`, no `delete`,
/// no `entries`, and monotonic versioning of `stores.xml`.
pub struct MetadataStore<S: Store> {
    inner: S,
    /// Serializes every `put` across the entire metadata store, matching
    /// the "one put proceeds at a time" critical-section requirement.
    write_lock: AsyncMutex<()>,
}

impl<S: Store> MetadataStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            write_lock: AsyncMutex::new(()),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Vec<Versioned<Bytes>>, RingError> {
        self.inner.get(&Bytes::copy_from_slice(key.as_bytes())).await
    }

    /// Decodes `key`/`value` as UTF-8, applies the reserved-key invariants,
    /// and persists via the inner store. Only one `put` proceeds at a time.
    pub async fn put(&self, key: &str, value: Versioned<Bytes>) -> Result<(), RingError> {
        let _guard = self.write_lock.lock().await;

        if !matches!(
            key,
            CLUSTER_XML_KEY | STORES_XML_KEY | SERVER_STATE_KEY | OLD_CLUSTER_XML_KEY
        ) {
            return Err(RingError::UnknownMetadataKey(key.to_string()));
        }

        String::from_utf8(value.value.to_vec())?;

        if key == STORES_XML_KEY {
            let existing = self
                .inner
                .get(&Bytes::copy_from_slice(key.as_bytes()))
                .await?;
            match existing.len() {
                0 => {}
                1 => {
                    let ordering = existing[0].version.compare(&value.version);
                    if !matches!(ordering, ClockOrdering::Before) {
                        return Err(RingError::ObsoleteVersion);
                    }
                }
                _ => {
                    return Err(RingError::InconsistentMetadata(format!(
                        "{key} has more than one current version"
                    )));
                }
            }
        }

        self.inner
            .put(Bytes::copy_from_slice(key.as_bytes()), value)
            .await
    }

    pub async fn delete(&self, _key: &str, _version: &VectorClock) -> Result<bool, RingError> {
        Err(RingError::PermissionDenied(
            "metadata is not deletable".into(),
        ))
    }

    pub async fn entries(&self) -> Result<Vec<(Bytes, Vec<Versioned<Bytes>>)>, RingError> {
        Err(RingError::NotSupported("metadata store has no entries()".into()))
    }

    /// Parses `cluster.xml`, expecting exactly one current version.
    pub async fn get_cluster(&self) -> Result<Cluster, RingError> {
        let versions = self.get(CLUSTER_XML_KEY).await?;
        let xml = single_version_str(CLUSTER_XML_KEY, &versions)?;
        xml::cluster_from_xml(&xml)
    }

    /// Parses `stores.xml` into its list of store definitions.
    pub async fn get_stores(&self) -> Result<Vec<StoreDefinition>, RingError> {
        let versions = self.get(STORES_XML_KEY).await?;
        let xml = single_version_str(STORES_XML_KEY, &versions)?;
        xml::stores_from_xml(&xml)
    }

    pub async fn get_store(&self, name: &str) -> Result<StoreDefinition, RingError> {
        self.get_stores()
            .await?
            .into_iter()
            .find(|def| def.name == name)
            .ok_or_else(|| RingError::StoreNotFound(name.to_string()))
    }

    /// The current `server.state`, defaulting to `NORMAL_STATE` if absent.
    pub async fn get_server_state(&self) -> Result<ServerState, RingError> {
        let versions = self.get(SERVER_STATE_KEY).await?;
        if versions.is_empty() {
            return Ok(ServerState::Normal);
        }
        let text = single_version_str(SERVER_STATE_KEY, &versions)?;
        ServerState::parse(&text).ok_or_else(|| {
            RingError::InconsistentMetadata(format!("unrecognized server.state value: {text}"))
        })
    }

    /// Advances `server.state`, bumping the vector clock on top of whatever
    /// is currently stored (or a fresh clock if absent).
    pub async fn set_server_state(&self, node_id: u16, state: ServerState) -> Result<(), RingError> {
        let versions = self.get(SERVER_STATE_KEY).await?;
        let version = versions
            .first()
            .map(|v| v.version.increment(node_id))
            .unwrap_or_else(|| VectorClock::new().increment(node_id));
        self.put(
            SERVER_STATE_KEY,
            Versioned::new(Bytes::from(state.as_wire_str()), version),
        )
        .await
    }
}

fn single_version_str(key: &str, versions: &[Versioned<Bytes>]) -> Result<String, RingError> {
    match versions.len() {
        1 => Ok(String::from_utf8(versions[0].value.to_vec())?),
        0 => Err(RingError::InconsistentMetadata(format!("{key} is absent"))),
        _ => Err(RingError::InconsistentMetadata(format!(
            "{key} has more than one current version"
        ))),
    }
}
