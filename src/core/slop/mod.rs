// src/core/slop/mod.rs

//! Ownership-checking store wrapper: writes for keys this node does not own
//! are diverted into a local slop queue instead of the underlying store, so
//! they are not lost during a topology change.

use crate::core::clock::{Versioned, VectorClock};
use crate::core::errors::RingError;
use crate::core::metadata::model::NodeId;
use crate::core::routing::RoutingStrategy;
use crate::core::store::Store;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The operation a slop record is standing in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopOp {
    Put,
    Delete,
}

/// A misrouted write, parked locally until a rebalance or slop-pusher job
/// (out of scope here) drains it to its rightful owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopRecord {
    pub store_name: String,
    pub op: SlopOp,
    pub key: Bytes,
    pub value: Option<Bytes>,
    pub originating_node_id: NodeId,
    pub arrival_time_ms: u64,
}

impl SlopRecord {
    /// The deterministic slop-store key for `(storeName, originatingNodeId,
    /// op, key)`, so re-insertion of the same misrouted write is idempotent.
    pub fn slop_key(store_name: &str, originating_node_id: NodeId, op: SlopOp, key: &Bytes) -> Bytes {
        let mut buf = BytesMut::with_capacity(store_name.len() + key.len() + 8);
        buf.put_u16(store_name.len() as u16);
        buf.put_slice(store_name.as_bytes());
        buf.put_u16(originating_node_id);
        buf.put_u8(match op {
            SlopOp::Put => 0,
            SlopOp::Delete => 1,
        });
        buf.put_slice(key);
        buf.freeze()
    }

    pub fn key(&self) -> Bytes {
        Self::slop_key(&self.store_name, self.originating_node_id, self.op, &self.key)
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(match self.op {
            SlopOp::Put => 0,
            SlopOp::Delete => 1,
        });
        match &self.value {
            Some(v) => {
                buf.put_i32(v.len() as i32);
                buf.put_slice(v);
            }
            None => buf.put_i32(-1),
        }
        buf.put_u16(self.originating_node_id);
        buf.put_u64(self.arrival_time_ms);
        buf.freeze()
    }

    pub fn from_bytes(store_name: &str, key: Bytes, mut src: impl Buf) -> Result<Self, RingError> {
        if src.remaining() < 1 {
            return Err(RingError::InvalidRequest("truncated slop record".into()));
        }
        let op = match src.get_u8() {
            0 => SlopOp::Put,
            1 => SlopOp::Delete,
            other => {
                return Err(RingError::InvalidRequest(format!(
                    "unknown slop op byte {other}"
                )));
            }
        };
        if src.remaining() < 4 {
            return Err(RingError::InvalidRequest("truncated slop value len".into()));
        }
        let len = src.get_i32();
        let value = if len < 0 {
            None
        } else {
            if src.remaining() < len as usize {
                return Err(RingError::InvalidRequest("truncated slop value".into()));
            }
            Some(src.copy_to_bytes(len as usize))
        };
        if src.remaining() < 10 {
            return Err(RingError::InvalidRequest(
                "truncated slop node id/timestamp".into(),
            ));
        }
        let originating_node_id = src.get_u16();
        let arrival_time_ms = src.get_u64();
        Ok(Self {
            store_name: store_name.to_string(),
            op,
            key,
            value,
            originating_node_id,
            arrival_time_ms,
        })
    }
}

/// Wraps an inner store and a slop store. Every `put`/`delete` first checks
/// whether `local_node_id` is in the key's preference list; if not, the op
/// is diverted to the slop store instead of the inner store.
pub struct SlopDetectingStore<I: Store, Sl: Store, R: RoutingStrategy> {
    store_name: String,
    inner: I,
    slop: Sl,
    routing: R,
    local_node_id: NodeId,
    replication_factor: u8,
}

impl<I: Store, Sl: Store, R: RoutingStrategy> SlopDetectingStore<I, Sl, R> {
    pub fn new(
        store_name: impl Into<String>,
        inner: I,
        slop: Sl,
        routing: R,
        local_node_id: NodeId,
        replication_factor: u8,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            inner,
            slop,
            routing,
            local_node_id,
            replication_factor,
        }
    }

    fn owns(&self, key: &[u8]) -> bool {
        self.routing
            .route(key, self.replication_factor)
            .contains(&self.local_node_id)
    }

    async fn divert(&self, op: SlopOp, key: Bytes, value: Option<Bytes>, version: VectorClock) -> Result<(), RingError> {
        let record = SlopRecord {
            store_name: self.store_name.clone(),
            op,
            key,
            value,
            originating_node_id: self.local_node_id,
            arrival_time_ms: VectorClock::new().timestamp_ms(),
        };
        let slop_key = record.key();
        self.slop
            .put(slop_key, Versioned::new(record.to_bytes(), version))
            .await
    }

    /// `get` always reads the inner store directly; slop is not readable
    /// via the normal key namespace.
    pub async fn get(&self, key: &Bytes) -> Result<Vec<Versioned<Bytes>>, RingError> {
        self.inner.get(key).await
    }

    pub async fn put(&self, key: Bytes, value: Versioned<Bytes>) -> Result<(), RingError> {
        if self.owns(&key) {
            self.inner.put(key, value).await
        } else {
            let version = value.version.clone();
            self.divert(SlopOp::Put, key, Some(value.value), version).await
        }
    }

    pub async fn delete(&self, key: &Bytes, version: &VectorClock) -> Result<bool, RingError> {
        if self.owns(key) {
            self.inner.delete(key, version).await
        } else {
            self.divert(SlopOp::Delete, key.clone(), None, version.clone())
                .await?;
            Ok(false)
        }
    }
}

#[async_trait]
impl<I: Store, Sl: Store, R: RoutingStrategy> Store for SlopDetectingStore<I, Sl, R> {
    async fn get(&self, key: &Bytes) -> Result<Vec<Versioned<Bytes>>, RingError> {
        SlopDetectingStore::get(self, key).await
    }

    async fn put(&self, key: Bytes, value: Versioned<Bytes>) -> Result<(), RingError> {
        SlopDetectingStore::put(self, key, value).await
    }

    async fn delete(&self, key: &Bytes, version: &VectorClock) -> Result<bool, RingError> {
        SlopDetectingStore::delete(self, key, version).await
    }

    async fn entries(&self) -> Result<Vec<(Bytes, Vec<Versioned<Bytes>>)>, RingError> {
        self.inner.entries().await
    }

    async fn close(&self) -> Result<(), RingError> {
        self.inner.close().await?;
        self.slop.close().await
    }

    fn name(&self) -> &str {
        &self.store_name
    }
}
