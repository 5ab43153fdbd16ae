// src/core/admin/server.rs

//! Server-side dispatch for the admin protocol: validates each request
//! against the opcode table, mutates the metadata store, and streams
//! partition contents for the two transfer opcodes.
//!
//! Every opcode here is permitted regardless of `server.state`; only
//! regular client operations (the separate, out-of-scope client protocol)
//! are state-gated to NORMAL_STATE.

use super::protocol::{
    self, AdminRequest, ResponsePrelude, StreamEntry, pack_value_with_clock,
    unpack_value_with_clock,
};
use crate::core::clock::{NodeId, Versioned};
use crate::core::errors::RingError;
use crate::core::metadata::model::ServerState;
use crate::core::metadata::{CLUSTER_XML_KEY, MetadataStore, STORES_XML_KEY};
use crate::core::routing::partition::hash_to_partition;
use crate::core::store::Store;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

/// Owns the named store registry and a handle to the metadata store; one
/// instance is shared across all admin connections on a node.
pub struct AdminServer<S: Store> {
    local_node_id: NodeId,
    num_partitions: u16,
    metadata: Arc<MetadataStore<S>>,
    stores: Arc<DashMap<String, Arc<dyn Store>>>,
}

impl<S: Store> AdminServer<S> {
    pub fn new(
        local_node_id: NodeId,
        num_partitions: u16,
        metadata: Arc<MetadataStore<S>>,
        stores: Arc<DashMap<String, Arc<dyn Store>>>,
    ) -> Self {
        Self {
            local_node_id,
            num_partitions,
            metadata,
            stores,
        }
    }

    fn store(&self, name: &str) -> Result<Arc<dyn Store>, RingError> {
        self.stores
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| RingError::StoreNotFound(name.to_string()))
    }

    /// Serves admin requests off `io` until the peer disconnects.
    pub async fn serve<IO>(&self, io: &mut IO) -> Result<(), RingError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let req = match protocol::read_request(io).await {
                Ok(req) => req,
                Err(RingError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            self.dispatch(io, req).await?;
        }
    }

    async fn dispatch<IO>(&self, io: &mut IO, req: AdminRequest) -> Result<(), RingError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        match req {
            AdminRequest::UpdateClusterMetadata {
                metadata_key,
                cluster_xml,
            } => {
                let result = self.handle_update_cluster_metadata(&metadata_key, cluster_xml).await;
                self.respond_simple(io, result).await
            }
            AdminRequest::UpdateStoresMetadata { stores_xml } => {
                let result = self.handle_update_stores_metadata(stores_xml).await;
                self.respond_simple(io, result).await
            }
            AdminRequest::RebalancingServerMode => {
                let result = self
                    .metadata
                    .set_server_state(self.local_node_id, ServerState::Rebalancing)
                    .await;
                self.respond_simple(io, result).await
            }
            AdminRequest::NormalServerMode => {
                let result = self
                    .metadata
                    .set_server_state(self.local_node_id, ServerState::Normal)
                    .await;
                self.respond_simple(io, result).await
            }
            AdminRequest::RestartServices => {
                info!("admin: restart services requested (no-op for the storage plane)");
                self.respond_simple(io, Ok(())).await
            }
            AdminRequest::RedirectGet { store_name, key } => self.handle_redirect_get(io, &store_name, key).await,
            AdminRequest::GetPartitionAsStream {
                store_name,
                partition_ids,
            } => {
                self.handle_get_partition_as_stream(io, &store_name, &partition_ids)
                    .await
            }
            AdminRequest::PutPartitionAsStream { store_name } => {
                self.handle_put_partition_as_stream(io, &store_name).await
            }
        }
    }

    async fn respond_simple<IO>(&self, io: &mut IO, result: Result<(), RingError>) -> Result<(), RingError>
    where
        IO: AsyncWrite + Unpin,
    {
        let prelude = match &result {
            Ok(()) => ResponsePrelude::ok(),
            Err(e) => ResponsePrelude::from_error(e),
        };
        protocol::write_prelude(io, &prelude).await
    }

    async fn handle_update_cluster_metadata(
        &self,
        metadata_key: &str,
        cluster_xml: String,
    ) -> Result<(), RingError> {
        if metadata_key != CLUSTER_XML_KEY {
            return Err(RingError::UnknownMetadataKey(metadata_key.to_string()));
        }
        let version = self
            .metadata
            .get(CLUSTER_XML_KEY)
            .await?
            .first()
            .map(|v| v.version.increment(self.local_node_id))
            .unwrap_or_else(|| crate::core::clock::VectorClock::new().increment(self.local_node_id));
        self.metadata
            .put(CLUSTER_XML_KEY, Versioned::new(Bytes::from(cluster_xml), version))
            .await
    }

    async fn handle_update_stores_metadata(&self, stores_xml: String) -> Result<(), RingError> {
        let version = self
            .metadata
            .get(STORES_XML_KEY)
            .await?
            .first()
            .map(|v| v.version.increment(self.local_node_id))
            .unwrap_or_else(|| crate::core::clock::VectorClock::new().increment(self.local_node_id));
        self.metadata
            .put(STORES_XML_KEY, Versioned::new(Bytes::from(stores_xml), version))
            .await
    }

    async fn handle_redirect_get<IO>(
        &self,
        io: &mut IO,
        store_name: &str,
        key: Bytes,
    ) -> Result<(), RingError>
    where
        IO: AsyncWrite + Unpin,
    {
        let result = async {
            let store = self.store(store_name)?;
            let versions = store.get(&key).await?;
            Ok::<Vec<Bytes>, RingError>(
                versions
                    .into_iter()
                    .map(|v| pack_value_with_clock(&v.version, &v.value))
                    .collect(),
            )
        }
        .await;

        match result {
            Ok(entries) => {
                protocol::write_prelude(io, &ResponsePrelude::ok()).await?;
                protocol::write_redirect_get_response(io, &entries).await
            }
            Err(e) => protocol::write_prelude(io, &ResponsePrelude::from_error(&e)).await,
        }
    }

    async fn handle_get_partition_as_stream<IO>(
        &self,
        io: &mut IO,
        store_name: &str,
        partition_ids: &[u16],
    ) -> Result<(), RingError>
    where
        IO: AsyncWrite + Unpin,
    {
        let store = match self.store(store_name) {
            Ok(store) => store,
            Err(e) => return protocol::write_prelude(io, &ResponsePrelude::from_error(&e)).await,
        };

        let entries = match store.entries().await {
            Ok(entries) => entries,
            Err(e) => return protocol::write_prelude(io, &ResponsePrelude::from_error(&e)).await,
        };

        protocol::write_prelude(io, &ResponsePrelude::ok()).await?;

        let num_partitions = self.num_partitions;
        for (key, versions) in entries {
            let partition = hash_to_partition(&key, num_partitions);
            if !partition_ids.contains(&partition) {
                continue;
            }
            for versioned in versions {
                let value_with_clock = pack_value_with_clock(&versioned.version, &versioned.value);
                protocol::write_stream_entry(
                    io,
                    &StreamEntry {
                        key: key.clone(),
                        value_with_clock,
                    },
                )
                .await?;
            }
        }
        protocol::write_stream_end(io).await
    }

    async fn handle_put_partition_as_stream<IO>(&self, io: &mut IO, store_name: &str) -> Result<(), RingError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let store = match self.store(store_name) {
            Ok(store) => store,
            Err(e) => {
                // Drain the stream so the peer's writer doesn't block forever,
                // then report the failure.
                while protocol::read_stream_entry(io).await?.is_some() {}
                return protocol::write_prelude(io, &ResponsePrelude::from_error(&e)).await;
            }
        };

        let mut obsolete_count = 0u64;
        let result: Result<(), RingError> = async {
            while let Some(entry) = protocol::read_stream_entry(io).await? {
                let (clock, value) = unpack_value_with_clock(entry.value_with_clock)?;
                match store.put(entry.key, Versioned::new(value, clock)).await {
                    Ok(()) => {}
                    Err(RingError::ObsoleteVersion) => obsolete_count += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
        .await;

        if obsolete_count > 0 {
            warn!(obsolete_count, store = store_name, "partition transfer saw obsolete versions");
        }
        self.respond_simple(io, result).await
    }
}
