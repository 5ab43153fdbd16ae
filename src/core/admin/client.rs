// src/core/admin/client.rs

//! Invokes remote admin operations and orchestrates the rebalance
//! choreography. Holds a read-only handle to the metadata store (for
//! resolving peer addresses and the current topology) and a shared socket
//! pool; never mutates the metadata store directly except through its own
//! remote calls back to itself.

use super::protocol::{self, AdminRequest, unpack_value_with_clock};
use super::socket_pool::SocketPool;
use crate::core::clock::{NodeId, Versioned, VectorClock};
use crate::core::errors::RingError;
use crate::core::metadata::model::{Cluster, StoreDefinition};
use crate::core::metadata::xml;
use crate::core::metadata::{CLUSTER_XML_KEY, MetadataStore};
use crate::core::store::Store;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub struct AdminClient<S: Store> {
    local_node_id: NodeId,
    metadata: Arc<MetadataStore<S>>,
    pool: Arc<SocketPool>,
}

impl<S: Store> AdminClient<S> {
    pub fn new(local_node_id: NodeId, metadata: Arc<MetadataStore<S>>, pool: Arc<SocketPool>) -> Self {
        Self {
            local_node_id,
            metadata,
            pool,
        }
    }

    /// Wraps a single admin-protocol read in the pool's configured socket
    /// read timeout, turning a stalled peer into `RingError::Timeout`
    /// instead of hanging the caller indefinitely.
    async fn with_socket_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, RingError>>,
    ) -> Result<T, RingError> {
        tokio::time::timeout(self.pool.socket_timeout(), fut)
            .await
            .map_err(|_| RingError::Timeout("admin socket read".into()))?
    }

    async fn addr_for(&self, node_id: NodeId) -> Result<SocketAddr, RingError> {
        let cluster = self.metadata.get_cluster().await?;
        let node = cluster.nodes.get(&node_id).ok_or_else(|| {
            RingError::InconsistentMetadata(format!("no such node id {node_id}"))
        })?;
        format!("{}:{}", node.host, node.admin_port)
            .parse()
            .map_err(|e| RingError::Internal(format!("bad admin address for node {node_id}: {e}")))
    }

    /// Sends a request that expects no success payload, returning once the
    /// response prelude confirms `retCode == 0`.
    async fn call_simple(&self, node_id: NodeId, req: AdminRequest) -> Result<(), RingError> {
        let addr = self.addr_for(node_id).await?;
        let mut conn = self.pool.check_out(addr).await?;
        let result = async {
            protocol::write_request(&mut conn.stream, &req).await?;
            self.with_socket_timeout(protocol::read_prelude(&mut conn.stream))
                .await?
                .into_result()
        }
        .await;
        match result {
            Ok(()) => {
                self.pool.check_in(conn);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_cluster_meta_data(
        &self,
        target_node_id: NodeId,
        cluster: &Cluster,
        metadata_key: &str,
    ) -> Result<(), RingError> {
        let cluster_xml = xml::cluster_to_xml(cluster)?;
        self.call_simple(
            target_node_id,
            AdminRequest::UpdateClusterMetadata {
                metadata_key: metadata_key.to_string(),
                cluster_xml,
            },
        )
        .await
    }

    pub async fn update_stores_meta_data(
        &self,
        target_node_id: NodeId,
        store_defs: &[StoreDefinition],
    ) -> Result<(), RingError> {
        let stores_xml = xml::stores_to_xml(store_defs)?;
        self.call_simple(
            target_node_id,
            AdminRequest::UpdateStoresMetadata { stores_xml },
        )
        .await
    }

    pub async fn set_rebalancing_state_and_restart(&self, node_id: NodeId) -> Result<(), RingError> {
        self.call_simple(node_id, AdminRequest::RebalancingServerMode).await
    }

    pub async fn set_normal_state_and_restart(&self, node_id: NodeId) -> Result<(), RingError> {
        self.call_simple(node_id, AdminRequest::NormalServerMode).await
    }

    pub async fn restart_services(&self, node_id: NodeId) -> Result<(), RingError> {
        self.call_simple(node_id, AdminRequest::RestartServices).await
    }

    pub async fn redirect_get(
        &self,
        node_id: NodeId,
        store_name: &str,
        key: &Bytes,
    ) -> Result<Vec<Versioned<Bytes>>, RingError> {
        let addr = self.addr_for(node_id).await?;
        let mut conn = self.pool.check_out(addr).await?;
        let result: Result<Vec<Versioned<Bytes>>, RingError> = async {
            protocol::write_request(
                &mut conn.stream,
                &AdminRequest::RedirectGet {
                    store_name: store_name.to_string(),
                    key: key.clone(),
                },
            )
            .await?;
            self.with_socket_timeout(protocol::read_prelude(&mut conn.stream))
                .await?
                .into_result()?;
            let blobs = self
                .with_socket_timeout(protocol::read_redirect_get_response(&mut conn.stream))
                .await?;
            blobs
                .into_iter()
                .map(|blob| {
                    let (clock, value) = unpack_value_with_clock(blob)?;
                    Ok(Versioned::new(value, clock))
                })
                .collect()
        }
        .await;
        if result.is_ok() {
            self.pool.check_in(conn);
        }
        result
    }

    /// Streams every key in `partition_list` owned by `store_name` from
    /// `from_node_id` to `to_node_id`. `ObsoleteVersion` responses from the
    /// receiving node's inner store are swallowed and counted.
    pub async fn pipe_get_and_put_streams(
        &self,
        from_node_id: NodeId,
        to_node_id: NodeId,
        store_name: &str,
        partition_list: &[u16],
    ) -> Result<u64, RingError> {
        let from_addr = self.addr_for(from_node_id).await?;
        let to_addr = self.addr_for(to_node_id).await?;

        let mut source = self.pool.check_out(from_addr).await?;
        protocol::write_request(
            &mut source.stream,
            &AdminRequest::GetPartitionAsStream {
                store_name: store_name.to_string(),
                partition_ids: partition_list.to_vec(),
            },
        )
        .await?;
        self.with_socket_timeout(protocol::read_prelude(&mut source.stream))
            .await?
            .into_result()?;

        let mut sink = self.pool.check_out(to_addr).await?;
        protocol::write_request(
            &mut sink.stream,
            &AdminRequest::PutPartitionAsStream {
                store_name: store_name.to_string(),
            },
        )
        .await?;

        let mut transferred = 0u64;
        loop {
            let entry = self
                .with_socket_timeout(protocol::read_stream_entry(&mut source.stream))
                .await?;
            match entry {
                Some(entry) => {
                    protocol::write_stream_entry(&mut sink.stream, &entry).await?;
                    transferred += 1;
                }
                None => {
                    protocol::write_stream_end(&mut sink.stream).await?;
                    break;
                }
            }
        }

        self.with_socket_timeout(protocol::read_prelude(&mut sink.stream))
            .await?
            .into_result()?;

        self.pool.check_in(source);
        self.pool.check_in(sink);
        Ok(transferred)
    }

    /// This node (T) steals `storeName`'s partitions from every other node
    /// into itself, ending up owning exactly `final_partition_ids`.
    pub async fn steal_partitions_from_cluster(
        &self,
        store_name: &str,
        final_partition_ids: &[u16],
    ) -> Result<(), RingError> {
        let old_cluster = self.metadata.get_cluster().await?;
        self.metadata
            .put(
                crate::core::metadata::OLD_CLUSTER_XML_KEY,
                Versioned::new(
                    Bytes::from(xml::cluster_to_xml(&old_cluster)?),
                    VectorClock::new().increment(self.local_node_id),
                ),
            )
            .await?;

        self.set_rebalancing_state_and_restart(self.local_node_id).await?;

        let new_cluster = super::rebalance::update_cluster_steal_partitions(
            &old_cluster,
            self.local_node_id,
            final_partition_ids,
        )?;

        let union_nodes: Vec<NodeId> = {
            let mut ids = old_cluster.node_ids();
            for id in new_cluster.node_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids
        };

        let mut current_cluster = old_cluster.clone();
        for donor_id in old_cluster.node_ids() {
            if donor_id == self.local_node_id {
                continue;
            }
            let steal_list = super::rebalance::steal_list(&old_cluster, &new_cluster, donor_id, self.local_node_id);
            if steal_list.is_empty() {
                continue;
            }

            let temp_cluster = super::rebalance::temp_cluster_for_steal(
                &current_cluster,
                donor_id,
                self.local_node_id,
                &steal_list,
            );

            for recipient in &union_nodes {
                self.update_cluster_meta_data(*recipient, &temp_cluster, CLUSTER_XML_KEY)
                    .await?;
            }
            current_cluster = temp_cluster;

            let moved = self
                .pipe_get_and_put_streams(donor_id, self.local_node_id, store_name, &steal_list)
                .await?;
            info!(donor = donor_id, moved, "stole partitions from donor");
        }

        // Final corrective broadcast: every node sees the authoritative end
        // state, even donors whose steal list happened to be empty and so
        // never received an intermediate update.
        for recipient in &union_nodes {
            self.update_cluster_meta_data(*recipient, &new_cluster, CLUSTER_XML_KEY)
                .await?;
        }
        self.set_normal_state_and_restart(self.local_node_id).await?;
        Ok(())
    }

    /// This node (T) is leaving; distributes its partitions to the rest of
    /// the cluster per `distribution` (recipient node id -> partitions it
    /// should take), symmetric to [`Self::steal_partitions_from_cluster`].
    pub async fn return_partitions_to_cluster(
        &self,
        store_name: &str,
        distribution: &[(NodeId, Vec<u16>)],
    ) -> Result<(), RingError> {
        let old_cluster = self.metadata.get_cluster().await?;
        let new_cluster = super::rebalance::update_cluster_return_partitions(
            &old_cluster,
            self.local_node_id,
            distribution,
        )?;

        let union_nodes: Vec<NodeId> = {
            let mut ids = old_cluster.node_ids();
            for id in new_cluster.node_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids
        };

        let mut current_cluster = old_cluster.clone();
        for (recipient_id, intake_list) in distribution {
            let recipient_id = *recipient_id;
            if intake_list.is_empty() {
                continue;
            }

            let temp_cluster = super::rebalance::temp_cluster_for_steal(
                &current_cluster,
                self.local_node_id,
                recipient_id,
                intake_list,
            );

            for node in &union_nodes {
                self.update_cluster_meta_data(*node, &temp_cluster, CLUSTER_XML_KEY)
                    .await?;
            }
            current_cluster = temp_cluster;

            self.set_rebalancing_state_and_restart(recipient_id).await?;
            let moved = self
                .pipe_get_and_put_streams(self.local_node_id, recipient_id, store_name, intake_list)
                .await?;
            self.set_normal_state_and_restart(recipient_id).await?;
            info!(recipient = recipient_id, moved, "returned partitions to recipient");
        }

        // Final corrective broadcast, mirroring steal_partitions_from_cluster:
        // guarantees every node converges on the authoritative end state even
        // if every intake list above happened to be empty.
        for node in &union_nodes {
            self.update_cluster_meta_data(*node, &new_cluster, CLUSTER_XML_KEY)
                .await?;
        }

        Ok(())
    }
}
