// src/server.rs

//! Wires the storage plane together: loads or bootstraps cluster metadata,
//! builds the routing strategy and slop-detecting store registry, and runs
//! the admin TCP accept loop.

use crate::config::Config;
use crate::core::admin::{AdminClient, AdminServer, SocketPool};
use crate::core::clock::VectorClock;
use crate::core::metadata::model::{Cluster, Node, NodeStatus, ServerState, StoreDefinition};
use crate::core::metadata::{CLUSTER_XML_KEY, MetadataStore, STORES_XML_KEY, xml};
use crate::core::routing::ConsistentRoutingStrategy;
use crate::core::slop::SlopDetectingStore;
use crate::core::store::Store;
use crate::core::store::memory::MemoryStore;
use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Brings up a single node: loads or bootstraps its metadata, registers the
/// configured stores, and serves the admin protocol until shutdown.
pub async fn run(config: Config) -> Result<()> {
    std::fs::create_dir_all(config.metadata_dir())
        .with_context(|| format!("creating {}", config.metadata_dir().display()))?;
    std::fs::create_dir_all(config.data_dir())
        .with_context(|| format!("creating {}", config.data_dir().display()))?;

    let metadata = Arc::new(MetadataStore::new(MemoryStore::new("metadata")));
    bootstrap_metadata_if_absent(&metadata, &config).await?;

    let cluster = metadata
        .get_cluster()
        .await
        .context("loading cluster.xml after bootstrap")?;
    let store_defs = metadata
        .get_stores()
        .await
        .context("loading stores.xml after bootstrap")?;

    let routing = Arc::new(ConsistentRoutingStrategy::from_cluster(&cluster, config.num_partitions));

    let stores: Arc<DashMap<String, Arc<dyn Store>>> = Arc::new(DashMap::new());
    for def in &store_defs {
        let slop_name = format!("{}.slop", def.name);
        let wrapped = SlopDetectingStore::new(
            def.name.clone(),
            MemoryStore::new(def.name.clone()),
            MemoryStore::new(slop_name),
            ArcRoutingStrategy(routing.clone()),
            config.node_id,
            def.replication_factor,
        );
        stores.insert(def.name.clone(), Arc::new(wrapped) as Arc<dyn Store>);
    }

    let admin_metadata = metadata.clone();
    let admin_server = Arc::new(AdminServer::new(
        config.node_id,
        config.num_partitions,
        metadata,
        stores,
    ));

    let listener = TcpListener::bind(config.admin_bind_addr)
        .await
        .with_context(|| format!("binding admin listener on {}", config.admin_bind_addr))?;
    info!(addr = %config.admin_bind_addr, node_id = config.node_id, "admin listener bound");

    let accept_loop = tokio::spawn(run_accept_loop(listener, admin_server));

    let pool = Arc::new(SocketPool::new(
        config.socket_pool.max_connections,
        config.socket_pool.max_cached,
        Duration::from_millis(config.socket_pool.connect_timeout_ms),
        Duration::from_millis(config.socket_pool.socket_timeout_ms),
        Duration::from_millis(config.socket_pool.checkout_timeout_ms),
    ));
    let admin_client = AdminClient::new(config.node_id, admin_metadata.clone(), pool);

    // A node that crashed mid-rebalance restarts in REBALANCING_STATE; drive
    // it back to NORMAL_STATE over the same admin RPC a peer would use,
    // rather than mutating the metadata store directly.
    if let Ok(ServerState::Rebalancing) = admin_metadata.get_server_state().await {
        warn!(node_id = config.node_id, "node started in REBALANCING_STATE, restoring NORMAL_STATE");
        if let Err(e) = admin_client.set_normal_state_and_restart(config.node_id).await {
            error!(error = %e, "failed to self-correct stale REBALANCING_STATE");
        }
    }

    accept_loop.await.context("admin accept loop panicked")?;
    info!("admin server shut down");
    Ok(())
}

/// Runs the admin accept loop until a shutdown signal arrives, spawning one
/// task per connection and reaping them as they finish.
async fn run_accept_loop<S: Store>(listener: TcpListener, admin_server: Arc<AdminServer<S>>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }

            Some(res) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("admin connection task panicked: {e:?}");
                    }
                }
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((mut socket, addr)) => {
                        info!(%addr, "accepted admin connection");
                        let server = admin_server.clone();
                        connections.spawn(async move {
                            if let Err(e) = server.serve(&mut socket).await {
                                warn!(%addr, error = %e, "admin connection terminated");
                            }
                        });
                    }
                    Err(e) => error!("failed to accept admin connection: {e}"),
                }
            }
        }
    }

    connections.shutdown().await;
}

/// Forwards `RoutingStrategy` through a shared, clonable handle so each
/// registered store can hold its own copy without re-deriving the ring.
#[derive(Clone)]
struct ArcRoutingStrategy(Arc<ConsistentRoutingStrategy>);

impl crate::core::routing::RoutingStrategy for ArcRoutingStrategy {
    fn route(&self, key: &[u8], replication_factor: u8) -> Vec<crate::core::clock::NodeId> {
        self.0.route(key, replication_factor)
    }

    fn partition_list(&self, key: &[u8]) -> Vec<u16> {
        self.0.partition_list(key)
    }

    fn num_partitions(&self) -> u16 {
        self.0.num_partitions()
    }
}

/// On a fresh node with no `cluster.xml`, writes a single-node cluster and a
/// single default store definition derived from `config.default_store`.
async fn bootstrap_metadata_if_absent<S: Store>(
    metadata: &MetadataStore<S>,
    config: &Config,
) -> Result<()> {
    if metadata.get(CLUSTER_XML_KEY).await?.is_empty() {
        let mut cluster = Cluster::new("ringdb-cluster");
        cluster.nodes.insert(
            config.node_id,
            Node {
                id: config.node_id,
                host: config.admin_bind_addr.ip().to_string(),
                http_port: 0,
                socket_port: 0,
                admin_port: config.admin_bind_addr.port(),
                partition_ids: (0..config.num_partitions).collect(),
                status: NodeStatus::Available,
            },
        );
        let xml = xml::cluster_to_xml(&cluster).context("encoding bootstrap cluster.xml")?;
        metadata
            .put(
                CLUSTER_XML_KEY,
                crate::core::clock::Versioned::new(
                    Bytes::from(xml),
                    VectorClock::new().increment(config.node_id),
                ),
            )
            .await
            .context("writing bootstrap cluster.xml")?;
        info!(node_id = config.node_id, "bootstrapped fresh single-node cluster.xml");
    }

    if metadata.get(STORES_XML_KEY).await?.is_empty() {
        let ds = &config.default_store;
        let def = StoreDefinition {
            name: ds.name.clone(),
            store_type: "memory".to_string(),
            replication_factor: ds.replication_factor,
            preferred_reads: ds.preferred_reads,
            required_reads: ds.required_reads,
            preferred_writes: ds.preferred_writes,
            required_writes: ds.required_writes,
            key_serializer: "bytes".to_string(),
            value_serializer: "bytes".to_string(),
        };
        def.validate().map_err(anyhow::Error::msg)?;
        let xml = xml::stores_to_xml(std::slice::from_ref(&def)).context("encoding bootstrap stores.xml")?;
        metadata
            .put(
                STORES_XML_KEY,
                crate::core::clock::Versioned::new(
                    Bytes::from(xml),
                    VectorClock::new().increment(config.node_id),
                ),
            )
            .await
            .context("writing bootstrap stores.xml")?;
        info!(store = %ds.name, "bootstrapped fresh default store definition");
    }

    Ok(())
}
