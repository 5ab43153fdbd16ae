use bytes::Bytes;
use dashmap::DashMap;
use ringdb::core::admin::{AdminClient, AdminServer, SocketPool};
use ringdb::core::clock::{NodeId, Versioned, VectorClock};
use ringdb::core::metadata::model::{Cluster, Node, NodeStatus, StoreDefinition};
use ringdb::core::metadata::{CLUSTER_XML_KEY, MetadataStore, STORES_XML_KEY, xml};
use ringdb::core::routing::partition::hash_to_partition;
use ringdb::core::routing::{ConsistentRoutingStrategy, RoutingStrategy};
use ringdb::core::slop::SlopDetectingStore;
use ringdb::core::store::Store;
use ringdb::core::store::memory::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const NUM_PARTITIONS: u16 = 8;

/// A node wired exactly the way `server::run` wires one, but bound to an
/// ephemeral port and without the config/bootstrap layer around it.
pub struct TestNode {
    pub node_id: NodeId,
    pub addr: SocketAddr,
    pub metadata: Arc<MetadataStore<MemoryStore>>,
    pub stores: Arc<DashMap<String, Arc<dyn Store>>>,
}

#[derive(Clone)]
struct ArcRouting(Arc<ConsistentRoutingStrategy>);

impl RoutingStrategy for ArcRouting {
    fn route(&self, key: &[u8], replication_factor: u8) -> Vec<NodeId> {
        self.0.route(key, replication_factor)
    }
    fn partition_list(&self, key: &[u8]) -> Vec<u16> {
        self.0.partition_list(key)
    }
    fn num_partitions(&self) -> u16 {
        self.0.num_partitions()
    }
}

fn node_entry(id: NodeId, addr: SocketAddr, partition_ids: Vec<u16>) -> Node {
    Node {
        id,
        host: addr.ip().to_string(),
        http_port: 0,
        socket_port: 0,
        admin_port: addr.port(),
        partition_ids,
        status: NodeStatus::Available,
    }
}

/// Binds a real TCP listener, spawns its accept loop in the background, and
/// seeds `cluster.xml`/`stores.xml` so the node is immediately addressable.
pub async fn spawn_node(node_id: NodeId, cluster: &Cluster, store_defs: &[StoreDefinition]) -> TestNode {
    let metadata = Arc::new(MetadataStore::new(MemoryStore::new("metadata")));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    metadata
        .put(
            CLUSTER_XML_KEY,
            Versioned::new(
                Bytes::from(xml::cluster_to_xml(cluster).unwrap()),
                VectorClock::new().increment(node_id),
            ),
        )
        .await
        .unwrap();
    metadata
        .put(
            STORES_XML_KEY,
            Versioned::new(
                Bytes::from(xml::stores_to_xml(store_defs).unwrap()),
                VectorClock::new().increment(node_id),
            ),
        )
        .await
        .unwrap();

    let routing = Arc::new(ConsistentRoutingStrategy::from_cluster(cluster, NUM_PARTITIONS));
    let stores: Arc<DashMap<String, Arc<dyn Store>>> = Arc::new(DashMap::new());
    for def in store_defs {
        let wrapped = SlopDetectingStore::new(
            def.name.clone(),
            MemoryStore::new(def.name.clone()),
            MemoryStore::new(format!("{}.slop", def.name)),
            ArcRouting(routing.clone()),
            node_id,
            def.replication_factor,
        );
        stores.insert(def.name.clone(), Arc::new(wrapped) as Arc<dyn Store>);
    }

    let admin_server = Arc::new(AdminServer::new(
        node_id,
        NUM_PARTITIONS,
        metadata.clone(),
        stores.clone(),
    ));
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let server = admin_server.clone();
            tokio::spawn(async move {
                let _ = server.serve(&mut socket).await;
            });
        }
    });

    TestNode {
        node_id,
        addr,
        metadata,
        stores,
    }
}

/// Builds a two-node cluster with node 0 owning every partition and node 1
/// owning none, at the given (not-yet-bound) addresses.
pub fn two_node_cluster(addr_a: SocketAddr, addr_b: SocketAddr) -> Cluster {
    let mut cluster = Cluster::new("test-cluster");
    cluster
        .nodes
        .insert(0, node_entry(0, addr_a, (0..NUM_PARTITIONS).collect()));
    cluster.nodes.insert(1, node_entry(1, addr_b, vec![]));
    cluster
}

/// Builds a three-node cluster at the given (not-yet-bound) addresses, with
/// node ids and partition ownership assigned by `owned_partitions` (one
/// `Vec<u16>` per node, in node-id order).
pub fn three_node_cluster(addrs: [SocketAddr; 3], owned_partitions: [Vec<u16>; 3]) -> Cluster {
    let mut cluster = Cluster::new("test-cluster");
    for (id, (addr, partitions)) in addrs.into_iter().zip(owned_partitions).enumerate() {
        cluster
            .nodes
            .insert(id as NodeId, node_entry(id as NodeId, addr, partitions));
    }
    cluster
}

pub fn admin_client(node: &TestNode) -> AdminClient<MemoryStore> {
    let pool = Arc::new(SocketPool::new(
        4,
        4,
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(2),
    ));
    AdminClient::new(node.node_id, node.metadata.clone(), pool)
}

pub fn sample_store_def(name: &str, replication_factor: u8) -> StoreDefinition {
    StoreDefinition {
        name: name.to_string(),
        store_type: "memory".to_string(),
        replication_factor,
        preferred_reads: 1,
        required_reads: 1,
        preferred_writes: 1,
        required_writes: 1,
        key_serializer: "bytes".to_string(),
        value_serializer: "bytes".to_string(),
    }
}

/// Brute-forces a key whose ring hash lands in `partition`, so tests can
/// target a specific partition without depending on hash internals.
pub fn key_for_partition(partition: u16) -> Bytes {
    for i in 0u32.. {
        let candidate = Bytes::from(format!("probe-{i}"));
        if hash_to_partition(&candidate, NUM_PARTITIONS) == partition {
            return candidate;
        }
    }
    unreachable!("ring hash covers every partition within a bounded search")
}
