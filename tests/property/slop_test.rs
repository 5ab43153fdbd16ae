//! Property-based test for the slop-detecting store's core invariant: a
//! misrouted put never reaches the inner store.

use bytes::Bytes;
use proptest::prelude::*;
use ringdb::core::clock::{VectorClock, Versioned};
use ringdb::core::metadata::model::{Cluster, Node, NodeStatus};
use ringdb::core::routing::{ConsistentRoutingStrategy, RoutingStrategy};
use ringdb::core::slop::SlopDetectingStore;
use ringdb::core::store::memory::MemoryStore;

const NUM_PARTITIONS: u16 = 8;

fn round_robin_cluster(num_nodes: u16) -> Cluster {
    let mut cluster = Cluster::new("property-cluster");
    for node_id in 0..num_nodes {
        cluster.nodes.insert(
            node_id,
            Node {
                id: node_id,
                host: format!("node-{node_id}"),
                http_port: 0,
                socket_port: 0,
                admin_port: 0,
                partition_ids: (0..NUM_PARTITIONS)
                    .filter(|p| p % num_nodes == node_id)
                    .collect(),
                status: NodeStatus::Available,
            },
        );
    }
    cluster
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn a_put_either_lands_in_the_inner_store_or_is_diverted(
        num_nodes in 2u16..5,
        local_node_id in 0u16..5,
        replication_factor in 1u8..3,
        key_bytes in proptest::collection::vec(any::<u8>(), 1..16),
    ) {
        let local_node_id = local_node_id % num_nodes;
        let cluster = round_robin_cluster(num_nodes);
        let routing = ConsistentRoutingStrategy::from_cluster(&cluster, NUM_PARTITIONS);
        let owns = routing
            .route(&key_bytes, replication_factor)
            .contains(&local_node_id);

        let store = SlopDetectingStore::new(
            "store",
            MemoryStore::new("inner"),
            MemoryStore::new("slop"),
            routing,
            local_node_id,
            replication_factor,
        );

        let key = Bytes::from(key_bytes);
        let value = Versioned::new(Bytes::from_static(b"v"), VectorClock::new().increment(local_node_id));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            store.put(key.clone(), value).await.unwrap();
            let seen = store.get(&key).await.unwrap();
            if owns {
                assert_eq!(seen.len(), 1);
            } else {
                assert!(seen.is_empty(), "misrouted put must not reach the inner store");
            }
        });
    }
}
