//! Property-based tests for `ConsistentRoutingStrategy`.

use proptest::prelude::*;
use ringdb::core::metadata::model::{Cluster, Node, NodeStatus};
use ringdb::core::routing::{ConsistentRoutingStrategy, RoutingStrategy};

const NUM_PARTITIONS: u16 = 16;

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
        cases: 150,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn route_length_and_distinctness_hold_for_any_cluster_and_key(
        num_nodes in 1u16..7,
        replication_factor in 1u8..8,
        key in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let cluster = round_robin_cluster(num_nodes);
        let routing = ConsistentRoutingStrategy::from_cluster(&cluster, NUM_PARTITIONS);
        let owners = routing.route(&key, replication_factor);

        let expected_len = std::cmp::min(replication_factor as usize, num_nodes as usize);
        prop_assert_eq!(owners.len(), expected_len);

        let mut distinct = owners.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(distinct.len(), owners.len());
    }

    #[test]
    fn partition_list_visits_every_partition_exactly_once(
        num_nodes in 1u16..7,
        key in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let cluster = round_robin_cluster(num_nodes);
        let routing = ConsistentRoutingStrategy::from_cluster(&cluster, NUM_PARTITIONS);
        let mut visited = routing.partition_list(&key);
        prop_assert_eq!(visited.len(), NUM_PARTITIONS as usize);
        visited.sort_unstable();
        visited.dedup();
        prop_assert_eq!(visited.len(), NUM_PARTITIONS as usize);
    }
}
