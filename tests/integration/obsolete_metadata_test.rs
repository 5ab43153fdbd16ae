use super::test_helpers::*;
use ringdb::core::errors::RingError;

/// `steal_partitions_from_cluster` snapshots `old.cluster.xml` with a fresh
/// clock on every call; a second rebalance issued back-to-back on the same
/// node writes the same clock value again and must be rejected by the
/// underlying store's monotonicity rule rather than silently overwriting
/// the first snapshot.
#[tokio::test]
async fn back_to_back_rebalance_attempts_reject_the_stale_snapshot() {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let cluster = two_node_cluster(addr, addr);
    let store_defs = vec![sample_store_def("orders", 1)];

    let node_a = spawn_node(0, &cluster, &store_defs).await;
    let node_b = spawn_node(1, &cluster, &store_defs).await;
    let real_cluster = two_node_cluster(node_a.addr, node_b.addr);
    for node in [&node_a, &node_b] {
        node.metadata
            .put(
                ringdb::core::metadata::CLUSTER_XML_KEY,
                ringdb::core::clock::Versioned::new(
                    bytes::Bytes::from(ringdb::core::metadata::xml::cluster_to_xml(&real_cluster).unwrap()),
                    ringdb::core::clock::VectorClock::new()
                        .increment(node.node_id)
                        .increment(node.node_id),
                ),
            )
            .await
            .unwrap();
    }

    let client_b = admin_client(&node_b);
    client_b
        .steal_partitions_from_cluster("orders", &[0])
        .await
        .unwrap();

    let err = client_b
        .steal_partitions_from_cluster("orders", &[1])
        .await
        .unwrap_err();
    assert_eq!(err, RingError::ObsoleteVersion);
}
