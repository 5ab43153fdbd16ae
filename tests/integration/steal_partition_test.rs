use super::test_helpers::*;
use bytes::Bytes;
use ringdb::core::clock::{VectorClock, Versioned};
use ringdb::core::store::Store;

/// Node B steals two partitions from node A, which owns the whole ring to
/// start with; the keys that live in those partitions must follow.
#[tokio::test]
async fn steal_moves_owned_keys_and_updates_both_clusters() {
    let addr_a = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let addr_b = addr_a;
    let cluster = two_node_cluster(addr_a, addr_b);
    let store_defs = vec![sample_store_def("orders", 1)];

    let node_a = spawn_node(0, &cluster, &store_defs).await;
    let node_b = spawn_node(1, &cluster, &store_defs).await;
    let real_cluster = two_node_cluster(node_a.addr, node_b.addr);

    // Re-seed both nodes with their real, now-known addresses.
    for node in [&node_a, &node_b] {
        node.metadata
            .put(
                ringdb::core::metadata::CLUSTER_XML_KEY,
                Versioned::new(
                    Bytes::from(ringdb::core::metadata::xml::cluster_to_xml(&real_cluster).unwrap()),
                    VectorClock::new().increment(node.node_id).increment(node.node_id),
                ),
            )
            .await
            .unwrap();
    }

    let store_a = node_a.stores.get("orders").unwrap().clone();
    let key_p0 = key_for_partition(0);
    let key_p1 = key_for_partition(1);
    let key_p2 = key_for_partition(2);
    for key in [&key_p0, &key_p1, &key_p2] {
        store_a
            .put(
                key.clone(),
                Versioned::new(Bytes::from_static(b"v"), VectorClock::new().increment(0)),
            )
            .await
            .unwrap();
    }

    let client_b = admin_client(&node_b);
    client_b
        .steal_partitions_from_cluster("orders", &[0, 1])
        .await
        .unwrap();

    let store_b = node_b.stores.get("orders").unwrap().clone();
    assert_eq!(store_b.get(&key_p0).await.unwrap().len(), 1);
    assert_eq!(store_b.get(&key_p1).await.unwrap().len(), 1);
    // Partition 2 was never part of the steal; it stays behind on A.
    assert!(store_b.get(&key_p2).await.unwrap().is_empty());

    let final_cluster = node_b.metadata.get_cluster().await.unwrap();
    let node_b_entry = &final_cluster.nodes[&1];
    assert!(node_b_entry.partition_ids.contains(&0));
    assert!(node_b_entry.partition_ids.contains(&1));
    assert!(!final_cluster.nodes[&0].partition_ids.contains(&0));
}
