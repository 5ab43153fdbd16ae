use super::test_helpers::*;
use bytes::Bytes;
use ringdb::core::clock::{VectorClock, Versioned};
use ringdb::core::metadata::{CLUSTER_XML_KEY, xml};
use ringdb::core::store::Store;

/// Three donors, one target: N0=[0], N1=[1], N2=[2,3], and N2 steals [0,1]
/// from N0 and N1. With two donors in the loop, a `temp_cluster_for_steal`
/// call that always starts from the pristine pre-rebalance snapshot (instead
/// of the progressively-updated state) would re-broadcast a cluster that
/// still shows N0 owning partition 0 after N0's migration already ran, and
/// would never tell N0/N1 about N1's own migration at all. Every node must
/// end up agreeing on the same final, disjoint, exhaustive partitioning.
#[tokio::test]
async fn steal_with_two_donors_converges_every_node_on_the_final_cluster() {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let cluster = three_node_cluster(
        [addr, addr, addr],
        [vec![0], vec![1], vec![2, 3]],
    );
    let store_defs = vec![sample_store_def("orders", 1)];

    let node_a = spawn_node(0, &cluster, &store_defs).await;
    let node_b = spawn_node(1, &cluster, &store_defs).await;
    let node_c = spawn_node(2, &cluster, &store_defs).await;
    let real_cluster = three_node_cluster(
        [node_a.addr, node_b.addr, node_c.addr],
        [vec![0], vec![1], vec![2, 3]],
    );

    for node in [&node_a, &node_b, &node_c] {
        node.metadata
            .put(
                CLUSTER_XML_KEY,
                Versioned::new(
                    Bytes::from(xml::cluster_to_xml(&real_cluster).unwrap()),
                    VectorClock::new().increment(node.node_id).increment(node.node_id),
                ),
            )
            .await
            .unwrap();
    }

    let key_p0 = key_for_partition(0);
    let key_p1 = key_for_partition(1);
    let key_p2 = key_for_partition(2);

    let store_a = node_a.stores.get("orders").unwrap().clone();
    store_a
        .put(
            key_p0.clone(),
            Versioned::new(Bytes::from_static(b"v0"), VectorClock::new().increment(0)),
        )
        .await
        .unwrap();
    let store_b = node_b.stores.get("orders").unwrap().clone();
    store_b
        .put(
            key_p1.clone(),
            Versioned::new(Bytes::from_static(b"v1"), VectorClock::new().increment(1)),
        )
        .await
        .unwrap();
    let store_c = node_c.stores.get("orders").unwrap().clone();
    store_c
        .put(
            key_p2.clone(),
            Versioned::new(Bytes::from_static(b"v2"), VectorClock::new().increment(2)),
        )
        .await
        .unwrap();

    let client_c = admin_client(&node_c);
    client_c
        .steal_partitions_from_cluster("orders", &[0, 1, 2, 3])
        .await
        .unwrap();

    assert_eq!(store_c.get(&key_p0).await.unwrap().len(), 1);
    assert_eq!(store_c.get(&key_p1).await.unwrap().len(), 1);
    assert_eq!(store_c.get(&key_p2).await.unwrap().len(), 1);

    // Every node must converge on the same final topology: N2 owns every
    // partition, N0 and N1 own none.
    for node in [&node_a, &node_b, &node_c] {
        let final_cluster = node.metadata.get_cluster().await.unwrap();
        assert!(final_cluster.nodes[&0].partition_ids.is_empty());
        assert!(final_cluster.nodes[&1].partition_ids.is_empty());
        let mut owned = final_cluster.nodes[&2].partition_ids.clone();
        owned.sort();
        assert_eq!(owned, vec![0, 1, 2, 3]);
    }
}
