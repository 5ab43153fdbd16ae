use super::test_helpers::*;
use bytes::Bytes;
use ringdb::core::clock::{VectorClock, Versioned};
use ringdb::core::store::Store;

/// An owned key written directly at node A is retrievable by node B over a
/// real TCP round trip through `redirect_get`, with its vector clock intact.
#[tokio::test]
async fn redirect_get_returns_an_owned_keys_versions_over_the_wire() {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let cluster = two_node_cluster(addr, addr);
    let store_defs = vec![sample_store_def("orders", 1)];

    let node_a = spawn_node(0, &cluster, &store_defs).await;
    let node_b = spawn_node(1, &cluster, &store_defs).await;

    let key = key_for_partition(0);
    let clock = VectorClock::new().increment(0);
    node_a
        .stores
        .get("orders")
        .unwrap()
        .put(key.clone(), Versioned::new(Bytes::from_static(b"payload"), clock.clone()))
        .await
        .unwrap();

    let client_b = admin_client(&node_b);
    let versions = client_b.redirect_get(0, "orders", &key).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].value, Bytes::from_static(b"payload"));
    assert_eq!(versions[0].version, clock);
}

#[tokio::test]
async fn redirect_get_against_an_unknown_store_fails_cleanly() {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let cluster = two_node_cluster(addr, addr);
    let store_defs = vec![sample_store_def("orders", 1)];

    let node_a = spawn_node(0, &cluster, &store_defs).await;
    let node_b = spawn_node(1, &cluster, &store_defs).await;

    let client_b = admin_client(&node_b);
    let err = client_b
        .redirect_get(0, "no-such-store", &Bytes::from_static(b"k"))
        .await
        .unwrap_err();
    assert!(matches!(err, ringdb::core::errors::RingError::StoreNotFound(_)));
}
