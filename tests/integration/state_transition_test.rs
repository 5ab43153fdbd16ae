use super::test_helpers::*;
use ringdb::core::metadata::model::ServerState;

/// Drives a node through `REBALANCING_STATE` and back via the admin wire
/// protocol, confirming the transition is visible through its own
/// metadata store after each hop.
#[tokio::test]
async fn rebalancing_and_normal_state_round_trip_over_the_wire() {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let cluster = two_node_cluster(addr, addr);
    let store_defs = vec![sample_store_def("orders", 1)];
    let node_a = spawn_node(0, &cluster, &store_defs).await;

    assert_eq!(node_a.metadata.get_server_state().await.unwrap(), ServerState::Normal);

    let client = admin_client(&node_a);
    client.set_rebalancing_state_and_restart(0).await.unwrap();
    assert_eq!(
        node_a.metadata.get_server_state().await.unwrap(),
        ServerState::Rebalancing
    );

    client.restart_services(0).await.unwrap();

    client.set_normal_state_and_restart(0).await.unwrap();
    assert_eq!(node_a.metadata.get_server_state().await.unwrap(), ServerState::Normal);
}
