//! Coverage for `SocketPool`'s checkout-timeout invariant: checking out a
//! connection to an already-saturated destination fails with `PoolTimeout`
//! rather than blocking forever.

use ringdb::core::admin::SocketPool;
use ringdb::core::errors::RingError;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::test]
async fn checkout_times_out_once_a_destination_is_saturated() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    });

    let pool = SocketPool::new(
        1,
        1,
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_millis(50),
    );
    let held = pool.check_out(addr).await.unwrap();

    let err = pool.check_out(addr).await.unwrap_err();
    assert!(matches!(err, RingError::PoolTimeout(_)));

    // Returning the held connection frees capacity for the next checkout.
    pool.check_in(held);
    pool.check_out(addr).await.unwrap();
}
