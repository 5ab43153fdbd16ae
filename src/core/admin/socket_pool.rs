// src/core/admin/socket_pool.rs

//! A per-destination TCP connection pool for the admin client. Connections
//! are reused across calls to the same peer; a capacity semaphore bounds how
//! many connections (idle or checked out) exist per destination at once.

use crate::core::errors::RingError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct Destination {
    idle: Mutex<VecDeque<TcpStream>>,
    capacity: Arc<Semaphore>,
}

/// A checked-out connection. Dropping it without calling [`SocketPool::check_in`]
/// discards the connection (matching the "close instead of returning on IO
/// failure" contract).
pub struct PooledConnection {
    pub stream: TcpStream,
    addr: SocketAddr,
    _permit: OwnedSemaphorePermit,
}

pub struct SocketPool {
    max_per_destination: usize,
    max_cached: usize,
    connect_timeout: Duration,
    socket_timeout: Duration,
    checkout_timeout: Duration,
    destinations: Mutex<HashMap<SocketAddr, Arc<Destination>>>,
}

impl SocketPool {
    pub fn new(
        max_per_destination: usize,
        max_cached: usize,
        connect_timeout: Duration,
        socket_timeout: Duration,
        checkout_timeout: Duration,
    ) -> Self {
        Self {
            max_per_destination,
            max_cached,
            connect_timeout,
            socket_timeout,
            checkout_timeout,
            destinations: Mutex::new(HashMap::new()),
        }
    }

    /// The socket read timeout every admin RPC wraps its reads in.
    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    fn destination(&self, addr: SocketAddr) -> Arc<Destination> {
        self.destinations
            .lock()
            .entry(addr)
            .or_insert_with(|| {
                Arc::new(Destination {
                    idle: Mutex::new(VecDeque::new()),
                    capacity: Arc::new(Semaphore::new(self.max_per_destination)),
                })
            })
            .clone()
    }

    /// Checks out a connection to `addr`, reusing an idle one if present or
    /// dialing a new one. Fails with `PoolTimeout` if the destination is at
    /// capacity for longer than the configured checkout timeout.
    pub async fn check_out(&self, addr: SocketAddr) -> Result<PooledConnection, RingError> {
        let destination = self.destination(addr);

        let permit = tokio::time::timeout(
            self.checkout_timeout,
            destination.capacity.clone().acquire_owned(),
        )
        .await
        .map_err(|_| RingError::PoolTimeout(addr.to_string()))?
        .map_err(|_| RingError::Internal("socket pool semaphore closed".into()))?;

        if let Some(stream) = destination.idle.lock().pop_front() {
            return Ok(PooledConnection {
                stream,
                addr,
                _permit: permit,
            });
        }

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RingError::Timeout(format!("connect to {addr}")))??;
        Ok(PooledConnection {
            stream,
            addr,
            _permit: permit,
        })
    }

    /// Returns a healthy connection to the idle pool, up to `max_cached`
    /// idle connections per destination; beyond that the connection is
    /// simply dropped and closed rather than cached.
    pub fn check_in(&self, conn: PooledConnection) {
        let destination = self.destination(conn.addr);
        let mut idle = destination.idle.lock();
        if idle.len() < self.max_cached {
            idle.push_back(conn.stream);
        }
    }
}
