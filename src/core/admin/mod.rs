// src/core/admin/mod.rs

//! The admin wire protocol: opcode-framed requests/responses between nodes,
//! the client that drives them, the rebalance choreography built atop that
//! client, and the connection pool backing it.

pub mod client;
pub mod opcodes;
pub mod protocol;
pub mod rebalance;
pub mod server;
pub mod socket_pool;

pub use client::AdminClient;
pub use server::AdminServer;
pub use socket_pool::SocketPool;
