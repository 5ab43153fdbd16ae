// src/core/metadata/model.rs

//! Cluster topology and store-definition types, serialized to/from XML by
//! [`super::xml`] and cached in-process by [`super::MetadataStore`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeId = u16;

/// Availability of a node as last observed by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Available,
    Unavailable,
}

/// A single server node's address and partition ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub host: String,
    pub http_port: u16,
    pub socket_port: u16,
    pub admin_port: u16,
    /// Ordered; the partitions owned by this node.
    pub partition_ids: Vec<u16>,
    pub status: NodeStatus,
}

/// Cluster-wide topology: a named set of nodes keyed by id.
///
/// Invariant: node IDs are unique and the union of all `partition_ids` is
/// contiguous from `0`. Callers that build a `Cluster` by hand (tests,
/// rebalance planning) are responsible for upholding it; [`super::xml`]
/// does not re-validate on parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub nodes: BTreeMap<NodeId, Node>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// The set of node IDs across the cluster, in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn total_partitions(&self) -> u16 {
        self.nodes
            .values()
            .flat_map(|n| n.partition_ids.iter())
            .copied()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}

/// Replication and consistency knobs for a named store.
///
/// Invariant: `1 <= required_reads <= preferred_reads <= replication_factor`
/// and likewise for writes; both `<= |nodes|` in the owning cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub store_type: String,
    #[serde(rename = "replication-factor")]
    pub replication_factor: u8,
    #[serde(rename = "preferred-reads")]
    pub preferred_reads: u8,
    #[serde(rename = "required-reads")]
    pub required_reads: u8,
    #[serde(rename = "preferred-writes")]
    pub preferred_writes: u8,
    #[serde(rename = "required-writes")]
    pub required_writes: u8,
    #[serde(rename = "key-serializer")]
    pub key_serializer: String,
    #[serde(rename = "value-serializer")]
    pub value_serializer: String,
}

impl StoreDefinition {
    pub fn validate(&self) -> Result<(), String> {
        let checks = [
            (
                "reads",
                self.required_reads,
                self.preferred_reads,
                self.replication_factor,
            ),
            (
                "writes",
                self.required_writes,
                self.preferred_writes,
                self.replication_factor,
            ),
        ];
        for (label, required, preferred, rf) in checks {
            if !(1 <= required && required <= preferred && preferred <= rf) {
                return Err(format!(
                    "store {}: invalid {} bounds (required={}, preferred={}, rf={})",
                    self.name, label, required, preferred, rf
                ));
            }
        }
        Ok(())
    }
}

/// The server lifecycle state stored under the `server.state` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Normal,
    Rebalancing,
}

impl ServerState {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ServerState::Normal => "NORMAL_STATE",
            ServerState::Rebalancing => "REBALANCING_STATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NORMAL_STATE" => Some(ServerState::Normal),
            "REBALANCING_STATE" => Some(ServerState::Rebalancing),
            _ => None,
        }
    }
}
