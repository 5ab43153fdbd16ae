// src/core/metadata/xml.rs

//! Round-trip XML encoding for `cluster.xml` and `stores.xml`, the two
//! metadata documents exchanged between nodes and persisted to disk.

use super::model::{Cluster, Node, NodeId, NodeStatus, StoreDefinition};
use crate::core::errors::RingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize)]
#[serde(rename = "cluster")]
struct ClusterXml {
    name: String,
    #[serde(rename = "server", default)]
    servers: Vec<NodeXml>,
}

#[derive(Serialize, Deserialize)]
struct NodeXml {
    id: NodeId,
    host: String,
    #[serde(rename = "http-port")]
    http_port: u16,
    #[serde(rename = "socket-port")]
    socket_port: u16,
    #[serde(rename = "admin-port")]
    admin_port: u16,
    /// A single comma-separated element, e.g. `<partitions>0,1,2</partitions>`.
    #[serde(rename = "partitions", default, with = "partitions_csv")]
    partitions: Vec<u16>,
    status: String,
}

/// (De)serializes `Vec<u16>` as the single comma-joined string `cluster.xml`
/// documents for `<partitions/>`, rather than quick-xml's default of one
/// repeated element per entry.
mod partitions_csv {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(partitions: &[u16], s: S) -> Result<S::Ok, S::Error> {
        let csv = partitions
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        s.serialize_str(&csv)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u16>, D::Error> {
        let csv = String::deserialize(d)?;
        if csv.is_empty() {
            return Ok(Vec::new());
        }
        csv.split(',')
            .map(|part| part.trim().parse::<u16>().map_err(D::Error::custom))
            .collect()
    }
}

impl From<&Node> for NodeXml {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id,
            host: n.host.clone(),
            http_port: n.http_port,
            socket_port: n.socket_port,
            admin_port: n.admin_port,
            partitions: n.partition_ids.clone(),
            status: match n.status {
                NodeStatus::Available => "available".to_string(),
                NodeStatus::Unavailable => "unavailable".to_string(),
            },
        }
    }
}

impl TryFrom<NodeXml> for Node {
    type Error = RingError;

    fn try_from(n: NodeXml) -> Result<Self, RingError> {
        let status = match n.status.as_str() {
            "available" => NodeStatus::Available,
            "unavailable" => NodeStatus::Unavailable,
            other => {
                return Err(RingError::InconsistentMetadata(format!(
                    "node {}: unknown status {other}",
                    n.id
                )));
            }
        };
        Ok(Node {
            id: n.id,
            host: n.host,
            http_port: n.http_port,
            socket_port: n.socket_port,
            admin_port: n.admin_port,
            partition_ids: n.partitions,
            status,
        })
    }
}

/// Serializes a `Cluster` to `cluster.xml` bytes.
pub fn cluster_to_xml(cluster: &Cluster) -> Result<String, RingError> {
    let doc = ClusterXml {
        name: cluster.name.clone(),
        servers: cluster.nodes.values().map(NodeXml::from).collect(),
    };
    quick_xml::se::to_string(&doc)
        .map_err(|e| RingError::InconsistentMetadata(format!("cluster.xml encode: {e}")))
}

/// Parses `cluster.xml` bytes into a `Cluster`.
pub fn cluster_from_xml(xml: &str) -> Result<Cluster, RingError> {
    let doc: ClusterXml = quick_xml::de::from_str(xml)
        .map_err(|e| RingError::InconsistentMetadata(format!("cluster.xml decode: {e}")))?;
    let mut nodes = BTreeMap::new();
    for node_xml in doc.servers {
        let node = Node::try_from(node_xml)?;
        if nodes.insert(node.id, node).is_some() {
            return Err(RingError::InconsistentMetadata(
                "cluster.xml: duplicate node id".into(),
            ));
        }
    }
    Ok(Cluster {
        name: doc.name,
        nodes,
    })
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "stores")]
struct StoresXml {
    #[serde(rename = "store", default)]
    stores: Vec<StoreDefinition>,
}

/// Serializes a list of store definitions to `stores.xml` bytes.
pub fn stores_to_xml(stores: &[StoreDefinition]) -> Result<String, RingError> {
    let doc = StoresXml {
        stores: stores.to_vec(),
    };
    quick_xml::se::to_string(&doc)
        .map_err(|e| RingError::InconsistentMetadata(format!("stores.xml encode: {e}")))
}

/// Parses `stores.xml` bytes into a list of store definitions.
pub fn stores_from_xml(xml: &str) -> Result<Vec<StoreDefinition>, RingError> {
    let doc: StoresXml = quick_xml::de::from_str(xml)
        .map_err(|e| RingError::InconsistentMetadata(format!("stores.xml decode: {e}")))?;
    for def in &doc.stores {
        def.validate().map_err(RingError::InconsistentMetadata)?;
    }
    Ok(doc.stores)
}
