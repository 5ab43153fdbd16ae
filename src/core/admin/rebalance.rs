// src/core/admin/rebalance.rs

//! Pure cluster-topology transforms used by the rebalance choreography in
//! [`super::client`]. These never touch the network; they only compute the
//! intermediate and final `Cluster` snapshots that choreography propagates.

use crate::core::errors::RingError;
use crate::core::metadata::model::{Cluster, NodeId};

/// The planned final topology for a steal: `target` ends up owning exactly
/// `final_partition_ids`, and every partition in that set is removed from
/// whichever other node currently owns it.
pub fn update_cluster_steal_partitions(
    old: &Cluster,
    target: NodeId,
    final_partition_ids: &[u16],
) -> Result<Cluster, RingError> {
    if !old.nodes.contains_key(&target) {
        return Err(RingError::InconsistentMetadata(format!(
            "steal target {target} is not a member of the cluster"
        )));
    }
    let mut new_cluster = old.clone();
    for node in new_cluster.nodes.values_mut() {
        if node.id == target {
            continue;
        }
        node.partition_ids
            .retain(|p| !final_partition_ids.contains(p));
    }
    if let Some(target_node) = new_cluster.nodes.get_mut(&target) {
        target_node.partition_ids = final_partition_ids.to_vec();
        target_node.partition_ids.sort_unstable();
    }
    Ok(new_cluster)
}

/// The planned final topology for a node leaving: every partition in
/// `distribution` is removed from `leaving` and added to its assigned
/// recipient.
pub fn update_cluster_return_partitions(
    old: &Cluster,
    leaving: NodeId,
    distribution: &[(NodeId, Vec<u16>)],
) -> Result<Cluster, RingError> {
    if !old.nodes.contains_key(&leaving) {
        return Err(RingError::InconsistentMetadata(format!(
            "leaving node {leaving} is not a member of the cluster"
        )));
    }
    let mut new_cluster = old.clone();
    for (recipient, partitions) in distribution {
        if let Some(leaving_node) = new_cluster.nodes.get_mut(&leaving) {
            leaving_node.partition_ids.retain(|p| !partitions.contains(p));
        }
        if let Some(recipient_node) = new_cluster.nodes.get_mut(recipient) {
            for &p in partitions {
                if !recipient_node.partition_ids.contains(&p) {
                    recipient_node.partition_ids.push(p);
                }
            }
            recipient_node.partition_ids.sort_unstable();
        }
    }
    Ok(new_cluster)
}

/// The partitions that move from `donor` to `target` between `old` and
/// `new`: the intersection of donor's old ownership and target's new
/// ownership.
pub fn steal_list(old: &Cluster, new: &Cluster, donor: NodeId, target: NodeId) -> Vec<u16> {
    let Some(old_donor) = old.nodes.get(&donor) else {
        return Vec::new();
    };
    let Some(new_target) = new.nodes.get(&target) else {
        return Vec::new();
    };
    old_donor
        .partition_ids
        .iter()
        .filter(|p| new_target.partition_ids.contains(p))
        .copied()
        .collect()
}

/// The atomic-per-donor intermediate topology: identical to `old` except
/// `donor`'s partitions shrink by `steal_list` and `target`'s grow by it.
/// This is what gets propagated to every node mid-transfer so a crash
/// between donor updates never leaves two nodes claiming the same partition.
pub fn temp_cluster_for_steal(
    old: &Cluster,
    donor: NodeId,
    target: NodeId,
    steal_list: &[u16],
) -> Cluster {
    let mut temp = old.clone();
    if let Some(donor_node) = temp.nodes.get_mut(&donor) {
        donor_node.partition_ids.retain(|p| !steal_list.contains(p));
    }
    if let Some(target_node) = temp.nodes.get_mut(&target) {
        for &p in steal_list {
            if !target_node.partition_ids.contains(&p) {
                target_node.partition_ids.push(p);
            }
        }
        target_node.partition_ids.sort_unstable();
    }
    temp
}
