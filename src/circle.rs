use std::collections::HashMap;
use std::fmt::Write;

use crate::hasher::{Digester, HashKey, KEYS_PER_DIGEST};
use crate::topology::Topology;

/// Point groups generated per node, scaled by the node count and weight.
const POINT_GROUPS_PER_NODE: u64 = 40;

/// A single point on the circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VirtualPoint {
    /// The position of this point.
    pub key: HashKey,
    /// Index of the owning node in the ring's node list.
    pub(crate) node: u32,
}

/// The populated circle: every virtual point, sorted by key.
///
/// Colliding keys keep one entry per generated point, all of them resolving
/// to whichever node wrote that key last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Circle {
    points: Vec<VirtualPoint>,
}

impl Circle {
    pub fn build(topology: &Topology, digester: &Digester) -> Self {
        let node_count = topology.nodes.len() as u64;
        let total_weight: u64 = topology
            .nodes
            .iter()
            .map(|node| topology.weight_of(node) as u64)
            .sum();

        let mut owners: HashMap<HashKey, u32> = HashMap::new();
        let mut keys = Vec::new();

        let mut hash_buf = String::new();
        for (idx, node) in topology.nodes.iter().enumerate() {
            let weight = topology.weight_of(node) as u64;
            let groups = point_groups(node_count, weight, total_weight);
            keys.reserve(groups as usize * KEYS_PER_DIGEST);

            for group in 0..groups {
                hash_buf.clear();
                write!(&mut hash_buf, "{node}-{group}").unwrap();

                for key in digester.point_keys(hash_buf.as_bytes()) {
                    owners.insert(key, idx as u32);
                    keys.push(key);
                }
            }
        }

        keys.sort_unstable();
        let points = keys
            .into_iter()
            .map(|key| VirtualPoint {
                key,
                node: owners[&key],
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            nodes = node_count,
            points = points.len(),
            "built hash ring circle"
        );

        Self { points }
    }

    pub fn points(&self) -> &[VirtualPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the first point strictly after `key`, wrapping to 0.
    pub fn position(&self, key: HashKey) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }

        let pos = self.points.partition_point(|point| point.key <= key);
        if pos == self.points.len() {
            Some(0)
        } else {
            Some(pos)
        }
    }

    /// Walks the circle clockwise starting at `pos`, wrapping once.
    pub fn walk_from(&self, pos: usize) -> impl Iterator<Item = &VirtualPoint> {
        let (before, after) = self.points.split_at(pos);
        after.iter().chain(before)
    }
}

/// `floor(40 * nodes * weight / total_weight)`
fn point_groups(node_count: u64, weight: u64, total_weight: u64) -> u64 {
    if total_weight == 0 {
        return 0;
    }
    POINT_GROUPS_PER_NODE * node_count * weight / total_weight
}
