//! The node/weight description a ring is built from.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::hasher::{Digester, RingHasher};
use crate::ring::HashRing;

/// The weight of nodes that have no explicit entry.
pub const DEFAULT_WEIGHT: u32 = 1;

/// An ordered set of nodes together with their weights.
///
/// Node order decides which node wins when two virtual points collide, so it
/// is always deterministic: either the order the nodes were given in, or
/// lexicographic order when built from a weight mapping.
///
/// Deserializes from `{"nodes": [...], "weights": {...}}`. Both fields are
/// optional; without `nodes`, the weighted nodes are used in sorted order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TopologyDef", into = "TopologyDef")]
pub struct Topology {
    pub(crate) nodes: IndexSet<SmolStr>,
    pub(crate) weights: IndexMap<SmolStr, u32>,
}

// `IndexSet` equality ignores order, which matters here.
impl PartialEq for Topology {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.iter().eq(other.nodes.iter()) && self.weights == other.weights
    }
}

impl Eq for Topology {}

#[derive(Serialize, Deserialize)]
struct TopologyDef {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<SmolStr>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    weights: IndexMap<SmolStr, u32>,
}

impl From<TopologyDef> for Topology {
    fn from(def: TopologyDef) -> Self {
        if def.nodes.is_empty() {
            return Self::from_weights(def.weights);
        }

        let mut topology = Self::new(def.nodes);
        for (node, weight) in def.weights {
            if !topology.nodes.contains(&node) {
                continue;
            }
            if weight == 0 {
                topology.nodes.shift_remove(&node);
            } else {
                topology.weights.insert(node, weight);
            }
        }
        topology
    }
}

impl From<Topology> for TopologyDef {
    fn from(topology: Topology) -> Self {
        Self {
            nodes: topology.nodes.into_iter().collect(),
            weights: topology.weights,
        }
    }
}

impl Topology {
    /// Creates a topology of equally weighted nodes, keeping their order.
    ///
    /// Repeated identifiers are only kept at their first occurrence.
    pub fn new<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<SmolStr>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            weights: IndexMap::new(),
        }
    }

    /// Creates a topology from a node to weight mapping.
    ///
    /// Nodes are sorted lexicographically, so equivalent mappings always yield
    /// identical rings. Nodes with a weight of 0 are left out.
    pub fn from_weights<I, N>(weights: I) -> Self
    where
        I: IntoIterator<Item = (N, u32)>,
        N: Into<SmolStr>,
    {
        let mut weights: IndexMap<SmolStr, u32> = weights
            .into_iter()
            .map(|(node, weight)| (node.into(), weight))
            .collect();
        weights.retain(|_, weight| *weight > 0);
        weights.sort_keys();

        Self {
            nodes: weights.keys().cloned().collect(),
            weights,
        }
    }

    /// Builds a ring using the default MD5 digest.
    pub fn build(&self) -> HashRing {
        HashRing::from_parts(self.clone(), Digester::default())
    }

    /// Builds a ring using a custom digest.
    ///
    /// Fails if `hasher` produces digests shorter than
    /// [`MIN_DIGEST_LEN`](crate::MIN_DIGEST_LEN).
    pub fn build_with_hasher<H>(&self, hasher: H) -> anyhow::Result<HashRing>
    where
        H: RingHasher + 'static,
    {
        let digester = Digester::checked(hasher)?;
        Ok(HashRing::from_parts(self.clone(), digester))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(SmolStr::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// The weight of `node`, or `None` if it is not part of this topology.
    pub fn weight(&self, node: &str) -> Option<u32> {
        self.contains(node).then(|| self.weight_of(node))
    }

    pub(crate) fn weight_of(&self, node: &str) -> u32 {
        self.weights.get(node).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// Appends `node` with `weight`. Returns `false` if it was already present.
    pub(crate) fn insert(&mut self, node: SmolStr, weight: u32) -> bool {
        if !self.nodes.insert(node.clone()) {
            return false;
        }
        self.weights.insert(node, weight);
        true
    }

    /// Removes `node`, keeping the order of the others.
    pub(crate) fn remove(&mut self, node: &str) -> bool {
        self.weights.shift_remove(node);
        self.nodes.shift_remove(node)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keeps_first_occurrence_of_nodes() {
        let topology = Topology::new(["b", "a", "b", "c"]);
        assert_eq!(topology.nodes().collect::<Vec<_>>(), ["b", "a", "c"]);
        assert_eq!(topology.weight("a"), Some(1));
        assert_eq!(topology.weight("z"), None);
    }

    #[test]
    fn weights_are_sorted() {
        let first = Topology::from_weights([("c", 3), ("a", 1), ("b", 2), ("z", 0)]);
        let second = Topology::from_weights([("b", 2), ("c", 3), ("a", 1)]);

        assert_eq!(first, second);
        assert_eq!(first.nodes().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(first.weight("c"), Some(3));
        assert!(!first.contains("z"));
    }

    #[test]
    fn insert_and_remove() {
        let mut topology = Topology::new(["a", "b", "c"]);

        assert!(!topology.insert("a".into(), 5));
        assert_eq!(topology.weight("a"), Some(1));

        assert!(topology.insert("d".into(), 4));
        assert_eq!(topology.weight("d"), Some(4));

        assert!(topology.remove("b"));
        assert!(!topology.remove("b"));
        assert_eq!(topology.nodes().collect::<Vec<_>>(), ["a", "c", "d"]);
    }

    #[test]
    fn deserializes_node_lists() {
        let topology: Topology = serde_json::from_value(json!({
            "nodes": ["cache-2", "cache-1", "cache-3"],
            "weights": {"cache-1": 3, "cache-3": 0, "unknown": 2},
        }))
        .unwrap();

        assert_eq!(
            topology.nodes().collect::<Vec<_>>(),
            ["cache-2", "cache-1"]
        );
        assert_eq!(topology.weight("cache-1"), Some(3));
        assert_eq!(topology.weight("cache-2"), Some(1));
        assert_eq!(topology.weight("unknown"), None);
    }

    #[test]
    fn deserializes_weight_maps() {
        let topology: Topology = serde_json::from_value(json!({
            "weights": {"b": 1, "a": 2},
        }))
        .unwrap();

        assert_eq!(topology, Topology::from_weights([("a", 2), ("b", 1)]));
        assert_eq!(
            serde_json::to_value(&topology).unwrap(),
            json!({"nodes": ["a", "b"], "weights": {"a": 2, "b": 1}})
        );
    }
}
