use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::circle::{Circle, VirtualPoint};
use crate::hasher::{Digester, HashKey, RingHasher};
use crate::topology::Topology;

/// A consistent hash ring over a set of weighted nodes.
///
/// A built ring never changes. [`add`](Self::add), [`add_weighted`](Self::add_weighted)
/// and [`remove`](Self::remove) return a freshly built ring and leave `self`
/// untouched, so any number of threads can keep reading a ring while another
/// one prepares its successor. Cloning is cheap and shares the built circle.
#[derive(Clone)]
pub struct HashRing {
    inner: Arc<RingInner>,
}

struct RingInner {
    topology: Topology,
    circle: Circle,
    digester: Digester,
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("topology", &self.inner.topology)
            .field("points", &self.point_count())
            .finish()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Topology::default().build()
    }
}

impl HashRing {
    /// Builds a ring of equally weighted nodes, using MD5.
    pub fn new<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<SmolStr>,
    {
        Topology::new(nodes).build()
    }

    /// Builds a ring of equally weighted nodes, using a custom digest.
    pub fn with_hasher<I, N, H>(nodes: I, hasher: H) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<SmolStr>,
        H: RingHasher + 'static,
    {
        Topology::new(nodes).build_with_hasher(hasher)
    }

    /// Builds a ring from a node to weight mapping, using MD5.
    ///
    /// Nodes are placed in lexicographic order regardless of the iteration
    /// order of `weights`.
    pub fn with_weights<I, N>(weights: I) -> Self
    where
        I: IntoIterator<Item = (N, u32)>,
        N: Into<SmolStr>,
    {
        Topology::from_weights(weights).build()
    }

    /// Builds a ring from a node to weight mapping, using a custom digest.
    pub fn with_weights_and_hasher<I, N, H>(weights: I, hasher: H) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (N, u32)>,
        N: Into<SmolStr>,
        H: RingHasher + 'static,
    {
        Topology::from_weights(weights).build_with_hasher(hasher)
    }

    pub(crate) fn from_parts(topology: Topology, digester: Digester) -> Self {
        let circle = Circle::build(&topology, &digester);
        Self {
            inner: Arc::new(RingInner {
                topology,
                circle,
                digester,
            }),
        }
    }

    /// Returns whether both handles point to the same built ring.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// The position of `key` on the circle: the first four bytes of its
    /// digest, as a little-endian `u32`.
    pub fn compute_key(&self, key: &str) -> HashKey {
        self.inner.digester.key(key.as_bytes())
    }

    /// Finds the index of the first virtual point strictly after `key`.
    ///
    /// Keys beyond the last point wrap around to index 0. Returns `None` if the
    /// ring has no points.
    pub fn locate(&self, key: &str) -> Option<usize> {
        let circle = &self.inner.circle;
        if circle.is_empty() {
            return None;
        }
        circle.position(self.compute_key(key))
    }

    /// Returns the node owning `key`, or `None` if the ring is empty.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        let pos = self.locate(key)?;
        let point = &self.inner.circle.points()[pos];
        Some(self.owner(point))
    }

    /// Collects `count` distinct nodes for `key`, in the order they are met
    /// walking clockwise from the key's position.
    ///
    /// The first node is always the one [`resolve`](Self::resolve) returns.
    /// Returns `None` if the ring is empty, if `count` exceeds the number of
    /// nodes, or if a full turn around the circle finds fewer than `count`
    /// nodes owning points.
    pub fn select_distinct(&self, key: &str, count: usize) -> Option<Vec<&str>> {
        let pos = self.locate(key)?;
        if count > self.len() {
            return None;
        }

        let mut selected: Vec<u32> = Vec::with_capacity(count);
        for point in self.inner.circle.walk_from(pos) {
            if selected.len() == count {
                break;
            }
            if !selected.contains(&point.node) {
                selected.push(point.node);
            }
        }

        if selected.len() < count {
            return None;
        }

        let nodes = &self.inner.topology.nodes;
        Some(
            selected
                .into_iter()
                .map(|idx| nodes[idx as usize].as_str())
                .collect(),
        )
    }

    /// Returns a ring with `node` added at weight 1.
    pub fn add(&self, node: impl Into<SmolStr>) -> Self {
        self.add_weighted(node, 1)
    }

    /// Returns a ring with `node` added at `weight`.
    ///
    /// Returns `self` unchanged if `weight` is 0 or `node` is already present.
    pub fn add_weighted(&self, node: impl Into<SmolStr>, weight: u32) -> Self {
        let node = node.into();
        if weight == 0 {
            tracing::debug!(%node, "not adding node with zero weight");
            return self.clone();
        }

        let mut topology = self.inner.topology.clone();
        if !topology.insert(node.clone(), weight) {
            tracing::debug!(%node, "not adding duplicate node");
            return self.clone();
        }

        tracing::debug!(%node, weight, "adding node to ring");
        self.rebuild(topology)
    }

    /// Returns a ring without `node`.
    ///
    /// Removing an absent node still rebuilds an equivalent ring.
    pub fn remove(&self, node: &str) -> Self {
        let mut topology = self.inner.topology.clone();
        if topology.remove(node) {
            tracing::debug!(%node, "removing node from ring");
        } else {
            tracing::debug!(%node, "removing absent node from ring");
        }
        self.rebuild(topology)
    }

    fn rebuild(&self, topology: Topology) -> Self {
        Self::from_parts(topology, self.inner.digester.clone())
    }

    /// The nodes in this ring, in build order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.inner.topology.nodes()
    }

    /// The number of distinct nodes.
    pub fn len(&self) -> usize {
        self.inner.topology.len()
    }

    /// Returns `true` if the ring has no virtual points, so nothing resolves.
    pub fn is_empty(&self) -> bool {
        self.inner.circle.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.inner.topology.contains(node)
    }

    pub fn weight(&self, node: &str) -> Option<u32> {
        self.inner.topology.weight(node)
    }

    pub fn point_count(&self) -> usize {
        self.inner.circle.points().len()
    }

    /// The virtual points in ascending key order, with their owners.
    pub fn points(&self) -> impl Iterator<Item = (HashKey, &str)> {
        self.inner
            .circle
            .points()
            .iter()
            .map(move |point| (point.key, self.owner(point)))
    }

    pub fn topology(&self) -> &Topology {
        &self.inner.topology
    }

    fn owner(&self, point: &VirtualPoint) -> &str {
        self.inner.topology.nodes[point.node as usize].as_str()
    }
}
