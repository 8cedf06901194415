//! A handle for publishing topology changes to concurrent readers.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use smol_str::SmolStr;

use crate::ring::HashRing;

/// Holds the current [`HashRing`] and swaps it atomically.
///
/// Readers take a snapshot with [`load`](Self::load) and keep using it for as
/// long as they like; a concurrent swap never changes a snapshot already
/// handed out. Writers never block readers.
pub struct SharedRing {
    current: ArcSwap<HashRing>,
}

impl fmt::Debug for SharedRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedRing")
            .field(&**self.current.load())
            .finish()
    }
}

impl Default for SharedRing {
    fn default() -> Self {
        Self::new(HashRing::default())
    }
}

impl From<HashRing> for SharedRing {
    fn from(ring: HashRing) -> Self {
        Self::new(ring)
    }
}

impl SharedRing {
    pub fn new(ring: HashRing) -> Self {
        Self {
            current: ArcSwap::from_pointee(ring),
        }
    }

    /// Returns the current ring.
    pub fn load(&self) -> Arc<HashRing> {
        self.current.load_full()
    }

    /// Replaces the current ring, returning the previous one.
    pub fn store(&self, ring: HashRing) -> Arc<HashRing> {
        self.current.swap(Arc::new(ring))
    }

    /// Replaces the current ring with `f(current)`, returning the previous one.
    ///
    /// If another writer swaps the ring in the meantime, `f` is applied again
    /// to the newer ring, so no update is lost. `f` may therefore run more
    /// than once.
    pub fn update<F>(&self, f: F) -> Arc<HashRing>
    where
        F: Fn(&HashRing) -> HashRing,
    {
        let previous = self.current.rcu(|current| f(current));
        tracing::debug!(
            before = previous.len(),
            after = self.current.load().len(),
            "updated shared hash ring"
        );
        previous
    }

    pub fn add(&self, node: impl Into<SmolStr>) -> Arc<HashRing> {
        self.add_weighted(node, 1)
    }

    pub fn add_weighted(&self, node: impl Into<SmolStr>, weight: u32) -> Arc<HashRing> {
        let node = node.into();
        self.update(|ring| ring.add_weighted(node.clone(), weight))
    }

    pub fn remove(&self, node: &str) -> Arc<HashRing> {
        self.update(|ring| ring.remove(node))
    }
}
