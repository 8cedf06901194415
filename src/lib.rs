//! A consistent hash ring mapping string keys onto a set of weighted nodes.
//!
//! Every node is placed on a 32-bit circle at many virtual points, in numbers
//! proportional to its weight. A key belongs to the node owning the first point
//! after the key's own position, so adding or removing a node only moves the
//! keys next to that node's points.
//!
//! ```
//! use ketama_ring::HashRing;
//!
//! let ring = HashRing::new(["cache-1", "cache-2", "cache-3"]);
//! let owner = ring.resolve("user:42").unwrap();
//! assert!(ring.contains(owner));
//!
//! let replicas = ring.select_distinct("user:42", 2).unwrap();
//! assert_eq!(replicas[0], owner);
//!
//! // Topology changes produce a new ring; `ring` itself is unchanged.
//! let bigger = ring.add_weighted("cache-4", 2);
//! assert_eq!(ring.len(), 3);
//! assert_eq!(bigger.len(), 4);
//! ```

mod circle;
mod hasher;
mod ring;
mod shared;
mod topology;

pub use self::hasher::{DigestHasher, HashKey, Md5Hasher, RingHasher, MIN_DIGEST_LEN};
pub use self::ring::HashRing;
pub use self::shared::SharedRing;
pub use self::topology::{Topology, DEFAULT_WEIGHT};
