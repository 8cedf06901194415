//! Digest strategies used to place virtual points and to locate keys.
//!
//! A [`RingHasher`] turns a byte string into a digest of at least
//! [`MIN_DIGEST_LEN`] bytes. The first four bytes of a key's digest, read as a
//! little-endian `u32`, are the key's position on the circle. Node point groups
//! use the first twelve bytes, which yield three positions.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use md5::{Digest, Md5};

/// A position on the circle. Values wrap modulo 2^32.
pub type HashKey = u32;

/// The minimum digest length, in bytes, that a [`RingHasher`] has to produce.
pub const MIN_DIGEST_LEN: usize = KEY_LEN * KEYS_PER_DIGEST;

/// Number of virtual points derived from a single digest.
pub(crate) const KEYS_PER_DIGEST: usize = 3;

const KEY_LEN: usize = 4;

/// A pluggable digest function.
///
/// Implementations must return at least [`MIN_DIGEST_LEN`] bytes for every
/// input, and must be deterministic. Plain closures of type
/// `Fn(&[u8]) -> Vec<u8>` implement this trait.
pub trait RingHasher: Send + Sync {
    fn digest(&self, input: &[u8]) -> Vec<u8>;
}

impl<F> RingHasher for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn digest(&self, input: &[u8]) -> Vec<u8> {
        self(input)
    }
}

/// Adapts any RustCrypto [`Digest`] into a [`RingHasher`].
pub struct DigestHasher<D>(PhantomData<fn() -> D>);

impl<D> DigestHasher<D> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<D> Default for DigestHasher<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for DigestHasher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DigestHasher")
            .field(&std::any::type_name::<D>())
            .finish()
    }
}

impl<D: Digest> RingHasher for DigestHasher<D> {
    fn digest(&self, input: &[u8]) -> Vec<u8> {
        D::digest(input).to_vec()
    }
}

/// The default hasher: MD5, producing 16 bytes.
pub type Md5Hasher = DigestHasher<Md5>;

/// A shared, validated [`RingHasher`].
#[derive(Clone)]
pub(crate) struct Digester(Arc<dyn RingHasher>);

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Digester")
    }
}

impl Default for Digester {
    fn default() -> Self {
        Self(Arc::new(Md5Hasher::new()))
    }
}

impl Digester {
    /// Wraps `hasher` after probing that it honors the digest length contract.
    pub fn checked<H: RingHasher + 'static>(hasher: H) -> anyhow::Result<Self> {
        let len = hasher.digest(b"").len();
        if len < MIN_DIGEST_LEN {
            anyhow::bail!(
                "digest produced {len} bytes, but at least {MIN_DIGEST_LEN} are required"
            );
        }
        Ok(Self(Arc::new(hasher)))
    }

    /// Computes the position of a single key: the first four digest bytes.
    ///
    /// # Panics
    ///
    /// Panics if the hasher returns fewer than four bytes, which breaks the
    /// contract it was validated against.
    pub fn key(&self, input: &[u8]) -> HashKey {
        let digest = self.0.digest(input);
        assert!(
            digest.len() >= KEY_LEN,
            "digest produced {} bytes, but at least {KEY_LEN} are required",
            digest.len()
        );
        hash_value(&digest, 0)
    }

    /// Computes the three point positions of a point group.
    ///
    /// # Panics
    ///
    /// Panics if the hasher returns fewer than [`MIN_DIGEST_LEN`] bytes.
    pub fn point_keys(&self, input: &[u8]) -> [HashKey; KEYS_PER_DIGEST] {
        let digest = self.0.digest(input);
        assert!(
            digest.len() >= MIN_DIGEST_LEN,
            "digest produced {} bytes, but at least {MIN_DIGEST_LEN} are required",
            digest.len()
        );
        std::array::from_fn(|chunk| hash_value(&digest, chunk))
    }
}

/// Decodes the `chunk`th group of four bytes as a little-endian `u32`.
fn hash_value(digest: &[u8], chunk: usize) -> HashKey {
    let offset = chunk * KEY_LEN;
    u32::from_le_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_keys_are_little_endian() {
        let digester = Digester::default();

        // md5("") = d41d8cd9 8f00b204 e9800998 ecf8427e
        assert_eq!(digester.key(b""), 0xd98c1dd4);
        assert_eq!(
            digester.point_keys(b""),
            [0xd98c1dd4, 0x04b2008f, 0x980980e9]
        );

        // md5("a") = 0cc175b9 ...
        assert_eq!(digester.key(b"a"), 0xb975c10c);
    }

    #[test]
    fn closures_are_hashers() {
        let digester = Digester::checked(|input: &[u8]| {
            let mut out = vec![0; 12];
            out[0] = input.len() as u8;
            out
        })
        .unwrap();

        assert_eq!(digester.key(b"abc"), 3);
        assert_eq!(digester.point_keys(b"ab"), [2, 0, 0]);
    }

    #[test]
    fn short_digests_are_rejected() {
        let err = Digester::checked(|_: &[u8]| vec![0u8; 8]).unwrap_err();
        assert!(err.to_string().contains("at least 12"));

        assert!(Digester::checked(|_: &[u8]| vec![0u8; 12]).is_ok());
        assert!(Digester::checked(Md5Hasher::new()).is_ok());
    }

    #[test]
    #[should_panic(expected = "digest produced 4 bytes")]
    fn inconsistent_digest_panics() {
        let digester = Digester::checked(|input: &[u8]| {
            if input.is_empty() {
                vec![0; 16]
            } else {
                vec![0; 4]
            }
        })
        .unwrap();

        digester.point_keys(b"node-0");
    }
}
