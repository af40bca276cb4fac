//! Hashing and shard selection.
use crc::{Crc, CRC_64_GO_ISO};

use crate::key::Key;

/// CRC-64 with the ISO polynomial, reflected, all-ones init and xor-out.
const CRC64_ISO: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Digest of a routing key. Must be pure: same key, same digest, forever.
pub trait KeyHash: Send + Sync {
    fn sum(&self, key: Key<'_>) -> u64;
}

/// Default [`KeyHash`]: CRC-64/ISO over [`Key::encode`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc64;

impl KeyHash for Crc64 {
    fn sum(&self, key: Key<'_>) -> u64 {
        CRC64_ISO.checksum(&key.encode())
    }
}

/// Picks a shard position for a key.
///
/// Implementations return an index below `shards`; the cluster reduces the
/// result modulo the shard count regardless, so a lookup never leaves the
/// existing shard set.
pub trait Strategy: Send + Sync {
    fn select(&self, key: Key<'_>, shards: usize) -> usize;
}

/// Digest modulo shard count.
#[derive(Debug, Default, Clone)]
pub struct HashStrategy<H = Crc64> {
    hash: H,
}

impl<H: KeyHash> HashStrategy<H> {
    pub fn new(hash: H) -> Self {
        Self { hash }
    }

    /// Digest of `key` under this strategy's hash.
    pub fn sum(&self, key: Key<'_>) -> u64 {
        self.hash.sum(key)
    }
}

impl<H: KeyHash> Strategy for HashStrategy<H> {
    fn select(&self, key: Key<'_>, shards: usize) -> usize {
        (self.hash.sum(key) % shards as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ShardKey;

    #[test]
    fn crc64_fixed_digests() {
        let h = Crc64;
        assert_eq!(h.sum(122i64.as_key()), 4733761633363427328);
        assert_eq!(h.sum(122u64.as_key()), 4733761633363427328);
        assert_eq!(h.sum("122".as_key()), 4733761633363427328);
        assert_eq!(h.sum(123i64.as_key()), 4612164443424423936);
        assert_eq!(h.sum(123u64.as_key()), 4612164443424423936);
        assert_eq!(h.sum("123".as_key()), 4612164443424423936);
        assert_eq!(h.sum(b"123".as_slice().as_key()), 4612164443424423936);
        assert_eq!(h.sum("".as_key()), 0);
    }

    #[test]
    fn crc64_is_stable_across_calls() {
        let h = Crc64;
        let first = h.sum("alpha".as_key());
        for _ in 0..100 {
            assert_eq!(h.sum("alpha".as_key()), first);
        }
        assert_eq!(first, 3753819210285842432);
    }

    struct One;

    impl KeyHash for One {
        fn sum(&self, _: Key<'_>) -> u64 {
            1
        }
    }

    #[test]
    fn strategy_uses_plugged_hash() {
        let s = HashStrategy::new(One);
        assert_eq!(s.select("anything".as_key(), 3), 1);
        assert_eq!(s.select(Key::Int(9), 1), 0);
        let d = HashStrategy::<Crc64>::default();
        // 4733761633363427328 % 3 == 0
        assert_eq!(d.select(Key::Uint(122), 3), 0);
        assert_eq!(d.sum(Key::Uint(122)), 4733761633363427328);
    }
}
