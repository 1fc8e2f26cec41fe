//! Hashing & Expansion Policy Module
//!
//! Strategies that place keys into shards and buckets, and decide when a
//! shard has outgrown its bucket array.

// == Slot Hasher ==
/// Maps a key to a slot index in `[0, modulus)`.
///
/// The same hasher picks both the shard (modulus = shard count) and the
/// bucket inside it (modulus = the shard's bucket count). An index that is
/// not strictly less than `modulus` is a fatal fault.
pub trait SlotHasher: Send + Sync {
    fn slot(&self, key: &str, modulus: usize) -> usize;
}

impl<F> SlotHasher for F
where
    F: Fn(&str, usize) -> usize + Send + Sync,
{
    fn slot(&self, key: &str, modulus: usize) -> usize {
        self(key, modulus)
    }
}

/// DJB hash over the key bytes, reduced into `[0, modulus)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DjbHasher;

impl DjbHasher {
    /// Returns the raw 31-bit hash of `key`.
    ///
    /// Each byte is added as a signed `i8`, so bytes at or above 0x80 are
    /// sign-extended before the add.
    pub fn hash(key: &str) -> u32 {
        let hash = key.bytes().fold(5381u32, |hash, byte| {
            hash.wrapping_add((hash << 5).wrapping_add(byte as i8 as u32))
        });
        hash & 0x7FFF_FFFF
    }
}

impl SlotHasher for DjbHasher {
    fn slot(&self, key: &str, modulus: usize) -> usize {
        Self::hash(key) as usize % modulus
    }
}

// == Expand Policy ==
/// Decides whether a shard should double its bucket array.
pub trait ExpandPolicy: Send + Sync {
    fn should_expand(&self, bucket_count: usize, live_count: usize) -> bool;
}

impl<F> ExpandPolicy for F
where
    F: Fn(usize, usize) -> bool + Send + Sync,
{
    fn should_expand(&self, bucket_count: usize, live_count: usize) -> bool {
        self(bucket_count, live_count)
    }
}

/// Grows a shard once its live entries exceed `factor` per bucket.
#[derive(Debug, Clone, Copy)]
pub struct LoadFactorPolicy {
    pub factor: usize,
}

impl Default for LoadFactorPolicy {
    fn default() -> Self {
        Self { factor: 2 }
    }
}

impl ExpandPolicy for LoadFactorPolicy {
    fn should_expand(&self, bucket_count: usize, live_count: usize) -> bool {
        live_count > self.factor.saturating_mul(bucket_count)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_djb_known_values() {
        assert_eq!(DjbHasher::hash(""), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(DjbHasher::hash("a"), 177_670);
        assert_eq!(DjbHasher::hash("ab"), 177_670 * 33 + 98);
    }

    #[test]
    fn test_djb_sign_extends_high_bytes() {
        // "é" is 0xC3 0xA9, added as -61 then -87
        assert_eq!(DjbHasher::hash("é"), 5_857_809);
        assert_eq!(DjbHasher::hash("é"), (177_573u32 - 61) * 33 - 87);
    }

    #[test]
    fn test_djb_slot_in_range() {
        for modulus in [1usize, 2, 7, 128, 1024] {
            for key in ["", "a", "hello", "a much longer key with spaces"] {
                assert!(DjbHasher.slot(key, modulus) < modulus);
            }
        }
    }

    #[test]
    fn test_djb_high_bit_masked() {
        let long_key = "z".repeat(64);
        assert!(DjbHasher::hash(&long_key) <= 0x7FFF_FFFF);
    }

    #[test]
    fn test_closure_hasher() {
        let hasher = |key: &str, modulus: usize| key.len() % modulus;
        assert_eq!(hasher.slot("abc", 2), 1);
    }

    #[test]
    fn test_load_factor_policy() {
        let policy = LoadFactorPolicy::default();
        assert!(!policy.should_expand(4, 8));
        assert!(policy.should_expand(4, 9));
    }

    #[test]
    fn test_closure_policy() {
        let never = |_: usize, _: usize| false;
        assert!(!never.should_expand(1, usize::MAX));
    }
}
