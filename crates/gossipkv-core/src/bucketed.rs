//! `BucketedHashSet`: a partitioned anti-entropy divergence-detection aid.
//!
//! `numBuckets` buckets, each an XOR accumulator of per-item combined
//! hashes. Insert and match are O(1); the exported form is a fixed-size
//! array, making it cheap to gossip alongside a digest so two replicas
//! can tell, bucket by bucket, whether they've diverged.

use serde::{Deserialize, Serialize};

use crate::hash::fnv1a_str;

/// A multiplicative salt applied per additional value in a multi-value
/// insert/match, so that `(key, v1, v2)` and `(key, v2, v1)` combine
/// differently (order matters within a single call).
const VALUE_SALT: u32 = 0x9E37_79B1;

/// A bucketed hash set, configured by bucket count and an optional seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketedHashSet {
    seed: u32,
    buckets: Vec<u32>,
}

impl BucketedHashSet {
    /// Create a new set with `num_buckets` buckets (must be nonzero) and
    /// `seed` (0 if unspecified).
    pub fn new(num_buckets: usize, seed: u32) -> Self {
        assert!(num_buckets > 0, "numBuckets must be > 0");
        BucketedHashSet {
            seed,
            buckets: vec![0u32; num_buckets],
        }
    }

    fn bucket_index(&self, key_hash: u32) -> usize {
        (key_hash as usize % self.buckets.len()) + 1
    }

    fn combined_hash(&self, key: &str, values: &[&str]) -> (usize, u32) {
        let key_hash = fnv1a_str(key, self.seed);
        let mut combined = key_hash;
        for (i, value) in values.iter().enumerate() {
            let salt = ((i as u32 + 1).wrapping_mul(VALUE_SALT)) as u32;
            combined ^= fnv1a_str(value, self.seed.wrapping_add(salt));
        }
        (self.bucket_index(key_hash), combined)
    }

    /// XOR `(key, values...)`'s combined hash into its bucket. Inserting
    /// the exact same `(key, values...)` twice cancels out: the
    /// operation is its own undo for repeats.
    pub fn insert(&mut self, key: &str, values: &[&str]) {
        let bucket_at = self.bucket_index(fnv1a_str(key, self.seed)) - 1;
        let (_, combined) = self.combined_hash(key, values);
        self.buckets[bucket_at] ^= combined;
    }

    /// True iff `(key, values...)`'s bucket currently equals the combined
    /// hash that an `insert` of exactly this tuple would have produced.
    pub fn matches(&self, key: &str, values: &[&str]) -> bool {
        let (bucket, combined) = self.combined_hash(key, values);
        self.buckets[bucket - 1] == combined
    }

    /// Zero all buckets.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = 0);
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Export as the positional `(seed, numBuckets, buckets)` triple.
    pub fn export(&self) -> (u32, usize, Vec<u32>) {
        (self.seed, self.buckets.len(), self.buckets.clone())
    }

    /// Import a previously exported triple. Fails if `buckets.len() !=
    /// num_buckets`.
    pub fn import(seed: u32, num_buckets: usize, buckets: Vec<u32>) -> Option<Self> {
        if buckets.len() != num_buckets {
            return None;
        }
        Some(BucketedHashSet { seed, buckets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_matches() {
        let mut set = BucketedHashSet::new(16, 0);
        set.insert("alice", &["1", "on"]);
        assert!(set.matches("alice", &["1", "on"]));
    }

    #[test]
    fn non_inserted_key_does_not_match_fresh_set() {
        let set = BucketedHashSet::new(16, 0);
        assert!(!set.matches("alice", &["1"]));
    }

    #[test]
    fn insert_is_self_inverse() {
        let mut set = BucketedHashSet::new(16, 0);
        set.insert("alice", &["1"]);
        set.insert("alice", &["1"]);
        assert!(!set.matches("alice", &["1"]));
        assert_eq!(set.export().2, vec![0u32; 16]);
    }

    #[test]
    fn insert_order_is_commutative_across_keys() {
        let mut a = BucketedHashSet::new(8, 0);
        let mut b = BucketedHashSet::new(8, 0);

        a.insert("k1", &["v1"]);
        a.insert("k2", &["v2"]);

        b.insert("k2", &["v2"]);
        b.insert("k1", &["v1"]);

        assert_eq!(a.export(), b.export());
    }

    #[test]
    fn clear_zeros_all_buckets() {
        let mut set = BucketedHashSet::new(4, 0);
        set.insert("a", &[]);
        set.clear();
        assert_eq!(set.export().2, vec![0u32; 4]);
    }

    #[test]
    fn import_rejects_length_mismatch() {
        assert!(BucketedHashSet::import(0, 4, vec![0, 0]).is_none());
    }

    #[test]
    fn export_import_round_trips() {
        let mut set = BucketedHashSet::new(4, 7);
        set.insert("a", &["b"]);
        let (seed, n, buckets) = set.export();
        let imported = BucketedHashSet::import(seed, n, buckets).unwrap();
        assert_eq!(set, imported);
    }
}
