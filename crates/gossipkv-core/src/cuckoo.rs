//! Partial-key cuckoo filter with 1-based bucket addressing.
//!
//! Unlike [`crate::bloom::BloomFilter`], a cuckoo filter supports
//! deletion: each slot stores a short fingerprint rather than a set of
//! hash bits, so removing an item just clears its fingerprint slot.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hash::fnv1a_str;

/// Multiplier used to derive a fingerprint's alternate-bucket offset.
/// Must be the same constant on every replica for `alternate_bucket` to
/// be self-inverse against itself.
const ALT_MULTIPLIER: u32 = 0x5bd1_e995;

/// A bucket is a fixed-size array of fingerprint slots; `0` means
/// unoccupied (fingerprints are forced nonzero at construction time).
type Bucket = Vec<u16>;

/// A cuckoo filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuckooFilter {
    num_buckets: usize,
    bucket_size: usize,
    fingerprint_bits: u32,
    max_kicks: usize,
    buckets: Vec<Bucket>,
    item_count: u64,
}

impl CuckooFilter {
    /// Create a filter sized for `num_items` at the given `bucket_size`
    /// (slots per bucket), `fingerprint_bits`, and `max_kicks` (eviction
    /// retry budget). `numBuckets` is the next power of two at or above
    /// `ceil(numItems / bucketSize)`.
    pub fn new(
        num_items: usize,
        bucket_size: usize,
        fingerprint_bits: u32,
        max_kicks: usize,
    ) -> Self {
        assert!(bucket_size > 0);
        assert!(fingerprint_bits > 0 && fingerprint_bits <= 16);
        let needed = num_items.max(1).div_ceil(bucket_size).max(1);
        let num_buckets = needed.next_power_of_two();

        CuckooFilter {
            num_buckets,
            bucket_size,
            fingerprint_bits,
            max_kicks,
            buckets: vec![Vec::new(); num_buckets],
            item_count: 0,
        }
    }

    fn fingerprint_mask(&self) -> u32 {
        (1u32 << self.fingerprint_bits) - 1
    }

    /// `fp = (FNV1a(v) >> 16) & mask`; zero is forced to 1 so it stays
    /// reserved as "unset."
    fn fingerprint(&self, v: &str) -> u16 {
        let h = fnv1a_str(v, 0);
        let fp = (h >> 16) & self.fingerprint_mask();
        (if fp == 0 { 1 } else { fp }) as u16
    }

    /// `(FNV1a(v) mod numBuckets) + 1`, 1-based.
    fn primary_bucket(&self, v: &str) -> (usize, u32) {
        let h = fnv1a_str(v, 0);
        ((h as usize % self.num_buckets) + 1, h)
    }

    /// The alternate bucket for `(index, fingerprint)`. Self-inverse:
    /// `alternate_bucket(alternate_bucket(i, fp), fp) == i` for every `i`
    /// in `[1, numBuckets]` — relies on `numBuckets` being a power of
    /// two so that XOR stays within `[0, numBuckets)` under `mod
    /// numBuckets`.
    fn alternate_bucket(&self, index: usize, fp: u16) -> usize {
        let fp = fp as u32;
        let mixed = fp.wrapping_mul(ALT_MULTIPLIER);
        let h = mixed ^ (mixed >> 15);
        let zero_based = (index - 1) % self.num_buckets;
        let alt = (zero_based ^ (h as usize % self.num_buckets)) % self.num_buckets;
        alt + 1
    }

    fn try_place(&mut self, bucket: usize, fp: u16) -> bool {
        let slots = &mut self.buckets[bucket - 1];
        if slots.len() < self.bucket_size {
            slots.push(fp);
            true
        } else {
            false
        }
    }

    /// Insert `v`. Returns `false` if the filter is full and eviction
    /// exhausts `maxKicks` without finding a placement.
    ///
    /// `itemCount` is bumped before the eviction loop runs, and
    /// evictions performed during a failed attempt are **not** rolled
    /// back. A filter driven to saturation can therefore end up with
    /// `itemCount` slightly ahead of its true occupied-slot count; this
    /// is documented behavior, not a bug (see DESIGN.md).
    pub fn insert(&mut self, v: &str) -> bool {
        let fp = self.fingerprint(v);
        let (i1, primary_hash) = self.primary_bucket(v);
        let i2 = self.alternate_bucket(i1, fp);

        if self.try_place(i1, fp) || self.try_place(i2, fp) {
            self.item_count += 1;
            return true;
        }

        self.item_count += 1;

        let mut curr = if primary_hash % 2 == 0 { i1 } else { i2 };
        let mut curr_fp = fp;
        let mut rng = rand::thread_rng();

        for _ in 0..self.max_kicks {
            let slots = &mut self.buckets[curr - 1];
            let slot = rng.gen_range(0..slots.len());
            std::mem::swap(&mut slots[slot], &mut curr_fp);

            let alt = self.alternate_bucket(curr, curr_fp);
            if self.try_place(alt, curr_fp) {
                return true;
            }
            curr = alt;
        }

        false
    }

    /// Scan `i1` then `i2` for a matching fingerprint.
    pub fn contains(&self, v: &str) -> bool {
        let fp = self.fingerprint(v);
        let (i1, _) = self.primary_bucket(v);
        let i2 = self.alternate_bucket(i1, fp);
        self.buckets[i1 - 1].contains(&fp) || self.buckets[i2 - 1].contains(&fp)
    }

    /// Remove at most one occurrence of `v`'s fingerprint from `i1` or
    /// `i2`. Duplicates are not tracked, so deleting a value inserted
    /// twice only removes one copy.
    pub fn delete(&mut self, v: &str) -> bool {
        let fp = self.fingerprint(v);
        let (i1, _) = self.primary_bucket(v);
        let i2 = self.alternate_bucket(i1, fp);

        for bucket in [i1, i2] {
            if let Some(pos) = self.buckets[bucket - 1].iter().position(|&slot| slot == fp) {
                self.buckets[bucket - 1].remove(pos);
                self.item_count = self.item_count.saturating_sub(1);
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.item_count = 0;
    }

    pub fn len(&self) -> u64 {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Fraction of total slots currently occupied. Diagnostic only; not
    /// part of the export format.
    pub fn load_factor(&self) -> f64 {
        let occupied: usize = self.buckets.iter().map(Vec::len).sum();
        let total = self.num_buckets * self.bucket_size;
        occupied as f64 / total as f64
    }

    /// Export as the positional `[numBuckets, bucketSize, fpBits,
    /// maxKicks, sparseBuckets]` tuple. `sparseBuckets` lists only
    /// nonempty buckets as `(index, fingerprints)`, 0-based.
    pub fn export(&self) -> (usize, usize, u32, usize, Vec<(usize, Vec<u16>)>) {
        let sparse = self
            .buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, b)| (i, b.clone()))
            .collect();
        (
            self.num_buckets,
            self.bucket_size,
            self.fingerprint_bits,
            self.max_kicks,
            sparse,
        )
    }

    /// Import a previously exported filter; recomputes `itemCount` from
    /// the occupied slots rather than trusting a stored value.
    pub fn import(
        num_buckets: usize,
        bucket_size: usize,
        fingerprint_bits: u32,
        max_kicks: usize,
        sparse_buckets: Vec<(usize, Vec<u16>)>,
    ) -> Option<Self> {
        if !num_buckets.is_power_of_two() {
            return None;
        }
        let mut buckets = vec![Vec::new(); num_buckets];
        let mut item_count = 0u64;
        for (index, fps) in sparse_buckets {
            if index >= num_buckets || fps.len() > bucket_size {
                return None;
            }
            item_count += fps.len() as u64;
            buckets[index] = fps;
        }
        Some(CuckooFilter {
            num_buckets,
            bucket_size,
            fingerprint_bits,
            max_kicks,
            buckets,
            item_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_bucket_is_self_inverse() {
        let filter = CuckooFilter::new(64, 4, 12, 512);
        for i in 1..=filter.num_buckets {
            for fp in 1u16..=((1u32 << filter.fingerprint_bits) - 1) as u16 {
                let alt = filter.alternate_bucket(i, fp);
                assert_eq!(filter.alternate_bucket(alt, fp), i, "i={i} fp={fp}");
            }
        }
    }

    #[test]
    fn insert_and_contains_100_items() {
        let mut filter = CuckooFilter::new(100, 4, 12, 512);
        let items: Vec<String> = (1..=100).map(|i| format!("item_{i}")).collect();
        for item in &items {
            assert!(filter.insert(item), "insert of {item} failed at low load");
        }
        for item in &items {
            assert!(filter.contains(item));
        }
        assert!(!filter.contains("missing"));
    }

    #[test]
    fn delete_removes_only_the_deleted_item() {
        let mut filter = CuckooFilter::new(100, 4, 12, 512);
        for i in 1..=100 {
            filter.insert(&format!("item_{i}"));
        }
        assert!(filter.delete("item_50"));
        assert!(!filter.contains("item_50"));
        assert!(filter.contains("item_51"));
    }

    #[test]
    fn delete_missing_item_fails() {
        let mut filter = CuckooFilter::new(16, 4, 12, 512);
        filter.insert("present");
        assert!(!filter.delete("absent"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut filter = CuckooFilter::new(16, 4, 12, 512);
        filter.insert("a");
        filter.clear();
        assert!(!filter.contains("a"));
        assert_eq!(filter.len(), 0);
    }

    #[test]
    fn export_import_round_trips() {
        let mut filter = CuckooFilter::new(16, 4, 12, 512);
        filter.insert("a");
        filter.insert("b");
        let (nb, bs, fb, mk, sparse) = filter.export();
        let imported = CuckooFilter::import(nb, bs, fb, mk, sparse).unwrap();
        assert!(imported.contains("a"));
        assert!(imported.contains("b"));
        assert_eq!(imported.len(), 2);
    }

    #[test]
    fn saturation_returns_false_without_panicking() {
        // Tiny filter, heavily overloaded: eviction will eventually fail.
        let mut filter = CuckooFilter::new(4, 1, 4, 50);
        let mut failed = false;
        for i in 0..200 {
            if !filter.insert(&format!("x{i}")) {
                failed = true;
                break;
            }
        }
        assert!(failed, "expected saturation on a 4x1 filter with 200 inserts");
    }
}
