//! Classic k-hash Bloom filter, sized from `(n, fpr)`.

use serde::{Deserialize, Serialize};

use crate::hash::fnv1a_str;

/// A Bloom filter backed by a word-packed bit array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    num_bits: u32,
    num_hashes: u32,
    words: Vec<u32>,
    inserted: u64,
}

impl BloomFilter {
    /// Size a filter for `num_items` expected insertions at false-positive
    /// rate `fpr` (default 0.01 at the call site if unspecified).
    ///
    /// `m = ceil(n * -ln(p) / ln(2)^2)`, `k = ceil((m/n) * ln(2))`.
    pub fn new(num_items: u32, fpr: f64) -> Self {
        let n = num_items.max(1) as f64;
        let m = (n * (-fpr.ln()) / std::f64::consts::LN_2.powi(2)).ceil() as u32;
        let m = m.max(1);
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;
        let k = k.max(1);

        BloomFilter {
            num_bits: m,
            num_hashes: k,
            words: vec![0u32; (m as usize).div_ceil(32)],
            inserted: 0,
        }
    }

    fn set_bit(&mut self, i: u32) {
        let word = (i / 32) as usize;
        let bit = i % 32;
        self.words[word] |= 1u32 << bit;
    }

    fn get_bit(&self, i: u32) -> bool {
        let word = (i / 32) as usize;
        let bit = i % 32;
        (self.words[word] >> bit) & 1 == 1
    }

    /// Insert `v`, setting one bit per hash seed `0..k`.
    pub fn insert(&mut self, v: &str) {
        for s in 0..self.num_hashes {
            let i = fnv1a_str(v, s) % self.num_bits;
            self.set_bit(i);
        }
        self.inserted += 1;
    }

    /// True if every bit `v` would set is already set. May be a false
    /// positive; never a false negative for anything actually inserted.
    pub fn contains(&self, v: &str) -> bool {
        (0..self.num_hashes).all(|s| {
            let i = fnv1a_str(v, s) % self.num_bits;
            self.get_bit(i)
        })
    }

    /// `(1 - e^(-kn/m))^k`, the textbook estimated false-positive rate
    /// given how many items have actually been inserted.
    pub fn estimated_fpr(&self) -> f64 {
        let k = self.num_hashes as f64;
        let n = self.inserted as f64;
        let m = self.num_bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn len(&self) -> u64 {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }
}
