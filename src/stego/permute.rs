// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Secret-dependent ordering of the usable carrier positions.
//!
//! The permutation is a forward Fisher-Yates shuffle driven by ChaCha20
//! seeded from `SHA-256(ordering_key ‖ "stegkit/shuffle" ‖ mode_label)`.
//!
//! # Cross-platform portability
//!
//! `gen_range` is always called on `u32`, never `usize`, so 32-bit and
//! 64-bit targets draw the same amount of entropy per step and produce the
//! same permutation.
//!
//! [`ShuffleStream`] yields the permutation lazily: only the swaps actually
//! performed are remembered, so reading an 11-byte header out of a 48M
//! position carrier costs 88 draws, not a 48M-entry vector.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use super::EmbedMode;

const SHUFFLE_DOMAIN: &[u8] = b"stegkit/shuffle";

pub fn shuffle_seed(ordering_key: &[u8; 32], mode: EmbedMode) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(ordering_key);
    h.update(SHUFFLE_DOMAIN);
    h.update(mode.label().as_bytes());
    h.finalize().into()
}

/// Lazy Fisher-Yates over `0..len`.
pub struct ShuffleStream {
    rng: ChaCha20Rng,
    /// Slots whose content differs from the identity.
    swapped: HashMap<u32, u32>,
    len: u32,
    next: u32,
}

impl ShuffleStream {
    pub fn new(seed: [u8; 32], len: u32) -> Self {
        Self { rng: ChaCha20Rng::from_seed(seed), swapped: HashMap::new(), len, next: 0 }
    }

    pub fn for_mode(ordering_key: &[u8; 32], mode: EmbedMode, len: u32) -> Self {
        Self::new(shuffle_seed(ordering_key, mode), len)
    }

    fn slot(&self, i: u32) -> u32 {
        self.swapped.get(&i).copied().unwrap_or(i)
    }
}

impl Iterator for ShuffleStream {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next >= self.len {
            return None;
        }
        let i = self.next;
        let j = self.rng.gen_range(i..self.len);
        let at_i = self.slot(i);
        let at_j = self.slot(j);
        // Slot i is never read again; only j needs remembering.
        self.swapped.remove(&i);
        if j != i {
            self.swapped.insert(j, at_i);
        }
        self.next += 1;
        Some(at_j)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.len - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ShuffleStream {}

/// The whole permutation of `0..len`.
pub fn shuffle(seed: [u8; 32], len: u32) -> Vec<u32> {
    ShuffleStream::new(seed, len).collect()
}

/// Hand each bit of `bytes` (MSB first) to `set` together with the next
/// shuffled index. Returns the number of bits placed, which is short only
/// if the stream ran out.
pub fn scatter_bits<F>(bytes: &[u8], order: &mut ShuffleStream, mut set: F) -> usize
where
    F: FnMut(u32, u8),
{
    let mut placed = 0;
    for (bit, idx) in super::frame::bits_msb_first(bytes).zip(order) {
        set(idx, bit);
        placed += 1;
    }
    placed
}
