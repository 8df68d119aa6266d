// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Quantized coefficient storage.

/// Quantization table, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    pub values: [u16; 64],
}

/// Quantized DCT coefficients of one component.
///
/// Blocks are kept in raster order; the 64 coefficients of a block are in
/// natural order (`row * 8 + col`), so index 0 of every block is DC. The flat
/// index `block * 64 + k` is what the embedding layer calls a position.
#[derive(Debug, Clone)]
pub struct DctGrid {
    blocks_wide: usize,
    blocks_tall: usize,
    coeffs: Vec<i16>,
}

impl DctGrid {
    pub fn new(blocks_wide: usize, blocks_tall: usize) -> Self {
        Self {
            blocks_wide,
            blocks_tall,
            coeffs: vec![0; blocks_wide * blocks_tall * 64],
        }
    }

    pub fn blocks_wide(&self) -> usize {
        self.blocks_wide
    }

    pub fn blocks_tall(&self) -> usize {
        self.blocks_tall
    }

    pub fn total_blocks(&self) -> usize {
        self.blocks_wide * self.blocks_tall
    }

    pub fn block(&self, row: usize, col: usize) -> &[i16] {
        let start = (row * self.blocks_wide + col) * 64;
        &self.coeffs[start..start + 64]
    }

    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut [i16] {
        let start = (row * self.blocks_wide + col) * 64;
        &mut self.coeffs[start..start + 64]
    }

    /// All coefficients, `total_blocks() * 64` long.
    pub fn coeffs(&self) -> &[i16] {
        &self.coeffs
    }

    pub fn coeffs_mut(&mut self) -> &mut [i16] {
        &mut self.coeffs
    }
}
