// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Capacity arithmetic shared by the embedding modes.
//!
//! Frame capacity is what the carrier can hold after the mode's own
//! redundancy. Payload capacity subtracts the fixed per-message overhead:
//! frame header, encryption header and compression header.

use serde::{Deserialize, Serialize};

use super::dct::layout;
use super::{compress, crypto, frame, EmbedMode};

/// Bytes every message costs on top of its (compressed) content.
pub const PAYLOAD_OVERHEAD: usize = frame::HEADER_LEN + crypto::OVERHEAD + compress::HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub mode: EmbedMode,
    pub usable_positions: usize,
    /// Largest frame, in bytes, the carrier can hold.
    pub frame_capacity: usize,
    /// Largest uncompressed text payload that always fits.
    pub payload_capacity: usize,
}

impl CapacityReport {
    pub fn new(mode: EmbedMode, usable_positions: usize) -> Self {
        let frame_capacity = frame_capacity(mode, usable_positions);
        Self {
            mode,
            usable_positions,
            frame_capacity,
            payload_capacity: frame_capacity.saturating_sub(PAYLOAD_OVERHEAD),
        }
    }

    pub fn fits(&self, frame_len: usize) -> bool {
        frame_len <= self.frame_capacity
    }

    /// Share of the capacity a frame of `frame_len` bytes uses, in percent.
    pub fn used_percent(&self, frame_len: usize) -> f64 {
        if self.frame_capacity == 0 {
            return 100.0;
        }
        frame_len as f64 * 100.0 / self.frame_capacity as f64
    }
}

/// What an embed changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedStats {
    /// Pixels whose value changed. In native mode these are the pixels
    /// covered by blocks with a changed coefficient, since a JPEG decoder
    /// reconstructs the whole block from its coefficients.
    pub pixels_modified: usize,
    pub total_pixels: usize,
    pub capacity_used_percent: f64,
    pub bits_embedded: usize,
    pub usable_positions: usize,
    /// Rebuilt or touched 8×8 blocks. DCT modes only.
    pub blocks_modified: Option<usize>,
}

pub fn frame_capacity(mode: EmbedMode, usable_positions: usize) -> usize {
    match mode {
        EmbedMode::Lsb => usable_positions / 8,
        EmbedMode::DctTransform | EmbedMode::DctNative => layout::frame_capacity(usable_positions),
    }
}
