// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Transform-domain embedding for any carrier image.
//!
//! Luma `Y = 0.299R + 0.587G + 0.114B` is transformed one full 8×8 block at
//! a time with stack buffers; AC coefficients are quantized with a fixed
//! step of 16. Only blocks that receive a changed bit are rebuilt: every AC
//! coefficient of such a block is snapped to `q · 16`, the block is inverse
//! transformed, and the luma difference is added equally to R, G and B.
//! Snapping puts each coefficient in the middle of its quantization bin, so
//! rounding pixels back to 8 bits does not move it across a boundary.
//!
//! No whole-image transform is ever built. Output is PNG.

use std::collections::BTreeMap;

use tracing::debug;

use super::layout;
use super::transform;
use super::{is_usable, lsb_of, with_lsb};
use crate::stego::canvas::Canvas;
use crate::stego::capacity::{CapacityReport, EmbedStats};
use crate::stego::error::{Result, StegoError};
use crate::stego::permute::{scatter_bits, ShuffleStream};
use crate::stego::progress::BlockProgress;
use crate::stego::EmbedMode;

pub const QUANT_STEP: f32 = 16.0;

const MODE: EmbedMode = EmbedMode::DctTransform;

fn quantize(c: f32) -> i32 {
    (c / QUANT_STEP).round() as i32
}

/// Usable positions of a carrier and the quantized value at each.
pub struct TransformScan {
    pub positions: Vec<u32>,
    pub values: Vec<i16>,
    pub total_blocks: usize,
}

/// One forward transform per full block, in raster order.
pub(crate) fn scan(canvas: &Canvas, progress: &BlockProgress) -> Result<TransformScan> {
    let (bw, bh) = canvas.blocks();
    if bw == 0 || bh == 0 {
        return Err(StegoError::Validation(
            "carrier needs at least one full 8x8 block for DCT embedding".into(),
        ));
    }
    let total_blocks = bw * bh;
    let mut positions = Vec::new();
    let mut values = Vec::new();
    for by in 0..bh {
        for bx in 0..bw {
            let block = by * bw + bx;
            let coeffs = transform::forward(&canvas.luma_block(bx, by));
            for (k, &c) in coeffs.iter().enumerate().skip(1) {
                let q = quantize(c);
                if is_usable(q) {
                    positions.push((block * 64 + k) as u32);
                    values.push(q as i16);
                }
            }
            progress.tick(block + 1);
        }
    }
    Ok(TransformScan { positions, values, total_blocks })
}

pub fn capacity(canvas: &Canvas) -> Result<CapacityReport> {
    let s = scan(canvas, &BlockProgress::silent())?;
    Ok(CapacityReport::new(MODE, s.positions.len()))
}

/// Rebuild one block so that its AC coefficients quantize to `overrides`
/// (and to their current values elsewhere). Returns changed pixels and
/// how many coefficients still read back differently.
fn rebuild_block(canvas: &mut Canvas, bx: usize, by: usize, overrides: &[(usize, i32)]) -> Result<(usize, usize)> {
    let luma = canvas.luma_block(bx, by);
    let coeffs = transform::forward(&luma);

    let mut wanted = [0i32; 64];
    for k in 1..64 {
        wanted[k] = quantize(coeffs[k]);
    }
    for &(k, q) in overrides {
        wanted[k] = q;
    }
    let mut snapped = [0.0f32; 64];
    snapped[0] = coeffs[0];
    for k in 1..64 {
        snapped[k] = wanted[k] as f32 * QUANT_STEP;
    }

    let rebuilt = transform::inverse(&snapped);
    let mut delta = [0.0f32; 64];
    for i in 0..64 {
        delta[i] = rebuilt[i] - luma[i];
    }
    let changed = canvas.apply_luma_delta(bx, by, &delta);

    let check = transform::forward(&canvas.luma_block(bx, by));
    let mut flipped = 0;
    for k in 1..64 {
        let got = quantize(check[k]);
        if is_usable(got) != is_usable(wanted[k]) {
            // Clipping moved a coefficient in or out of the usable set; the
            // decoder would see a different position list.
            return Err(StegoError::Unsupported("carrier is too saturated for transform-domain embedding"));
        }
        if got != wanted[k] {
            flipped += 1;
        }
    }
    Ok((changed, flipped))
}

pub(crate) fn embed(
    mut canvas: Canvas,
    frame: &[u8],
    ordering_key: &[u8; 32],
    progress: &BlockProgress,
) -> Result<(Vec<u8>, EmbedStats)> {
    let scan = scan(&canvas, progress)?;
    let report = CapacityReport::new(MODE, scan.positions.len());
    if !report.fits(frame.len()) {
        return Err(StegoError::Capacity { needed: frame.len(), available: report.frame_capacity });
    }

    let stream_bytes = layout::encode(frame);
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, scan.positions.len() as u32);
    let mut targets: BTreeMap<u32, Vec<(usize, i32)>> = BTreeMap::new();
    let bits = scatter_bits(&stream_bytes, &mut order, |idx, bit| {
        let idx = idx as usize;
        let q = i32::from(scan.values[idx]);
        let nq = with_lsb(q, bit);
        if nq != q {
            let pos = scan.positions[idx];
            targets.entry(pos / 64).or_default().push(((pos % 64) as usize, nq));
        }
    });

    let (bw, _) = canvas.blocks();
    let mut pixels_modified = 0;
    let mut flipped = 0;
    for (&block, overrides) in &targets {
        let block = block as usize;
        let (changed, flips) = rebuild_block(&mut canvas, block % bw, block / bw, overrides)?;
        pixels_modified += changed;
        flipped += flips;
    }
    progress.finish();
    debug!(bits, blocks = targets.len(), pixels_modified, flipped, "transform-domain frame written");

    let stats = EmbedStats {
        pixels_modified,
        total_pixels: canvas.pixel_count(),
        capacity_used_percent: report.used_percent(frame.len()),
        bits_embedded: bits,
        usable_positions: report.usable_positions,
        blocks_modified: Some(targets.len()),
    };
    Ok((canvas.encode_png()?, stats))
}

pub fn probe(canvas: &Canvas, ordering_key: &[u8; 32]) -> Option<layout::HeaderBlock> {
    let scan = scan(canvas, &BlockProgress::silent()).ok()?;
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, scan.positions.len() as u32);
    layout::probe(&mut order, |idx| lsb_of(i32::from(scan.values[idx as usize])))
}

pub(crate) fn extract(canvas: &Canvas, ordering_key: &[u8; 32], progress: &BlockProgress) -> Result<Vec<u8>> {
    let scan = scan(canvas, progress)?;
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, scan.positions.len() as u32);
    let frame = layout::read(
        &mut order,
        |idx| lsb_of(i32::from(scan.values[idx as usize])),
        scan.positions.len(),
    );
    progress.finish();
    frame
}
