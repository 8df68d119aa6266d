// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Native JPEG embedding: bits go straight into the quantized luma AC
//! coefficients of a baseline JPEG, which is then re-encoded with its own
//! tables.
//!
//! Flipping the magnitude LSB of a coefficient with `|c| >= 2` keeps the bit
//! length of the magnitude, hence its Huffman size category, so the file's
//! own tables can still encode it.

use tracing::debug;

use super::layout;
use super::{is_usable, lsb_of, with_lsb};
use crate::jpeg::coeffs::DctGrid;
use crate::jpeg::{looks_like_jpeg, read_dimensions, JpegImage};
use crate::stego::capacity::{CapacityReport, EmbedStats};
use crate::stego::error::{Result, StegoError};
use crate::stego::permute::{scatter_bits, ShuffleStream};
use crate::stego::progress::BlockProgress;
use crate::stego::{validate_dimensions, EmbedMode};

const MODE: EmbedMode = EmbedMode::DctNative;

/// Parse a carrier for native embedding. Non-JPEG input is an image error.
pub fn load(bytes: &[u8]) -> Result<JpegImage> {
    if !looks_like_jpeg(bytes) {
        return Err(StegoError::InvalidImage("native DCT mode needs a JPEG carrier".into()));
    }
    let (width, height) = read_dimensions(bytes)?;
    validate_dimensions(u32::from(width), u32::from(height))?;
    let img = JpegImage::from_bytes(bytes)?;
    if img.grid(0).total_blocks() == 0 {
        return Err(StegoError::Validation("carrier has no 8x8 luma blocks".into()));
    }
    Ok(img)
}

/// Usable luma positions (`block * 64 + k`) in block-raster, natural order.
pub fn usable_positions(grid: &DctGrid) -> Vec<u32> {
    grid.coeffs()
        .iter()
        .enumerate()
        .filter(|&(i, &c)| i % 64 != 0 && is_usable(i32::from(c)))
        .map(|(i, _)| i as u32)
        .collect()
}

fn scan(grid: &DctGrid, progress: &BlockProgress) -> Vec<u32> {
    let positions = usable_positions(grid);
    for done in 1..=grid.total_blocks() {
        progress.tick(done);
    }
    positions
}

pub fn capacity(img: &JpegImage) -> CapacityReport {
    CapacityReport::new(MODE, usable_positions(img.grid(0)).len())
}

pub(crate) fn embed(
    mut img: JpegImage,
    frame: &[u8],
    ordering_key: &[u8; 32],
    progress: &BlockProgress,
) -> Result<(Vec<u8>, EmbedStats)> {
    let positions = scan(img.grid(0), progress);
    let report = CapacityReport::new(MODE, positions.len());
    if !report.fits(frame.len()) {
        return Err(StegoError::Capacity { needed: frame.len(), available: report.frame_capacity });
    }

    let stream_bytes = layout::encode(frame);
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, positions.len() as u32);
    let mut modified = 0usize;
    let mut blocks = Vec::new();
    let coeffs = img.grid_mut(0).coeffs_mut();
    let bits = scatter_bits(&stream_bytes, &mut order, |idx, bit| {
        let pos = positions[idx as usize] as usize;
        let old = i32::from(coeffs[pos]);
        let new = with_lsb(old, bit);
        if new != old {
            coeffs[pos] = new as i16;
            modified += 1;
            blocks.push(pos / 64);
        }
    });
    blocks.sort_unstable();
    blocks.dedup();
    progress.finish();
    debug!(bits, coefficients = modified, blocks = blocks.len(), "native frame written");

    // A changed coefficient alters every decoded pixel of its block; padding
    // blocks past the image edge cover none.
    let (width, height) = (usize::from(img.width()), usize::from(img.height()));
    let bw = img.grid(0).blocks_wide();
    let pixels_modified = blocks
        .iter()
        .map(|&b| {
            let (x, y) = ((b % bw) * 8, (b / bw) * 8);
            width.saturating_sub(x).min(8) * height.saturating_sub(y).min(8)
        })
        .sum();

    let stats = EmbedStats {
        pixels_modified,
        total_pixels: width * height,
        capacity_used_percent: report.used_percent(frame.len()),
        bits_embedded: bits,
        usable_positions: report.usable_positions,
        blocks_modified: Some(blocks.len()),
    };
    Ok((img.to_bytes()?, stats))
}

pub fn probe(img: &JpegImage, ordering_key: &[u8; 32]) -> Option<layout::HeaderBlock> {
    let grid = img.grid(0);
    let positions = usable_positions(grid);
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, positions.len() as u32);
    layout::probe(&mut order, |idx| lsb_of(i32::from(grid.coeffs()[positions[idx as usize] as usize])))
}

pub(crate) fn extract(img: &JpegImage, ordering_key: &[u8; 32], progress: &BlockProgress) -> Result<Vec<u8>> {
    let grid = img.grid(0);
    let positions = scan(grid, progress);
    let mut order = ShuffleStream::for_mode(ordering_key, MODE, positions.len() as u32);
    let frame = layout::read(
        &mut order,
        |idx| lsb_of(i32::from(grid.coeffs()[positions[idx as usize] as usize])),
        positions.len(),
    );
    progress.finish();
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::frame::{build_frame, FrameHeader};
    use crate::stego::payload::PayloadType;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn noisy_jpeg(w: u32, h: u32) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let img = RgbImage::from_fn(w, h, |_, _| {
            Rgb([rng.gen_range(40..210), rng.gen_range(40..210), rng.gen_range(40..210)])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90).encode_image(&img).unwrap();
        out
    }

    fn frame(body_len: usize) -> Vec<u8> {
        let h = FrameHeader::new(PayloadType::Text, MODE, false, body_len as u32);
        build_frame(&h, None, &vec![0x3E; body_len]).unwrap()
    }

    #[test]
    fn positions_skip_dc_and_small_values() {
        let mut grid = DctGrid::new(2, 1);
        grid.coeffs_mut()[0] = 40;
        grid.coeffs_mut()[3] = -2;
        grid.coeffs_mut()[4] = 1;
        grid.coeffs_mut()[64 + 9] = 5;
        assert_eq!(usable_positions(&grid), vec![3, 73]);
    }

    #[test]
    fn embed_then_extract() {
        let key = [6u8; 32];
        let f = frame(100);
        let img = load(&noisy_jpeg(128, 128)).unwrap();
        let before = usable_positions(img.grid(0));
        let (jpeg, stats) = embed(img, &f, &key, &BlockProgress::silent()).unwrap();
        // 128x128 has no padding blocks.
        assert_eq!(stats.pixels_modified, stats.blocks_modified.unwrap() * 64);
        assert!(stats.pixels_modified <= stats.total_pixels);

        let stego = load(&jpeg).unwrap();
        assert_eq!(usable_positions(stego.grid(0)), before);
        assert!(probe(&stego, &key).is_some());
        assert_eq!(extract(&stego, &key, &BlockProgress::silent()).unwrap(), f);
        assert!(image::load_from_memory(&jpeg).is_ok());
    }

    #[test]
    fn oversized_frame_header_is_refused() {
        let mut data = noisy_jpeg(16, 16);
        let sof = data.windows(2).position(|w| w == [0xFF, 0xC0]).unwrap();
        data[sof + 5..sof + 9].copy_from_slice(&[0x2E, 0xE0, 0x2E, 0xE0]);
        assert!(matches!(load(&data), Err(StegoError::Validation(_))));
    }

    #[test]
    fn png_is_refused() {
        assert!(matches!(load(b"\x89PNG\r\n\x1a\n...."), Err(StegoError::InvalidImage(_))));
    }
}
