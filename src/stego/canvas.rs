// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! 8-bit RGB(A) pixel buffer used by the pixel-domain modes.
//!
//! Any format the `image` crate reads is accepted as a carrier; output is
//! always PNG. An alpha channel is carried through untouched, otherwise the
//! output is RGB8.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, RgbaImage};

use super::error::{Result, StegoError};
use super::validate_dimensions;

pub struct Canvas {
    width: u32,
    height: u32,
    /// 3 for RGB, 4 for RGBA.
    channels: usize,
    data: Vec<u8>,
}

/// Width and height as the image header states them. No pixel data is
/// decoded.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StegoError::InvalidImage(e.to_string()))?
        .into_dimensions()
        .map_err(|e| StegoError::InvalidImage(e.to_string()))
}

impl Canvas {
    /// Decode to pixels. The size limits are checked against the header
    /// before any pixel is decoded.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (width, height) = read_dimensions(bytes)?;
        validate_dimensions(width, height)?;
        let img = image::load_from_memory(bytes).map_err(|e| StegoError::InvalidImage(e.to_string()))?;
        if (img.width(), img.height()) != (width, height) {
            return Err(StegoError::InvalidImage("decoded size differs from the header".into()));
        }
        let (channels, data) = if img.color().has_alpha() {
            (4, img.into_rgba8().into_raw())
        } else {
            (3, img.into_rgb8().into_raw())
        };
        Ok(Self { width, height, channels, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn luma_at(&self, pixel: usize) -> f32 {
        let o = pixel * self.channels;
        0.299 * f32::from(self.data[o]) + 0.587 * f32::from(self.data[o + 1]) + 0.114 * f32::from(self.data[o + 2])
    }

    /// Full 8×8 blocks across and down. Partial edge blocks are never used.
    pub fn blocks(&self) -> (usize, usize) {
        (self.width as usize / 8, self.height as usize / 8)
    }

    /// Luma of block (`bx`, `by`) in row-major order.
    pub fn luma_block(&self, bx: usize, by: usize) -> [f32; 64] {
        let mut out = [0.0f32; 64];
        let w = self.width as usize;
        for y in 0..8 {
            let row = (by * 8 + y) * w + bx * 8;
            for x in 0..8 {
                out[y * 8 + x] = self.luma_at(row + x);
            }
        }
        out
    }

    /// Add `delta[i]` to R, G and B of each block pixel, rounding and
    /// clamping. Returns how many pixels changed.
    pub fn apply_luma_delta(&mut self, bx: usize, by: usize, delta: &[f32; 64]) -> usize {
        let w = self.width as usize;
        let mut changed = 0;
        for y in 0..8 {
            let row = (by * 8 + y) * w + bx * 8;
            for x in 0..8 {
                let o = (row + x) * self.channels;
                let d = delta[y * 8 + x];
                let mut touched = false;
                for c in &mut self.data[o..o + 3] {
                    let v = (f32::from(*c) + d).round().clamp(0.0, 255.0) as u8;
                    touched |= v != *c;
                    *c = v;
                }
                changed += usize::from(touched);
            }
        }
        changed
    }

    pub fn encode_png(self) -> Result<Vec<u8>> {
        let Canvas { width, height, channels, data } = self;
        let img = match channels {
            4 => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
            _ => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
        };
        let img = img.ok_or_else(|| StegoError::InvalidImage("pixel buffer does not match dimensions".into()))?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .map_err(|e| StegoError::InvalidImage(format!("PNG encoding failed: {e}")))?;
        Ok(out.into_inner())
    }
}
