// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Synthetic carriers and credentials shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stegkit_core::{CodecConfig, Credentials};

/// Mid-range RGB noise. Stays clear of 0 and 255 so DCT rebuilds never clip.
pub fn noise(w: u32, h: u32, seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    RgbImage::from_fn(w, h, |_, _| Rgb([rng.gen_range(50..200), rng.gen_range(50..200), rng.gen_range(50..200)]))
}

pub fn png(w: u32, h: u32, seed: u64) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(noise(w, h, seed)).write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn jpeg(w: u32, h: u32, seed: u64, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&noise(w, h, seed)).unwrap();
    out
}

pub fn dimensions(image: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(image).unwrap();
    (img.width(), img.height())
}

/// Four-word passphrase plus a six-digit PIN.
pub fn creds() -> Credentials {
    Credentials::new(b"holiday photo, lake, 2019".to_vec(), "amber falcon quiet meadow").with_pin("381205")
}

pub fn config() -> CodecConfig {
    CodecConfig::for_testing()
}

/// Opt-in log output: `RUST_LOG=stegkit_core=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
