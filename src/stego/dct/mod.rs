// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! DCT-coefficient embedding.
//!
//! Usable positions are the AC coefficients of full 8×8 luma blocks whose
//! quantized magnitude is at least 2, in block-raster order with natural
//! (row-major) order inside each block. A position is `block * 64 + k`.
//! A payload bit is the LSB of the magnitude; the sign is kept, and since
//! a magnitude of 2 or 3 only ever moves to 2 or 3 the usable set is the
//! same before and after embedding.
//!
//! - [`spatial`]: coefficients computed from pixels with a fixed step.
//! - [`native`]: the quantized coefficients of a baseline JPEG.

pub mod layout;
pub mod native;
pub mod spatial;
pub mod transform;

/// Smallest quantized magnitude that carries a bit.
pub const MIN_MAGNITUDE: i32 = 2;

pub fn is_usable(q: i32) -> bool {
    q.abs() >= MIN_MAGNITUDE
}

/// `q` with its magnitude LSB set to `bit`, sign preserved.
pub fn with_lsb(q: i32, bit: u8) -> i32 {
    let mag = (q.abs() & !1) | i32::from(bit & 1);
    if q < 0 {
        -mag
    } else {
        mag
    }
}

/// The bit carried by `q`.
pub fn lsb_of(q: i32) -> u8 {
    (q.abs() & 1) as u8
}
