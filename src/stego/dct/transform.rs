// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Orthonormal 8×8 DCT-II and its inverse on stack buffers.
//!
//! Blocks are in natural (row-major) order, index = row * 8 + col. Both
//! directions are separable and allocate nothing.

use std::sync::OnceLock;

/// `BASIS[u][x] = C(u) * cos((2x + 1) * u * PI / 16)`, C(0) = 1/sqrt(8), C(u>0) = 1/2.
static BASIS: OnceLock<[[f32; 8]; 8]> = OnceLock::new();

fn basis() -> &'static [[f32; 8]; 8] {
    BASIS.get_or_init(|| {
        let mut table = [[0.0f32; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            let norm = if u == 0 { 1.0 / 8.0f64.sqrt() } else { 0.5 };
            for (x, v) in row.iter_mut().enumerate() {
                let angle = (2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0;
                *v = (norm * angle.cos()) as f32;
            }
        }
        table
    })
}

/// Spatial block to coefficients.
pub fn forward(pixels: &[f32; 64]) -> [f32; 64] {
    let b = basis();
    // Rows: tmp[y][v] = sum_x B[v][x] * f[y][x]
    let mut tmp = [0.0f32; 64];
    for y in 0..8 {
        for v in 0..8 {
            let mut acc = 0.0f32;
            for x in 0..8 {
                acc += b[v][x] * pixels[y * 8 + x];
            }
            tmp[y * 8 + v] = acc;
        }
    }
    // Columns: out[u][v] = sum_y B[u][y] * tmp[y][v]
    let mut out = [0.0f32; 64];
    for u in 0..8 {
        for v in 0..8 {
            let mut acc = 0.0f32;
            for y in 0..8 {
                acc += b[u][y] * tmp[y * 8 + v];
            }
            out[u * 8 + v] = acc;
        }
    }
    out
}

/// Coefficients back to a spatial block.
pub fn inverse(coeffs: &[f32; 64]) -> [f32; 64] {
    let b = basis();
    // tmp[u][x] = sum_v B[v][x] * F[u][v]
    let mut tmp = [0.0f32; 64];
    for u in 0..8 {
        for x in 0..8 {
            let mut acc = 0.0f32;
            for v in 0..8 {
                acc += b[v][x] * coeffs[u * 8 + v];
            }
            tmp[u * 8 + x] = acc;
        }
    }
    // f[y][x] = sum_u B[u][y] * tmp[u][x]
    let mut out = [0.0f32; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut acc = 0.0f32;
            for u in 0..8 {
                acc += b[u][y] * tmp[u * 8 + x];
            }
            out[y * 8 + x] = acc;
        }
    }
    out
}
