// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Zigzag <-> natural (row-major) coefficient order.

/// `ZIGZAG[z]` is the row-major index of the z-th coefficient in scan order.
pub const ZIGZAG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Inverse of [`ZIGZAG`].
pub const UNZIGZAG: [usize; 64] = {
    let mut inv = [0usize; 64];
    let mut z = 0;
    while z < 64 {
        inv[ZIGZAG[z]] = z;
        z += 1;
    }
    inv
};
