// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error type for the JPEG coefficient codec.

use thiserror::Error;

/// Errors raised while parsing or re-encoding a JPEG stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JpegError {
    #[error("unexpected end of JPEG data")]
    UnexpectedEof,
    #[error("missing SOI marker (not a JPEG)")]
    NotAJpeg,
    /// Progressive, lossless, arithmetic-coded and hierarchical frames.
    #[error("unsupported JPEG coding process: marker 0xFF{0:02X}")]
    UnsupportedProcess(u8),
    #[error("malformed {segment} segment: {reason}")]
    Malformed {
        segment: &'static str,
        reason: &'static str,
    },
    #[error("invalid Huffman code in scan data")]
    HuffmanDecode,
    #[error("Huffman table has no code for symbol 0x{0:02X}")]
    MissingHuffmanCode(u8),
    #[error("referenced table {0} is not defined")]
    UndefinedTable(u8),
    #[error("scan references unknown component {0}")]
    UnknownComponent(u8),
    #[error("scan does not cover every frame component")]
    PartialScan,
    #[error("unsupported sample precision: {0}-bit")]
    UnsupportedPrecision(u8),
    #[error("invalid image dimensions or sampling factors")]
    InvalidDimensions,
}

pub type Result<T> = std::result::Result<T, JpegError>;

pub(crate) fn malformed(segment: &'static str, reason: &'static str) -> JpegError {
    JpegError::Malformed { segment, reason }
}
