// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Self-describing compression wrapper applied to the plaintext before
//! encryption.
//!
//! Layout: `MAGIC(4) | ALGO(1) | ORIG_SIZE(4, LE) | BODY`. Inputs shorter than
//! [`MIN_COMPRESS_LEN`] and inputs that do not shrink are stored with the
//! `None` tag, so wrapping never costs more than [`HEADER_LEN`] bytes.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::Capabilities;
use super::error::CompressionError;

pub const MAGIC: [u8; 4] = *b"STGZ";
pub const HEADER_LEN: usize = 9;
pub const MIN_COMPRESS_LEN: usize = 64;

const BROTLI_QUALITY: u32 = 9;
const BROTLI_LG_WINDOW: u32 = 22;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Deflate,
    Lz4,
    Brotli,
}

impl CompressionAlgorithm {
    pub fn tag(self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Deflate => 1,
            CompressionAlgorithm::Lz4 => 2,
            CompressionAlgorithm::Brotli => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Deflate),
            2 => Some(CompressionAlgorithm::Lz4),
            3 => Some(CompressionAlgorithm::Brotli),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Deflate => "deflate",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Brotli => "brotli",
        }
    }

    /// The algorithm actually used for `preferred` under `caps`.
    pub fn resolve(self, caps: &Capabilities) -> Self {
        match self {
            CompressionAlgorithm::Lz4 if !caps.effective().lz4 => CompressionAlgorithm::Deflate,
            other => other,
        }
    }
}

fn wrap(algo: CompressionAlgorithm, orig_len: usize, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(algo.tag());
    out.extend_from_slice(&(orig_len as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data)?;
    enc.finish()
}

fn brotli_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut w = brotli::CompressorWriter::new(&mut out, 4096, BROTLI_QUALITY, BROTLI_LG_WINDOW);
        w.write_all(data)?;
        w.flush()?;
    }
    Ok(out)
}

#[cfg(feature = "lz4")]
fn lz4_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    Ok(lz4_flex::compress(data))
}

#[cfg(not(feature = "lz4"))]
fn lz4_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    deflate(data)
}

/// Compress `data` with `preferred` (or its fallback) and wrap it.
///
/// Never fails: a backend error is logged and the data is stored as-is.
pub fn compress(data: &[u8], preferred: CompressionAlgorithm, caps: &Capabilities) -> Vec<u8> {
    let algo = preferred.resolve(caps);
    if algo == CompressionAlgorithm::None || data.len() < MIN_COMPRESS_LEN {
        return wrap(CompressionAlgorithm::None, data.len(), data);
    }
    let packed = match algo {
        CompressionAlgorithm::None => return wrap(algo, data.len(), data),
        CompressionAlgorithm::Deflate => deflate(data),
        CompressionAlgorithm::Lz4 => lz4_compress(data),
        CompressionAlgorithm::Brotli => brotli_compress(data),
    };
    match packed {
        Ok(body) if body.len() < data.len() => {
            debug!(algo = algo.name(), from = data.len(), to = body.len(), "payload compressed");
            wrap(algo, data.len(), &body)
        }
        Ok(_) => wrap(CompressionAlgorithm::None, data.len(), data),
        Err(e) => {
            debug!(algo = algo.name(), error = %e, "compression failed, storing raw");
            wrap(CompressionAlgorithm::None, data.len(), data)
        }
    }
}

fn read_bounded<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>, CompressionError> {
    let mut out = Vec::with_capacity(limit.min(1 << 20));
    // One byte of slack so an oversized stream shows up as a size mismatch.
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::Corrupt(e.to_string()))?;
    Ok(out)
}

#[cfg(feature = "lz4")]
fn lz4_decompress(body: &[u8], orig: usize) -> Result<Vec<u8>, CompressionError> {
    lz4_flex::decompress(body, orig).map_err(|e| CompressionError::Corrupt(e.to_string()))
}

#[cfg(not(feature = "lz4"))]
fn lz4_decompress(_body: &[u8], _orig: usize) -> Result<Vec<u8>, CompressionError> {
    Err(CompressionError::Unavailable("lz4"))
}

/// Unwrap and decompress a frame produced by [`compress`].
///
/// The result must be exactly the recorded original size.
pub fn decompress(framed: &[u8]) -> Result<Vec<u8>, CompressionError> {
    if framed.len() < HEADER_LEN {
        return Err(CompressionError::Truncated);
    }
    if framed[..4] != MAGIC {
        return Err(CompressionError::BadMagic);
    }
    let algo = CompressionAlgorithm::from_tag(framed[4]).ok_or(CompressionError::UnknownAlgorithm(framed[4]))?;
    let expected = u32::from_le_bytes([framed[5], framed[6], framed[7], framed[8]]) as usize;
    let body = &framed[HEADER_LEN..];

    let out = match algo {
        CompressionAlgorithm::None => body.to_vec(),
        CompressionAlgorithm::Deflate => read_bounded(DeflateDecoder::new(body), expected)?,
        CompressionAlgorithm::Lz4 => lz4_decompress(body, expected)?,
        CompressionAlgorithm::Brotli => read_bounded(brotli::Decompressor::new(body, 4096), expected)?,
    };
    if out.len() != expected {
        return Err(CompressionError::SizeMismatch { expected, actual: out.len() });
    }
    Ok(out)
}
