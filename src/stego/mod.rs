// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Steganographic encoding and decoding.
//!
//! Three embedding modes share one payload frame, one key derivation and one
//! encryption layer:
//!
//! - **LSB** (`EmbedMode::Lsb`): one bit per pixel channel, output PNG.
//!   Largest capacity, does not survive any lossy step.
//! - **DCT transform** (`EmbedMode::DctTransform`): bits go into quantized
//!   luma DCT coefficients computed from pixels, output PNG.
//! - **DCT native** (`EmbedMode::DctNative`): bits go straight into the
//!   quantized coefficients of a baseline JPEG, output JPEG.
//!
//! Both DCT modes protect the frame with a triple header and Reed-Solomon
//! coding. [`Codec`] is the entry point; [`Codec::decode`] auto-detects the
//! mode when none is requested.

pub mod batch;
pub mod canvas;
pub mod capacity;
pub mod channel;
pub mod compress;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod dct;
pub mod ecc;
pub mod error;
pub mod frame;
pub mod isolate;
pub mod kdf;
pub mod lsb;
pub mod payload;
pub mod permute;
pub mod pipeline;
pub mod progress;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use capacity::{CapacityReport, EmbedStats};
pub use channel::{ChannelKey, ChannelSelector};
pub use compress::CompressionAlgorithm;
pub use config::{Capabilities, CodecConfig, KdfParams};
pub use credentials::{Credentials, RsaKeyMaterial};
pub use error::{ErrorKind, StegoError};
pub use payload::Payload;
pub use pipeline::{Codec, DecodeOutput, EncodeOutput};
pub use progress::{ChannelProgress, ProgressSink};

/// Maximum carrier width or height.
pub const MAX_DIMENSION: u32 = 8192;

/// Maximum carrier pixel count (width × height).
pub const MAX_PIXELS: u64 = 16_000_000;

/// Maximum payload content size (text bytes or file bytes).
pub const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Validate carrier dimensions before any work is done on it.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), StegoError> {
    if width == 0 || height == 0 {
        return Err(StegoError::InvalidImage("carrier has no pixels".into()));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(StegoError::Validation(format!(
            "carrier is {width}x{height}, sides are limited to {MAX_DIMENSION}px"
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(StegoError::Validation(format!(
            "carrier has {} pixels, limit is {MAX_PIXELS}",
            u64::from(width) * u64::from(height)
        )));
    }
    Ok(())
}

/// Where the payload bits live in the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedMode {
    Lsb,
    DctTransform,
    DctNative,
}

impl EmbedMode {
    pub const ALL: [EmbedMode; 3] = [EmbedMode::Lsb, EmbedMode::DctTransform, EmbedMode::DctNative];

    /// Label mixed into the shuffle seed, so each mode permutes differently.
    pub fn label(self) -> &'static str {
        match self {
            EmbedMode::Lsb => "lsb",
            EmbedMode::DctTransform => "dct-transform",
            EmbedMode::DctNative => "dct-native",
        }
    }

    /// Value stored in bits 1-2 of the frame flags.
    pub fn flag_bits(self) -> u8 {
        match self {
            EmbedMode::Lsb => 0,
            EmbedMode::DctTransform => 1,
            EmbedMode::DctNative => 2,
        }
    }

    pub fn from_flag_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0 => Some(EmbedMode::Lsb),
            1 => Some(EmbedMode::DctTransform),
            2 => Some(EmbedMode::DctNative),
            _ => None,
        }
    }

    /// Order in which an unspecified decode tries the modes.
    ///
    /// Native first, and only for JPEG input with the capability present,
    /// then transform, then LSB.
    pub fn auto_order(is_jpeg: bool, caps: &Capabilities) -> Vec<EmbedMode> {
        let mut order = Vec::with_capacity(3);
        if is_jpeg && caps.effective().native_jpeg {
            order.push(EmbedMode::DctNative);
        }
        order.push(EmbedMode::DctTransform);
        order.push(EmbedMode::Lsb);
        order
    }
}

impl fmt::Display for EmbedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EmbedMode {
    type Err = StegoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lsb" => Ok(EmbedMode::Lsb),
            "dct" | "dct-transform" => Ok(EmbedMode::DctTransform),
            "dct-native" | "jpeg" => Ok(EmbedMode::DctNative),
            other => Err(StegoError::Validation(format!("unknown embed mode '{other}'"))),
        }
    }
}
