// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Codec configuration and build capabilities.
//!
//! Optional backends (Argon2, LZ4, native JPEG coefficient access, the rayon
//! pool) are cargo features. [`Capabilities::probe`] reports what the build
//! contains; the result is injected once through [`CodecConfig`] so the
//! derivation and embedding code never checks features on its own.

use serde::{Deserialize, Serialize};

use super::compress::CompressionAlgorithm;

/// Which optional backends are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Argon2id key derivation; PBKDF2-HMAC-SHA256 is used otherwise.
    pub argon2: bool,
    pub lz4: bool,
    /// Direct read/write of quantized JPEG coefficients.
    pub native_jpeg: bool,
    pub parallel: bool,
}

impl Capabilities {
    /// What this build was compiled with.
    pub const fn probe() -> Self {
        Self {
            argon2: cfg!(feature = "argon2"),
            lz4: cfg!(feature = "lz4"),
            native_jpeg: cfg!(feature = "native-jpeg"),
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Clamp to what is compiled in. A caller may switch a backend off but
    /// never on.
    pub fn effective(self) -> Self {
        let built = Self::probe();
        Self {
            argon2: self.argon2 && built.argon2,
            lz4: self.lz4 && built.lz4,
            native_jpeg: self.native_jpeg && built.native_jpeg,
            parallel: self.parallel && built.parallel,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::probe()
    }
}

/// Cost parameters for the password KDF.
///
/// Both sides of an exchange must use the same values; they are not stored
/// in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_lanes: u32,
    pub pbkdf2_iterations: u32,
}

impl KdfParams {
    /// 256 MiB, 4 passes, 4 lanes; 600k PBKDF2 rounds for the fallback.
    pub const STANDARD: Self = Self {
        argon2_memory_kib: 256 * 1024,
        argon2_iterations: 4,
        argon2_lanes: 4,
        pbkdf2_iterations: 600_000,
    };

    /// Smallest legal cost. Only for tests and throwaway data.
    pub const MINIMAL: Self = Self {
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        argon2_lanes: 1,
        pbkdf2_iterations: 1_000,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Everything a [`Codec`](super::pipeline::Codec) needs besides the inputs
/// of a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub capabilities: Capabilities,
    pub kdf: KdfParams,
    /// Preferred algorithm for the payload before encryption.
    pub compression: CompressionAlgorithm,
    /// DCT blocks between progress reports.
    pub progress_interval: usize,
    /// Upper bound on payload content (text bytes or file bytes).
    pub max_payload_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::probe(),
            kdf: KdfParams::STANDARD,
            compression: CompressionAlgorithm::Deflate,
            progress_interval: 256,
            max_payload_bytes: super::MAX_PAYLOAD_BYTES,
        }
    }
}

impl CodecConfig {
    /// Default configuration with the minimal KDF cost.
    pub fn for_testing() -> Self {
        Self { kdf: KdfParams::MINIMAL, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_never_adds_backends() {
        let all_on = Capabilities { argon2: true, lz4: true, native_jpeg: true, parallel: true };
        assert_eq!(all_on.effective(), Capabilities::probe());

        let off = Capabilities { argon2: false, ..Capabilities::probe() };
        assert!(!off.effective().argon2);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: CodecConfig = serde_json::from_str(r#"{"progress_interval": 8}"#).unwrap();
        assert_eq!(cfg.progress_interval, 8);
        assert_eq!(cfg.kdf, KdfParams::STANDARD);
        assert_eq!(cfg.compression, CompressionAlgorithm::Deflate);
    }
}
