// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # stegkit-core
//!
//! Steganographic codec that hides encrypted text or files inside carrier
//! images. Three embedding modes:
//!
//! - **LSB**: one bit per pixel channel. Largest capacity, PNG output.
//! - **DCT transform**: bits in quantized luma DCT coefficients computed from
//!   pixels, with a triple header and Reed-Solomon coding. PNG output.
//! - **DCT native**: the same layout written straight into the coefficients
//!   of a baseline JPEG, re-encoded with its own tables. JPEG output.
//!
//! Keys come from a reference photo, a passphrase and a PIN and/or RSA key,
//! optionally bound to a channel key. Payloads are compressed, then sealed
//! with AES-256-GCM. The JPEG coefficient codec (`jpeg` module) is pure Rust.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use stegkit_core::{Codec, CodecConfig, Credentials, EmbedMode, Payload};
//!
//! let codec = Codec::new(CodecConfig::default());
//! let creds = Credentials::new(photo_bytes, "correct horse battery").with_pin("482913");
//! let out = codec.encode(&carrier_png, &Payload::text("meet at noon"), &creds, EmbedMode::Lsb)?;
//! let back = codec.decode(&out.image, &creds, None)?;
//! assert_eq!(back.payload, Payload::text("meet at noon"));
//! ```

pub mod jpeg;
pub mod stego;

pub use jpeg::coeffs::DctGrid;
pub use jpeg::error::JpegError;
pub use jpeg::JpegImage;
pub use stego::batch::{DecodeJob, EncodeJob};
pub use stego::isolate::{handle_json_request, Isolator, Request, Response};
pub use stego::{
    validate_dimensions, Capabilities, CapacityReport, ChannelKey, ChannelProgress, ChannelSelector, Codec,
    CodecConfig, CompressionAlgorithm, Credentials, DecodeOutput, EmbedMode, EmbedStats, EncodeOutput, ErrorKind,
    KdfParams, Payload, ProgressSink, RsaKeyMaterial, StegoError, MAX_DIMENSION, MAX_PAYLOAD_BYTES, MAX_PIXELS,
};
