// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Encode/decode pipeline.
//!
//! Encode: validate, derive keys, compress, encrypt, frame, check capacity,
//! embed. Decode runs the same steps backwards: extract, parse the frame,
//! decrypt, decompress.
//!
//! The carrier's header dimensions are checked against the size limits
//! before keys are derived or any pixel or coefficient is decoded.
//!
//! Without a requested mode, decode tries native JPEG first (JPEG input with
//! the capability present), then transform (carriers with a full 8x8 block),
//! then LSB, and stops at the first mode whose header validates. Once a
//! header validates, later errors are returned as they are; no other mode is
//! tried. A carrier that fails validation ends the search too.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, info_span, Span};

use crate::jpeg::{looks_like_jpeg, JpegImage};
use crate::stego::canvas::{self, Canvas};
use crate::stego::capacity::{CapacityReport, EmbedStats};
use crate::stego::config::{Capabilities, CodecConfig};
use crate::stego::credentials::Credentials;
use crate::stego::dct::{native, spatial};
use crate::stego::error::{Result, StegoError};
use crate::stego::frame::{self, FrameHeader};
use crate::stego::kdf::{self, DerivedKeys};
use crate::stego::payload::Payload;
use crate::stego::progress::{BlockProgress, ProgressSink};
use crate::stego::{compress, crypto, lsb, validate_dimensions, EmbedMode};

/// Result of a successful encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutput {
    /// PNG for the pixel modes, JPEG for native mode.
    pub image: Vec<u8>,
    pub mode: EmbedMode,
    pub stats: EmbedStats,
}

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutput {
    pub payload: Payload,
    pub mode: EmbedMode,
    /// The frame was written under a private channel key.
    pub channel_used: bool,
}

/// A carrier decoded for one mode.
enum Carrier {
    Pixels(Canvas),
    Jpeg(JpegImage),
}

impl Carrier {
    fn total_blocks(&self) -> usize {
        match self {
            Carrier::Pixels(c) => {
                let (bw, bh) = c.blocks();
                bw * bh
            }
            Carrier::Jpeg(img) => img.grid(0).total_blocks(),
        }
    }
}

/// Entry point for encode, decode and capacity queries.
///
/// Holds the injected configuration, an optional progress sink and the span
/// all operation spans are parented to.
#[derive(Clone)]
pub struct Codec {
    config: CodecConfig,
    progress: Option<Arc<dyn ProgressSink>>,
    span: Span,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config, progress: None, span: info_span!("stegkit") }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Parent span for every operation of this codec.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn caps(&self) -> Capabilities {
        self.config.capabilities.effective()
    }

    fn block_progress(&self, total: usize) -> BlockProgress<'_> {
        BlockProgress::new(self.progress.as_ref(), self.config.progress_interval, total)
    }

    fn check_mode(&self, mode: EmbedMode) -> Result<()> {
        match mode {
            EmbedMode::DctNative if !self.caps().native_jpeg => {
                Err(StegoError::Unsupported("native JPEG embedding is not available in this build"))
            }
            _ => Ok(()),
        }
    }

    fn load(&self, bytes: &[u8], mode: EmbedMode) -> Result<Carrier> {
        match mode {
            EmbedMode::Lsb => Ok(Carrier::Pixels(Canvas::decode(bytes)?)),
            EmbedMode::DctTransform => {
                let canvas = Canvas::decode(bytes)?;
                let (bw, bh) = canvas.blocks();
                if bw == 0 || bh == 0 {
                    return Err(StegoError::Validation(
                        "carrier needs at least one full 8x8 block for DCT embedding".into(),
                    ));
                }
                Ok(Carrier::Pixels(canvas))
            }
            EmbedMode::DctNative => {
                self.check_mode(mode)?;
                Ok(Carrier::Jpeg(native::load(bytes)?))
            }
        }
    }

    /// Derive the per-call keys. Exposed so batch work can derive once.
    pub fn derive_keys(&self, creds: &Credentials) -> Result<DerivedKeys> {
        kdf::derive_keys(creds, &self.config.kdf, &self.caps())
    }

    /// Hide `payload` in `carrier`.
    pub fn encode(
        &self,
        carrier: &[u8],
        payload: &Payload,
        creds: &Credentials,
        mode: EmbedMode,
    ) -> Result<EncodeOutput> {
        let span = debug_span!(parent: &self.span, "encode", %mode);
        let _enter = span.enter();

        payload.validate(self.config.max_payload_bytes)?;
        creds.validate()?;
        self.check_mode(mode)?;
        check_carrier(carrier)?;
        let channel = creds.channel()?.is_private();
        let keys = self.derive_keys(creds)?;
        self.encode_with_keys(carrier, payload, channel, &keys, mode)
    }

    pub(crate) fn encode_with_keys(
        &self,
        carrier: &[u8],
        payload: &Payload,
        channel: bool,
        keys: &DerivedKeys,
        mode: EmbedMode,
    ) -> Result<EncodeOutput> {
        payload.validate(self.config.max_payload_bytes)?;
        let loaded = self.load(carrier, mode)?;

        let compressed = compress::compress(payload.content(), self.config.compression, &self.caps());
        let body = crypto::encrypt(&compressed, &keys.encryption)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| StegoError::Validation("payload too large for frame".into()))?;
        let header = FrameHeader::new(payload.payload_type(), mode, channel, body_len);
        let meta = payload.file_meta();
        let framed = frame::build_frame(&header, meta.as_ref(), &body)?;
        debug!(content = payload.content().len(), compressed = compressed.len(), frame = framed.len(), "payload framed");

        let progress = self.block_progress(loaded.total_blocks());
        let (image, stats) = debug_span!("embed", %mode).in_scope(|| match (mode, loaded) {
            (EmbedMode::Lsb, Carrier::Pixels(c)) => lsb::embed(c, &framed, &keys.ordering),
            (EmbedMode::DctTransform, Carrier::Pixels(c)) => spatial::embed(c, &framed, &keys.ordering, &progress),
            (EmbedMode::DctNative, Carrier::Jpeg(img)) => native::embed(img, &framed, &keys.ordering, &progress),
            _ => Err(StegoError::Unsupported("carrier does not match embed mode")),
        })?;
        debug!(
            pixels_modified = stats.pixels_modified,
            used = stats.capacity_used_percent,
            "encode finished"
        );
        Ok(EncodeOutput { image, mode, stats })
    }

    /// Recover the payload. `mode = None` auto-detects.
    pub fn decode(&self, stego: &[u8], creds: &Credentials, mode: Option<EmbedMode>) -> Result<DecodeOutput> {
        let span = debug_span!(parent: &self.span, "decode", mode = ?mode);
        let _enter = span.enter();

        creds.validate()?;
        if let Some(m) = mode {
            self.check_mode(m)?;
        }
        check_carrier(stego)?;
        let keys = self.derive_keys(creds)?;
        self.decode_with_keys(stego, &keys, mode)
    }

    pub(crate) fn decode_with_keys(
        &self,
        stego: &[u8],
        keys: &DerivedKeys,
        mode: Option<EmbedMode>,
    ) -> Result<DecodeOutput> {
        let (width, height) = check_carrier(stego)?;
        match mode {
            Some(requested) => {
                let carrier = self.load(stego, requested)?;
                match self.extract(&carrier, requested, keys) {
                    Ok(framed) => open(&framed, keys, requested),
                    Err(StegoError::NoDataFound) => {
                        for other in EmbedMode::ALL.into_iter().filter(|&m| m != requested) {
                            if self.probe(stego, other, keys) {
                                debug!(%requested, detected = %other, "header found in another mode");
                                return Err(StegoError::ModeMismatch { requested, detected: other });
                            }
                        }
                        Err(StegoError::NoDataFound)
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                let has_block = width >= 8 && height >= 8;
                for m in EmbedMode::auto_order(looks_like_jpeg(stego), &self.caps()) {
                    if m == EmbedMode::DctTransform && !has_block {
                        continue;
                    }
                    let carrier = match self.load(stego, m) {
                        Ok(c) => c,
                        Err(e @ StegoError::Validation(_)) => return Err(e),
                        Err(e) => {
                            debug!(mode = %m, error = %e, "carrier not usable in this mode");
                            continue;
                        }
                    };
                    match self.extract(&carrier, m, keys) {
                        Ok(framed) => return open(&framed, keys, m),
                        Err(StegoError::NoDataFound) => debug!(mode = %m, "no header"),
                        Err(e) => return Err(e),
                    }
                }
                Err(StegoError::NoDataFound)
            }
        }
    }

    fn extract(&self, carrier: &Carrier, mode: EmbedMode, keys: &DerivedKeys) -> Result<Vec<u8>> {
        let progress = self.block_progress(carrier.total_blocks());
        let framed = debug_span!("extract", %mode).in_scope(|| match (mode, carrier) {
            (EmbedMode::Lsb, Carrier::Pixels(c)) => lsb::extract(c, &keys.ordering),
            (EmbedMode::DctTransform, Carrier::Pixels(c)) => spatial::extract(c, &keys.ordering, &progress),
            (EmbedMode::DctNative, Carrier::Jpeg(img)) => native::extract(img, &keys.ordering, &progress),
            _ => Err(StegoError::Unsupported("carrier does not match embed mode")),
        })?;
        // The shuffle is keyed per mode, so a header claiming another mode
        // is noise that happened to parse.
        match FrameHeader::parse(&framed)?.mode() {
            Some(m) if m == mode => Ok(framed),
            other => {
                debug!(mode = %mode, header_mode = ?other, "header mode disagrees");
                Err(StegoError::NoDataFound)
            }
        }
    }

    /// `true` if a valid header for `mode` is present.
    fn probe(&self, stego: &[u8], mode: EmbedMode, keys: &DerivedKeys) -> bool {
        match self.load(stego, mode) {
            Ok(Carrier::Pixels(c)) => match mode {
                EmbedMode::Lsb => lsb::probe(&c, &keys.ordering).is_some(),
                _ => spatial::probe(&c, &keys.ordering).is_some(),
            },
            Ok(Carrier::Jpeg(img)) => native::probe(&img, &keys.ordering).is_some(),
            Err(_) => false,
        }
    }

    /// Capacity of `carrier` in `mode`.
    pub fn capacity(&self, carrier: &[u8], mode: EmbedMode) -> Result<CapacityReport> {
        self.check_mode(mode)?;
        match (mode, self.load(carrier, mode)?) {
            (EmbedMode::Lsb, Carrier::Pixels(c)) => Ok(lsb::capacity(&c)),
            (EmbedMode::DctTransform, Carrier::Pixels(c)) => spatial::capacity(&c),
            (EmbedMode::DctNative, Carrier::Jpeg(img)) => Ok(native::capacity(&img)),
            _ => Err(StegoError::Unsupported("carrier does not match embed mode")),
        }
    }

    /// Exact frame size `payload` will need with this codec's compression.
    pub fn framed_len(&self, payload: &Payload) -> Result<usize> {
        payload.validate(self.config.max_payload_bytes)?;
        let compressed = compress::compress(payload.content(), self.config.compression, &self.caps());
        Ok(frame::framed_len(payload.file_meta().as_ref(), compressed.len() + crypto::OVERHEAD))
    }

    pub fn fits(&self, carrier: &[u8], mode: EmbedMode, payload: &Payload) -> Result<bool> {
        Ok(self.capacity(carrier, mode)?.fits(self.framed_len(payload)?))
    }
}

/// Header-only size check. Runs before keys are derived or the carrier is
/// decoded.
fn check_carrier(bytes: &[u8]) -> Result<(u32, u32)> {
    let (width, height) = canvas::read_dimensions(bytes)?;
    validate_dimensions(width, height)?;
    Ok((width, height))
}

/// Frame bytes to payload.
fn open(framed: &[u8], keys: &DerivedKeys, mode: EmbedMode) -> Result<DecodeOutput> {
    let frame = frame::parse_frame(framed)?;
    let compressed = crypto::decrypt(&frame.body, &keys.encryption)?;
    let content = compress::decompress(&compressed)?;
    let payload = Payload::from_parts(frame.header.payload_type, frame.meta, content)?;
    Ok(DecodeOutput { payload, mode, channel_used: frame.header.channel_used() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::io::Cursor;

    fn noisy_png(w: u32, h: u32) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let img = RgbImage::from_fn(w, h, |_, _| {
            Rgb([rng.gen_range(50..200), rng.gen_range(50..200), rng.gen_range(50..200)])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn creds() -> Credentials {
        Credentials::new(b"reference photo".to_vec(), "blue lantern harbor").with_pin("482913")
    }

    #[test]
    fn lsb_roundtrip_reports_mode() {
        let codec = Codec::new(CodecConfig::for_testing());
        let carrier = noisy_png(48, 48);
        let out = codec.encode(&carrier, &Payload::text("hello"), &creds(), EmbedMode::Lsb).unwrap();
        assert_eq!(out.mode, EmbedMode::Lsb);

        let back = codec.decode(&out.image, &creds(), None).unwrap();
        assert_eq!(back.payload, Payload::text("hello"));
        assert_eq!(back.mode, EmbedMode::Lsb);
        assert!(!back.channel_used);
    }

    #[test]
    fn explicit_wrong_mode_is_a_mismatch() {
        let codec = Codec::new(CodecConfig::for_testing());
        let out = codec
            .encode(&noisy_png(64, 64), &Payload::text("mode check"), &creds(), EmbedMode::DctTransform)
            .unwrap();
        let err = codec.decode(&out.image, &creds(), Some(EmbedMode::Lsb)).unwrap_err();
        assert!(matches!(
            err,
            StegoError::ModeMismatch { requested: EmbedMode::Lsb, detected: EmbedMode::DctTransform }
        ));
    }

    #[test]
    fn clean_carrier_has_nothing() {
        let codec = Codec::new(CodecConfig::for_testing());
        let err = codec.decode(&noisy_png(32, 32), &creds(), None).unwrap_err();
        assert!(matches!(err, StegoError::NoDataFound));
    }

    #[test]
    fn native_needs_capability() {
        let mut config = CodecConfig::for_testing();
        config.capabilities.native_jpeg = false;
        let codec = Codec::new(config);
        let err = codec.capacity(&noisy_png(16, 16), EmbedMode::DctNative).unwrap_err();
        assert!(matches!(err, StegoError::Unsupported(_)));
    }

    #[test]
    fn capacity_checked_before_embedding() {
        let codec = Codec::new(CodecConfig::for_testing());
        let carrier = noisy_png(8, 8);
        let big = Payload::text("q".repeat(200));
        assert!(!codec.fits(&carrier, EmbedMode::Lsb, &big).unwrap());
        let err = codec.encode(&carrier, &big, &creds(), EmbedMode::Lsb).unwrap_err();
        assert!(matches!(err, StegoError::Capacity { available: 24, .. }));
    }
}
