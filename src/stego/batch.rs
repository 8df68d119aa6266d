// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Simple fan-out of many encodes or decodes under one set of credentials.
//!
//! Keys are derived once per batch. Items run on a fixed-size rayon pool
//! when the `parallel` capability is present, sequentially otherwise. Every
//! item gets its own `Result`; one failure never aborts the others.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, debug_span};

use super::credentials::Credentials;
use super::error::Result;
use super::payload::Payload;
use super::pipeline::{Codec, DecodeOutput, EncodeOutput};
use super::EmbedMode;

/// One carrier and what to hide in it.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub carrier: Vec<u8>,
    pub payload: Payload,
    pub mode: EmbedMode,
}

#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub image: Vec<u8>,
    /// `None` auto-detects.
    pub mode: Option<EmbedMode>,
}

fn fan_out<T, R, F>(items: &[T], threads: usize, parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Send + Sync,
{
    #[cfg(feature = "parallel")]
    if parallel && items.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("stegkit-batch-{i}"))
            .build();
        match pool {
            Ok(pool) => return pool.install(|| items.par_iter().map(&f).collect()),
            Err(e) => debug!(error = %e, "batch pool unavailable, running sequentially"),
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = (threads, parallel);

    items.iter().map(f).collect()
}

impl Codec {
    /// Encode every job with the same credentials on up to `threads` workers.
    ///
    /// The outer error covers credential validation and key derivation.
    pub fn encode_batch(
        &self,
        jobs: &[EncodeJob],
        creds: &Credentials,
        threads: usize,
    ) -> Result<Vec<Result<EncodeOutput>>> {
        let span = debug_span!("encode_batch", jobs = jobs.len(), threads);
        let _enter = span.enter();

        creds.validate()?;
        let channel = creds.channel()?.is_private();
        let keys = self.derive_keys(creds)?;
        let parallel = self.config().capabilities.effective().parallel;

        let results = fan_out(jobs, threads, parallel, |job| {
            self.encode_with_keys(&job.carrier, &job.payload, channel, &keys, job.mode)
        });
        debug!(failed = results.iter().filter(|r| r.is_err()).count(), "batch encode done");
        Ok(results)
    }

    /// Decode every image with the same credentials on up to `threads` workers.
    pub fn decode_batch(
        &self,
        jobs: &[DecodeJob],
        creds: &Credentials,
        threads: usize,
    ) -> Result<Vec<Result<DecodeOutput>>> {
        let span = debug_span!("decode_batch", jobs = jobs.len(), threads);
        let _enter = span.enter();

        creds.validate()?;
        let keys = self.derive_keys(creds)?;
        let parallel = self.config().capabilities.effective().parallel;

        let results = fan_out(jobs, threads, parallel, |job| self.decode_with_keys(&job.image, &keys, job.mode));
        debug!(failed = results.iter().filter(|r| r.is_err()).count(), "batch decode done");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::config::CodecConfig;
    use crate::stego::error::StegoError;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(seed: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(40, 40, |x, y| Rgb([x as u8 ^ seed, y as u8 * 3, seed.wrapping_mul(7)]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn fan_out_keeps_order() {
        let items: Vec<u32> = (0..20).collect();
        assert_eq!(fan_out(&items, 4, true, |x| x * 2), (0..20).map(|x| x * 2).collect::<Vec<_>>());
        assert_eq!(fan_out(&items, 4, false, |x| x + 1)[19], 20);
    }

    #[test]
    fn one_bad_item_does_not_sink_the_batch() {
        let codec = Codec::new(CodecConfig::for_testing());
        let creds = Credentials::new(b"batch photo".to_vec(), "river stone").with_pin("731905");
        let jobs = vec![
            EncodeJob { carrier: png(1), payload: Payload::text("first"), mode: EmbedMode::Lsb },
            EncodeJob { carrier: b"not an image".to_vec(), payload: Payload::text("lost"), mode: EmbedMode::Lsb },
            EncodeJob { carrier: png(2), payload: Payload::text("third"), mode: EmbedMode::Lsb },
        ];
        let encoded = codec.encode_batch(&jobs, &creds, 2).unwrap();
        assert!(encoded[0].is_ok());
        assert!(matches!(encoded[1], Err(StegoError::InvalidImage(_))));

        let decode_jobs: Vec<DecodeJob> = encoded
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|o| DecodeJob { image: o.image.clone(), mode: None })
            .collect();
        let decoded = codec.decode_batch(&decode_jobs, &creds, 2).unwrap();
        assert_eq!(decoded[0].as_ref().unwrap().payload, Payload::text("first"));
        assert_eq!(decoded[1].as_ref().unwrap().payload, Payload::text("third"));
    }

    #[test]
    fn bad_credentials_fail_the_whole_batch() {
        let codec = Codec::new(CodecConfig::for_testing());
        let creds = Credentials::new(b"p".to_vec(), "words");
        assert!(codec.decode_batch(&[], &creds, 1).is_err());
    }
}
