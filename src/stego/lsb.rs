// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Least-significant-bit embedding in pixel channels.
//!
//! Every R, G and B sample is usable. Positions are channel-major: index `i`
//! is channel `i / (W·H)` of pixel `i % (W·H)`, pixels in raster order. The
//! frame is written bit by bit (MSB first) in shuffle order, with no extra
//! redundancy. Output is always PNG.

use tracing::{debug, trace};

use super::canvas::Canvas;
use super::capacity::{CapacityReport, EmbedStats};
use super::error::{FrameError, Result, StegoError};
use super::frame::{self, FrameHeader};
use super::payload::PayloadType;
use super::permute::{scatter_bits, ShuffleStream};
use super::EmbedMode;

/// Byte addressed by position `i` in a buffer of `n` pixels.
fn lsb_offset(n: usize, channels: usize, i: u32) -> usize {
    let i = i as usize;
    (i % n) * channels + i / n
}

fn byte_offset(canvas: &Canvas, i: u32) -> usize {
    lsb_offset(canvas.pixel_count(), canvas.channels(), i)
}

fn usable(canvas: &Canvas) -> usize {
    3 * canvas.pixel_count()
}

fn order(canvas: &Canvas, ordering_key: &[u8; 32]) -> ShuffleStream {
    ShuffleStream::for_mode(ordering_key, EmbedMode::Lsb, usable(canvas) as u32)
}

pub fn capacity(canvas: &Canvas) -> CapacityReport {
    CapacityReport::new(EmbedMode::Lsb, usable(canvas))
}

/// Write `frame` into the carrier. The caller has checked capacity.
pub fn embed(mut canvas: Canvas, frame: &[u8], ordering_key: &[u8; 32]) -> Result<(Vec<u8>, EmbedStats)> {
    let report = capacity(&canvas);
    if !report.fits(frame.len()) {
        return Err(StegoError::Capacity { needed: frame.len(), available: report.frame_capacity });
    }
    let n = canvas.pixel_count();
    let channels = canvas.channels();
    let mut touched = vec![false; n];
    let mut modified = 0usize;
    let mut stream = order(&canvas, ordering_key);

    let data = canvas.data_mut();
    let bits = scatter_bits(frame, &mut stream, |i, bit| {
        let off = lsb_offset(n, channels, i);
        let old = data[off];
        let new = (old & !1) | bit;
        if new != old {
            data[off] = new;
            let pixel = i as usize % n;
            if !touched[pixel] {
                touched[pixel] = true;
                modified += 1;
            }
        }
    });
    debug!(bits, modified, "LSB frame written");

    let stats = EmbedStats {
        pixels_modified: modified,
        total_pixels: n,
        capacity_used_percent: report.used_percent(frame.len()),
        bits_embedded: bits,
        usable_positions: report.usable_positions,
        blocks_modified: None,
    };
    Ok((canvas.encode_png()?, stats))
}

fn bit_reader(canvas: &Canvas) -> impl FnMut(u32) -> u8 + '_ {
    move |i| canvas.data()[byte_offset(canvas, i)] & 1
}

/// Read and validate the frame header only.
pub fn probe(canvas: &Canvas, ordering_key: &[u8; 32]) -> Option<FrameHeader> {
    let mut stream = order(canvas, ordering_key);
    let head = frame::read_bytes(&mut stream, frame::HEADER_LEN, bit_reader(canvas))?;
    FrameHeader::parse(&head).ok()
}

/// Pull the frame out of the carrier: header first, then metadata lengths
/// and strings, then exactly BODY_LEN bytes.
pub fn extract(canvas: &Canvas, ordering_key: &[u8; 32]) -> Result<Vec<u8>> {
    let available = usable(canvas) / 8;
    let mut stream = order(canvas, ordering_key);
    let read = |stream: &mut ShuffleStream, n: usize, have: usize| {
        frame::read_bytes(stream, n, bit_reader(canvas))
            .ok_or(StegoError::Frame(FrameError::Truncated { needed: have + n, available }))
    };

    let mut out = read(&mut stream, frame::HEADER_LEN, 0).map_err(|_| StegoError::NoDataFound)?;
    let header = match FrameHeader::parse(&out) {
        Ok(h) => h,
        Err(e) => {
            trace!(error = %e, "no LSB header");
            return Err(StegoError::NoDataFound);
        }
    };

    if header.payload_type == PayloadType::File {
        for _ in 0..2 {
            let len = read(&mut stream, 2, out.len())?;
            let n = u16::from_be_bytes([len[0], len[1]]) as usize;
            out.extend_from_slice(&len);
            let s = read(&mut stream, n, out.len())?;
            out.extend_from_slice(&s);
        }
    }

    let body_len = header.body_len as usize;
    if out.len() + body_len > available {
        return Err(FrameError::Truncated { needed: out.len() + body_len, available }.into());
    }
    let body = read(&mut stream, body_len, out.len())?;
    out.extend_from_slice(&body);
    Ok(out)
}
