// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Bit layout shared by both DCT modes.
//!
//! ```text
//! HEADER_BLOCK = frame[0..11] ‖ TAIL_LEN(4, BE) ‖ CRC32(first 15 bytes, BE)   19 bytes
//! stream       = HEADER_BLOCK × 3 ‖ RS(frame[11..])
//! ```
//!
//! The three header copies are majority-voted bit by bit on read. The rest of
//! the frame (metadata and encrypted body) is Reed-Solomon coded.

use tracing::debug;

use crate::stego::ecc;
use crate::stego::error::{FrameError, Result, StegoError};
use crate::stego::frame::{self, FrameHeader};

pub const HEADER_BLOCK_LEN: usize = 19;
pub const HEADER_COPIES: usize = 3;
pub const HEADER_REGION_LEN: usize = HEADER_BLOCK_LEN * HEADER_COPIES;
/// Carrier bits taken by the redundant header.
pub const HEADER_BITS: usize = HEADER_REGION_LEN * 8;

fn header_block(frame: &[u8]) -> [u8; HEADER_BLOCK_LEN] {
    let mut block = [0u8; HEADER_BLOCK_LEN];
    block[..frame::HEADER_LEN].copy_from_slice(&frame[..frame::HEADER_LEN]);
    let tail_len = (frame.len() - frame::HEADER_LEN) as u32;
    block[11..15].copy_from_slice(&tail_len.to_be_bytes());
    let crc = crc32fast::hash(&block[..15]);
    block[15..].copy_from_slice(&crc.to_be_bytes());
    block
}

/// Bytes written to the carrier for `frame`.
pub fn encode(frame: &[u8]) -> Vec<u8> {
    debug_assert!(frame.len() >= frame::HEADER_LEN);
    let block = header_block(frame);
    let tail = ecc::encode(&frame[frame::HEADER_LEN..]);
    let mut out = Vec::with_capacity(HEADER_REGION_LEN + tail.len());
    for _ in 0..HEADER_COPIES {
        out.extend_from_slice(&block);
    }
    out.extend_from_slice(&tail);
    out
}

/// Encoded size of a frame of `frame_len` bytes.
pub fn encoded_len(frame_len: usize) -> usize {
    HEADER_REGION_LEN + ecc::encoded_len(frame_len.saturating_sub(frame::HEADER_LEN))
}

/// Largest frame that fits in `usable_positions` carrier bits.
pub fn frame_capacity(usable_positions: usize) -> usize {
    let bytes = usable_positions / 8;
    if bytes < HEADER_REGION_LEN {
        return 0;
    }
    frame::HEADER_LEN + ecc::max_data_len(bytes - HEADER_REGION_LEN)
}

/// Per-bit majority over the three copies.
pub fn vote(region: &[u8]) -> [u8; HEADER_BLOCK_LEN] {
    debug_assert_eq!(region.len(), HEADER_REGION_LEN);
    let mut out = [0u8; HEADER_BLOCK_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        let a = region[i];
        let b = region[HEADER_BLOCK_LEN + i];
        let c = region[2 * HEADER_BLOCK_LEN + i];
        *byte = (a & b) | (a & c) | (b & c);
    }
    out
}

/// A validated header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock {
    pub header: FrameHeader,
    pub tail_len: usize,
    pub raw: [u8; frame::HEADER_LEN],
}

pub fn parse_header_block(block: &[u8; HEADER_BLOCK_LEN]) -> std::result::Result<HeaderBlock, FrameError> {
    let stored = u32::from_be_bytes([block[15], block[16], block[17], block[18]]);
    if crc32fast::hash(&block[..15]) != stored {
        return Err(FrameError::HeaderChecksum);
    }
    let header = FrameHeader::parse(&block[..frame::HEADER_LEN])?;
    let tail_len = u32::from_be_bytes([block[11], block[12], block[13], block[14]]) as usize;
    if tail_len < header.body_len as usize {
        return Err(FrameError::LengthMismatch { declared: header.body_len as usize, actual: tail_len });
    }
    let mut raw = [0u8; frame::HEADER_LEN];
    raw.copy_from_slice(&block[..frame::HEADER_LEN]);
    Ok(HeaderBlock { header, tail_len, raw })
}

/// Read and validate only the header. `None` when nothing valid is there.
pub fn probe<I, F>(order: &mut I, bit_at: F) -> Option<HeaderBlock>
where
    I: Iterator<Item = u32>,
    F: FnMut(u32) -> u8,
{
    let region = frame::read_bytes(order, HEADER_REGION_LEN, bit_at)?;
    match parse_header_block(&vote(&region)) {
        Ok(h) => Some(h),
        Err(e) => {
            debug!(error = %e, "no DCT header");
            None
        }
    }
}

/// Read a whole frame. A missing header is [`StegoError::NoDataFound`]; a
/// header that promises more than the carrier holds is a truncation.
pub fn read<I, F>(order: &mut I, mut bit_at: F, usable_positions: usize) -> Result<Vec<u8>>
where
    I: Iterator<Item = u32>,
    F: FnMut(u32) -> u8,
{
    let head = probe(order, &mut bit_at).ok_or(StegoError::NoDataFound)?;
    let available = usable_positions / 8;
    let needed = HEADER_REGION_LEN + ecc::encoded_len(head.tail_len);
    if needed > available {
        return Err(FrameError::Truncated { needed, available }.into());
    }
    let coded = frame::read_bytes(order, ecc::encoded_len(head.tail_len), bit_at)
        .ok_or(FrameError::Truncated { needed, available })?;
    let (tail, corrected) =
        ecc::decode(&coded, head.tail_len).map_err(|e| StegoError::ReedSolomon { chunk: e.chunk })?;
    if corrected > 0 {
        debug!(corrected, "Reed-Solomon repaired bytes");
    }
    let mut out = Vec::with_capacity(frame::HEADER_LEN + tail.len());
    out.extend_from_slice(&head.raw);
    out.extend_from_slice(&tail);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::frame::build_frame;
    use crate::stego::payload::PayloadType;
    use crate::stego::EmbedMode;

    fn sample_frame(body_len: usize) -> Vec<u8> {
        let h = FrameHeader::new(PayloadType::Text, EmbedMode::DctNative, false, body_len as u32);
        let body: Vec<u8> = (0..body_len).map(|i| (i * 7) as u8).collect();
        build_frame(&h, None, &body).unwrap()
    }

    fn bits(bytes: &[u8]) -> Vec<u8> {
        frame::bits_msb_first(bytes).collect()
    }

    #[test]
    fn layout_size_matches_encoding() {
        let f = sample_frame(60);
        assert_eq!(encode(&f).len(), encoded_len(f.len()));
        assert_eq!(encoded_len(f.len()), 57 + 60 + 32);
    }

    #[test]
    fn capacity_is_tight() {
        for usable in [456, 1000, 4000, 20_000, 123_457] {
            let cap = frame_capacity(usable);
            if cap == 0 {
                continue;
            }
            assert!(encoded_len(cap) <= usable / 8, "usable {usable}");
            assert!(encoded_len(cap + 1) > usable / 8, "usable {usable}");
        }
        assert_eq!(frame_capacity(455), 0);
    }

    #[test]
    fn majority_vote_survives_one_bad_copy() {
        let f = sample_frame(50);
        let mut stream = encode(&f);
        for b in &mut stream[19..38] {
            *b ^= 0xFF;
        }
        let block = vote(&stream[..HEADER_REGION_LEN]);
        let parsed = parse_header_block(&block).unwrap();
        assert_eq!(parsed.tail_len, 50);
        assert_eq!(&parsed.raw[..], &f[..11]);
    }

    #[test]
    fn read_recovers_frame_through_bit_errors() {
        let f = sample_frame(80);
        let mut b = bits(&encode(&f));
        // One bit in each of five body bytes.
        for k in 0..5 {
            b[HEADER_BITS + k * 64 + 3] ^= 1;
        }
        let usable = b.len();
        let mut order = 0..usable as u32;
        let got = read(&mut order, |i| b[i as usize], usable).unwrap();
        assert_eq!(got, f);
    }

    #[test]
    fn too_many_errors_is_a_reed_solomon_failure() {
        let f = sample_frame(80);
        let mut b = bits(&encode(&f));
        for k in 0..20 {
            b[HEADER_BITS + k * 8] ^= 1;
        }
        let usable = b.len();
        let mut order = 0..usable as u32;
        let err = read(&mut order, |i| b[i as usize], usable).unwrap_err();
        assert!(matches!(err, StegoError::ReedSolomon { chunk: 0 }));
    }

    #[test]
    fn garbage_is_no_data() {
        let b = vec![0u8; 4000];
        let mut order = 0..4000u32;
        assert!(matches!(read(&mut order, |i| b[i as usize], 4000), Err(StegoError::NoDataFound)));
    }

    #[test]
    fn oversized_tail_is_truncation() {
        let f = sample_frame(200);
        let b = bits(&encode(&f));
        let usable = HEADER_BITS + 800;
        let mut order = 0..usable as u32;
        assert!(matches!(
            read(&mut order, |i| b[i as usize], usable),
            Err(StegoError::Frame(FrameError::Truncated { .. }))
        ));
    }
}
