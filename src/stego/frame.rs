// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Payload frame format.
//!
//! ```text
//! MAGIC(4)="STGK" | VERSION(1) | FLAGS(1) | TYPE(1) | BODY_LEN(4, BE)
//!   [ FILENAME_LEN(2, BE) | FILENAME | MIME_LEN(2, BE) | MIME ]   file payloads only
//!   BODY = SALT(16) | IV(12) | TAG(16) | CIPHERTEXT
//! ```
//!
//! FLAGS bit 0 marks a private channel key, bits 1-2 hold the embed mode.
//! The other bits are written as zero and ignored on read.

use super::crypto;
use super::error::FrameError;
use super::payload::PayloadType;
use super::EmbedMode;

pub const MAGIC: [u8; 4] = *b"STGK";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 11;

pub const FLAG_CHANNEL: u8 = 0b0000_0001;
const MODE_SHIFT: u8 = 1;
const MODE_MASK: u8 = 0b0000_0110;

/// The fixed 11-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: u8,
    pub payload_type: PayloadType,
    pub body_len: u32,
}

impl FrameHeader {
    pub fn new(payload_type: PayloadType, mode: EmbedMode, channel: bool, body_len: u32) -> Self {
        let mut flags = mode.flag_bits() << MODE_SHIFT;
        if channel {
            flags |= FLAG_CHANNEL;
        }
        Self { version: VERSION, flags, payload_type, body_len }
    }

    pub fn channel_used(&self) -> bool {
        self.flags & FLAG_CHANNEL != 0
    }

    pub fn mode(&self) -> Option<EmbedMode> {
        EmbedMode::from_flag_bits((self.flags & MODE_MASK) >> MODE_SHIFT)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&MAGIC);
        out[4] = self.version;
        out[5] = self.flags & (FLAG_CHANNEL | MODE_MASK);
        out[6] = self.payload_type.tag();
        out[7..11].copy_from_slice(&self.body_len.to_be_bytes());
        out
    }

    /// Magic first, then version, then type. Nothing after a failed check is
    /// looked at.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated { needed: HEADER_LEN, available: bytes.len() });
        }
        if bytes[..4] != MAGIC {
            return Err(FrameError::BadMagic);
        }
        if bytes[4] != VERSION {
            return Err(FrameError::UnsupportedVersion(bytes[4]));
        }
        let payload_type = PayloadType::from_tag(bytes[6]).ok_or(FrameError::UnknownPayloadType(bytes[6]))?;
        Ok(Self {
            version: bytes[4],
            flags: bytes[5],
            payload_type,
            body_len: u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
        })
    }
}

/// Filename and MIME type carried by file payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub filename: String,
    pub mime_type: String,
}

impl FileMeta {
    pub fn encoded_len(&self) -> usize {
        4 + self.filename.len() + self.mime_type.len()
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), FrameError> {
        write_str(out, &self.filename, "filename")?;
        write_str(out, &self.mime_type, "MIME type")
    }
}

fn write_str(out: &mut Vec<u8>, s: &str, what: &'static str) -> Result<(), FrameError> {
    let len = u16::try_from(s.len()).map_err(|_| FrameError::MetadataTooLong(what))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// A fully parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub meta: Option<FileMeta>,
    pub body: Vec<u8>,
}

/// Total frame size for a body of `body_len` bytes.
pub fn framed_len(meta: Option<&FileMeta>, body_len: usize) -> usize {
    HEADER_LEN + meta.map_or(0, FileMeta::encoded_len) + body_len
}

pub fn build_frame(header: &FrameHeader, meta: Option<&FileMeta>, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    debug_assert_eq!(header.body_len as usize, body.len());
    let mut out = Vec::with_capacity(framed_len(meta, body.len()));
    out.extend_from_slice(&header.to_bytes());
    match (header.payload_type, meta) {
        (PayloadType::File, Some(m)) => m.write(&mut out)?,
        (PayloadType::File, None) => FileMeta { filename: String::new(), mime_type: String::new() }.write(&mut out)?,
        (PayloadType::Text, _) => {}
    }
    out.extend_from_slice(body);
    Ok(out)
}

/// Read a big-endian u16-prefixed UTF-8 string at `*pos`.
fn read_str(bytes: &[u8], pos: &mut usize) -> Result<String, FrameError> {
    let len_end = *pos + 2;
    if bytes.len() < len_end {
        return Err(FrameError::Truncated { needed: len_end, available: bytes.len() });
    }
    let len = u16::from_be_bytes([bytes[*pos], bytes[*pos + 1]]) as usize;
    let end = len_end + len;
    if bytes.len() < end {
        return Err(FrameError::Truncated { needed: end, available: bytes.len() });
    }
    let s = std::str::from_utf8(&bytes[len_end..end]).map_err(|_| FrameError::InvalidUtf8)?;
    *pos = end;
    Ok(s.to_string())
}

pub fn parse_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let header = FrameHeader::parse(bytes)?;
    let mut pos = HEADER_LEN;
    let meta = match header.payload_type {
        PayloadType::Text => None,
        PayloadType::File => {
            let filename = read_str(bytes, &mut pos)?;
            let mime_type = read_str(bytes, &mut pos)?;
            Some(FileMeta { filename, mime_type })
        }
    };
    let declared = header.body_len as usize;
    let remaining = bytes.len() - pos;
    if declared > remaining {
        return Err(FrameError::Truncated { needed: pos + declared, available: bytes.len() });
    }
    if declared < remaining || declared < crypto::OVERHEAD {
        return Err(FrameError::LengthMismatch { declared, actual: remaining });
    }
    Ok(Frame { header, meta, body: bytes[pos..].to_vec() })
}

/// Bits of `bytes`, most significant bit of each byte first.
pub fn bits_msb_first(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes.iter().flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1))
}

/// Pull `n` bytes out of a position stream, MSB first. `bit_at` reads the
/// carrier bit at a shuffled index. `None` once the stream is exhausted.
pub fn read_bytes<I, F>(order: &mut I, n: usize, mut bit_at: F) -> Option<Vec<u8>>
where
    I: Iterator<Item = u32>,
    F: FnMut(u32) -> u8,
{
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | (bit_at(order.next()?) & 1);
        }
        out.push(byte);
    }
    Some(out)
}
