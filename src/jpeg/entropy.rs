// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Entropy-coded segment primitives: bit reader/writer with 0xFF stuffing
//! and canonical Huffman tables (ITU-T T.81 Annex C / F.2.2.3).

use super::error::{malformed, JpegError, Result};

/// MSB-first reader over entropy-coded bytes.
///
/// A marker inside the scan (`0xFF` followed by anything but `0x00`) is not
/// consumed; the reader feeds zero bits from that point on until
/// [`BitReader::restart`] is called, the same way libjpeg pads a short segment.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    count: u32,
    at_marker: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos, acc: 0, count: 0, at_marker: false }
    }

    fn fill(&mut self, need: u32) -> Result<()> {
        while self.count < need {
            let byte = if self.at_marker {
                0
            } else {
                let b = *self.data.get(self.pos).ok_or(JpegError::UnexpectedEof)?;
                if b == 0xFF {
                    match self.data.get(self.pos + 1) {
                        Some(0x00) => {
                            self.pos += 2;
                            0xFF
                        }
                        Some(_) => {
                            self.at_marker = true;
                            0
                        }
                        None => return Err(JpegError::UnexpectedEof),
                    }
                } else {
                    self.pos += 1;
                    b
                }
            };
            self.acc = (self.acc << 8) | u64::from(byte);
            self.count += 8;
        }
        Ok(())
    }

    /// Look at the next `n` (1..=16) bits without consuming them.
    pub fn peek(&mut self, n: u32) -> Result<u16> {
        self.fill(n)?;
        Ok(((self.acc >> (self.count - n)) & ((1u64 << n) - 1)) as u16)
    }

    pub fn consume(&mut self, n: u32) {
        debug_assert!(n <= self.count);
        self.count -= n;
    }

    pub fn bits(&mut self, n: u32) -> Result<u16> {
        if n == 0 {
            return Ok(0);
        }
        let v = self.peek(n)?;
        self.consume(n);
        Ok(v)
    }

    /// Drop buffered bits and step over an RSTn marker if one is next.
    /// A missing marker is tolerated, as libjpeg does.
    pub fn restart(&mut self) {
        self.acc = 0;
        self.count = 0;
        self.at_marker = false;
        while self.pos + 1 < self.data.len() && self.data[self.pos] == 0xFF {
            match self.data[self.pos + 1] {
                0xFF => self.pos += 1,
                0xD0..=0xD7 => {
                    self.pos += 2;
                    break;
                }
                _ => break,
            }
        }
    }
}

/// MSB-first writer that stuffs a zero after every emitted 0xFF.
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    count: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, value: u16, n: u32) {
        if n == 0 {
            return;
        }
        self.acc = (self.acc << n) | (u32::from(value) & ((1 << n) - 1));
        self.count += n;
        while self.count >= 8 {
            self.count -= 8;
            let byte = (self.acc >> self.count) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
        }
    }

    fn pad(&mut self) {
        if self.count > 0 {
            let fill = 8 - self.count;
            self.put((1 << fill) - 1, fill);
        }
    }

    /// Pad to a byte boundary with 1-bits and emit `FF D0+n`.
    pub fn restart_marker(&mut self, n: u8) {
        self.pad();
        self.out.push(0xFF);
        self.out.push(0xD0 + (n & 7));
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.pad();
        self.out
    }
}

/// Huffman table as transmitted in DHT: code counts per length and symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    /// 0 = DC, 1 = AC.
    pub class: u8,
    pub id: u8,
    pub counts: [u8; 16],
    pub symbols: Vec<u8>,
}

impl HuffmanSpec {
    /// Canonical (code, length) pairs in symbol order.
    fn canonical_codes(&self) -> Result<Vec<(u16, u8)>> {
        let total: usize = self.counts.iter().map(|&c| c as usize).sum();
        if total != self.symbols.len() || total > 256 {
            return Err(malformed("DHT", "symbol count mismatch"));
        }
        let mut codes = Vec::with_capacity(total);
        let mut code = 0u32;
        for (i, &n) in self.counts.iter().enumerate() {
            let len = i as u32 + 1;
            for _ in 0..n {
                codes.push((code as u16, len as u8));
                code += 1;
            }
            if code > (1 << len) {
                return Err(malformed("DHT", "over-subscribed code lengths"));
            }
            code <<= 1;
        }
        Ok(codes)
    }
}

const LOOKAHEAD: u32 = 8;

/// Decoder: an 8-bit lookahead table plus the maxcode walk for longer codes.
pub struct HuffDecoder {
    /// `(len << 8) | symbol`, 0 when the code is longer than the lookahead.
    lookup: [u16; 1 << LOOKAHEAD],
    maxcode: [i32; 17],
    mincode: [i32; 17],
    valptr: [usize; 17],
    symbols: Vec<u8>,
}

impl HuffDecoder {
    pub fn new(spec: &HuffmanSpec) -> Result<Self> {
        let codes = spec.canonical_codes()?;
        let mut dec = Self {
            lookup: [0; 1 << LOOKAHEAD],
            maxcode: [-1; 17],
            mincode: [0; 17],
            valptr: [0; 17],
            symbols: spec.symbols.clone(),
        };
        let mut k = 0usize;
        for len in 1..=16usize {
            let n = spec.counts[len - 1] as usize;
            if n == 0 {
                continue;
            }
            dec.valptr[len] = k;
            dec.mincode[len] = i32::from(codes[k].0);
            dec.maxcode[len] = i32::from(codes[k + n - 1].0);
            k += n;
        }
        for (&(code, len), &sym) in codes.iter().zip(&spec.symbols) {
            let len = u32::from(len);
            if len <= LOOKAHEAD {
                let shift = LOOKAHEAD - len;
                let base = (code as usize) << shift;
                for slot in &mut dec.lookup[base..base + (1 << shift)] {
                    *slot = ((len as u16) << 8) | u16::from(sym);
                }
            }
        }
        Ok(dec)
    }

    pub fn decode(&self, r: &mut BitReader) -> Result<u8> {
        let peek = r.peek(LOOKAHEAD)?;
        let hit = self.lookup[peek as usize];
        if hit != 0 {
            r.consume(u32::from(hit >> 8));
            return Ok(hit as u8);
        }
        for len in (LOOKAHEAD + 1)..=16 {
            let code = i32::from(r.peek(len)?);
            let l = len as usize;
            if code <= self.maxcode[l] {
                r.consume(len);
                let idx = self.valptr[l] + (code - self.mincode[l]) as usize;
                return self.symbols.get(idx).copied().ok_or(JpegError::HuffmanDecode);
            }
        }
        Err(JpegError::HuffmanDecode)
    }
}

/// Encoder: symbol -> (code, length); length 0 marks an absent symbol.
pub struct HuffEncoder {
    codes: [(u16, u8); 256],
}

impl HuffEncoder {
    pub fn new(spec: &HuffmanSpec) -> Result<Self> {
        let mut codes = [(0u16, 0u8); 256];
        for (code, &sym) in spec.canonical_codes()?.into_iter().zip(&spec.symbols) {
            codes[sym as usize] = code;
        }
        Ok(Self { codes })
    }

    pub fn emit(&self, w: &mut BitWriter, symbol: u8) -> Result<()> {
        let (code, len) = self.codes[symbol as usize];
        if len == 0 {
            return Err(JpegError::MissingHuffmanCode(symbol));
        }
        w.put(code, u32::from(len));
        Ok(())
    }
}

/// Size category and additional bits of a coefficient (T.81 F.1.2.1).
pub fn categorize(v: i16) -> (u8, u16) {
    if v == 0 {
        return (0, 0);
    }
    let size = 16 - v.unsigned_abs().leading_zeros() as u8;
    let raw = if v < 0 { v.wrapping_sub(1) as u16 } else { v as u16 };
    (size, raw & ((1u32 << size) - 1) as u16)
}

/// Inverse of [`categorize`].
pub fn extend(raw: u16, size: u8) -> i16 {
    if size == 0 {
        return 0;
    }
    let raw = i32::from(raw);
    if raw < (1 << (size - 1)) {
        (raw - (1 << size) + 1) as i16
    } else {
        raw as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Luminance DC table from T.81 Table K.3.
    fn dc_luma() -> HuffmanSpec {
        HuffmanSpec {
            class: 0,
            id: 0,
            counts: [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
            symbols: (0..12).collect(),
        }
    }

    /// A table with codes up to 12 bits, forcing the slow path.
    fn long_codes() -> HuffmanSpec {
        HuffmanSpec {
            class: 1,
            id: 0,
            counts: [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0],
            symbols: (0..13).collect(),
        }
    }

    #[test]
    fn bit_reader_unstuffs_ff00() {
        let data = [0xFF, 0x00, 0x80];
        let mut r = BitReader::new(&data, 0);
        assert_eq!(r.bits(12).unwrap(), 0xFF8);
    }

    #[test]
    fn bit_reader_pads_with_zeros_at_marker() {
        let data = [0xAB, 0xFF, 0xD9];
        let mut r = BitReader::new(&data, 0);
        assert_eq!(r.bits(8).unwrap(), 0xAB);
        assert_eq!(r.bits(8).unwrap(), 0);
        assert_eq!(r.pos, 1, "marker must not be consumed");
    }

    #[test]
    fn bit_writer_stuffs_and_pads() {
        let mut w = BitWriter::new();
        w.put(0xFF, 8);
        w.put(0b101, 3);
        assert_eq!(w.finish(), vec![0xFF, 0x00, 0b1011_1111]);
    }

    #[test]
    fn restart_marker_resyncs_reader() {
        let mut w = BitWriter::new();
        w.put(0b0, 1);
        w.restart_marker(0);
        w.put(0b0110, 4);
        let bytes = w.finish();
        assert_eq!(&bytes[1..3], &[0xFF, 0xD0]);

        let mut r = BitReader::new(&bytes, 0);
        assert_eq!(r.bits(1).unwrap(), 0);
        r.restart();
        assert_eq!(r.bits(4).unwrap(), 0b0110);
    }

    fn roundtrip_symbols(spec: &HuffmanSpec) {
        let enc = HuffEncoder::new(spec).unwrap();
        let dec = HuffDecoder::new(spec).unwrap();
        let mut w = BitWriter::new();
        for &s in &spec.symbols {
            enc.emit(&mut w, s).unwrap();
        }
        let mut bytes = w.finish();
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        let mut r = BitReader::new(&bytes, 0);
        for &s in &spec.symbols {
            assert_eq!(dec.decode(&mut r).unwrap(), s);
        }
    }

    #[test]
    fn huffman_short_codes() {
        roundtrip_symbols(&dc_luma());
    }

    #[test]
    fn huffman_long_codes() {
        roundtrip_symbols(&long_codes());
    }

    #[test]
    fn oversubscribed_table_rejected() {
        let spec = HuffmanSpec {
            class: 0,
            id: 0,
            counts: [3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            symbols: vec![0, 1, 2],
        };
        assert!(HuffDecoder::new(&spec).is_err());
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let enc = HuffEncoder::new(&dc_luma()).unwrap();
        let mut w = BitWriter::new();
        assert_eq!(enc.emit(&mut w, 0x42), Err(JpegError::MissingHuffmanCode(0x42)));
    }

    #[test]
    fn categorize_inverts_extend() {
        for v in -1023i16..=1023 {
            let (size, raw) = categorize(v);
            assert_eq!(extend(raw, size), v);
        }
        assert_eq!(categorize(-3), (2, 0b00));
        assert_eq!(categorize(5), (3, 0b101));
    }

    #[test]
    fn lsb_flip_keeps_category_above_one() {
        for mag in 2i16..512 {
            for v in [mag, -mag] {
                let flipped = v.signum() * (v.abs() ^ 1);
                assert_eq!(categorize(v).0, categorize(flipped).0, "value {v}");
            }
        }
    }
}
