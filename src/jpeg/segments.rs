// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Marker segment walking and header parsing (SOF, DQT, DHT, DRI, SOS).

use super::coeffs::QuantTable;
use super::entropy::HuffmanSpec;
use super::error::{malformed, JpegError, Result};
use super::zigzag::ZIGZAG;

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const SOS: u8 = 0xDA;

/// A marker segment kept verbatim (body excludes marker and length).
#[derive(Debug, Clone)]
pub struct Segment {
    pub marker: u8,
    pub body: Vec<u8>,
}

/// Everything before the entropy-coded data of the first scan.
pub struct Headers {
    /// Segments between SOI and SOS, in file order.
    pub segments: Vec<Segment>,
    pub sos: Vec<u8>,
    /// Offset of the first entropy-coded byte.
    pub scan_start: usize,
}

fn is_sof(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, DHT | 0xC8 | 0xCC)
}

/// Walk segments from SOI up to and including the first SOS.
pub fn read_headers(data: &[u8]) -> Result<Headers> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(JpegError::NotAJpeg);
    }
    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() {
            return Err(JpegError::UnexpectedEof);
        }
        let marker = data[pos + 1];
        pos += 2;
        match marker {
            0x00 | 0xD0..=0xD7 => continue,
            EOI => return Err(malformed("SOS", "image has no scan")),
            m if is_sof(m) && m != SOF0 && m != SOF1 => {
                return Err(JpegError::UnsupportedProcess(m));
            }
            _ => {}
        }
        let len_bytes = data.get(pos..pos + 2).ok_or(JpegError::UnexpectedEof)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if len < 2 {
            return Err(malformed("segment", "length below 2"));
        }
        let body = data
            .get(pos + 2..pos + len)
            .ok_or(JpegError::UnexpectedEof)?
            .to_vec();
        pos += len;
        if marker == SOS {
            return Ok(Headers { segments, sos: body, scan_start: pos });
        }
        segments.push(Segment { marker, body });
    }
}

pub fn write_segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

#[derive(Debug, Clone)]
pub struct Component {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quant_table: u8,
}

/// Parsed SOF0/SOF1 header with derived MCU geometry.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub width: u16,
    pub height: u16,
    pub components: Vec<Component>,
    pub mcus_wide: usize,
    pub mcus_tall: usize,
}

impl FrameHeader {
    pub fn blocks_wide(&self, comp: usize) -> usize {
        self.mcus_wide * self.components[comp].h as usize
    }

    pub fn blocks_tall(&self, comp: usize) -> usize {
        self.mcus_tall * self.components[comp].v as usize
    }
}

pub fn parse_sof(body: &[u8]) -> Result<FrameHeader> {
    if body.len() < 6 {
        return Err(JpegError::UnexpectedEof);
    }
    if body[0] != 8 {
        return Err(JpegError::UnsupportedPrecision(body[0]));
    }
    let height = u16::from_be_bytes([body[1], body[2]]);
    let width = u16::from_be_bytes([body[3], body[4]]);
    let n = body[5] as usize;
    if width == 0 || height == 0 || n == 0 {
        return Err(JpegError::InvalidDimensions);
    }
    let spec = body.get(6..6 + 3 * n).ok_or(JpegError::UnexpectedEof)?;
    let mut components: Vec<Component> = spec
        .chunks_exact(3)
        .map(|c| Component { id: c[0], h: c[1] >> 4, v: c[1] & 0x0F, quant_table: c[2] })
        .collect();
    if components
        .iter()
        .any(|c| !(1..=4).contains(&c.h) || !(1..=4).contains(&c.v) || c.quant_table > 3)
    {
        return Err(JpegError::InvalidDimensions);
    }
    // A single-component scan is never interleaved: one block per MCU.
    if components.len() == 1 {
        components[0].h = 1;
        components[0].v = 1;
    }
    let max_h = components.iter().map(|c| c.h as usize).max().unwrap_or(1);
    let max_v = components.iter().map(|c| c.v as usize).max().unwrap_or(1);
    Ok(FrameHeader {
        width,
        height,
        mcus_wide: (width as usize).div_ceil(8 * max_h),
        mcus_tall: (height as usize).div_ceil(8 * max_v),
        components,
    })
}

pub fn parse_dqt(body: &[u8]) -> Result<Vec<(u8, QuantTable)>> {
    let mut tables = Vec::new();
    let mut rest = body;
    while let Some((&pq_tq, tail)) = rest.split_first() {
        let (precision, id) = (pq_tq >> 4, pq_tq & 0x0F);
        if id > 3 || precision > 1 {
            return Err(malformed("DQT", "bad table id or precision"));
        }
        let width = 1 + precision as usize;
        let raw = tail.get(..64 * width).ok_or(JpegError::UnexpectedEof)?;
        let mut values = [0u16; 64];
        for (z, chunk) in raw.chunks_exact(width).enumerate() {
            values[ZIGZAG[z]] = if width == 1 {
                u16::from(chunk[0])
            } else {
                u16::from_be_bytes([chunk[0], chunk[1]])
            };
        }
        tables.push((id, QuantTable { values }));
        rest = &tail[64 * width..];
    }
    Ok(tables)
}

pub fn parse_dht(body: &[u8]) -> Result<Vec<HuffmanSpec>> {
    let mut specs = Vec::new();
    let mut rest = body;
    while let Some((&tc_th, tail)) = rest.split_first() {
        let (class, id) = (tc_th >> 4, tc_th & 0x0F);
        if class > 1 || id > 3 {
            return Err(malformed("DHT", "bad table class or id"));
        }
        let counts_raw = tail.get(..16).ok_or(JpegError::UnexpectedEof)?;
        let mut counts = [0u8; 16];
        counts.copy_from_slice(counts_raw);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let symbols = tail.get(16..16 + total).ok_or(JpegError::UnexpectedEof)?.to_vec();
        specs.push(HuffmanSpec { class, id, counts, symbols });
        rest = &tail[16 + total..];
    }
    Ok(specs)
}

pub fn parse_dri(body: &[u8]) -> Result<u16> {
    match body {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(JpegError::UnexpectedEof),
    }
}

/// Component selector from an SOS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSelector {
    pub component_id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// Parse a sequential SOS header (Ss=0, Se=63, Ah=Al=0).
pub fn parse_sos(body: &[u8]) -> Result<Vec<ScanSelector>> {
    let n = *body.first().ok_or(JpegError::UnexpectedEof)? as usize;
    let sel = body.get(1..1 + 2 * n).ok_or(JpegError::UnexpectedEof)?;
    let tail = body.get(1 + 2 * n..1 + 2 * n + 3).ok_or(JpegError::UnexpectedEof)?;
    if tail != [0, 63, 0] {
        return Err(malformed("SOS", "spectral selection of a progressive scan"));
    }
    Ok(sel
        .chunks_exact(2)
        .map(|c| ScanSelector { component_id: c[0], dc_table: c[1] >> 4, ac_table: c[1] & 0x0F })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_jpeg() {
        assert!(matches!(read_headers(b"\x89PNG"), Err(JpegError::NotAJpeg)));
    }

    #[test]
    fn rejects_progressive() {
        let data = [0xFF, 0xD8, 0xFF, 0xC2, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0];
        assert_eq!(read_headers(&data).err(), Some(JpegError::UnsupportedProcess(0xC2)));
    }

    #[test]
    fn collects_segments_until_sos() {
        let mut data = vec![0xFF, 0xD8];
        write_segment(&mut data, 0xFE, b"hello");
        write_segment(&mut data, DRI, &[0, 4]);
        write_segment(&mut data, SOS, &[1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0x12, 0x34, 0xFF, 0xD9]);
        let h = read_headers(&data).unwrap();
        assert_eq!(h.segments.len(), 2);
        assert_eq!(h.segments[0].body, b"hello");
        assert_eq!(parse_dri(&h.segments[1].body).unwrap(), 4);
        assert_eq!(data[h.scan_start], 0x12);
    }

    #[test]
    fn sof_420_geometry() {
        let body = [8, 1, 0xE0, 2, 0x80, 3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1];
        let f = parse_sof(&body).unwrap();
        assert_eq!((f.width, f.height), (640, 480));
        assert_eq!((f.mcus_wide, f.mcus_tall), (40, 30));
        assert_eq!((f.blocks_wide(0), f.blocks_tall(0)), (80, 60));
        assert_eq!((f.blocks_wide(2), f.blocks_tall(2)), (40, 30));
    }

    #[test]
    fn single_component_ignores_sampling() {
        let body = [8, 0, 20, 0, 20, 1, 1, 0x22, 0];
        let f = parse_sof(&body).unwrap();
        assert_eq!((f.blocks_wide(0), f.blocks_tall(0)), (3, 3));
    }

    #[test]
    fn dqt_is_stored_in_natural_order() {
        let mut body = vec![0x01];
        body.extend(1..=64u8);
        let tables = parse_dqt(&body).unwrap();
        assert_eq!(tables[0].0, 1);
        let qt = &tables[0].1;
        assert_eq!(qt.values[0], 1);
        assert_eq!(qt.values[8], 3, "zigzag slot 2 is row 1 col 0");
    }

    #[test]
    fn dht_multiple_tables() {
        let mut body = vec![0x00];
        body.extend_from_slice(&[0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        body.extend_from_slice(&[5, 6, 7]);
        body.push(0x11);
        body.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        body.push(0x00);
        let specs = parse_dht(&body).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].symbols, vec![5, 6, 7]);
        assert_eq!((specs[1].class, specs[1].id), (1, 1));
    }

    #[test]
    fn sos_selectors() {
        let sel = parse_sos(&[2, 1, 0x00, 2, 0x11, 0, 63, 0]).unwrap();
        assert_eq!(sel[1], ScanSelector { component_id: 2, dc_table: 1, ac_table: 1 });
        assert!(parse_sos(&[1, 1, 0x00, 1, 5, 0]).is_err());
    }
}
