// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Pure-Rust JPEG coefficient codec.
//!
//! Reads baseline sequential JPEG files (SOF0/SOF1, 8-bit, Huffman coded)
//! into quantized DCT coefficients and writes them back with the file's own
//! Huffman tables, so nothing is re-quantized and no pixel round-trip happens.
//! Every marker segment before the scan (APPn, COM, DQT, DHT, SOF, DRI) is
//! preserved verbatim.
//!
//! Progressive, lossless, arithmetic-coded and multi-scan files are rejected.

pub mod coeffs;
pub mod entropy;
pub mod error;
pub mod scan;
pub mod segments;
pub mod zigzag;

use coeffs::{DctGrid, QuantTable};
use entropy::HuffmanSpec;
use error::{malformed, JpegError, Result};
use scan::{ScanComponent, TableSet};
use segments::{FrameHeader, Segment};

/// `true` if `data` starts with an SOI marker.
pub fn looks_like_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == segments::SOI && data[2] == 0xFF
}

/// Frame width and height from the SOF segment. The entropy-coded data is
/// not read.
pub fn read_dimensions(data: &[u8]) -> Result<(u16, u16)> {
    let headers = segments::read_headers(data)?;
    let sof = headers
        .segments
        .iter()
        .find(|s| matches!(s.marker, segments::SOF0 | segments::SOF1))
        .ok_or(malformed("SOF", "no frame header before scan"))?;
    let frame = segments::parse_sof(&sof.body)?;
    Ok((frame.width, frame.height))
}

/// A parsed baseline JPEG with mutable coefficient access.
#[derive(Clone)]
pub struct JpegImage {
    frame: FrameHeader,
    /// One grid per frame component, in frame order.
    grids: Vec<DctGrid>,
    dc_tables: [Option<HuffmanSpec>; 4],
    ac_tables: [Option<HuffmanSpec>; 4],
    scan: Vec<ScanComponent>,
    restart_interval: u16,
    segments: Vec<Segment>,
    sos: Vec<u8>,
}

impl JpegImage {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let headers = segments::read_headers(data)?;

        let mut frame = None;
        let mut quant: [Option<QuantTable>; 4] = Default::default();
        let mut dc_tables: [Option<HuffmanSpec>; 4] = Default::default();
        let mut ac_tables: [Option<HuffmanSpec>; 4] = Default::default();
        let mut restart_interval = 0;

        for seg in &headers.segments {
            match seg.marker {
                segments::SOF0 | segments::SOF1 => frame = Some(segments::parse_sof(&seg.body)?),
                segments::DQT => {
                    for (id, table) in segments::parse_dqt(&seg.body)? {
                        quant[id as usize] = Some(table);
                    }
                }
                segments::DHT => {
                    for spec in segments::parse_dht(&seg.body)? {
                        let slot = spec.id as usize;
                        if spec.class == 0 {
                            dc_tables[slot] = Some(spec);
                        } else {
                            ac_tables[slot] = Some(spec);
                        }
                    }
                }
                segments::DRI => restart_interval = segments::parse_dri(&seg.body)?,
                _ => {}
            }
        }

        let frame = frame.ok_or(malformed("SOF", "no frame header before scan"))?;
        if let Some(c) = frame.components.iter().find(|c| quant[c.quant_table as usize].is_none()) {
            return Err(JpegError::UndefinedTable(c.quant_table));
        }
        let mut scan = Vec::new();
        for sel in segments::parse_sos(&headers.sos)? {
            let index = frame
                .components
                .iter()
                .position(|c| c.id == sel.component_id)
                .ok_or(JpegError::UnknownComponent(sel.component_id))?;
            scan.push(ScanComponent {
                index,
                dc_table: sel.dc_table as usize,
                ac_table: sel.ac_table as usize,
            });
        }
        if scan.len() != frame.components.len() {
            return Err(JpegError::PartialScan);
        }

        let tables = TableSet { dc: &dc_tables, ac: &ac_tables };
        let grids = scan::decode_scan(data, headers.scan_start, &frame, &scan, &tables, restart_interval)?;

        Ok(Self {
            frame,
            grids,
            dc_tables,
            ac_tables,
            scan,
            restart_interval,
            segments: headers.segments,
            sos: headers.sos,
        })
    }

    /// Serialize with the original headers and Huffman tables.
    ///
    /// Fails with [`JpegError::MissingHuffmanCode`] if a modified coefficient
    /// needs a symbol the tables do not define.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tables = TableSet { dc: &self.dc_tables, ac: &self.ac_tables };
        let entropy = scan::encode_scan(&self.frame, &self.scan, &self.grids, &tables, self.restart_interval)?;

        let mut out = Vec::with_capacity(entropy.len() + 1024);
        out.extend_from_slice(&[0xFF, segments::SOI]);
        for seg in &self.segments {
            segments::write_segment(&mut out, seg.marker, &seg.body);
        }
        segments::write_segment(&mut out, segments::SOS, &self.sos);
        out.extend_from_slice(&entropy);
        out.extend_from_slice(&[0xFF, segments::EOI]);
        Ok(out)
    }

    pub fn width(&self) -> u16 {
        self.frame.width
    }

    pub fn height(&self) -> u16 {
        self.frame.height
    }

    pub fn num_components(&self) -> usize {
        self.grids.len()
    }

    pub fn grid(&self, component: usize) -> &DctGrid {
        &self.grids[component]
    }

    pub fn grid_mut(&mut self, component: usize) -> &mut DctGrid {
        &mut self.grids[component]
    }
}
