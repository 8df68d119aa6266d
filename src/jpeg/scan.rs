// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Baseline scan decoding and encoding: interleaved MCUs, DC prediction,
//! run-length coded AC coefficients and restart intervals.

use super::coeffs::DctGrid;
use super::entropy::{categorize, extend, BitReader, BitWriter, HuffDecoder, HuffEncoder, HuffmanSpec};
use super::error::{malformed, JpegError, Result};
use super::segments::FrameHeader;
use super::zigzag::ZIGZAG;

/// One component of the scan, resolved against the frame.
#[derive(Debug, Clone, Copy)]
pub struct ScanComponent {
    /// Index into `FrameHeader::components`.
    pub index: usize,
    pub dc_table: usize,
    pub ac_table: usize,
}

/// Huffman tables by id (0..=3), split by class.
pub struct TableSet<'a> {
    pub dc: &'a [Option<HuffmanSpec>; 4],
    pub ac: &'a [Option<HuffmanSpec>; 4],
}

fn spec<'a>(tables: &'a [Option<HuffmanSpec>; 4], id: usize) -> Result<&'a HuffmanSpec> {
    tables
        .get(id)
        .and_then(Option::as_ref)
        .ok_or(JpegError::UndefinedTable(id as u8))
}

/// Visit every block of every MCU in scan order. The callback receives the
/// position in `scan`, the block row/column in that component's grid, and
/// whether a restart interval begins before this MCU.
fn for_each_block<F>(frame: &FrameHeader, scan: &[ScanComponent], restart: u16, mut f: F) -> Result<()>
where
    F: FnMut(usize, usize, usize, bool) -> Result<()>,
{
    let mut mcu = 0usize;
    for mcu_row in 0..frame.mcus_tall {
        for mcu_col in 0..frame.mcus_wide {
            let mut restart_here = restart > 0 && mcu > 0 && mcu % restart as usize == 0;
            for (s, sc) in scan.iter().enumerate() {
                let comp = &frame.components[sc.index];
                for v in 0..comp.v as usize {
                    for h in 0..comp.h as usize {
                        let row = mcu_row * comp.v as usize + v;
                        let col = mcu_col * comp.h as usize + h;
                        f(s, row, col, restart_here)?;
                        restart_here = false;
                    }
                }
            }
            mcu += 1;
        }
    }
    Ok(())
}

/// Decode the entropy-coded data starting at `start` into one grid per
/// frame component.
pub fn decode_scan(
    data: &[u8],
    start: usize,
    frame: &FrameHeader,
    scan: &[ScanComponent],
    tables: &TableSet<'_>,
    restart: u16,
) -> Result<Vec<DctGrid>> {
    let decoders = scan
        .iter()
        .map(|sc| Ok((HuffDecoder::new(spec(tables.dc, sc.dc_table)?)?, HuffDecoder::new(spec(tables.ac, sc.ac_table)?)?)))
        .collect::<Result<Vec<_>>>()?;
    let mut grids: Vec<DctGrid> = (0..frame.components.len())
        .map(|c| DctGrid::new(frame.blocks_wide(c), frame.blocks_tall(c)))
        .collect();
    let mut pred = vec![0i32; scan.len()];
    let mut reader = BitReader::new(data, start);

    for_each_block(frame, scan, restart, |s, row, col, restart_here| {
        if restart_here {
            reader.restart();
            pred.iter_mut().for_each(|p| *p = 0);
        }
        let (dc, ac) = &decoders[s];
        let block = grids[scan[s].index].block_mut(row, col);
        decode_block(&mut reader, dc, ac, &mut pred[s], block)
    })?;
    Ok(grids)
}

fn decode_block(r: &mut BitReader, dc: &HuffDecoder, ac: &HuffDecoder, pred: &mut i32, out: &mut [i16]) -> Result<()> {
    let size = dc.decode(r)?;
    if size > 15 {
        return Err(JpegError::HuffmanDecode);
    }
    let dc_value = pred.wrapping_add(i32::from(extend(r.bits(u32::from(size))?, size)));
    out[0] = i16::try_from(dc_value).map_err(|_| malformed("scan", "DC coefficient out of range"))?;
    *pred = dc_value;

    let mut k = 1usize;
    while k < 64 {
        let rs = ac.decode(r)?;
        let (run, size) = ((rs >> 4) as usize, rs & 0x0F);
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(JpegError::HuffmanDecode);
        }
        out[ZIGZAG[k]] = extend(r.bits(u32::from(size))?, size);
        k += 1;
    }
    Ok(())
}

/// Re-encode the grids with the given tables, inserting RSTn markers every
/// `restart` MCUs.
pub fn encode_scan(
    frame: &FrameHeader,
    scan: &[ScanComponent],
    grids: &[DctGrid],
    tables: &TableSet<'_>,
    restart: u16,
) -> Result<Vec<u8>> {
    let encoders = scan
        .iter()
        .map(|sc| Ok((HuffEncoder::new(spec(tables.dc, sc.dc_table)?)?, HuffEncoder::new(spec(tables.ac, sc.ac_table)?)?)))
        .collect::<Result<Vec<_>>>()?;
    let mut writer = BitWriter::new();
    let mut pred = vec![0i32; scan.len()];
    let mut rst = 0u8;

    for_each_block(frame, scan, restart, |s, row, col, restart_here| {
        if restart_here {
            writer.restart_marker(rst);
            rst = rst.wrapping_add(1) & 7;
            pred.iter_mut().for_each(|p| *p = 0);
        }
        let (dc, ac) = &encoders[s];
        encode_block(&mut writer, dc, ac, &mut pred[s], grids[scan[s].index].block(row, col))
    })?;
    Ok(writer.finish())
}

fn encode_block(w: &mut BitWriter, dc: &HuffEncoder, ac: &HuffEncoder, pred: &mut i32, block: &[i16]) -> Result<()> {
    let diff = i32::from(block[0]) - *pred;
    *pred = i32::from(block[0]);
    let diff = i16::try_from(diff).map_err(|_| malformed("scan", "DC difference out of range"))?;
    let (size, raw) = categorize(diff);
    dc.emit(w, size)?;
    w.put(raw, u32::from(size));

    let mut run = 0u8;
    for &natural in &ZIGZAG[1..] {
        let v = block[natural];
        if v == 0 {
            run += 1;
            continue;
        }
        while run >= 16 {
            ac.emit(w, 0xF0)?;
            run -= 16;
        }
        let (size, raw) = categorize(v);
        if size > 15 {
            return Err(malformed("scan", "AC coefficient out of range"));
        }
        ac.emit(w, (run << 4) | size)?;
        w.put(raw, u32::from(size));
        run = 0;
    }
    if run > 0 {
        ac.emit(w, 0x00)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::segments::Component;

    fn single_symbol(class: u8, symbol: u8) -> HuffmanSpec {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        HuffmanSpec { class, id: 0, counts, symbols: vec![symbol] }
    }

    fn strip(blocks: usize) -> FrameHeader {
        FrameHeader {
            width: (blocks * 8) as u16,
            height: 8,
            components: vec![Component { id: 1, h: 1, v: 1, quant_table: 0 }],
            mcus_wide: blocks,
            mcus_tall: 1,
        }
    }

    #[test]
    fn runaway_dc_prediction_is_rejected() {
        // Every block adds +32767 to the DC predictor.
        let dc = single_symbol(0, 15);
        let ac = single_symbol(1, 0x00);
        let (dc_enc, ac_enc) = (HuffEncoder::new(&dc).unwrap(), HuffEncoder::new(&ac).unwrap());
        let mut w = BitWriter::new();
        for _ in 0..3 {
            dc_enc.emit(&mut w, 15).unwrap();
            w.put(0x7FFF, 15);
            ac_enc.emit(&mut w, 0x00).unwrap();
        }
        let data = w.finish();

        let dc_tables = [Some(dc), None, None, None];
        let ac_tables = [Some(ac), None, None, None];
        let tables = TableSet { dc: &dc_tables, ac: &ac_tables };
        let scan = [ScanComponent { index: 0, dc_table: 0, ac_table: 0 }];

        let one = decode_scan(&data, 0, &strip(1), &scan, &tables, 0).unwrap();
        assert_eq!(one[0].coeffs()[0], i16::MAX);
        assert!(matches!(
            decode_scan(&data, 0, &strip(3), &scan, &tables, 0),
            Err(JpegError::Malformed { segment: "scan", .. })
        ));
    }
}
