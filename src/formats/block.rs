//! Contact block decoding
//!
//! A block is a zlib stream. Once inflated it starts with an `i32` record
//! count, followed by one of three layouts:
//!
//! - versions before 7: `(binX: i32, binY: i32, counts: f32)` triples
//! - version 7 and later, a shared `(binXOffset: i32, binYOffset: i32,
//!   useShort: u8, type: u8)` header, then
//!   - type 1: list of rows, `(y: i16, colCount: i16, colCount x (x: i16, value))`
//!   - type 2: dense row-major grid, `(nPts: i32, w: i16, nPts x value)`
//!
//! `useShort == 0` means values are `i16`; anything else means `f32`.
//! Missing cells (`i16` -32768 or `f32` NaN) are never emitted.

use crate::core::cursor::BinaryCursor;
use crate::core::{Result, StrawError};
use crate::core::io::ByteSource;
use crate::core::types::{ContactRecord, IndexEntry};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Missing-cell marker for 16-bit values
pub const SHORT_MISSING: i16 = i16::MIN;

/// First version using the offset-relative layouts
pub const OFFSET_LAYOUT_VERSION: i32 = 7;

const ROW_LIST_TYPE: u8 = 1;
const DENSE_TYPE: u8 = 2;

/// Bin origin and value width shared by the version 7+ layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOrigin {
    pub bin_x_offset: i32,
    pub bin_y_offset: i32,
    /// Values are stored as `i16` rather than `f32`
    pub short_values: bool,
}

/// Record layout of one inflated block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    LegacyRecordList,
    RowList(BlockOrigin),
    Dense(BlockOrigin),
    /// Unrecognised type tag; decodes to no records
    Unknown(u8),
}

impl BlockLayout {
    /// Read the layout header that follows the record count
    fn read(cursor: &mut BinaryCursor<'_>, version: i32) -> Result<Self> {
        if version < OFFSET_LAYOUT_VERSION {
            return Ok(BlockLayout::LegacyRecordList);
        }
        let origin = BlockOrigin {
            bin_x_offset: cursor.read_i32()?,
            bin_y_offset: cursor.read_i32()?,
            short_values: cursor.read_u8()? == 0,
        };
        Ok(match cursor.read_u8()? {
            ROW_LIST_TYPE => BlockLayout::RowList(origin),
            DENSE_TYPE => BlockLayout::Dense(origin),
            other => BlockLayout::Unknown(other),
        })
    }
}

/// Read one cell value; `None` for a missing cell
fn read_value(cursor: &mut BinaryCursor<'_>, short_values: bool) -> Result<Option<f32>> {
    if short_values {
        let c = cursor.read_i16()?;
        Ok((c != SHORT_MISSING).then_some(f32::from(c)))
    } else {
        let c = cursor.read_f32()?;
        Ok((!c.is_nan()).then_some(c))
    }
}

fn decode_legacy(cursor: &mut BinaryCursor<'_>, n_records: usize) -> Result<Vec<ContactRecord>> {
    let mut records = Vec::with_capacity(n_records.min(cursor.remaining() / 12));
    for _ in 0..n_records {
        let bin_x = cursor.read_i32()?;
        let bin_y = cursor.read_i32()?;
        let counts = cursor.read_f32()?;
        if !counts.is_nan() {
            records.push(ContactRecord::new(bin_x, bin_y, counts));
        }
    }
    Ok(records)
}

fn decode_row_list(
    cursor: &mut BinaryCursor<'_>,
    origin: BlockOrigin,
    n_records: usize,
) -> Result<Vec<ContactRecord>> {
    let mut records = Vec::with_capacity(n_records.min(cursor.remaining() / 4));
    let row_count = cursor.read_i16()?;
    for _ in 0..row_count.max(0) {
        let y = cursor.read_i16()?;
        let bin_y = origin.bin_y_offset.wrapping_add(i32::from(y));
        let col_count = cursor.read_i16()?;
        for _ in 0..col_count.max(0) {
            let x = cursor.read_i16()?;
            let bin_x = origin.bin_x_offset.wrapping_add(i32::from(x));
            if let Some(counts) = read_value(cursor, origin.short_values)? {
                records.push(ContactRecord::new(bin_x, bin_y, counts));
            }
        }
    }
    Ok(records)
}

fn decode_dense(cursor: &mut BinaryCursor<'_>, origin: BlockOrigin) -> Result<Vec<ContactRecord>> {
    let n_pts = cursor.read_count("dense cell")?;
    let w = cursor.read_i16()?;
    if n_pts > 0 && w <= 0 {
        return Err(StrawError::Malformed(format!("dense block with {} cells has row width {}", n_pts, w)));
    }
    let w = i32::from(w);

    let mut records = Vec::with_capacity(n_pts.min(cursor.remaining() / 2));
    for i in 0..n_pts {
        let i = i as i32;
        let row = i / w;
        let col = i - row * w;
        if let Some(counts) = read_value(cursor, origin.short_values)? {
            records.push(ContactRecord::new(
                origin.bin_x_offset.wrapping_add(col),
                origin.bin_y_offset.wrapping_add(row),
                counts,
            ));
        }
    }
    Ok(records)
}

/// Decode the records of an inflated block
pub fn decode_block(data: &[u8], version: i32) -> Result<Vec<ContactRecord>> {
    let mut cursor = BinaryCursor::new(data);
    let n_records = cursor.read_count("record")?;
    match BlockLayout::read(&mut cursor, version)? {
        BlockLayout::LegacyRecordList => decode_legacy(&mut cursor, n_records),
        BlockLayout::RowList(origin) => decode_row_list(&mut cursor, origin, n_records),
        BlockLayout::Dense(origin) => decode_dense(&mut cursor, origin),
        BlockLayout::Unknown(tag) => {
            log::warn!("skipping block with unknown type tag {}", tag);
            Ok(Vec::new())
        }
    }
}

/// Inflate a zlib-compressed block; the output buffer grows as needed
pub fn inflate_block(compressed: &[u8], position: u64) -> Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(|e| StrawError::Decompression {
            offset: position,
            message: e.to_string(),
        })?;
    Ok(inflated)
}

fn fetch_inflated(source: &dyn ByteSource, entry: IndexEntry) -> Result<Vec<u8>> {
    let compressed = source.read_at(entry.position, entry.size as usize)?;
    inflate_block(&compressed, entry.position)
}

/// Fetch, inflate and decode one block. Empty entries cost no I/O.
pub fn read_block(source: &dyn ByteSource, entry: IndexEntry, version: i32) -> Result<Vec<ContactRecord>> {
    if entry.is_empty() {
        return Ok(Vec::new());
    }
    decode_block(&fetch_inflated(source, entry)?, version)
}

/// Record count stored in a block's header, without decoding records.
///
/// Dense blocks count missing cells too.
pub fn read_block_record_count(source: &dyn ByteSource, entry: IndexEntry) -> Result<u64> {
    if entry.is_empty() {
        return Ok(0);
    }
    let inflated = fetch_inflated(source, entry)?;
    let n = BinaryCursor::new(&inflated).read_count("record")?;
    Ok(n as u64)
}
