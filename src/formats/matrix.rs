//! Matrix zoom directory parsing
//!
//! A chromosome pair's matrix starts with `(chr1: i32, chr2: i32, nRes: i32)`
//! followed by `nRes` zoom records:
//!
//! ```text
//! cstr unit ("BP" | "FRAG")
//! i32  legacy zoom index
//! f32 x 4  sumCounts, occupiedCellCount, stdDev, percent95
//! i32  binSize
//! i32  blockBinCount
//! i32  blockColumnCount
//! i32  nBlocks, nBlocks x (i32 blockNumber, i64 position, i32 size)
//! ```
//!
//! Records are walked with explicit offsets: a one-byte read sizes the unit
//! tag, one ranged read covers the fixed preamble, and the block table is
//! only fetched for the matching record.

use crate::core::cursor::BinaryCursor;
use crate::core::{Result, StrawError};
use crate::core::io::ByteSource;
use crate::core::types::{IndexEntry, Unit};
use crate::formats::footer::index_entry;
use std::collections::BTreeMap;

/// Bytes of one block table entry
pub const BLOCK_INDEX_ENTRY_SIZE: usize = 4 + 8 + 4;
/// Preamble bytes following the unit tag (5 x i32 + 4 x f32)
const PREAMBLE_FIXED_SIZE: usize = 5 * 4 + 4 * 4;
/// `(chr1, chr2, nRes)`
const MATRIX_HEAD_SIZE: usize = 3 * 4;

/// Block directory for one (chromosome pair, resolution)
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixZoomData {
    pub unit: Unit,
    pub bin_size: i32,
    pub block_bin_count: i32,
    pub block_column_count: i32,
    pub block_map: BTreeMap<i32, IndexEntry>,
}

impl MatrixZoomData {
    pub fn block(&self, number: i32) -> Option<IndexEntry> {
        self.block_map.get(&number).copied()
    }
}

struct ZoomPreamble {
    unit: String,
    bin_size: i32,
    block_bin_count: i32,
    block_column_count: i32,
    n_blocks: usize,
}

fn unit_tag_len(first: u8) -> Result<usize> {
    match first {
        b'B' => Ok("BP".len() + 1),
        b'F' => Ok("FRAG".len() + 1),
        other => Err(StrawError::Malformed(format!(
            "zoom record unit starts with unexpected byte 0x{:02x}",
            other
        ))),
    }
}

fn parse_preamble(data: &[u8]) -> Result<ZoomPreamble> {
    let mut cursor = BinaryCursor::new(data);
    let unit = cursor.read_cstr()?;
    let _legacy_zoom = cursor.read_i32()?;
    for _ in 0..4 {
        cursor.read_f32()?;
    }
    let bin_size = cursor.read_i32()?;
    let block_bin_count = cursor.read_i32()?;
    let block_column_count = cursor.read_i32()?;
    let n_blocks = cursor.read_count("block")?;
    Ok(ZoomPreamble {
        unit,
        bin_size,
        block_bin_count,
        block_column_count,
        n_blocks,
    })
}

fn parse_block_table(data: &[u8], n_blocks: usize) -> Result<BTreeMap<i32, IndexEntry>> {
    let mut cursor = BinaryCursor::new(data);
    let mut block_map = BTreeMap::new();
    for _ in 0..n_blocks {
        let number = cursor.read_i32()?;
        let position = cursor.read_i64()?;
        let size = cursor.read_i32()?;
        block_map.insert(number, index_entry(position, size)?);
    }
    Ok(block_map)
}

/// Locate the zoom record for `unit`/`resolution` in the matrix at `matrix_offset`
pub fn read_matrix(
    source: &dyn ByteSource,
    matrix_offset: u64,
    unit: Unit,
    resolution: i32,
) -> Result<MatrixZoomData> {
    let head = source.read_at(matrix_offset, MATRIX_HEAD_SIZE)?;
    let mut cursor = BinaryCursor::new(&head);
    let chr1 = cursor.read_i32()?;
    let chr2 = cursor.read_i32()?;
    let n_res = cursor.read_count("resolution")?;
    log::debug!("matrix {}_{} has {} zoom levels", chr1, chr2, n_res);

    let mut offset = matrix_offset + MATRIX_HEAD_SIZE as u64;
    for _ in 0..n_res {
        let tag = source.read_at(offset, 1)?;
        let first = *tag.first().ok_or(StrawError::Truncated {
            position: offset,
            what: "zoom record unit",
        })?;
        let preamble_len = unit_tag_len(first)? + PREAMBLE_FIXED_SIZE;
        let preamble = parse_preamble(&source.read_at(offset, preamble_len)?)?;

        let table_offset = offset + preamble_len as u64;
        let table_len = preamble.n_blocks * BLOCK_INDEX_ENTRY_SIZE;

        if preamble.unit == unit.as_str() && preamble.bin_size == resolution {
            if preamble.block_bin_count <= 0 || preamble.block_column_count <= 0 {
                return Err(StrawError::Malformed(format!(
                    "zoom {} {} has block bin count {} and block column count {}",
                    resolution, unit, preamble.block_bin_count, preamble.block_column_count
                )));
            }
            let table = source.read_at(table_offset, table_len)?;
            let block_map = parse_block_table(&table, preamble.n_blocks)?;
            log::debug!(
                "zoom {} {}: {} blocks, blockBinCount {}, blockColumnCount {}",
                resolution,
                unit,
                block_map.len(),
                preamble.block_bin_count,
                preamble.block_column_count
            );
            return Ok(MatrixZoomData {
                unit,
                bin_size: preamble.bin_size,
                block_bin_count: preamble.block_bin_count,
                block_column_count: preamble.block_column_count,
                block_map,
            });
        }

        offset = table_offset + table_len as u64;
    }

    Err(StrawError::ResolutionNotFound {
        unit,
        bin_size: resolution,
    })
}
