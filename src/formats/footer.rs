//! Footer ("master index") parsing
//!
//! The footer maps chromosome-pair keys to matrix offsets, then carries two
//! expected-value sections (skipped byte-exactly) and the normalization
//! vector index.

use crate::core::cursor::BinaryCursor;
use crate::core::{Result, StrawError};
use crate::core::io::ByteSource;
use crate::core::types::{IndexEntry, Normalization, Unit};

/// Footer lookups for one chromosome pair
#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    /// Offset of the pair's matrix directory
    pub matrix_offset: u64,
    /// Normalization vector for the first chromosome, if requested and present
    pub norm1: Option<IndexEntry>,
    /// Normalization vector for the second chromosome, if requested and present
    pub norm2: Option<IndexEntry>,
    pairs: Vec<String>,
}

impl Footer {
    /// Every chromosome-pair key listed in the master index
    pub fn pairs(&self) -> &[String] {
        &self.pairs
    }

    /// Both normalization entries, or `NormVectorNotFound` for the first missing one
    pub fn require_norm_entries(
        &self,
        chr1: i32,
        chr2: i32,
        norm: Normalization,
        unit: Unit,
        resolution: i32,
    ) -> Result<(IndexEntry, IndexEntry)> {
        let missing = |chrom_index| StrawError::NormVectorNotFound {
            norm,
            chrom_index,
            unit,
            resolution,
        };
        let n1 = self.norm1.ok_or_else(|| missing(chr1))?;
        let n2 = self.norm2.ok_or_else(|| missing(chr2))?;
        Ok((n1, n2))
    }
}

/// Key of a chromosome pair in the master index (lower index first)
pub fn pair_key(chr1: i32, chr2: i32) -> String {
    format!("{}_{}", chr1, chr2)
}

/// Parse the footer from a buffer starting at the master offset
pub fn parse_footer(
    data: &[u8],
    chr1: i32,
    chr2: i32,
    norm: Normalization,
    unit: Unit,
    resolution: i32,
) -> Result<Footer> {
    let mut cursor = BinaryCursor::new(data);
    let _n_bytes = cursor.read_i32()?;

    let key = pair_key(chr1, chr2);
    let n_entries = cursor.read_count("master index entry")?;
    let mut matrix_offset = None;
    let mut pairs = Vec::with_capacity(n_entries.min(cursor.remaining() / 14));
    for _ in 0..n_entries {
        let entry_key = cursor.read_cstr()?;
        let position = cursor.read_i64()?;
        let _size = cursor.read_i32()?;
        if entry_key == key {
            matrix_offset = Some(position);
        }
        pairs.push(entry_key);
    }
    log::debug!("footer lists {} chromosome pairs", n_entries);

    let matrix_offset = matrix_offset.ok_or_else(|| StrawError::PairNotFound(key.clone()))?;
    let matrix_offset = u64::try_from(matrix_offset)
        .map_err(|_| StrawError::Malformed(format!("negative matrix offset for pair {}", key)))?;

    let mut footer = Footer {
        matrix_offset,
        norm1: None,
        norm2: None,
        pairs,
    };
    if norm.is_none() {
        return Ok(footer);
    }

    skip_expected_values(&mut cursor, false)?;
    skip_expected_values(&mut cursor, true)?;

    let n_norm = cursor.read_count("normalization vector index entry")?;
    for _ in 0..n_norm {
        let norm_type = cursor.read_cstr()?;
        let chrom_index = cursor.read_i32()?;
        let entry_unit = cursor.read_cstr()?;
        let entry_resolution = cursor.read_i32()?;
        let position = cursor.read_i64()?;
        let size = cursor.read_i32()?;

        if norm_type != norm.as_str() || entry_unit != unit.as_str() || entry_resolution != resolution {
            continue;
        }
        let entry = index_entry(position, size)?;
        if chrom_index == chr1 {
            footer.norm1 = Some(entry);
        }
        if chrom_index == chr2 {
            footer.norm2 = Some(entry);
        }
    }

    if footer.norm1.is_none() || footer.norm2.is_none() {
        log::warn!(
            "file did not contain {} normalization vectors for one or both chromosomes at {} {}",
            norm,
            resolution,
            unit
        );
    }
    Ok(footer)
}

/// Fetch the footer bytes (master offset to end of file) and parse them
pub fn read_footer(
    source: &dyn ByteSource,
    master_offset: u64,
    chr1: i32,
    chr2: i32,
    norm: Normalization,
    unit: Unit,
    resolution: i32,
) -> Result<Footer> {
    let total = source.total_len()?;
    let length = total.checked_sub(master_offset).ok_or_else(|| {
        StrawError::Malformed(format!("master offset {} beyond end of file ({} bytes)", master_offset, total))
    })?;
    let data = source.read_at(master_offset, length as usize)?;
    parse_footer(&data, chr1, chr2, norm, unit, resolution)
}

/// Consume one expected-value section; the second section prefixes each
/// item with a normalization type string.
fn skip_expected_values(cursor: &mut BinaryCursor<'_>, typed: bool) -> Result<()> {
    let n = cursor.read_count("expected value vector")?;
    for _ in 0..n {
        if typed {
            cursor.read_cstr()?;
        }
        cursor.read_cstr()?;
        let _bin_size = cursor.read_i32()?;
        let n_values = cursor.read_count("expected value")?;
        cursor.skip(n_values * 8)?;
        let n_factors = cursor.read_count("normalization factor")?;
        cursor.skip(n_factors * 12)?;
    }
    Ok(())
}

pub(crate) fn index_entry(position: i64, size: i32) -> Result<IndexEntry> {
    let position = u64::try_from(position)
        .map_err(|_| StrawError::Malformed(format!("negative file position {}", position)))?;
    let size = u32::try_from(size).map_err(|_| StrawError::Malformed(format!("negative entry size {}", size)))?;
    Ok(IndexEntry::new(position, size))
}
