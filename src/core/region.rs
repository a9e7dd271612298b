//! Genomic region specifiers and block-set resolution
//!
//! Regions are written `chr` or `chr:start:end` (0-based base pairs). Block
//! resolution maps a bin rectangle to the block numbers covering it on the
//! row-major block grid.

use crate::core::error::{Result, StrawError};
use crate::core::types::{Chromosome, ChromosomeTable};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Default bin count threshold for resolution inference
pub const DEFAULT_BIN_THRESHOLD: i64 = 1000;

/// A parsed, not yet resolved, region specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub chrom: String,
    /// Explicit `(start, end)`; `None` means the whole chromosome
    pub range: Option<(i64, i64)>,
}

impl RegionSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let chrom = parts[0];
        if chrom.is_empty() {
            return Err(StrawError::invalid_region(spec, "empty chromosome name"));
        }

        let range = match parts.len() {
            1 => None,
            3 => {
                let start = parse_coord(spec, parts[1])?;
                let end = parse_coord(spec, parts[2])?;
                if start > end {
                    return Err(StrawError::invalid_region(
                        spec,
                        format!("start ({}) > end ({})", start, end),
                    ));
                }
                Some((start, end))
            }
            _ => return Err(StrawError::invalid_region(spec, "expected chr or chr:start:end")),
        };

        Ok(Self {
            chrom: chrom.to_string(),
            range,
        })
    }

    /// Look up the chromosome and fill in a missing range
    pub fn resolve(&self, chromosomes: &ChromosomeTable) -> Result<Region> {
        let chrom = chromosomes.require(&self.chrom)?.clone();
        let (start, end) = self.range.unwrap_or((0, chrom.length));
        Ok(Region { chrom, start, end })
    }
}

impl FromStr for RegionSpec {
    type Err = StrawError;

    fn from_str(s: &str) -> Result<Self> {
        RegionSpec::parse(s)
    }
}

fn parse_coord(spec: &str, value: &str) -> Result<i64> {
    let coord: i64 = value
        .parse()
        .map_err(|_| StrawError::invalid_region(spec, format!("'{}' is not an integer", value)))?;
    if coord < 0 {
        return Err(StrawError::invalid_region(spec, format!("negative coordinate {}", coord)));
    }
    Ok(coord)
}

/// A region bound to a chromosome from the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: Chromosome,
    pub start: i64,
    pub end: i64,
}

impl Region {
    pub fn length(&self) -> i64 {
        self.end - self.start
    }

    /// Inclusive bin range at `bin_size`
    pub fn bins(&self, bin_size: i32) -> (i64, i64) {
        let bin_size = i64::from(bin_size);
        (self.start / bin_size, self.end / bin_size)
    }

    pub fn contains(&self, pos: i64) -> bool {
        pos >= self.start && pos <= self.end
    }
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Block numbers covering the bin rectangle `[x_lo, x_hi] x [y_lo, y_hi]`.
///
/// Columns follow x, rows follow y. For intra-chromosomal queries the
/// transposed rectangle is included too, since only the upper triangle is
/// stored. The set iterates in ascending block number.
pub fn blocks_for_region(
    bin_x_lo: i64,
    bin_x_hi: i64,
    bin_y_lo: i64,
    bin_y_hi: i64,
    block_bin_count: i32,
    block_column_count: i32,
    intra: bool,
) -> BTreeSet<i32> {
    let block_bin_count = i64::from(block_bin_count.max(1));
    let block_column_count = i64::from(block_column_count);
    let (x_lo, x_hi) = ordered(bin_x_lo, bin_x_hi);
    let (y_lo, y_hi) = ordered(bin_y_lo, bin_y_hi);

    let col1 = x_lo / block_bin_count;
    let col2 = (x_hi + 1) / block_bin_count;
    let row1 = y_lo / block_bin_count;
    let row2 = (y_hi + 1) / block_bin_count;

    let mut blocks = BTreeSet::new();
    let mut insert_rect = |rows: (i64, i64), cols: (i64, i64)| {
        for r in rows.0..=rows.1 {
            for c in cols.0..=cols.1 {
                if let Ok(number) = i32::try_from(r * block_column_count + c) {
                    blocks.insert(number);
                }
            }
        }
    };

    insert_rect((row1, row2), (col1, col2));
    if intra {
        insert_rect((col1, col2), (row1, row2));
    }
    blocks
}

/// Pick the finest resolution at which a region of `region_length` bp spans
/// fewer than `bin_threshold` bins; the coarsest one if none does.
pub fn infer_resolution(region_length: i64, resolutions: &[i32], bin_threshold: i64) -> Option<i32> {
    let mut sorted: Vec<i32> = resolutions.iter().copied().filter(|&r| r > 0).collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .copied()
        .find(|&r| region_length / i64::from(r) < bin_threshold)
        .or_else(|| sorted.last().copied())
}
