//! Query orchestration
//!
//! A query opens its source, reads the header, footer, optional
//! normalization vectors and the matrix directory, then decodes the blocks
//! covering the requested rectangle. Nothing is cached between queries.

use crate::core::error::{Result, StrawError};
use crate::core::io::{open_source, ByteSource, IoStrategy, DEFAULT_USER_AGENT};
use crate::core::region::{blocks_for_region, Region, RegionSpec};
use crate::core::types::{ContactRecord, Normalization, Unit};
use crate::formats::block::{read_block, read_block_record_count};
use crate::formats::footer::read_footer;
use crate::formats::header::{read_header, read_header_metadata, HicHeader, DEFAULT_HEADER_WINDOW};
use crate::formats::matrix::{read_matrix, MatrixZoomData};
use crate::formats::norm::{factor, read_norm_vector};
use rayon::prelude::*;

/// Tunables for a query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Worker threads for block fetch and decode (1 = sequential)
    pub threads: usize,
    /// Initial header window in bytes
    pub header_window: u64,
    /// Local file access strategy
    pub io_strategy: IoStrategy,
    /// User-Agent sent with ranged requests
    pub user_agent: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            header_window: DEFAULT_HEADER_WINDOW,
            io_strategy: IoStrategy::Auto,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A validated query
#[derive(Debug, Clone, PartialEq)]
pub struct StrawRequest {
    pub norm: Normalization,
    /// Local path or http(s) URL
    pub file: String,
    pub region1: RegionSpec,
    pub region2: RegionSpec,
    pub unit: Unit,
    pub bin_size: i32,
}

impl StrawRequest {
    /// Validate string arguments; performs no I/O
    pub fn parse(norm: &str, file: &str, chr1: &str, chr2: &str, unit: &str, bin_size: i32) -> Result<Self> {
        let unit = unit.parse::<Unit>()?;
        let norm = norm.parse::<Normalization>()?;
        if bin_size <= 0 {
            return Err(StrawError::InvalidBinSize(bin_size));
        }
        Ok(Self {
            norm,
            file: file.to_string(),
            region1: RegionSpec::parse(chr1)?,
            region2: RegionSpec::parse(chr2)?,
            unit,
            bin_size,
        })
    }
}

/// Base-pair rectangle that returned records must fall in
#[derive(Debug, Clone, Copy)]
struct OutputFilter {
    x: (i64, i64),
    y: (i64, i64),
    intra: bool,
}

impl OutputFilter {
    fn accepts(&self, x: i64, y: i64) -> bool {
        let inside = |v: i64, r: (i64, i64)| v >= r.0 && v <= r.1;
        (inside(x, self.x) && inside(y, self.y)) || (self.intra && inside(y, self.x) && inside(x, self.y))
    }
}

/// Everything resolved before block decoding
struct QueryPlan {
    version: i32,
    bin_size: i32,
    zoom: MatrixZoomData,
    blocks: Vec<i32>,
    norms: Option<(Vec<f64>, Vec<f64>)>,
    filter: OutputFilter,
}

impl QueryPlan {
    fn build(source: &dyn ByteSource, request: &StrawRequest, options: &QueryOptions, norm: Normalization) -> Result<Self> {
        let header = read_header(source, options.header_window)?;
        let region1 = request.region1.resolve(&header.chromosomes)?;
        let region2 = request.region2.resolve(&header.chromosomes)?;

        // the file stores each pair once, lower chromosome index first
        let (first, second): (Region, Region) = if region1.chrom.index > region2.chrom.index {
            (region2, region1)
        } else {
            (region1, region2)
        };
        let c1 = first.chrom.index;
        let c2 = second.chrom.index;
        let unit = request.unit;
        let bin_size = request.bin_size;

        let footer = read_footer(source, header.master_offset, c1, c2, norm, unit, bin_size)?;

        let norms = if norm.is_none() {
            None
        } else {
            let (e1, e2) = footer.require_norm_entries(c1, c2, norm, unit, bin_size)?;
            Some((read_norm_vector(source, e1)?, read_norm_vector(source, e2)?))
        };

        let zoom = read_matrix(source, footer.matrix_offset, unit, bin_size)?;

        let (x_lo, x_hi) = first.bins(bin_size);
        let (y_lo, y_hi) = second.bins(bin_size);
        let blocks: Vec<i32> = blocks_for_region(
            x_lo,
            x_hi,
            y_lo,
            y_hi,
            zoom.block_bin_count,
            zoom.block_column_count,
            c1 == c2,
        )
        .into_iter()
        .collect();
        log::debug!("{} candidate blocks for {}_{} at {} {}", blocks.len(), c1, c2, bin_size, unit);

        Ok(Self {
            version: header.version,
            bin_size,
            zoom,
            blocks,
            norms,
            filter: OutputFilter {
                x: (first.start, first.end),
                y: (second.start, second.end),
                intra: c1 == c2,
            },
        })
    }

    /// Scale to base pairs, filter to the requested rectangle and normalize
    fn finish(&self, record: ContactRecord) -> Option<ContactRecord> {
        let bin_size = i64::from(self.bin_size);
        let x = i64::from(record.bin_x) * bin_size;
        let y = i64::from(record.bin_y) * bin_size;
        if !self.filter.accepts(x, y) {
            return None;
        }
        let counts = match &self.norms {
            Some((n1, n2)) => {
                (f64::from(record.counts) / (factor(n1, record.bin_x) * factor(n2, record.bin_y))) as f32
            }
            None => record.counts,
        };
        Some(ContactRecord::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?, counts))
    }

    fn decode(&self, source: &dyn ByteSource, number: i32) -> Result<Vec<ContactRecord>> {
        match self.zoom.block(number) {
            Some(entry) => read_block(source, entry, self.version),
            None => Ok(Vec::new()),
        }
    }

    /// Run `f` over every block in ascending order, in parallel if configured
    fn map_blocks<T, F>(&self, threads: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(i32) -> Result<T> + Sync + Send,
    {
        if threads <= 1 {
            return self.blocks.iter().map(|&number| f(number)).collect();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                StrawError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to create thread pool: {}", e),
                ))
            })?;
        pool.install(|| self.blocks.par_iter().map(|&number| f(number)).collect())
    }
}

/// Fetch records from an already opened source
pub fn fetch_from(source: &dyn ByteSource, request: &StrawRequest, options: &QueryOptions) -> Result<Vec<ContactRecord>> {
    let plan = QueryPlan::build(source, request, options, request.norm)?;
    let per_block = plan.map_blocks(options.threads, |number| {
        let records = plan.decode(source, number)?;
        Ok(records.into_iter().filter_map(|r| plan.finish(r)).collect::<Vec<_>>())
    })?;
    let records: Vec<ContactRecord> = per_block.into_iter().flatten().collect();
    log::debug!("query returned {} records", records.len());
    Ok(records)
}

/// Count the records `fetch_from` would return, without normalizing or
/// materializing them
pub fn count_from(source: &dyn ByteSource, request: &StrawRequest, options: &QueryOptions) -> Result<u64> {
    let plan = QueryPlan::build(source, request, options, Normalization::None)?;
    let per_block = plan.map_blocks(options.threads, |number| {
        let records = plan.decode(source, number)?;
        Ok(records.into_iter().filter(|&r| plan.finish(r).is_some()).count() as u64)
    })?;
    Ok(per_block.into_iter().sum())
}

/// Sum of the record-count headers of every candidate block.
///
/// Skips decoding entirely, so it over-counts relative to [`count_from`]:
/// records outside the rectangle and missing dense cells are included.
pub fn block_record_total_from(source: &dyn ByteSource, request: &StrawRequest, options: &QueryOptions) -> Result<u64> {
    let plan = QueryPlan::build(source, request, options, Normalization::None)?;
    let per_block = plan.map_blocks(options.threads, |number| match plan.zoom.block(number) {
        Some(entry) => read_block_record_count(source, entry),
        None => Ok(0),
    })?;
    Ok(per_block.into_iter().sum())
}

fn open(request: &StrawRequest, options: &QueryOptions) -> Result<Box<dyn ByteSource>> {
    open_source(&request.file, options.io_strategy, &options.user_agent)
}

/// Records for `request`, with coordinates in base pairs
pub fn fetch(request: &StrawRequest, options: &QueryOptions) -> Result<Vec<ContactRecord>> {
    let source = open(request, options)?;
    fetch_from(source.as_ref(), request, options)
}

/// Number of records [`fetch`] would return under no normalization
pub fn count(request: &StrawRequest, options: &QueryOptions) -> Result<u64> {
    let source = open(request, options)?;
    count_from(source.as_ref(), request, options)
}

/// See [`block_record_total_from`]
pub fn block_record_total(request: &StrawRequest, options: &QueryOptions) -> Result<u64> {
    let source = open(request, options)?;
    block_record_total_from(source.as_ref(), request, options)
}

/// Header metadata of a file or URL, including its resolution lists
pub fn read_metadata(file: &str, options: &QueryOptions) -> Result<HicHeader> {
    let source = open_source(file, options.io_strategy, &options.user_agent)?;
    read_header_metadata(source.as_ref(), options.header_window)
}

/// One-call query:
/// `straw(norm, file, "chr[:start:end]", "chr[:start:end]", unit, bin_size)`
pub fn straw(norm: &str, file: &str, chr1: &str, chr2: &str, unit: &str, bin_size: i32) -> Result<Vec<ContactRecord>> {
    let request = StrawRequest::parse(norm, file, chr1, chr2, unit, bin_size)?;
    fetch(&request, &QueryOptions::default())
}

/// Count counterpart of [`straw`]
pub fn straw_count(norm: &str, file: &str, chr1: &str, chr2: &str, unit: &str, bin_size: i32) -> Result<u64> {
    let request = StrawRequest::parse(norm, file, chr1, chr2, unit, bin_size)?;
    count(&request, &QueryOptions::default())
}
