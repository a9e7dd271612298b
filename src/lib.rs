//! hic-straw - random-access reader for `.hic` contact matrices
//!
//! Extracts the contact records of one chromosome pair at one resolution
//! from a local `.hic` file or a remote one served over HTTP range requests.
//!
//! # Features
//!
//! - Reads only the header, footer, one zoom directory and the blocks that
//!   overlap the query
//! - Legacy, row-list and dense block layouts (versions 6 to 8)
//! - VC, VC_SQRT and KR normalization
//! - Optional parallel block decoding with rayon
//!
//! # Example
//!
//! ```ignore
//! use hic_straw::straw;
//!
//! let records = straw("KR", "sample.hic", "chr1:0:5000000", "chr1:0:5000000", "BP", 25000)?;
//! for r in &records {
//!     println!("{}\t{}\t{}", r.bin_x, r.bin_y, r.counts);
//! }
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use self::core::{
    block_record_total, count, fetch, infer_resolution, read_metadata, straw, straw_count, ByteSource,
    ContactRecord, IoStrategy, Normalization, QueryOptions, RegionSpec, Result, StrawError, StrawRequest,
    Unit,
};
pub use self::formats::HicHeader;
