//! Core query machinery
//!
//! Byte sources, the little-endian cursor, shared types, region resolution
//! and the query orchestrator.

pub mod cursor;
mod error;
pub mod io;
pub mod query;
pub mod region;
pub mod types;

pub use error::{Result, StrawError};
pub use io::{
    is_remote, open_source, ByteSource, IoStrategy, LocalSource, MemorySource, RemoteSource,
    DEFAULT_USER_AGENT, MMAP_THRESHOLD,
};
pub use query::{
    block_record_total, block_record_total_from, count, count_from, fetch, fetch_from, read_metadata,
    straw, straw_count, QueryOptions, StrawRequest,
};
pub use region::{blocks_for_region, infer_resolution, Region, RegionSpec, DEFAULT_BIN_THRESHOLD};
pub use types::{Chromosome, ChromosomeTable, ContactRecord, IndexEntry, Normalization, Unit};
