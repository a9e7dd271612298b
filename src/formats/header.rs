//! .hic header parsing
//!
//! Layout (little-endian):
//!
//! ```text
//! "HIC\0"                      magic
//! i32                          version
//! i64                          master (footer) offset
//! cstr                         genome id
//! i32 n, n x (cstr, cstr)      attribute dictionary
//! i32 n, n x (cstr, i32)       chromosomes (name, length)
//! ```
//!
//! Queries stop at the chromosome table. Files written by Juicer follow it
//! with two resolution lists, which only the metadata path reads:
//!
//! ```text
//! i32 n, n x i32               base-pair resolutions
//! i32 n, n x i32               fragment resolutions
//! ```

use crate::core::cursor::BinaryCursor;
use crate::core::io::ByteSource;
use crate::core::types::ChromosomeTable;
use crate::core::{Result, StrawError};
use std::collections::BTreeMap;

/// File signature
pub const MAGIC: &str = "HIC";
/// Oldest supported format version
pub const MIN_VERSION: i32 = 6;
/// Newest supported format version
pub const MAX_VERSION: i32 = 8;
/// Initial header window; doubled until the header fits
pub const DEFAULT_HEADER_WINDOW: u64 = 100_000;

/// Signature including its terminator
const SIGNATURE: &[u8] = b"HIC\0";

/// Parsed file header
#[derive(Debug, Clone)]
pub struct HicHeader {
    pub version: i32,
    /// Offset of the footer ("master index")
    pub master_offset: u64,
    pub genome_id: String,
    pub attributes: BTreeMap<String, String>,
    pub chromosomes: ChromosomeTable,
    /// Empty unless parsed with [`HicHeader::parse_with_resolutions`]
    pub bp_resolutions: Vec<i32>,
    /// Empty unless parsed with [`HicHeader::parse_with_resolutions`]
    pub frag_resolutions: Vec<i32>,
}

impl HicHeader {
    /// Parse a header, up to and including the chromosome table, from a
    /// buffer that starts at file offset 0
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::read_from(&mut BinaryCursor::new(data))
    }

    /// Parse a header followed by its base-pair and fragment resolution lists
    pub fn parse_with_resolutions(data: &[u8]) -> Result<Self> {
        let mut cursor = BinaryCursor::new(data);
        let mut header = Self::read_from(&mut cursor)?;
        header.bp_resolutions = read_resolutions(&mut cursor)?;
        header.frag_resolutions = read_resolutions(&mut cursor)?;
        Ok(header)
    }

    fn read_from(cursor: &mut BinaryCursor<'_>) -> Result<Self> {
        check_signature(cursor)?;
        cursor.skip(SIGNATURE.len())?;

        let version = cursor.read_i32()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(StrawError::UnsupportedVersion(version));
        }

        let master = cursor.read_i64()?;
        let master_offset = u64::try_from(master)
            .map_err(|_| StrawError::Malformed(format!("negative master offset {}", master)))?;
        let genome_id = cursor.read_cstr()?;

        let n_attributes = cursor.read_count("attribute")?;
        let mut attributes = BTreeMap::new();
        for _ in 0..n_attributes {
            let key = cursor.read_cstr()?;
            let value = cursor.read_cstr()?;
            attributes.insert(key, value);
        }

        let n_chrs = cursor.read_count("chromosome")?;
        let mut chromosomes = ChromosomeTable::new();
        for _ in 0..n_chrs {
            let name = cursor.read_cstr()?;
            let length = cursor.read_i32()?;
            chromosomes.push(name, i64::from(length));
        }

        log::debug!(
            "header: version {}, genome '{}', {} chromosomes, master at {}",
            version,
            genome_id,
            chromosomes.len(),
            master_offset
        );

        Ok(Self {
            version,
            master_offset,
            genome_id,
            attributes,
            chromosomes,
            bp_resolutions: Vec::new(),
            frag_resolutions: Vec::new(),
        })
    }
}

/// `BadMagic` unless the buffer starts with `HIC\0`, however short it is
fn check_signature(cursor: &BinaryCursor<'_>) -> Result<()> {
    let head = cursor.peek(SIGNATURE.len());
    if head == SIGNATURE {
        return Ok(());
    }
    let found = String::from_utf8_lossy(head).trim_end_matches('\0').to_string();
    Err(StrawError::BadMagic { found })
}

fn read_resolutions(cursor: &mut BinaryCursor<'_>) -> Result<Vec<i32>> {
    let n = cursor.read_count("resolution")?;
    (0..n).map(|_| cursor.read_i32()).collect()
}

/// Read the header, growing the fetched window until it fits
fn read_header_with(source: &dyn ByteSource, window_size: u64, parse: fn(&[u8]) -> Result<HicHeader>) -> Result<HicHeader> {
    let total = source.total_len()?;
    let mut window = window_size.max(16).min(total);

    loop {
        let data = source.read_at(0, window as usize)?;
        match parse(&data) {
            Err(e) if e.is_truncation() && window < total => {
                let grown = window.saturating_mul(2).min(total);
                log::warn!(
                    "header of {} exceeds {} bytes, retrying with {}",
                    source.location(),
                    window,
                    grown
                );
                window = grown;
            }
            result => return result,
        }
    }
}

/// Read the header needed by queries (through the chromosome table)
pub fn read_header(source: &dyn ByteSource, window_size: u64) -> Result<HicHeader> {
    read_header_with(source, window_size, HicHeader::parse)
}

/// Read the header together with its resolution lists
pub fn read_header_metadata(source: &dyn ByteSource, window_size: u64) -> Result<HicHeader> {
    read_header_with(source, window_size, HicHeader::parse_with_resolutions)
}
