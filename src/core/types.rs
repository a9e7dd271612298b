//! Shared data model
//!
//! Chromosomes, index entries, contact records and the two small string
//! enumerations (unit, normalization) that appear both in queries and on disk.

use crate::core::error::{Result, StrawError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A chromosome as declared in the file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    /// Position in the header table (0-based)
    pub index: i32,
    /// Length in base pairs
    pub length: i64,
}

/// Chromosome table keyed by name, preserving file order
#[derive(Debug, Clone, Default)]
pub struct ChromosomeTable {
    ordered: Vec<Chromosome>,
    by_name: HashMap<String, usize>,
}

impl ChromosomeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chromosome; its index is its position in the table.
    ///
    /// A repeated name keeps the later entry for lookups, matching how the
    /// header is consumed front to back.
    pub fn push(&mut self, name: String, length: i64) {
        let index = self.ordered.len();
        self.by_name.insert(name.clone(), index);
        self.ordered.push(Chromosome {
            name,
            index: index as i32,
            length,
        });
    }

    /// Case-sensitive lookup by name
    pub fn get(&self, name: &str) -> Option<&Chromosome> {
        self.by_name.get(name).map(|&i| &self.ordered[i])
    }

    /// Lookup that fails with `ChromosomeNotFound`
    pub fn require(&self, name: &str) -> Result<&Chromosome> {
        self.get(name)
            .ok_or_else(|| StrawError::ChromosomeNotFound(name.to_string()))
    }

    pub fn by_index(&self, index: i32) -> Option<&Chromosome> {
        usize::try_from(index).ok().and_then(|i| self.ordered.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chromosome> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Location of a compressed block or normalization vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    pub position: u64,
    /// Size in bytes; 0 means empty/absent
    pub size: u32,
}

impl IndexEntry {
    pub fn new(position: u64, size: u32) -> Self {
        Self { position, size }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// One sparse matrix cell.
///
/// Block decoding yields bin indices; the query layer rescales them to
/// base-pair coordinates before returning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRecord {
    pub bin_x: i32,
    pub bin_y: i32,
    pub counts: f32,
}

impl ContactRecord {
    pub fn new(bin_x: i32, bin_y: i32, counts: f32) -> Self {
        Self { bin_x, bin_y, counts }
    }
}

/// Bin unit: base pairs or restriction fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Bp,
    Frag,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bp => "BP",
            Unit::Frag => "FRAG",
        }
    }
}

impl FromStr for Unit {
    type Err = StrawError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BP" => Ok(Unit::Bp),
            "FRAG" => Ok(Unit::Frag),
            other => Err(StrawError::InvalidUnit(other.to_string())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalization method applied to raw counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalization {
    None,
    Vc,
    VcSqrt,
    Kr,
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalization::None => "NONE",
            Normalization::Vc => "VC",
            Normalization::VcSqrt => "VC_SQRT",
            Normalization::Kr => "KR",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Normalization::None)
    }
}

impl FromStr for Normalization {
    type Err = StrawError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NONE" => Ok(Normalization::None),
            "VC" => Ok(Normalization::Vc),
            "VC_SQRT" => Ok(Normalization::VcSqrt),
            "KR" => Ok(Normalization::Kr),
            other => Err(StrawError::InvalidNormalization(other.to_string())),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
