//! Error types for hic-straw
//!
//! Defines the error taxonomy shared by every parsing step and the query layer.

use crate::core::types::{Normalization, Unit};
use thiserror::Error;

/// Main error type for hic-straw operations
#[derive(Debug, Error)]
pub enum StrawError {
    /// The file does not start with the `HIC` signature
    #[error("Bad magic string '{found}': does not appear to be a .hic file")]
    BadMagic { found: String },

    /// Format version outside the supported range
    #[error("Unsupported .hic version {0} (supported: 6 to 8)")]
    UnsupportedVersion(i32),

    /// Chromosome name missing from the header table
    #[error("Chromosome not found in file: {0}")]
    ChromosomeNotFound(String),

    /// Chromosome-pair key missing from the master index
    #[error("File has no matrix for chromosome pair {0}")]
    PairNotFound(String),

    /// No zoom level for the requested unit and bin size
    #[error("No {unit} resolution with bin size {bin_size} in matrix")]
    ResolutionNotFound { unit: Unit, bin_size: i32 },

    /// Normalization vector absent from the footer index
    #[error("No {norm} normalization vector for chromosome index {chrom_index} at {resolution} {unit}")]
    NormVectorNotFound {
        norm: Normalization,
        chrom_index: i32,
        unit: Unit,
        resolution: i32,
    },

    /// Block payload failed to inflate
    #[error("Failed to decompress block at offset {offset}: {message}")]
    Decompression { offset: u64, message: String },

    /// Local file ended before the requested range
    #[error("Short read at offset {offset}: wanted {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// Transport failure or non-success HTTP status
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Unit string other than BP or FRAG
    #[error("Invalid unit '{0}': must be one of BP, FRAG")]
    InvalidUnit(String),

    /// Normalization string not recognised
    #[error("Invalid normalization '{0}': must be one of NONE, VC, VC_SQRT, KR")]
    InvalidNormalization(String),

    /// Malformed `chr[:start:end]` specifier
    #[error("Invalid region '{spec}': {message}")]
    InvalidRegionSpec { spec: String, message: String },

    /// Non-positive bin size
    #[error("Invalid bin size {0}: must be positive")]
    InvalidBinSize(i32),

    /// Decoder ran past the end of its buffer
    #[error("Unexpected end of data at byte {position} while reading {what}")]
    Truncated { position: u64, what: &'static str },

    /// Structurally impossible value in the file
    #[error("Malformed file: {0}")]
    Malformed(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrawError {
    /// Shorthand for a region specifier error
    pub fn invalid_region(spec: &str, message: impl Into<String>) -> Self {
        StrawError::InvalidRegionSpec {
            spec: spec.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a network error
    pub fn network(url: &str, message: impl Into<String>) -> Self {
        StrawError::Network {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// True when a larger input window could make the read succeed
    pub fn is_truncation(&self) -> bool {
        matches!(self, StrawError::Truncated { .. })
    }
}

/// Result type alias for hic-straw operations
pub type Result<T> = std::result::Result<T, StrawError>;
