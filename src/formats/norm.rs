//! Normalization vector parsing
//!
//! A vector is `i32 n` followed by `n` little-endian doubles, one per bin.

use crate::core::cursor::BinaryCursor;
use crate::core::Result;
use crate::core::io::ByteSource;
use crate::core::types::IndexEntry;

/// Decode a normalization vector; NaN entries are kept as-is
pub fn parse_norm_vector(data: &[u8]) -> Result<Vec<f64>> {
    let mut cursor = BinaryCursor::new(data);
    let n = cursor.read_count("normalization value")?;
    let mut values = Vec::with_capacity(n.min(cursor.remaining() / 8));
    for _ in 0..n {
        values.push(cursor.read_f64()?);
    }
    Ok(values)
}

pub fn read_norm_vector(source: &dyn ByteSource, entry: IndexEntry) -> Result<Vec<f64>> {
    let data = source.read_at(entry.position, entry.size as usize)?;
    let values = parse_norm_vector(&data)?;
    log::debug!("normalization vector at {}: {} bins", entry.position, values.len());
    Ok(values)
}

/// Factor for `bin`; bins past the end of the vector read as NaN
pub fn factor(values: &[f64], bin: i32) -> f64 {
    usize::try_from(bin)
        .ok()
        .and_then(|i| values.get(i))
        .copied()
        .unwrap_or(f64::NAN)
}
