//! Little-endian cursor over an in-memory byte buffer
//!
//! Every structure in a .hic file is read through this type once the bytes
//! have been fetched from a [`ByteSource`](crate::core::io::ByteSource).

use crate::core::error::{Result, StrawError};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Typed reader over a borrowed buffer
pub struct BinaryCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

macro_rules! read_le {
    ($name:ident, $t:ty, $method:ident) => {
        pub fn $name(&mut self) -> Result<$t> {
            let position = self.inner.position();
            self.inner.$method::<LittleEndian>().map_err(|_| StrawError::Truncated {
                position,
                what: stringify!($t),
            })
        }
    };
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    /// Current byte offset within the buffer
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> usize {
        let data = *self.inner.get_ref();
        data.len().saturating_sub(self.inner.position() as usize)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let position = self.inner.position();
        self.inner.read_u8().map_err(|_| StrawError::Truncated {
            position,
            what: "u8",
        })
    }

    read_le!(read_i16, i16, read_i16);
    read_le!(read_i32, i32, read_i32);
    read_le!(read_i64, i64, read_i64);
    read_le!(read_f32, f32, read_f32);
    read_le!(read_f64, f64, read_f64);

    /// Read a NUL-terminated string, consuming the terminator
    pub fn read_cstr(&mut self) -> Result<String> {
        let start = self.inner.position() as usize;
        let data = *self.inner.get_ref();
        let rest = data.get(start..).unwrap_or(&[]);
        let len = memchr::memchr(0, rest).ok_or(StrawError::Truncated {
            position: start as u64,
            what: "NUL-terminated string",
        })?;
        self.inner.set_position((start + len + 1) as u64);
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }

    /// Up to `n` bytes from the current position, without consuming them
    pub fn peek(&self, n: usize) -> &'a [u8] {
        let data: &'a [u8] = *self.inner.get_ref();
        let start = (self.inner.position() as usize).min(data.len());
        &data[start..start.saturating_add(n).min(data.len())]
    }

    /// Advance past `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(StrawError::Truncated {
                position: self.inner.position(),
                what: "skipped bytes",
            });
        }
        self.inner.set_position(self.inner.position() + n as u64);
        Ok(())
    }

    /// Read a non-negative i32 count
    pub fn read_count(&mut self, what: &'static str) -> Result<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| StrawError::Malformed(format!("negative {} count {}", what, n)))
    }
}
