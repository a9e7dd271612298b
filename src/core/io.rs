//! Byte sources: positioned reads from a local file or an HTTP server
//!
//! Every read is addressed by an absolute offset, so no read cursor is shared
//! between calls. Local files are read through a seek-per-call handle or a
//! memory map; remote files through HTTP range requests.

use crate::core::error::{Result, StrawError};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// Threshold for using memory mapping (100MB)
pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Default User-Agent for ranged requests
pub const DEFAULT_USER_AGENT: &str = concat!("hic-straw/", env!("CARGO_PKG_VERSION"));

/// I/O strategy selection for local files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoStrategy {
    /// Seek and read on every call
    Buffered,
    /// Use memory mapping for the entire file
    MemoryMapped,
    /// Automatically select based on file size
    #[default]
    Auto,
}

/// Uniform positioned-read interface
pub trait ByteSource: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    ///
    /// Local sources fail with `ShortRead` when fewer bytes exist; remote
    /// sources may return fewer bytes at end of file.
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    /// Total size of the underlying file in bytes
    fn total_len(&self) -> Result<u64>;

    /// Path or URL, for diagnostics
    fn location(&self) -> &str;
}

/// True when the specifier names an HTTP(S) resource
pub fn is_remote(spec: &str) -> bool {
    spec.starts_with("http://") || spec.starts_with("https://")
}

/// Open a file path or URL as a byte source
pub fn open_source(spec: &str, strategy: IoStrategy, user_agent: &str) -> Result<Box<dyn ByteSource>> {
    if is_remote(spec) {
        Ok(Box::new(RemoteSource::new(spec, user_agent)?))
    } else {
        Ok(Box::new(LocalSource::open(spec, strategy)?))
    }
}

/// Local file source
pub enum LocalSource {
    /// Seek-per-call file handle
    Buffered {
        file: Mutex<File>,
        len: u64,
        path: String,
    },
    /// Memory-mapped file
    Mapped { mmap: Mmap, path: String },
}

impl LocalSource {
    /// Open a file with the specified I/O strategy
    pub fn open<P: AsRef<Path>>(path: P, strategy: IoStrategy) -> io::Result<Self> {
        let display = path.as_ref().display().to_string();
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();

        let mapped = match strategy {
            IoStrategy::Buffered => false,
            IoStrategy::MemoryMapped => true,
            IoStrategy::Auto => len >= MMAP_THRESHOLD,
        };

        if mapped {
            // SAFETY: We assume the file won't be modified while mapped
            let mmap = unsafe { Mmap::map(&file)? };
            log::debug!("memory-mapped {} ({} bytes)", display, len);
            Ok(LocalSource::Mapped { mmap, path: display })
        } else {
            Ok(LocalSource::Buffered {
                file: Mutex::new(file),
                len,
                path: display,
            })
        }
    }

    /// Check if using memory mapping
    pub fn is_mapped(&self) -> bool {
        matches!(self, LocalSource::Mapped { .. })
    }
}

impl ByteSource for LocalSource {
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        log::trace!("local read {}+{}", offset, length);
        match self {
            LocalSource::Mapped { mmap, .. } => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(mmap.len());
                let end = start.saturating_add(length).min(mmap.len());
                if end - start < length {
                    return Err(StrawError::ShortRead {
                        offset,
                        expected: length,
                        actual: end - start,
                    });
                }
                Ok(mmap[start..end].to_vec())
            }
            LocalSource::Buffered { file, len, .. } => {
                let available = len.saturating_sub(offset);
                if length as u64 > available {
                    return Err(StrawError::ShortRead {
                        offset,
                        expected: length,
                        actual: available as usize,
                    });
                }
                let mut file = file
                    .lock()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "file handle lock poisoned"))?;
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = Vec::with_capacity(length);
                (&mut *file).take(length as u64).read_to_end(&mut buf)?;
                if buf.len() < length {
                    return Err(StrawError::ShortRead {
                        offset,
                        expected: length,
                        actual: buf.len(),
                    });
                }
                Ok(buf)
            }
        }
    }

    fn total_len(&self) -> Result<u64> {
        Ok(match self {
            LocalSource::Mapped { mmap, .. } => mmap.len() as u64,
            LocalSource::Buffered { len, .. } => *len,
        })
    }

    fn location(&self) -> &str {
        match self {
            LocalSource::Mapped { path, .. } | LocalSource::Buffered { path, .. } => path,
        }
    }
}

/// HTTP source using byte-range requests
pub struct RemoteSource {
    url: String,
    client: reqwest::blocking::Client,
    /// File size parsed from the first `Content-Range` header seen
    total: OnceLock<u64>,
}

impl RemoteSource {
    pub fn new(url: &str, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| StrawError::network(url, e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
            total: OnceLock::new(),
        })
    }

    fn record_total(&self, response: &reqwest::blocking::Response) {
        if self.total.get().is_some() {
            return;
        }
        let total = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        if let Some(total) = total {
            log::debug!("{} reports {} total bytes", self.url, total);
            let _ = self.total.set(total);
        }
    }
}

impl ByteSource for RemoteSource {
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length as u64 - 1);
        log::trace!("GET {} Range: {}", self.url, range);

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range)
            .send()
            .map_err(|e| StrawError::network(&self.url, e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 200 {
            return Err(StrawError::network(
                &self.url,
                "server does not support range requests (returned 200 instead of 206)",
            ));
        }
        if !status.is_success() {
            return Err(StrawError::network(&self.url, format!("HTTP status {}", status.as_u16())));
        }
        self.record_total(&response);

        let mut bytes = response
            .bytes()
            .map_err(|e| StrawError::network(&self.url, e.to_string()))?
            .to_vec();
        bytes.truncate(length);
        Ok(bytes)
    }

    fn total_len(&self) -> Result<u64> {
        if let Some(&total) = self.total.get() {
            return Ok(total);
        }
        self.read_at(0, 1)?;
        self.total
            .get()
            .copied()
            .ok_or_else(|| StrawError::network(&self.url, "response carried no Content-Range total"))
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// In-memory source, counting the reads it serves
pub struct MemorySource {
    data: Vec<u8>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read_at` calls served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        if end - start < length {
            return Err(StrawError::ShortRead {
                offset,
                expected: length,
                actual: end - start,
            });
        }
        Ok(self.data[start..end].to_vec())
    }

    fn total_len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn location(&self) -> &str {
        "<memory>"
    }
}

/// Parse the total from `Content-Range: bytes 0-100000/891471462`
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
