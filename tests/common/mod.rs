//! Synthetic .hic file builder shared by the integration tests
//!
//! Writes the header, compressed blocks, normalization vectors, matrix
//! directories and the footer, then patches the master offset. Remote tests
//! serve the result from a wiremock server.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

fn i16le(buf: &mut Vec<u8>, v: i16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn i32le(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn i64le(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

// ============================================================================
// Block payloads (uncompressed)
// ============================================================================

/// Version 6 block: `(binX, binY, counts)` triples
pub fn legacy_block(records: &[(i32, i32, f32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    i32le(&mut buf, records.len() as i32);
    for &(x, y, c) in records {
        i32le(&mut buf, x);
        i32le(&mut buf, y);
        buf.extend_from_slice(&c.to_le_bytes());
    }
    buf
}

fn push_value(buf: &mut Vec<u8>, short: bool, v: f32) {
    if short {
        let s = if v.is_nan() { i16::MIN } else { v as i16 };
        i16le(buf, s);
    } else {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn offset_header(buf: &mut Vec<u8>, n: i32, x0: i32, y0: i32, short: bool, kind: u8) {
    i32le(buf, n);
    i32le(buf, x0);
    i32le(buf, y0);
    buf.push(if short { 0 } else { 1 });
    buf.push(kind);
}

/// Version 7+ row-list block; `rows` holds `(y, [(x, value)])` relative to the origin
pub fn row_list_block(x0: i32, y0: i32, short: bool, rows: &[(i16, Vec<(i16, f32)>)]) -> Vec<u8> {
    let n: usize = rows.iter().map(|(_, cols)| cols.len()).sum();
    let mut buf = Vec::new();
    offset_header(&mut buf, n as i32, x0, y0, short, 1);
    i16le(&mut buf, rows.len() as i16);
    for (y, cols) in rows {
        i16le(&mut buf, *y);
        i16le(&mut buf, cols.len() as i16);
        for &(x, v) in cols {
            i16le(&mut buf, x);
            push_value(&mut buf, short, v);
        }
    }
    buf
}

/// Version 7+ dense block; NaN values become missing cells
pub fn dense_block(x0: i32, y0: i32, short: bool, width: i16, values: &[f32]) -> Vec<u8> {
    let mut buf = Vec::new();
    offset_header(&mut buf, values.len() as i32, x0, y0, short, 2);
    i32le(&mut buf, values.len() as i32);
    i16le(&mut buf, width);
    for &v in values {
        push_value(&mut buf, short, v);
    }
    buf
}

pub fn compress(payload: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

// ============================================================================
// File builder
// ============================================================================

pub struct Zoom {
    pub unit: &'static str,
    pub bin_size: i32,
    pub block_bin_count: i32,
    pub block_column_count: i32,
    /// `(block number, uncompressed payload)`
    pub blocks: Vec<(i32, Vec<u8>)>,
    /// `(block number, bytes)` written verbatim, after the compressed blocks
    pub raw_blocks: Vec<(i32, Vec<u8>)>,
}

impl Zoom {
    pub fn bp(bin_size: i32, block_bin_count: i32, block_column_count: i32, blocks: Vec<(i32, Vec<u8>)>) -> Self {
        Self {
            unit: "BP",
            bin_size,
            block_bin_count,
            block_column_count,
            blocks,
            raw_blocks: Vec::new(),
        }
    }

    pub fn frag(bin_size: i32, block_bin_count: i32, block_column_count: i32, blocks: Vec<(i32, Vec<u8>)>) -> Self {
        Self {
            unit: "FRAG",
            ..Self::bp(bin_size, block_bin_count, block_column_count, blocks)
        }
    }

    /// Add a block whose stored bytes are exactly `bytes`
    pub fn raw_block(mut self, number: i32, bytes: &[u8]) -> Self {
        self.raw_blocks.push((number, bytes.to_vec()));
        self
    }
}

struct Matrix {
    chr1: i32,
    chr2: i32,
    zooms: Vec<Zoom>,
}

struct NormVector {
    norm: &'static str,
    chrom: i32,
    unit: &'static str,
    resolution: i32,
    values: Vec<f64>,
}

pub struct HicFileBuilder {
    version: i32,
    chromosomes: Vec<(String, i32)>,
    bp_resolutions: Vec<i32>,
    frag_resolutions: Vec<i32>,
    /// Older writers end the header at the chromosome table
    resolution_lists: bool,
    attributes: Vec<(String, String)>,
    matrices: Vec<Matrix>,
    norms: Vec<NormVector>,
    /// Extra bytes placed after the header to push data offsets out
    padding: usize,
}

impl HicFileBuilder {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            chromosomes: Vec::new(),
            bp_resolutions: Vec::new(),
            frag_resolutions: Vec::new(),
            resolution_lists: true,
            attributes: Vec::new(),
            matrices: Vec::new(),
            norms: Vec::new(),
            padding: 0,
        }
    }

    pub fn chromosome(mut self, name: &str, length: i32) -> Self {
        self.chromosomes.push((name.to_string(), length));
        self
    }

    pub fn resolutions(mut self, bp: &[i32]) -> Self {
        self.bp_resolutions = bp.to_vec();
        self
    }

    pub fn frag_resolutions(mut self, frag: &[i32]) -> Self {
        self.frag_resolutions = frag.to_vec();
        self
    }

    /// End the header at the chromosome table
    pub fn without_resolution_lists(mut self) -> Self {
        self.resolution_lists = false;
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn matrix(mut self, chr1: i32, chr2: i32, zooms: Vec<Zoom>) -> Self {
        self.matrices.push(Matrix { chr1, chr2, zooms });
        self
    }

    pub fn norm(mut self, norm: &'static str, chrom: i32, unit: &'static str, resolution: i32, values: &[f64]) -> Self {
        self.norms.push(NormVector {
            norm,
            chrom,
            unit,
            resolution,
            values: values.to_vec(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        cstr(&mut buf, "HIC");
        i32le(&mut buf, self.version);
        let master_slot = buf.len();
        i64le(&mut buf, 0);
        cstr(&mut buf, "test_genome");
        i32le(&mut buf, self.attributes.len() as i32);
        for (k, v) in &self.attributes {
            cstr(&mut buf, k);
            cstr(&mut buf, v);
        }
        i32le(&mut buf, self.chromosomes.len() as i32);
        for (name, length) in &self.chromosomes {
            cstr(&mut buf, name);
            i32le(&mut buf, *length);
        }
        if self.resolution_lists {
            for list in [&self.bp_resolutions, &self.frag_resolutions] {
                i32le(&mut buf, list.len() as i32);
                for &r in list {
                    i32le(&mut buf, r);
                }
            }
        }
        buf.extend(std::iter::repeat(0u8).take(self.padding));

        // compressed blocks, per matrix and zoom
        let mut block_entries: Vec<Vec<Vec<(i32, i64, i32)>>> = Vec::new();
        for matrix in &self.matrices {
            let mut per_zoom = Vec::new();
            for zoom in &matrix.zooms {
                let mut entries = Vec::new();
                for (number, payload) in &zoom.blocks {
                    let compressed = compress(payload);
                    entries.push((*number, buf.len() as i64, compressed.len() as i32));
                    buf.extend_from_slice(&compressed);
                }
                for (number, bytes) in &zoom.raw_blocks {
                    entries.push((*number, buf.len() as i64, bytes.len() as i32));
                    buf.extend_from_slice(bytes);
                }
                per_zoom.push(entries);
            }
            block_entries.push(per_zoom);
        }

        let mut norm_entries = Vec::new();
        for nv in &self.norms {
            let position = buf.len() as i64;
            i32le(&mut buf, nv.values.len() as i32);
            for v in &nv.values {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            norm_entries.push((position, (buf.len() as i64 - position) as i32));
        }

        let mut matrix_entries = Vec::new();
        for (matrix, per_zoom) in self.matrices.iter().zip(&block_entries) {
            let position = buf.len() as i64;
            i32le(&mut buf, matrix.chr1);
            i32le(&mut buf, matrix.chr2);
            i32le(&mut buf, matrix.zooms.len() as i32);
            for (zoom, entries) in matrix.zooms.iter().zip(per_zoom) {
                cstr(&mut buf, zoom.unit);
                i32le(&mut buf, 0);
                for v in [100.0f32, 10.0, 1.0, 5.0] {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                i32le(&mut buf, zoom.bin_size);
                i32le(&mut buf, zoom.block_bin_count);
                i32le(&mut buf, zoom.block_column_count);
                i32le(&mut buf, entries.len() as i32);
                for &(number, pos, size) in entries {
                    i32le(&mut buf, number);
                    i64le(&mut buf, pos);
                    i32le(&mut buf, size);
                }
            }
            let key = format!("{}_{}", matrix.chr1, matrix.chr2);
            matrix_entries.push((key, position, (buf.len() as i64 - position) as i32));
        }

        let master = buf.len() as i64;
        buf[master_slot..master_slot + 8].copy_from_slice(&master.to_le_bytes());

        i32le(&mut buf, 0);
        i32le(&mut buf, matrix_entries.len() as i32);
        for (key, pos, size) in &matrix_entries {
            cstr(&mut buf, key);
            i64le(&mut buf, *pos);
            i32le(&mut buf, *size);
        }

        // expected values: one untyped and one typed section
        i32le(&mut buf, 1);
        cstr(&mut buf, "BP");
        i32le(&mut buf, 10);
        i32le(&mut buf, 2);
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.extend_from_slice(&0.5f64.to_le_bytes());
        i32le(&mut buf, 1);
        i32le(&mut buf, 0);
        buf.extend_from_slice(&1.0f64.to_le_bytes());

        i32le(&mut buf, 1);
        cstr(&mut buf, "KR");
        cstr(&mut buf, "BP");
        i32le(&mut buf, 10);
        i32le(&mut buf, 1);
        buf.extend_from_slice(&2.0f64.to_le_bytes());
        i32le(&mut buf, 0);

        i32le(&mut buf, self.norms.len() as i32);
        for (nv, (pos, size)) in self.norms.iter().zip(&norm_entries) {
            cstr(&mut buf, nv.norm);
            i32le(&mut buf, nv.chrom);
            cstr(&mut buf, nv.unit);
            i32le(&mut buf, nv.resolution);
            i64le(&mut buf, *pos);
            i32le(&mut buf, *size);
        }
        buf
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

/// chrA (1000bp) and chrB (2000bp) at bin size 10, block bin count 100,
/// with intra-chrA, inter chrA-chrB and KR/VC vectors for both. chrA also
/// has a coarse BP 100 zoom and a FRAG 1 zoom.
pub fn sample_builder(version: i32) -> HicFileBuilder {
    let intra_block = if version >= 7 {
        row_list_block(
            0,
            0,
            true,
            &[(0, vec![(0, 10.0), (5, 4.0)]), (20, vec![(20, 8.0), (60, 2.0)]), (70, vec![(90, 6.0)])],
        )
    } else {
        legacy_block(&[(0, 0, 10.0), (5, 0, 4.0), (20, 20, 8.0), (60, 20, 2.0), (90, 70, 6.0)])
    };
    let inter_block_0 = legacy_or_dense(version, 0, 0);
    let inter_block_1 = if version >= 7 {
        row_list_block(0, 100, false, &[(0, vec![(3, 1.5)]), (50, vec![(99, 2.5)])])
    } else {
        legacy_block(&[(3, 100, 1.5), (99, 150, 2.5)])
    };

    HicFileBuilder::new(version)
        .chromosome("chrA", 1000)
        .chromosome("chrB", 2000)
        .resolutions(&[10, 100])
        .frag_resolutions(&[1])
        .attribute("software", "test")
        .matrix(
            0,
            0,
            vec![
                Zoom::bp(100, 10, 1, vec![(0, legacy_or_dense(version, 0, 0))]),
                Zoom::bp(10, 100, 1, vec![(0, intra_block)]),
                Zoom::frag(1, 100, 1, vec![(0, legacy_or_dense(version, 0, 0))]),
            ],
        )
        // block 0: chrB bins 0..100, block 1: chrB bins 100..200
        .matrix(0, 1, vec![Zoom::bp(10, 100, 1, vec![(0, inter_block_0), (1, inter_block_1)])])
        .norm("KR", 0, "BP", 10, &vec![2.0; 100])
        .norm("KR", 1, "BP", 10, &vec![0.5; 200])
        .norm("VC", 0, "BP", 10, &vec![1.0; 100])
}

/// A 2x2 block at `(x0, y0)` with values 1, 2, missing, 4
pub fn legacy_or_dense(version: i32, x0: i32, y0: i32) -> Vec<u8> {
    if version >= 7 {
        dense_block(x0, y0, true, 2, &[1.0, 2.0, f32::NAN, 4.0])
    } else {
        legacy_block(&[(x0, y0, 1.0), (x0 + 1, y0, 2.0), (x0 + 1, y0 + 1, 4.0)])
    }
}

// ============================================================================
// Mock HTTP range server
// ============================================================================

/// How the server answers range requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeMode {
    /// 206 with the requested bytes and a `Content-Range` header
    Honor,
    /// 200 with the whole file
    Ignore,
    /// 416 for every request
    Refuse,
}

struct RangeResponder {
    data: Arc<Vec<u8>>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.data.len();
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);
        match range {
            Some((start, end)) if start < total && start <= end => {
                let end = end.min(total - 1);
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
                    .set_body_bytes(self.data[start..=end].to_vec())
            }
            _ => unsatisfiable(total),
        }
    }
}

/// `bytes=start-end`
fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn unsatisfiable(total: usize) -> ResponseTemplate {
    ResponseTemplate::new(416).insert_header("Content-Range", format!("bytes */{}", total))
}

/// A wiremock server serving one file at `url`
///
/// The server runs on its own thread; the runtime only drives setup and
/// request inspection, so blocking clients can be used from the test thread.
pub struct RangeServer {
    pub url: String,
    server: MockServer,
    runtime: Runtime,
}

impl RangeServer {
    /// Requests received so far
    pub fn request_count(&self) -> usize {
        self.runtime
            .block_on(self.server.received_requests())
            .map_or(0, |requests| requests.len())
    }
}

pub fn serve(data: Vec<u8>, mode: RangeMode) -> RangeServer {
    let runtime = Runtime::new().unwrap();
    let total = data.len();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        let mock = Mock::given(method("GET")).and(path("/sample.hic"));
        match mode {
            RangeMode::Honor => mock.respond_with(RangeResponder { data: Arc::new(data) }),
            RangeMode::Ignore => mock.respond_with(ResponseTemplate::new(200).set_body_bytes(data)),
            RangeMode::Refuse => mock.respond_with(unsatisfiable(total)),
        }
        .mount(&server)
        .await;
        server
    });

    RangeServer {
        url: format!("{}/sample.hic", server.uri()),
        server,
        runtime,
    }
}
