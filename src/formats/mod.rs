//! `.hic` file structures
//!
//! Header, footer, matrix zoom directory, contact blocks and normalization
//! vectors. Each parser works on a byte slice; the `read_*` functions fetch
//! those slices from a [`ByteSource`](crate::core::ByteSource).

pub mod block;
pub mod footer;
pub mod header;
pub mod matrix;
pub mod norm;

pub use block::{decode_block, inflate_block, read_block, read_block_record_count, BlockLayout, BlockOrigin};
pub use footer::{pair_key, parse_footer, read_footer, Footer};
pub use header::{read_header, read_header_metadata, HicHeader, DEFAULT_HEADER_WINDOW, MAGIC, MAX_VERSION, MIN_VERSION};
pub use matrix::{read_matrix, MatrixZoomData};
pub use norm::{parse_norm_vector, read_norm_vector};
