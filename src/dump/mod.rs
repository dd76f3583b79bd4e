//! Multistream archive access.
//!
//! A multistream dump is a concatenation of independently compressed
//! blocks. A side index records where each block starts, which allows any
//! block to be decompressed without touching the ones before it.
//!
//! ## Architecture
//!
//! - [`index`]: turns index lines into [`IndexRecord`]s, one per block
//! - [`blocks`]: seeks to each record and decompresses it with a [`BlockCodec`]
//!
//! Both stages are lazy iterators. The only exception is progress
//! reporting, which needs the block count and therefore drains the index
//! before the first block is read.

mod blocks;
mod codec;
mod index;
mod progress;

pub use blocks::BlockReader;
pub use codec::BlockCodec;
pub use index::{parse_index, IndexParser, IndexRecord};

/// Settings for reading an archive.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Log progress while reading. Requires a finite index, which is
    /// collected before the first block is read.
    pub show_progress: bool,
    /// Compression format of the blocks.
    pub codec: BlockCodec,
    /// Blocks between progress reports; every 1% of the total when `None`.
    pub progress_interval: Option<usize>,
}
