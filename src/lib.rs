//! # wikistream
//!
//! Streams the elements of a multistream compressed XML dump, such as the
//! Wikipedia `pages-articles-multistream` files, with bounded memory.
//!
//! A multistream dump is many independently compressed blocks laid end to
//! end, with a side index of block offsets. The pipeline is a chain of lazy
//! iterators, each pulling one item at a time from the one before it:
//!
//! ```text
//! index lines ─▶ IndexParser ─▶ BlockReader ─▶ ElementStream ─▶ PageExtractor
//!                (offsets)      (chunks)       (elements)       (pages)
//! ```
//!
//! Corrupt blocks and unparseable chunks are logged and skipped, so a
//! damaged archive yields fewer elements rather than an error. Only failing
//! to access the archive itself ends the stream.
//!
//! ## Features
//!
//! - bzip2 blocks (the Wikimedia format), plus gzip, zlib and raw deflate
//! - Local archives and HTTP URLs read with Range requests
//! - Chunk boundaries anywhere, even inside a tag or a UTF-8 character
//! - Namespace-aware element names in `{uri}local` form
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use wikistream::dump::{parse_index, BlockReader, StreamConfig};
//! use wikistream::xml::ElementStream;
//! use wikistream::PageExtractor;
//!
//! fn main() -> wikistream::Result<()> {
//!     let index = parse_index(BufReader::new(File::open("index.txt")?));
//!     let archive = File::open("enwiki-pages-articles-multistream.xml.bz2")?;
//!
//!     let blocks = BlockReader::new(archive, index, &StreamConfig::default())?;
//!     for page in PageExtractor::new(ElementStream::new(blocks)) {
//!         let page = page?;
//!         println!("{}: {} bytes", page.title, page.text.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod dump;
pub mod error;
pub mod io;
pub mod pages;
pub mod xml;

pub use cli::Cli;
pub use dump::{BlockCodec, BlockReader, IndexParser, IndexRecord, StreamConfig};
pub use error::{DumpError, Result};
pub use pages::{Page, PageExtractor};
pub use xml::{ElementStream, ParsedElement, ParserState};
