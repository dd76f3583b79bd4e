//! Error types shared by every stage of the pipeline.

use thiserror::Error;

/// The error type for index parsing, block reading and element parsing.
///
/// Only [`DumpError::Io`], [`DumpError::Http`], [`DumpError::Format`] and
/// [`DumpError::Namespace`] ever reach a caller. Decompression, decode and
/// structure errors are recovered inside their stage and only logged.
#[derive(Debug, Error)]
pub enum DumpError {
    /// Reading or seeking the archive or the index failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote archive could not be accessed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A line of the block index is malformed.
    #[error("Malformed index line {line}: {message}")]
    Format { line: usize, message: String },

    /// A compressed block failed to decompress.
    #[error("Decompression failed at cursor {cursor}: {source}")]
    Decompression {
        cursor: u64,
        #[source]
        source: std::io::Error,
    },

    /// A chunk is not valid UTF-8.
    #[error("Invalid UTF-8 in chunk {chunk} at byte {offset}")]
    Decode { chunk: usize, offset: usize },

    /// A chunk contains malformed or inconsistent markup.
    #[error("XML error in chunk {chunk}: {message}")]
    Structure { chunk: usize, message: String },

    /// The document is not a MediaWiki export.
    #[error("{0:?} not recognized as a MediaWiki namespace")]
    Namespace(String),
}

impl From<reqwest::Error> for DumpError {
    fn from(err: reqwest::Error) -> Self {
        DumpError::Http(err.to_string())
    }
}

/// A convenience `Result` type alias using [`DumpError`].
pub type Result<T> = std::result::Result<T, DumpError>;
