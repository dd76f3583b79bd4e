//! Block decompression.

use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::str::FromStr;

use bzip2::bufread::BzDecoder;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use log::debug;

/// Compression format of the blocks in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockCodec {
    /// bzip2, as used by Wikimedia multistream dumps.
    #[default]
    Bzip2,
    Gzip,
    Zlib,
    /// Raw DEFLATE without a container.
    Deflate,
    /// No compression.
    Stored,
}

impl BlockCodec {
    /// Decompress one block.
    ///
    /// Every member concatenated inside `payload` is decoded, so a block
    /// spanning several bzip2 or gzip streams comes back whole. Bytes after
    /// the last complete bzip2 stream that do not start another stream are
    /// ignored; a stream cut off by the end of the payload is an error.
    pub fn decompress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        // Compressed text usually expands four to eight times.
        let mut output = Vec::with_capacity(payload.len().saturating_mul(4));
        match self {
            BlockCodec::Bzip2 => decode_bzip2_streams(payload, &mut output)?,
            BlockCodec::Gzip => {
                MultiGzDecoder::new(payload).read_to_end(&mut output)?;
            }
            BlockCodec::Zlib => {
                ZlibDecoder::new(payload).read_to_end(&mut output)?;
            }
            BlockCodec::Deflate => {
                DeflateDecoder::new(payload).read_to_end(&mut output)?;
            }
            BlockCodec::Stored => output.extend_from_slice(payload),
        }
        Ok(output)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockCodec::Bzip2 => "bzip2",
            BlockCodec::Gzip => "gzip",
            BlockCodec::Zlib => "zlib",
            BlockCodec::Deflate => "deflate",
            BlockCodec::Stored => "stored",
        }
    }
}

/// Decode the bzip2 streams of `payload` one after another into `output`.
fn decode_bzip2_streams(mut payload: &[u8], output: &mut Vec<u8>) -> io::Result<()> {
    let mut streams = 0usize;
    while !payload.is_empty() {
        let start = output.len();
        let mut decoder = BzDecoder::new(payload);
        match decoder.read_to_end(output) {
            Ok(_) => {
                payload = decoder.into_inner();
                streams += 1;
            }
            Err(e) if streams > 0 && e.kind() != ErrorKind::UnexpectedEof => {
                debug!(
                    "ignoring {} trailing bytes after {} bzip2 streams: {}",
                    payload.len(),
                    streams,
                    e
                );
                output.truncate(start);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl fmt::Display for BlockCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlockCodec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bzip2" | "bz2" => Ok(BlockCodec::Bzip2),
            "gzip" | "gz" => Ok(BlockCodec::Gzip),
            "zlib" => Ok(BlockCodec::Zlib),
            "deflate" => Ok(BlockCodec::Deflate),
            "stored" | "none" => Ok(BlockCodec::Stored),
            other => Err(format!("unknown block codec: {other}")),
        }
    }
}
