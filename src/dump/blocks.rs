//! Reading and decompressing indexed blocks from a multistream archive.

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::vec;

use log::{debug, trace, warn};

use super::codec::BlockCodec;
use super::index::IndexRecord;
use super::progress::Progress;
use super::StreamConfig;
use crate::error::{DumpError, Result};

/// Where the block locations come from.
enum Records<I> {
    /// Pulled from the index one at a time.
    Lazy(I),
    /// Collected up front so that the total is known.
    Eager(vec::IntoIter<IndexRecord>),
}

impl<I> Iterator for Records<I>
where
    I: Iterator<Item = Result<IndexRecord>>,
{
    type Item = Result<IndexRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Records::Lazy(records) => records.next(),
            Records::Eager(records) => records.next().map(Ok),
        }
    }
}

/// Iterator over the decompressed blocks of an archive, in index order.
///
/// Blocks that fail to decompress are logged and skipped. A failure to seek
/// or read the archive itself is yielded once and ends the iteration.
///
/// ## Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use wikistream::dump::{parse_index, BlockReader, StreamConfig};
///
/// # fn main() -> wikistream::Result<()> {
/// let index = parse_index(BufReader::new(File::open("index.txt")?));
/// let archive = File::open("pages-articles-multistream.xml.bz2")?;
/// for block in BlockReader::new(archive, index, &StreamConfig::default())? {
///     println!("{} bytes", block?.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct BlockReader<R, I> {
    archive: R,
    records: Records<I>,
    codec: BlockCodec,
    progress: Option<Progress>,
    decompressed: usize,
    skipped: usize,
    failed: bool,
}

impl<R, I> BlockReader<R, I>
where
    R: Read + Seek,
    I: Iterator<Item = Result<IndexRecord>>,
{
    /// Create a reader over `archive` for the blocks listed by `index`.
    ///
    /// With `show_progress` set the index is drained here, so it must be
    /// finite; a malformed index line then fails construction.
    pub fn new<T>(archive: R, index: T, config: &StreamConfig) -> Result<Self>
    where
        T: IntoIterator<IntoIter = I>,
    {
        let (records, progress) = if config.show_progress {
            debug!("parsing index");
            let records = index.into_iter().collect::<Result<Vec<_>>>()?;
            let progress = Progress::new(records.len(), config.progress_interval);
            (Records::Eager(records.into_iter()), Some(progress))
        } else {
            (Records::Lazy(index.into_iter()), None)
        };

        Ok(Self {
            archive,
            records,
            codec: config.codec,
            progress,
            decompressed: 0,
            skipped: 0,
            failed: false,
        })
    }

    /// Number of blocks yielded so far.
    pub fn decompressed(&self) -> usize {
        self.decompressed
    }

    /// Number of blocks skipped because they failed to decompress.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Read the raw bytes of one block.
    ///
    /// The length is clamped to what the archive actually holds past the
    /// cursor, so an index that overstates a block never allocates more
    /// than the archive size. A block cut short by the end of the archive
    /// is returned as far as it goes and left for the codec to judge.
    fn read_block(&mut self, record: IndexRecord) -> Result<Vec<u8>> {
        let available = self
            .archive
            .seek(SeekFrom::End(0))?
            .saturating_sub(record.cursor);
        let len = match record.size {
            Some(size) if size > available => {
                debug!(
                    "block at cursor {} overruns the archive: {} bytes indexed, {} available",
                    record.cursor, size, available
                );
                available
            }
            Some(size) => size,
            None => available,
        };
        let Ok(len) = usize::try_from(len) else {
            warn!(
                "block at cursor {} is too large to hold in memory ({} bytes), skipping block",
                record.cursor, len
            );
            return Ok(Vec::new());
        };
        self.archive.seek(SeekFrom::Start(record.cursor))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < buf.len() {
            match self.archive.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < buf.len() {
            debug!(
                "short read at cursor {}: expected {} bytes, got {}",
                record.cursor,
                buf.len(),
                filled
            );
            buf.truncate(filled);
        }
        Ok(buf)
    }
}

impl<R, I> Iterator for BlockReader<R, I>
where
    R: Read + Seek,
    I: Iterator<Item = Result<IndexRecord>>,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };

            let raw = match self.read_block(record) {
                Ok(raw) => raw,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };

            let result = if raw.is_empty() {
                None
            } else {
                Some(self.codec.decompress(&raw))
            };
            if let Some(progress) = self.progress.as_mut() {
                progress.advance();
            }

            match result {
                None => debug!("empty block at cursor {}", record.cursor),
                Some(Ok(data)) => {
                    trace!(
                        "block at cursor {}: {} -> {} bytes",
                        record.cursor,
                        raw.len(),
                        data.len()
                    );
                    self.decompressed += 1;
                    return Some(Ok(data));
                }
                Some(Err(source)) => {
                    let err = DumpError::Decompression {
                        cursor: record.cursor,
                        source,
                    };
                    warn!("{}, skipping block", err);
                    self.skipped += 1;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Build an archive from `blocks`, returning it with its exact index.
    fn archive(blocks: &[&[u8]]) -> (Vec<u8>, Vec<IndexRecord>) {
        let mut out = Vec::new();
        let mut index = Vec::new();
        for block in blocks {
            let data = compress(block);
            index.push(IndexRecord::new(out.len() as u64, data.len() as u64));
            out.extend(data);
        }
        (out, index)
    }

    fn read_all(archive: Vec<u8>, index: Vec<IndexRecord>, show_progress: bool) -> Vec<Vec<u8>> {
        let config = StreamConfig {
            show_progress,
            ..StreamConfig::default()
        };
        BlockReader::new(Cursor::new(archive), index.into_iter().map(Ok), &config)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn reproduces_blocks_in_order() {
        let blocks: [&[u8]; 3] = [b"block1 content", b"block2 ...", b"block3"];
        let (data, index) = archive(&blocks);

        for show_progress in [false, true] {
            let got = read_all(data.clone(), index.clone(), show_progress);
            assert_eq!(got, blocks.iter().map(|b| b.to_vec()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn sentinel_reads_to_end_of_archive() {
        let (data, index) = archive(&[b"head", b"tail"]);
        let index = vec![index[0], IndexRecord::to_end(index[1].cursor)];
        assert_eq!(read_all(data, index, false), vec![b"head".to_vec(), b"tail".to_vec()]);
    }

    #[test]
    fn sentinel_block_may_hold_several_streams() {
        let (data, _) = archive(&[b"<a>", b"</a>"]);
        let got = read_all(data, vec![IndexRecord::to_end(0)], false);
        assert_eq!(got, vec![b"<a></a>".to_vec()]);
    }

    #[test]
    fn corrupt_block_is_skipped() {
        let (mut data, index) = archive(&[b"one", b"two", b"three"]);
        let middle = index[1];
        for byte in &mut data[middle.cursor as usize..(middle.cursor + middle.size.unwrap()) as usize] {
            *byte = 0x55;
        }

        let config = StreamConfig::default();
        let mut reader =
            BlockReader::new(Cursor::new(data), index.into_iter().map(Ok), &config).unwrap();
        let got = reader.by_ref().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(got, vec![b"one".to_vec(), b"three".to_vec()]);
        assert_eq!(reader.decompressed(), 2);
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn truncated_final_block_is_skipped() {
        let (data, index) = archive(&[b"kept", b"lost to truncation"]);
        let cut = data.len() - 10;
        let got = read_all(data[..cut].to_vec(), index, false);
        assert_eq!(got, vec![b"kept".to_vec()]);
    }

    #[test]
    fn oversized_record_is_clamped_to_archive() {
        let (data, _) = archive(&[b"<page>x</page>"]);
        let index = vec![IndexRecord::new(0, 1 << 46), IndexRecord::to_end(1 << 46)];
        assert_eq!(read_all(data, index, false), vec![b"<page>x</page>".to_vec()]);
    }

    #[test]
    fn record_running_past_truncated_archive_is_skipped() {
        let (data, index) = archive(&[b"first", b"second block, cut off"]);
        let cut = index[1].cursor as usize + 8;
        let index = vec![index[0], IndexRecord::new(index[1].cursor, 1 << 20)];
        assert_eq!(read_all(data[..cut].to_vec(), index, false), vec![b"first".to_vec()]);
    }

    #[test]
    fn trailing_bytes_inside_block_are_ignored() {
        let (mut data, _) = archive(&[b"<page>kept</page>"]);
        data.extend_from_slice(b"\0\0garbage");
        let got = read_all(data, vec![IndexRecord::to_end(0)], false);
        assert_eq!(got, vec![b"<page>kept</page>".to_vec()]);
    }

    #[test]
    fn index_errors_pass_through_lazily() {
        let (data, index) = archive(&[b"only"]);
        let records = vec![
            Err(DumpError::Format {
                line: 1,
                message: "bad".to_string(),
            }),
            Ok(index[0]),
        ];
        let mut reader =
            BlockReader::new(Cursor::new(data), records, &StreamConfig::default()).unwrap();
        assert!(matches!(reader.next(), Some(Err(DumpError::Format { .. }))));
        assert_eq!(reader.next().unwrap().unwrap(), b"only");
        assert!(reader.next().is_none());
    }

    #[test]
    fn index_errors_fail_eager_construction() {
        let records = vec![Err(DumpError::Format {
            line: 3,
            message: "bad".to_string(),
        })];
        let config = StreamConfig {
            show_progress: true,
            ..StreamConfig::default()
        };
        assert!(BlockReader::new(Cursor::new(Vec::new()), records, &config).is_err());
    }
}
