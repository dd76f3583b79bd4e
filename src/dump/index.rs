//! Multistream index parsing.
//!
//! The index side file lists one `<offset>:<page id>:<title>` line per page.
//! Consecutive pages share a compressed stream, so the same offset repeats
//! until the next stream starts. Collapsing the repeats yields one
//! [`IndexRecord`] per compressed block.

use std::io::{self, BufRead};

use crate::error::{DumpError, Result};

/// Location of one compressed block in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset of the block.
    pub cursor: u64,
    /// Length of the block, or `None` to read until the end of the archive.
    pub size: Option<u64>,
}

impl IndexRecord {
    pub fn new(cursor: u64, size: u64) -> Self {
        Self {
            cursor,
            size: Some(size),
        }
    }

    /// The sentinel record covering everything from `cursor` onwards.
    pub fn to_end(cursor: u64) -> Self {
        Self { cursor, size: None }
    }

    pub fn is_sentinel(&self) -> bool {
        self.size.is_none()
    }
}

/// Lazily turns index lines into [`IndexRecord`]s.
///
/// Lines must be in ascending offset order. The final item is always the
/// sentinel record for the last block, even when the input is empty.
pub struct IndexParser<I> {
    lines: I,
    last_cursor: u64,
    line_no: usize,
    finished: bool,
}

impl<I, L> IndexParser<I>
where
    I: Iterator<Item = io::Result<L>>,
    L: AsRef<[u8]>,
{
    pub fn new<T>(lines: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            lines: lines.into_iter(),
            last_cursor: 0,
            line_no: 0,
            finished: false,
        }
    }

    /// Parse the offset token of a single line.
    ///
    /// Returns `Ok(None)` for blank lines.
    fn parse_line(&self, line: &[u8]) -> Result<Option<u64>> {
        let text = std::str::from_utf8(line).map_err(|e| DumpError::Format {
            line: self.line_no,
            message: format!("not valid UTF-8: {e}"),
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let token = text.split(':').next().unwrap_or(text).trim();
        token.parse::<u64>().map(Some).map_err(|_| DumpError::Format {
            line: self.line_no,
            message: format!("{token:?} is not a byte offset"),
        })
    }
}

impl<I, L> Iterator for IndexParser<I>
where
    I: Iterator<Item = io::Result<L>>,
    L: AsRef<[u8]>,
{
    type Item = Result<IndexRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    self.finished = true;
                    return Some(Ok(IndexRecord::to_end(self.last_cursor)));
                }
            };
            self.line_no += 1;

            let cursor = match self.parse_line(line.as_ref()) {
                Ok(Some(cursor)) => cursor,
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };

            if cursor == self.last_cursor {
                continue;
            }

            let Some(size) = cursor.checked_sub(self.last_cursor) else {
                return Some(Err(DumpError::Format {
                    line: self.line_no,
                    message: format!(
                        "offset {cursor} precedes previous offset {}",
                        self.last_cursor
                    ),
                }));
            };

            let record = IndexRecord::new(self.last_cursor, size);
            self.last_cursor = cursor;
            return Some(Ok(record));
        }
    }
}

/// Parse an index from any buffered reader, one record per compressed block.
pub fn parse_index<R: BufRead>(reader: R) -> IndexParser<io::Split<R>> {
    IndexParser::new(reader.split(b'\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(lines: &[&str]) -> Vec<IndexRecord> {
        IndexParser::new(lines.iter().map(Ok::<_, io::Error>))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn collapses_repeated_offsets() {
        let got = records(&["5:x:y\n", "5:\n", "\t \n", "10:\n", "11:\n"]);
        assert_eq!(
            got,
            vec![
                IndexRecord::new(0, 5),
                IndexRecord::new(5, 5),
                IndexRecord::new(10, 1),
                IndexRecord::to_end(11),
            ]
        );
    }

    #[test]
    fn empty_index_yields_single_sentinel() {
        assert_eq!(records(&[]), vec![IndexRecord::to_end(0)]);
        assert_eq!(records(&["", "  \n"]), vec![IndexRecord::to_end(0)]);
    }

    #[test]
    fn leading_zero_offset_is_not_a_block() {
        let got = records(&["0:1:Main", "0:2:Other", "600:3:Next"]);
        assert_eq!(
            got,
            vec![IndexRecord::new(0, 600), IndexRecord::to_end(600)]
        );
    }

    #[test]
    fn reads_wikipedia_style_lines() {
        let data = b"597:10:AccessibleComputing\n597:12:Anarchism\n\
                     682113:13:AfghanistanHistory\n";
        let got = parse_index(&data[..]).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            got,
            vec![
                IndexRecord::new(0, 597),
                IndexRecord::new(597, 681516),
                IndexRecord::to_end(682113),
            ]
        );
    }

    #[test]
    fn non_integer_offset_is_a_format_error() {
        let mut parser = IndexParser::new(["5:a", "x5:b"].iter().map(Ok::<_, io::Error>));
        assert_eq!(parser.next().unwrap().unwrap(), IndexRecord::new(0, 5));
        match parser.next() {
            Some(Err(DumpError::Format { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected format error, got {other:?}"),
        }
        assert_eq!(parser.next().unwrap().unwrap(), IndexRecord::to_end(5));
        assert!(parser.next().is_none());
    }

    #[test]
    fn descending_offset_is_a_format_error() {
        let mut parser = IndexParser::new(["10:a", "4:b"].iter().map(Ok::<_, io::Error>));
        assert!(parser.next().unwrap().is_ok());
        assert!(matches!(parser.next(), Some(Err(DumpError::Format { .. }))));
    }
}
