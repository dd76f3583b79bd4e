//! Archive sources.
//!
//! The block reader works over anything that is [`Read`] + [`Seek`]. Local
//! archives are plain files; remote ones go through [`HttpRangeReader`],
//! which turns every read into an HTTP Range request so that only the
//! blocks actually visited are downloaded.

mod http;

pub use http::HttpRangeReader;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::error::Result;

/// A seekable byte source holding a multistream archive.
pub trait Archive: Read + Seek {}

impl<T: Read + Seek> Archive for T {}

/// Whether `location` names a remote archive.
pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// An opened archive together with its download counter.
pub struct OpenedArchive {
    pub reader: Box<dyn Archive>,
    /// Bytes received over the network; `None` for local files.
    pub transferred: Option<Arc<AtomicU64>>,
}

/// Open a local path or an HTTP(S) URL as an archive.
pub fn open_archive(location: &str) -> Result<OpenedArchive> {
    if is_http_url(location) {
        let reader = HttpRangeReader::new(location.to_string())?;
        let transferred = Some(reader.transferred_bytes());
        Ok(OpenedArchive {
            reader: Box::new(reader),
            transferred,
        })
    } else {
        Ok(OpenedArchive {
            reader: Box::new(File::open(Path::new(location))?),
            transferred: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_urls() {
        assert!(is_http_url("https://dumps.wikimedia.org/enwiki/latest/x.bz2"));
        assert!(is_http_url("http://localhost/x"));
        assert!(!is_http_url("/data/enwiki-multistream.xml.bz2"));
    }

    #[test]
    fn missing_local_archive_is_an_error() {
        assert!(open_archive("/nonexistent/wikistream/archive.bz2").is_err());
    }

    #[test]
    fn local_archive_has_no_transfer_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.bz2");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut opened = open_archive(path.to_str().unwrap()).unwrap();
        assert!(opened.transferred.is_none());

        let mut tail = String::new();
        opened.reader.seek(std::io::SeekFrom::Start(6)).unwrap();
        opened.reader.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "6789");
    }
}
