use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;

use crate::error::{DumpError, Result};

/// Seekable reader over a remote file, fetched with HTTP Range requests.
///
/// Seeking only moves a local cursor. Each `read` call becomes one ranged
/// GET for exactly the requested window, so callers should read whole
/// blocks at a time rather than through a small buffer.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    position: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader.
    ///
    /// Sends a HEAD request to verify Range support and learn the file size.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let resp = client.head(&url).send()?;
        if !resp.status().is_success() {
            return Err(DumpError::Http(format!(
                "HEAD {url} failed with status: {}",
                resp.status()
            )));
        }

        let accept_ranges = resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !accept_ranges.contains("bytes") {
            return Err(DumpError::Http(
                "remote server does not support Range requests".to_string(),
            ));
        }

        let size = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                DumpError::Http("remote server did not return Content-Length".to_string())
            })?;

        Ok(Self {
            client,
            url,
            size,
            position: 0,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Total size of the remote file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Shared counter of bytes received so far. It stays valid after the
    /// reader has been moved into a pipeline.
    pub fn transferred_bytes(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.transferred_bytes)
    }

    /// Fetch `buf.len()` bytes starting at `offset`, retrying transient
    /// connection failures.
    fn fetch(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let expected_size = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            match self.client.get(&self.url).header(RANGE, &range).send() {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(DumpError::Http(format!(
                            "GET {} ({range}) failed with status: {}",
                            self.url,
                            resp.status()
                        )));
                    }

                    let bytes = resp.bytes()?;
                    if bytes.is_empty() {
                        break;
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(DumpError::Http(format!("max retries exceeded: {e}")));
                    }
                    warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }

        let n = self
            .fetch(self.position, buf)
            .map_err(|e| match e {
                DumpError::Io(e) => e,
                other => io::Error::other(other),
            })?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        };
        self.position = target;
        Ok(target)
    }
}
