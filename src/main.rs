//! Main entry point for the wikistream CLI application.
//!
//! Wires the index parser, block reader, element parser and page extractor
//! together and prints what comes out of the end of the pipeline.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use clap::Parser;
use log::info;

use wikistream::dump::{parse_index, BlockReader, IndexRecord};
use wikistream::io::{open_archive, OpenedArchive};
use wikistream::xml::ElementStream;
use wikistream::{Cli, PageExtractor};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let OpenedArchive {
        reader: archive,
        transferred,
    } = open_archive(&cli.archive).with_context(|| format!("Failed to open {}", cli.archive))?;
    let records = index_records(cli.index.as_deref())?;
    let blocks = BlockReader::new(archive, records, &cli.stream_config())
        .context("Failed to read the block index")?;
    let elements = ElementStream::new(blocks);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let limit = cli.limit.unwrap_or(usize::MAX);

    if cli.elements {
        for element in elements.take(limit) {
            let element = element?;
            match element.text {
                Some(text) => writeln!(out, "{}\t{}", element.tag, text.len())?,
                None => writeln!(out, "{}", element.tag)?,
            }
        }
    } else {
        let mut count = 0usize;
        for page in PageExtractor::with_namespace(elements, &cli.namespace).take(limit) {
            let page = page?;
            let marker = if page.is_redirect { " (redirect)" } else { "" };
            writeln!(out, "{}\t{} bytes{}", page.title, page.text.len(), marker)?;
            count += 1;
        }
        if !cli.is_quiet() {
            info!("{} pages in namespace {}", count, cli.namespace);
        }
    }
    out.flush()?;

    // Display network transfer statistics for HTTP sources
    if let Some(transferred) = transferred {
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(transferred.load(Ordering::Relaxed))
            );
        }
    }

    Ok(())
}

/// Block records from the index file, or a single whole-archive block
/// when there is none.
fn index_records(
    path: Option<&str>,
) -> Result<Box<dyn Iterator<Item = wikistream::Result<IndexRecord>>>> {
    let Some(path) = path else {
        return Ok(Box::new(std::iter::once(Ok(IndexRecord::to_end(0)))));
    };

    let file = File::open(path).with_context(|| format!("Failed to open index {path}"))?;
    let reader: Box<dyn BufRead> = if path.ends_with(".bz2") {
        Box::new(BufReader::new(MultiBzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Box::new(parse_index(reader)))
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
