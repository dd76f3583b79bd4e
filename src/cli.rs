use clap::Parser;
use log::LevelFilter;

use crate::dump::{BlockCodec, StreamConfig};

#[derive(Parser, Debug)]
#[command(name = "wikistream")]
#[command(version)]
#[command(about = "Stream pages out of multistream compressed XML dumps", long_about = None)]
#[command(after_help = "Examples:\n  \
  wikistream enwiki-pages-articles-multistream.xml.bz2 -i enwiki-pages-articles-multistream-index.txt.bz2\n  \
  wikistream --elements --limit 20 dump.xml.bz2     print the first 20 elements\n  \
  wikistream https://dumps.wikimedia.org/.../dump.xml.bz2 -i index.txt.bz2 --progress")]
pub struct Cli {
    /// Archive path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Block index file (bzip2-compressed when it ends in .bz2)
    #[arg(short = 'i', long, value_name = "INDEX")]
    pub index: Option<String>,

    /// Compression format of the archive blocks
    #[arg(short = 'c', long, value_name = "CODEC", default_value_t = BlockCodec::Bzip2)]
    pub codec: BlockCodec,

    /// Report progress (reads the whole index up front)
    #[arg(long)]
    pub progress: bool,

    /// Print every element instead of pages
    #[arg(short = 'e', long)]
    pub elements: bool,

    /// Wiki namespace of the pages to print
    #[arg(short = 'n', long, value_name = "NS", default_value = "0")]
    pub namespace: String,

    /// Stop after this many pages (or elements)
    #[arg(short = 'l', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Default log level when `RUST_LOG` is unset.
    pub fn log_level(&self) -> LevelFilter {
        match self.quiet {
            0 => LevelFilter::Info,
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            show_progress: self.progress,
            codec: self.codec,
            progress_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments() {
        let cli = Cli::parse_from([
            "wikistream",
            "dump.xml.gz",
            "-i",
            "index.txt",
            "--codec",
            "gzip",
            "--progress",
            "-qq",
        ]);
        assert_eq!(cli.archive, "dump.xml.gz");
        assert_eq!(cli.index.as_deref(), Some("index.txt"));
        assert_eq!(cli.namespace, "0");
        assert_eq!(cli.log_level(), LevelFilter::Error);

        let config = cli.stream_config();
        assert!(config.show_progress);
        assert_eq!(config.codec, BlockCodec::Gzip);
    }

    #[test]
    fn rejects_unknown_codec() {
        assert!(Cli::try_parse_from(["wikistream", "dump", "--codec", "lzma"]).is_err());
    }
}
