use std::time::Instant;

use log::info;

/// Periodic progress reporting over a known number of blocks.
pub(crate) struct Progress {
    total: usize,
    done: usize,
    every: usize,
    started: Instant,
}

impl Progress {
    /// Report every `interval` blocks, or every 1% of `total` when `None`.
    pub(crate) fn new(total: usize, interval: Option<usize>) -> Self {
        let every = interval.unwrap_or(total / 100).max(1);
        info!("reading {} compressed blocks", total);
        Self {
            total,
            done: 0,
            every,
            started: Instant::now(),
        }
    }

    /// Count one processed block, decompressed or skipped.
    pub(crate) fn advance(&mut self) {
        self.done += 1;
        if self.done % self.every != 0 && self.done != self.total {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "block {}/{} ({:.1}%), {:.1} blocks/s",
            self.done,
            self.total,
            self.done as f64 * 100.0 / self.total.max(1) as f64,
            rate
        );
    }

    #[cfg(test)]
    fn done(&self) -> usize {
        self.done
    }
}
