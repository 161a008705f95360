//! # P1 Ingestion Driver
//!
//! The ingest task reads the byte source, feeds the [`FrameReader`], splits
//! every telegram by channel, and enqueues the resulting records.
//!
//! Parsing is cheapest when one read returns exactly one telegram, leaving
//! nothing in the reader's buffer. Telegram length is not announced on the
//! wire, but it is nearly constant between consecutive readings: most
//! fields have a fixed width and the variable ones change rarely. The
//! [`ReadPlanner`] therefore assumes the next telegram is as long as the
//! last one and sizes reads accordingly. When the assumption breaks, one of
//! two things happens:
//!
//! - The new telegram is shorter. The reader produces a telegram and keeps
//!   the surplus, which is the start of the next one; the next read is
//!   shrunk to fetch just the remainder. Once a read again yields exactly
//!   one telegram with an empty buffer, the stream is back in sync.
//! - The new telegram is longer. The reader produces nothing; the read
//!   size drops to the minimum and small reads continue until the first
//!   case is reached.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use log::{debug, info};

use crate::constants::{SOURCE_INITIAL_READ_SIZE, SOURCE_MIN_READ_SIZE};
use crate::error::P1Error;
use crate::p1::parser::FrameReader;
use crate::pipeline::RecordSender;
use crate::transport::P1Source;

/// Adaptive read sizing for the ingest loop.
#[derive(Debug)]
pub struct ReadPlanner {
    /// Byte length of the last telegram parsed, and the best guess for the
    /// next one
    telegram_size: usize,
    /// Bytes to request on the next read; tracks `telegram_size` while in
    /// sync, deviates while resynchronizing
    read_size: usize,
    /// Whether one read currently yields exactly one telegram
    sync: bool,
}

impl ReadPlanner {
    pub fn new() -> Self {
        ReadPlanner {
            telegram_size: 0,
            read_size: SOURCE_INITIAL_READ_SIZE,
            sync: false,
        }
    }

    /// Number of bytes to request from the source next. Never below the
    /// minimum, so forward progress is guaranteed even while resyncing.
    pub fn next_read_size(&self) -> usize {
        self.read_size.max(SOURCE_MIN_READ_SIZE)
    }

    /// Whether reads are currently aligned to telegram boundaries.
    pub fn is_synced(&self) -> bool {
        self.sync
    }

    /// Records the outcome of one feed: the number of telegrams produced,
    /// the byte length of the most recent one, and the bytes left in the
    /// reader's buffer.
    pub fn observe(&mut self, telegrams: usize, last_len: usize, residual: usize) {
        if telegrams == 0 {
            info!(
                "Incomplete telegram read (size was {}), sync lost",
                self.telegram_size
            );
            self.read_size = 0;
            self.sync = false;
            return;
        }

        if last_len != self.telegram_size {
            info!(
                "Telegram size changed {} -> {}, sync lost",
                self.telegram_size, last_len
            );
            self.telegram_size = last_len;
            self.sync = false;
        }

        if !self.sync && residual == 0 {
            info!("Sync reestablished, telegram size {}", self.telegram_size);
            self.sync = true;
        }

        self.read_size = self.telegram_size.saturating_sub(residual);
    }
}

impl Default for ReadPlanner {
    fn default() -> Self {
        ReadPlanner::new()
    }
}

/// Main function of the ingest task.
///
/// Reads from `source` forever, pushing one record per telegram channel
/// into the queue. Returns an error only on fatal conditions: a short read
/// (dead or misconfigured transport) or a dump file failure.
pub async fn ingest_main(
    mut source: Box<dyn P1Source>,
    mut reader: FrameReader,
    sender: RecordSender,
    dump_path: Option<PathBuf>,
) -> Result<(), P1Error> {
    info!("P1 ingest task starting");

    let mut dump = match &dump_path {
        Some(path) => {
            info!("Writing source data to {}", path.display());
            Some(File::create(path)?)
        }
        None => None,
    };

    let mut planner = ReadPlanner::new();

    loop {
        let to_read = planner.next_read_size();
        debug!(
            "Reading from source, sync={}, to_read={}",
            planner.is_synced(),
            to_read
        );

        let data = source.read(to_read).await?;
        if data.len() != to_read {
            // The source could not fill the read within its timeout; the
            // connection parameters can no longer be trusted
            return Err(P1Error::SourceTimeout {
                requested: to_read,
                received: data.len(),
            });
        }

        if let Some(file) = dump.as_mut() {
            file.write_all(&data)?;
            file.flush()?;
        }

        let telegrams = reader.feed(&data);
        debug!("Received {} telegrams", telegrams.len());

        let last_len = telegrams.last().map(|t| t.raw_len()).unwrap_or_default();
        planner.observe(telegrams.len(), last_len, reader.buffered());

        for telegram in &telegrams {
            for sub in telegram.split_by_channel() {
                sender.send(sub.to_record()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_read_size() {
        let planner = ReadPlanner::new();
        assert_eq!(planner.next_read_size(), SOURCE_INITIAL_READ_SIZE);
        assert!(!planner.is_synced());
    }

    #[test]
    fn test_steady_state_converges_to_one_read_per_telegram() {
        let mut planner = ReadPlanner::new();

        // First oversized read catches one telegram exactly
        planner.observe(1, 800, 0);
        assert!(planner.is_synced());
        assert_eq!(planner.next_read_size(), 800);

        planner.observe(1, 800, 0);
        assert!(planner.is_synced());
        assert_eq!(planner.next_read_size(), 800);
    }

    #[test]
    fn test_empty_feed_drops_to_minimum() {
        let mut planner = ReadPlanner::new();
        planner.observe(1, 800, 0);

        planner.observe(0, 0, 500);
        assert!(!planner.is_synced());
        assert_eq!(planner.next_read_size(), SOURCE_MIN_READ_SIZE);
    }

    #[test]
    fn test_shorter_telegram_reads_remainder() {
        let mut planner = ReadPlanner::new();
        planner.observe(1, 800, 0);

        // Layout shrank: telegram of 700 bytes, 100 bytes of the next one
        // already buffered
        planner.observe(1, 700, 100);
        assert!(!planner.is_synced());
        assert_eq!(planner.next_read_size(), 600);

        // The remainder read completes the next telegram exactly
        planner.observe(1, 700, 0);
        assert!(planner.is_synced());
        assert_eq!(planner.next_read_size(), 700);
    }

    #[test]
    fn test_overread_clamps_to_minimum() {
        let mut planner = ReadPlanner::new();
        planner.observe(1, 100, 0);

        // Residual larger than the telegram size saturates at zero and the
        // floor takes over
        planner.observe(1, 100, 150);
        assert_eq!(planner.next_read_size(), SOURCE_MIN_READ_SIZE);
    }
}
