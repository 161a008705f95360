//! # P1 Stream Parser
//!
//! This module provides the [`FrameReader`], which consumes a byte stream of
//! arbitrary fragmentation and yields complete telegrams as soon as they are
//! fully buffered. The stream carries no length field, so the reader
//! recovers framing from the markers alone: a telegram starts at a `/` and
//! ends at `CR LF ! <4 hex digits> CR LF`.
//!
//! The reader is resilient to transport corruption: bytes in front of a
//! start marker, truncated telegram starts inside a candidate, stray end
//! markers, and checksum failures are all discarded without stopping the
//! stream.

use bytes::BytesMut;
use log::{debug, warn};

use crate::constants::{P1_FRAME_END, P1_FRAME_START};
use crate::p1::registry::FieldRegistry;
use crate::p1::telegram::Telegram;

/// Length of the frame terminator `\r\n!XXXX\r\n`.
const TERMINATOR_LEN: usize = 9;

/// Extracts complete telegrams from an incrementally fed byte stream.
///
/// The reader is stateful and persistent across [`FrameReader::feed`]
/// calls; bytes of a partially received telegram stay buffered until the
/// rest arrives.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    registry: FieldRegistry,
}

impl FrameReader {
    pub fn new(registry: FieldRegistry) -> Self {
        FrameReader {
            buffer: BytesMut::new(),
            registry,
        }
    }

    /// Number of bytes currently buffered without a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `chunk` to the internal buffer and extracts every complete
    /// telegram it now contains.
    ///
    /// Candidates that fail validation are logged and dropped; the returned
    /// list holds only telegrams that passed the checksum.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Telegram> {
        self.buffer.extend_from_slice(chunk);
        debug!(
            "Buffer holds {} bytes after consuming {} input bytes",
            self.buffer.len(),
            chunk.len()
        );

        let mut found = Vec::new();

        loop {
            // A telegram starts with '/', which appears nowhere else inside
            // one. Without it the buffer cannot contain a frame start.
            let Some(start) = position(&self.buffer, P1_FRAME_START) else {
                debug!("No start character, discarding entire buffer");
                self.buffer.clear();
                break;
            };

            if start > 0 {
                debug!("Discarding {start} bytes in front of buffer");
                let _ = self.buffer.split_to(start);
            }

            let Some(end) = find_terminator(&self.buffer) else {
                // Insufficient data for a complete frame yet
                break;
            };

            let mut candidate = self.buffer.split_to(end);

            // A communication error can leave the beginnings of earlier
            // telegrams inside the slice; the real frame starts at the last
            // start marker.
            if let Some(last_start) = rposition(&candidate, P1_FRAME_START) {
                if last_start != 0 {
                    warn!(
                        "Potential incomplete data detected, discarding {last_start} bytes"
                    );
                    let _ = candidate.split_to(last_start);
                }
            }

            // More than one end marker means a stray terminator from
            // transport corruption; nothing in the slice can be trusted.
            if count(&candidate, P1_FRAME_END) > 1 {
                warn!("Stray end marker detected, dropping message");
                continue;
            }

            debug!("Found potential telegram of length {}", candidate.len());

            match Telegram::decode(&candidate, &self.registry) {
                Ok(telegram) => found.push(telegram),
                Err(err) => {
                    warn!("Could not parse message as valid telegram: {err}");
                }
            }
        }

        found
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        FrameReader::new(FieldRegistry::with_default_fields())
    }
}

fn position(buf: &[u8], byte: u8) -> Option<usize> {
    buf.iter().position(|&b| b == byte)
}

fn rposition(buf: &[u8], byte: u8) -> Option<usize> {
    buf.iter().rposition(|&b| b == byte)
}

fn count(buf: &[u8], byte: u8) -> usize {
    buf.iter().filter(|&&b| b == byte).count()
}

/// Finds the frame terminator `\r\n!XXXX\r\n` and returns the offset one
/// past its end.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    if buf.len() < TERMINATOR_LEN {
        return None;
    }

    for i in 0..=buf.len() - TERMINATOR_LEN {
        let window = &buf[i..i + TERMINATOR_LEN];
        if window[0] == b'\r'
            && window[1] == b'\n'
            && window[2] == P1_FRAME_END
            && window[3..7].iter().all(|b| b.is_ascii_hexdigit())
            && window[7] == b'\r'
            && window[8] == b'\n'
        {
            return Some(i + TERMINATOR_LEN);
        }
    }

    None
}
