//! # Record Pipeline
//!
//! A single bounded FIFO carrying output records from the ingest task to
//! the publish task. The capacity is fixed at startup; a full queue blocks
//! the ingest side (backpressure), an empty one blocks the publish side.
//! Strict FIFO order preserves per-telegram arrival order across channel
//! splits and across telegrams.

use log::debug;
use tokio::sync::mpsc;

use crate::p1::telegram::OutputRecord;

/// Creates the record queue with the given capacity.
pub fn bounded(capacity: usize) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RecordSender { tx }, RecordReceiver { rx })
}

/// Ingest-side handle of the record queue.
#[derive(Clone)]
pub struct RecordSender {
    tx: mpsc::Sender<OutputRecord>,
}

impl RecordSender {
    /// Enqueues a record, waiting while the queue is full.
    ///
    /// Delivery is best effort: if the publish side is gone the record is
    /// dropped silently. The supervisor notices a dead publish task on its
    /// own.
    pub async fn send(&self, record: OutputRecord) {
        if self.tx.send(record).await.is_err() {
            debug!("Record queue closed, dropping record");
        }
    }
}

/// Publish-side handle of the record queue.
pub struct RecordReceiver {
    rx: mpsc::Receiver<OutputRecord>,
}

impl RecordReceiver {
    /// Dequeues the next record, waiting while the queue is empty.
    ///
    /// Returns `None` once the ingest side is gone and the queue drained.
    pub async fn recv(&mut self) -> Option<OutputRecord> {
        self.rx.recv().await
    }
}
