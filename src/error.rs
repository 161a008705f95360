//! # P1 Error Handling
//!
//! This module defines the P1Error enum, which represents the different error
//! types that can occur in the p1mqtt-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the P1 gateway.
#[derive(Debug, Error)]
pub enum P1Error {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates an error on the TCP byte source.
    #[error("TCP source error: {0}")]
    TcpSourceError(String),

    /// The byte source delivered fewer bytes than requested, which means the
    /// transport timed out or closed. Connection parameters can no longer be
    /// trusted, so this is not retried.
    #[error("Short read from source: requested {requested}, received {received}")]
    SourceTimeout { requested: usize, received: usize },

    /// Indicates a telegram checksum mismatch.
    #[error("Invalid checksum: expected {expected:04x}, calculated {calculated:04x}")]
    ChecksumMismatch { expected: u16, calculated: u16 },

    /// The four checksum characters of a telegram were not valid hex digits.
    #[error("Malformed checksum field: {0}")]
    MalformedChecksum(String),

    /// A candidate frame was too short to carry a checksum trailer.
    #[error("Truncated frame of {0} bytes")]
    TruncatedFrame(usize),

    /// Telegram bytes were not valid ASCII text.
    #[error("Telegram is not valid ASCII")]
    NonAsciiTelegram,

    /// A data line did not follow the `reference(value)...` grammar.
    #[error("Malformed line: {0}")]
    MalformedLine(String),

    /// An OBIS reference did not follow the `medium-channel:a.b.c` grammar.
    #[error("Malformed OBIS reference: {0}")]
    MalformedReference(String),

    /// No registered pattern matched the line's OBIS reference.
    #[error("Unknown OBIS reference: {0}")]
    UnknownReference(String),

    /// A pattern was registered twice.
    #[error("Pattern {0} already registered")]
    DuplicateRegistration(String),

    /// Indicates a value that could not be decoded as a P1 TST time stamp.
    #[error("Invalid P1 timestamp: {0}")]
    InvalidTimestamp(String),

    /// Indicates a malformed numeric or unit-float value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The power failure log did not carry the advertised number of entries.
    #[error("Inconsistent failure log: {stated} entries stated, {found} values found")]
    InconsistentLog { stated: usize, found: usize },

    /// Indicates an error raised by the MQTT client.
    #[error("MQTT client error: {0}")]
    MqttClientError(String),

    /// The record queue was closed on the other side.
    #[error("Record queue closed")]
    QueueClosed,

    /// Indicates a filesystem error, e.g. on the source dump file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
