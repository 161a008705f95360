//! # p1mqtt-rs - A Rust Crate for DSMR P1 to MQTT Telemetry
//!
//! The p1mqtt-rs crate reads the P1 telemetry port of a DSMR smart meter —
//! the standardized serial output of Dutch/European electricity meters —
//! and republishes the measurements as JSON records on an MQTT broker, one
//! record per logical measurement channel.
//!
//! ## Features
//!
//! - Read the P1 byte stream from a serial port or a TCP bridge
//! - Recover telegram framing from an unframed, arbitrarily fragmented
//!   stream, with automatic resynchronization after corruption
//! - Validate every telegram's CRC-16 checksum before decoding
//! - Decode the full DSMR field set through an ordered tag-dispatch
//!   registry (energy, power, voltage, current, failure logs, gas readings)
//! - Derive a unified time stamp, device id and channel per telegram, and
//!   split multi-channel telegrams into per-channel records
//! - Publish records over MQTT with reconnect handling and optional rate
//!   limiting
//!
//! ## Usage
//!
//! To use the p1mqtt-rs crate in your Rust project, add the following to
//! your Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! p1mqtt-rs = "1.0.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and
//! functions:
//!
//! ```rust
//! use p1mqtt_rs::{FieldRegistry, FrameReader, Telegram, P1Error};
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod mqtt;
pub mod p1;
pub mod pipeline;
pub mod transport;

pub use crate::error::P1Error;
pub use crate::logging::{init_logger, log_info};

// Core P1 types
pub use config::{GatewayConfig, MqttConfig, SourceConfig, TimestampAuthority, TimestampUnit};
pub use p1::{Field, FieldKind, FieldRegistry, FrameReader, OutputRecord, RecordValue, Telegram};
pub use transport::{DsmrVersion, P1Source, SerialSource, TcpSource};
