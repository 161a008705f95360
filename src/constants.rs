//! P1 Protocol Constants
//!
//! This module defines constants used in the DSMR P1 protocol implementation,
//! based on the Dutch Smart Meter Requirements (DSMR) P1 companion standard.

/// Telegram start marker; appears nowhere else inside a telegram
pub const P1_FRAME_START: u8 = b'/';

/// Telegram end marker, followed by the four checksum hex digits
pub const P1_FRAME_END: u8 = b'!';

/// CRC-16/IBM polynomial (reflected) used for the telegram checksum
pub const P1_CRC_POLYNOMIAL: u16 = 0xA001;

/// CRC-16/IBM initial value
pub const P1_CRC_INIT: u16 = 0x0000;

/// Number of trailing bytes not covered by the checksum:
/// four hex digits plus CR LF
pub const P1_CHECKSUM_TRAILER_LEN: usize = 6;

/// Channel that carries only the protocol version field, never measurement
/// data; dropped from every channel split
pub const P1_VERSION_CHANNEL: u8 = 3;

// ----------------------------------------------------------------------------
// Ingestion driver
// ----------------------------------------------------------------------------

/// Smallest read ever issued to the byte source, to guarantee forward
/// progress while resynchronizing
pub const SOURCE_MIN_READ_SIZE: usize = 64;

/// Read size used before the first telegram has been seen
pub const SOURCE_INITIAL_READ_SIZE: usize = 1024;

/// A source that cannot supply a full read within this window is considered
/// dead or misconfigured (wrong baud rate / parity), which is fatal
pub const SOURCE_READ_TIMEOUT_SECS: u64 = 30;

// ----------------------------------------------------------------------------
// MQTT defaults
// ----------------------------------------------------------------------------

/// Delay between connection attempts until the broker is first reached
pub const MQTT_CONNECT_RETRY_SECS: u64 = 2;

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_CLIENT_ID: &str = "p1-mqtt-gateway";
pub const DEFAULT_MQTT_TOPIC: &str = "p1-mqtt/tele/%(channel)s/%(device_id)s/SENSOR";

/// Default capacity of the record queue between the ingest and publish tasks
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;
