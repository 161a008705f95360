//! # Gateway Configuration
//!
//! Resolved configuration structs consumed by the gateway tasks. Parsing
//! and defaulting happen at the CLI boundary in `main`; everything here is
//! already validated.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MQTT_CLIENT_ID, DEFAULT_MQTT_PORT, DEFAULT_MQTT_TOPIC,
};
use crate::transport::DsmrVersion;

/// Where the telegram stream comes from.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// The meter's serial port
    Serial { device: String, version: DsmrVersion },
    /// A serial-to-network bridge
    Tcp { host: String, port: u16 },
}

/// Unit of the published time stamp values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    /// Whole seconds, rounded
    Seconds,
    /// Milliseconds, truncated
    Milliseconds,
}

/// Which time stamp the authoritative `p1mqtt_timestamp` key carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampAuthority {
    /// The time stamp embedded in the telegram
    Telegram,
    /// The collector's local receipt time
    Collector,
}

/// MQTT connection and publish parameters.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client id; must be unique among all clients on the broker
    pub client_id: String,
    /// Topic template with `%(device_id)s` and `%(channel)s` placeholders
    pub topic: String,
    /// Minimum interval between published records; a record dequeued
    /// sooner is dropped, not delayed
    pub rate: Duration,
    pub timestamp_unit: TimestampUnit,
    pub timestamp_authority: TimestampAuthority,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
            topic: DEFAULT_MQTT_TOPIC.to_string(),
            rate: Duration::ZERO,
            timestamp_unit: TimestampUnit::Seconds,
            timestamp_authority: TimestampAuthority::Telegram,
        }
    }
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub source: SourceConfig,
    /// Capacity of the record queue between the ingest and publish tasks
    pub buffer_size: usize,
    /// Optional file all source bytes are copied to, for debugging
    pub source_dump: Option<PathBuf>,
    pub mqtt: MqttConfig,
}

impl GatewayConfig {
    pub fn new(source: SourceConfig, mqtt: MqttConfig) -> Self {
        GatewayConfig {
            source,
            buffer_size: DEFAULT_BUFFER_SIZE,
            source_dump: None,
            mqtt,
        }
    }
}
