use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use log::error;

use p1mqtt_rs::config::{
    GatewayConfig, MqttConfig, SourceConfig, TimestampAuthority, TimestampUnit,
};
use p1mqtt_rs::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MQTT_CLIENT_ID, DEFAULT_MQTT_PORT, DEFAULT_MQTT_TOPIC,
};
use p1mqtt_rs::p1::{FieldRegistry, FrameReader};
use p1mqtt_rs::transport::{DsmrVersion, P1Source, SerialSource, TcpSource};
use p1mqtt_rs::{ingest, logging, mqtt, pipeline};

#[derive(Parser)]
#[command(name = "p1-mqtt")]
#[command(about = "Read DSMR P1 smart-meter telegrams and publish them to MQTT")]
struct Cli {
    /// Serial device to use
    #[arg(short, long, conflicts_with = "host")]
    device: Option<String>,

    /// TCP source host to use
    #[arg(long)]
    host: Option<String>,

    /// TCP source port to use
    #[arg(long)]
    port: Option<u16>,

    /// Use the DSMR 2.2 serial configuration instead of DSMR 4.0 and newer
    #[arg(long)]
    dsmr_22: bool,

    /// MQTT server to connect to
    #[arg(long)]
    mqtt_host: String,

    /// MQTT port to connect to
    #[arg(long, default_value_t = DEFAULT_MQTT_PORT)]
    mqtt_port: u16,

    /// MQTT user name to use
    #[arg(long)]
    mqtt_username: Option<String>,

    /// MQTT password to use
    #[arg(long)]
    mqtt_password: Option<String>,

    /// MQTT client ID, unique between all clients on the same broker
    #[arg(long, default_value = DEFAULT_MQTT_CLIENT_ID)]
    mqtt_client_id: String,

    /// MQTT topic to publish to; may contain %(device_id)s and %(channel)s
    /// placeholders filled per record
    #[arg(long, default_value = DEFAULT_MQTT_TOPIC)]
    mqtt_topic: String,

    /// Minimum time between messages sent to the broker, in seconds;
    /// records arriving faster are dropped
    #[arg(long, default_value_t = 0)]
    mqtt_rate: u64,

    /// How many records to buffer if the MQTT server is unavailable; the
    /// buffer is not persistent across restarts
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// File name to dump all data read from the source to, for debugging
    #[arg(long, alias = "serial-dump")]
    source_dump: Option<PathBuf>,

    /// Use the collector-local time as authoritative in the published data
    /// instead of the time stamp from the P1 telegram
    #[arg(long)]
    prefer_local_timestamp: bool,

    /// Send time stamps in milliseconds instead of seconds
    #[arg(long)]
    time_ms: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let source = match (self.device, self.host, self.port) {
            (Some(device), None, _) => SourceConfig::Serial {
                device,
                version: if self.dsmr_22 {
                    DsmrVersion::V22
                } else {
                    DsmrVersion::V40
                },
            },
            (None, Some(host), Some(port)) => SourceConfig::Tcp { host, port },
            _ => bail!("no serial device or no host/port given as data source"),
        };

        let mqtt = MqttConfig {
            host: self.mqtt_host,
            port: self.mqtt_port,
            username: self.mqtt_username,
            password: self.mqtt_password,
            client_id: self.mqtt_client_id,
            topic: self.mqtt_topic,
            rate: Duration::from_secs(self.mqtt_rate),
            timestamp_unit: if self.time_ms {
                TimestampUnit::Milliseconds
            } else {
                TimestampUnit::Seconds
            },
            timestamp_authority: if self.prefer_local_timestamp {
                TimestampAuthority::Collector
            } else {
                TimestampAuthority::Telegram
            },
        };

        Ok(GatewayConfig {
            source,
            buffer_size: self.buffer_size,
            source_dump: self.source_dump,
            mqtt,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        logging::init_logger_debug();
    } else {
        logging::init_logger();
    }

    let config = cli.into_config()?;

    let source: Box<dyn P1Source> = match &config.source {
        SourceConfig::Serial { device, version } => Box::new(
            SerialSource::open(device, *version)
                .await
                .with_context(|| format!("could not open serial port {device}"))?,
        ),
        SourceConfig::Tcp { host, port } => Box::new(
            TcpSource::connect(host, *port)
                .await
                .with_context(|| format!("could not connect to P1 source at {host}:{port}"))?,
        ),
    };

    let reader = FrameReader::new(FieldRegistry::with_default_fields());
    let (sender, receiver) = pipeline::bounded(config.buffer_size);

    let ingest_task = tokio::spawn(ingest::ingest_main(
        source,
        reader,
        sender,
        config.source_dump.clone(),
    ));
    let publish_task = tokio::spawn(mqtt::mqtt_main(receiver, config.mqtt.clone()));

    // Neither task returns under normal operation; whichever stops first
    // takes the whole gateway down so the supervisor can restart it.
    let failure = tokio::select! {
        result = ingest_task => ("ingest", result),
        result = publish_task => ("publish", result),
    };

    match failure {
        (task, Ok(Err(err))) => {
            error!("{task} task failed: {err}");
            bail!("{task} task failed: {err}");
        }
        (task, Ok(Ok(()))) => {
            error!("{task} task stopped unexpectedly");
            bail!("{task} task stopped unexpectedly");
        }
        (task, Err(err)) => {
            error!("{task} task panicked: {err}");
            bail!("{task} task panicked: {err}");
        }
    }
}
