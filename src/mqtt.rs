//! # MQTT Publisher
//!
//! The publish task: owns the connection state machine around the MQTT
//! client library, rate-limits outgoing records, and formats and publishes
//! each one.
//!
//! The client library drives the network from its own event loop; the only
//! state it shares with the publish loop is a single connected flag,
//! carried by a `tokio::sync::watch` channel. The event task sets it on
//! ConnAck, clears it on disconnect or poll error, and keeps polling with a
//! fixed backoff until the broker is reachable again — both the initial
//! connect retry and the indefinite reconnect come out of that one loop.
//! The publish loop sleeps on the flag whenever the connection is down.

use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::config::{MqttConfig, TimestampAuthority, TimestampUnit};
use crate::constants::MQTT_CONNECT_RETRY_SECS;
use crate::error::P1Error;
use crate::p1::telegram::{
    OutputRecord, RecordValue, KEY_CHANNEL, KEY_COLLECTOR_TIMESTAMP, KEY_DEVICE_ID,
    KEY_TELEGRAM_TIMESTAMP, KEY_TIMESTAMP,
};
use crate::pipeline::RecordReceiver;

/// Minimum-interval gate between published records.
///
/// A record arriving inside the interval is rejected; the caller discards
/// it rather than delaying it. An interval of zero admits everything.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        RateGate {
            min_interval,
            last: None,
        }
    }

    /// Whether a record observed at `now` may be published.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Converts the raw time stamp under `key` to the configured unit.
fn convert_timestamp(record: &mut OutputRecord, key: &str, unit: TimestampUnit) {
    let seconds = match record.get(key) {
        Some(RecordValue::Int(v)) => *v as f64,
        Some(RecordValue::Float(v)) => *v,
        _ => return,
    };

    let converted = match unit {
        TimestampUnit::Seconds => (seconds + 0.5).floor() as i64,
        TimestampUnit::Milliseconds => (seconds * 1000.0) as i64,
    };

    record.insert(key, RecordValue::Int(converted));
}

/// Brings both raw time stamps into the configured unit and installs the
/// authoritative `p1mqtt_timestamp` key from the configured source.
pub fn finalize_timestamps(
    record: &mut OutputRecord,
    unit: TimestampUnit,
    authority: TimestampAuthority,
) {
    convert_timestamp(record, KEY_COLLECTOR_TIMESTAMP, unit);
    convert_timestamp(record, KEY_TELEGRAM_TIMESTAMP, unit);

    let source = match authority {
        TimestampAuthority::Collector => KEY_COLLECTOR_TIMESTAMP,
        TimestampAuthority::Telegram => KEY_TELEGRAM_TIMESTAMP,
    };
    if let Some(value) = record.get(source).cloned() {
        record.insert(KEY_TIMESTAMP, value);
    }
}

/// Substitutes the record's device id and channel into the topic template.
///
/// Returns `None` when the record carries neither key, in which case it
/// cannot be routed and is dropped by the caller.
pub fn render_topic(template: &str, record: &OutputRecord) -> Option<String> {
    let device_id = record_text(record.get(KEY_DEVICE_ID)?);
    let channel = record_text(record.get(KEY_CHANNEL)?);

    Some(
        template
            .replace("%(device_id)s", &device_id)
            .replace("%(channel)s", &channel),
    )
}

fn record_text(value: &RecordValue) -> String {
    match value {
        RecordValue::Int(v) => v.to_string(),
        RecordValue::Float(v) => v.to_string(),
        RecordValue::Text(s) => s.clone(),
    }
}

/// Main function of the publish task.
///
/// Spawns the client library's event loop, then publishes records from the
/// queue until the queue closes or the client fails.
pub async fn mqtt_main(receiver: RecordReceiver, config: MqttConfig) -> Result<(), P1Error> {
    info!("MQTT publish task starting");

    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let (conn_tx, conn_rx) = watch::channel(false);

    let broker = format!("{}:{}", config.host, config.port);

    // The event task is the only writer of the connected flag; the client
    // library reconnects on its own as long as polling continues.
    let event_task = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let accepted = ack.code == ConnectReturnCode::Success;
                    if accepted {
                        info!("Connected to MQTT");
                    } else {
                        error!("MQTT connection refused: {:?}", ack.code);
                    }
                    let _ = conn_tx.send(accepted);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    error!("Unexpected disconnect from MQTT");
                    let _ = conn_tx.send(false);
                }
                Ok(event) => {
                    debug!("MQTT event: {event:?}");
                }
                Err(err) => {
                    warn!("Could not reach MQTT broker at {broker}, retrying ({err})");
                    let _ = conn_tx.send(false);
                    sleep(Duration::from_secs(MQTT_CONNECT_RETRY_SECS)).await;
                }
            }
        }
    });

    let result = publish_loop(&client, receiver, conn_rx, &config).await;
    event_task.abort();
    result
}

async fn publish_loop(
    client: &AsyncClient,
    mut receiver: RecordReceiver,
    mut connected: watch::Receiver<bool>,
    config: &MqttConfig,
) -> Result<(), P1Error> {
    let mut gate = RateGate::new(config.rate);

    loop {
        // This sleeps unless we're connected
        connected
            .wait_for(|up| *up)
            .await
            .map_err(|_| P1Error::MqttClientError("connection tracker gone".to_string()))?;

        let Some(mut record) = receiver.recv().await else {
            return Err(P1Error::QueueClosed);
        };
        debug!("Read record from queue");

        if !gate.admit(Instant::now()) {
            debug!("Rate limit active, dropping record");
            continue;
        }

        finalize_timestamps(&mut record, config.timestamp_unit, config.timestamp_authority);

        let Some(topic) = render_topic(&config.topic, &record) else {
            warn!("Record carries no device id or channel, not publishing");
            continue;
        };

        let payload =
            serde_json::to_vec(&record).map_err(|e| P1Error::MqttClientError(e.to_string()))?;

        debug!("Publishing {} bytes to {topic}", payload.len());
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| P1Error::MqttClientError(e.to_string()))?;
    }
}
