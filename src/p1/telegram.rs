//! # P1 Telegrams
//!
//! This module provides the [`Telegram`] type: one complete, checksum
//! verified protocol message from the meter, decoded into its data fields.
//! It also owns the output side of the data model — flattening a telegram
//! into an [`OutputRecord`] ready for JSON serialization, deriving the
//! telegram-wide time stamp, device id and channel, and splitting a
//! multi-channel telegram into per-channel sub-telegrams.
//!
//! A telegram can only be built from raw bytes through checksum validation.
//! [`Telegram::from_fields`] creates the synthetic per-channel telegrams
//! produced by [`Telegram::split_by_channel`]; those carry no raw bytes and
//! report a byte length of zero.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::Serialize;

use crate::constants::{P1_CHECKSUM_TRAILER_LEN, P1_VERSION_CHANNEL};
use crate::error::P1Error;
use crate::p1::checksum::crc16;
use crate::p1::field::Field;
use crate::p1::registry::FieldRegistry;

/// Key of the unified telegram time stamp, present iff exactly one field
/// can date the telegram.
pub const KEY_TELEGRAM_TIMESTAMP: &str = "p1mqtt_telegram_timestamp";
/// Key of the device identifier, present iff exactly one field carries one.
pub const KEY_DEVICE_ID: &str = "p1mqtt_device_id";
/// Key of the channel number, present iff all fields share one channel.
pub const KEY_CHANNEL: &str = "p1mqtt_channel";
/// Key of the collector-side receipt time stamp, always present.
pub const KEY_COLLECTOR_TIMESTAMP: &str = "p1mqtt_collector_timestamp";
/// Key of the authoritative time stamp chosen by the publisher.
pub const KEY_TIMESTAMP: &str = "p1mqtt_timestamp";

/// A scalar value in an output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// The flat key/value representation of a telegram that gets published.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputRecord(BTreeMap<String, RecordValue>);

impl OutputRecord {
    pub fn new() -> Self {
        OutputRecord::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RecordValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RecordValue)> {
        self.0.iter()
    }
}

/// One complete P1 telegram.
#[derive(Debug, Clone)]
pub struct Telegram {
    fields: Vec<Field>,
    raw_len: usize,
    unparseable: usize,
    meter_id: String,
}

impl Telegram {
    /// Decodes a candidate frame into a telegram.
    ///
    /// `buf` must span the whole frame, from the leading `/` through the
    /// checksum digits and their trailing CR LF. The checksum is validated
    /// first; line decode failures after that are counted in
    /// [`Telegram::unparseable`] but do not fail the telegram.
    pub fn decode(buf: &[u8], registry: &FieldRegistry) -> Result<Self, P1Error> {
        validate_checksum(buf)?;

        if !buf.is_ascii() {
            return Err(P1Error::NonAsciiTelegram);
        }
        let text = std::str::from_utf8(buf).map_err(|_| P1Error::NonAsciiTelegram)?;

        let mut fields = Vec::new();
        let mut unparseable = 0;
        let mut meter_id = String::new();

        for line in text.lines() {
            if let Some(ident) = line.strip_prefix('/') {
                meter_id = ident.to_string();
                continue;
            }
            if line.starts_with('!') {
                // checksum line, already verified
                continue;
            }
            if line.is_empty() {
                continue;
            }

            match registry.decode(line) {
                Ok(field) => fields.push(field),
                Err(err) => {
                    warn!("Could not parse line {line:?}: {err}");
                    unparseable += 1;
                }
            }
        }

        debug!(
            "Decoded telegram of {} bytes: {} fields, {} unparseable",
            buf.len(),
            fields.len(),
            unparseable
        );

        Ok(Telegram {
            fields,
            raw_len: buf.len(),
            unparseable,
            meter_id,
        })
    }

    /// Builds a synthetic telegram from already-decoded fields.
    ///
    /// Used for channel splits; the result has no raw bytes, so it reports
    /// a byte length of zero and needs no checksum.
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Telegram {
            fields,
            raw_len: 0,
            unparseable: 0,
            meter_id: String::new(),
        }
    }

    /// The decoded fields, in telegram order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Length of the raw bytes this telegram was decoded from; zero for
    /// telegrams built with [`Telegram::from_fields`].
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    /// Number of lines whose reference matched no registry entry or whose
    /// values failed to decode.
    pub fn unparseable(&self) -> usize {
        self.unparseable
    }

    /// The meter identification from the `/` header line.
    pub fn meter_id(&self) -> &str {
        &self.meter_id
    }

    /// The telegram-wide UTC Unix time stamp.
    ///
    /// Defined only when exactly one field is a time stamp candidate;
    /// none or several candidates leave the telegram undated.
    pub fn timestamp(&self) -> Option<i64> {
        let mut candidates = self.fields.iter().filter(|f| f.is_timestamp_candidate());
        match (candidates.next(), candidates.next()) {
            (Some(field), None) => field.unix_timestamp(),
            _ => None,
        }
    }

    /// The telegram-wide device identifier, under the same
    /// exactly-one-candidate rule as [`Telegram::timestamp`].
    pub fn device_id(&self) -> Option<String> {
        let mut candidates = self.fields.iter().filter(|f| f.is_device_id_candidate());
        match (candidates.next(), candidates.next()) {
            (Some(field), None) => field.device_id(),
            _ => None,
        }
    }

    /// The channel shared by every field, if there is a single one.
    pub fn channel(&self) -> Option<u8> {
        let mut channels = self.fields.iter().map(Field::channel);
        let first = channels.next()?;
        channels.all(|c| c == first).then_some(first)
    }

    /// Flattens the telegram into an output record.
    ///
    /// Each field contributes its named values; the unified time stamp,
    /// device id and channel are added when defined, and the collector
    /// receipt time is always stamped in.
    pub fn to_record(&self) -> OutputRecord {
        let mut record = OutputRecord::new();

        for field in &self.fields {
            for (key, value) in field.record_values() {
                record.insert(key, value);
            }
        }

        if let Some(ts) = self.timestamp() {
            record.insert(KEY_TELEGRAM_TIMESTAMP, RecordValue::Int(ts));
        }
        if let Some(id) = self.device_id() {
            record.insert(KEY_DEVICE_ID, RecordValue::Text(id));
        }
        if let Some(channel) = self.channel() {
            record.insert(KEY_CHANNEL, RecordValue::Int(i64::from(channel)));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        record.insert(KEY_COLLECTOR_TIMESTAMP, RecordValue::Float(now));

        record
    }

    /// Splits the telegram into one synthetic telegram per channel.
    ///
    /// Fields on the version channel are dropped entirely; the remaining
    /// channels partition the field set. The result is ordered by channel
    /// number and contains no duplicate channels.
    pub fn split_by_channel(&self) -> Vec<Telegram> {
        let mut groups: BTreeMap<u8, Vec<Field>> = BTreeMap::new();

        for field in &self.fields {
            if field.channel() == P1_VERSION_CHANNEL {
                continue;
            }
            groups.entry(field.channel()).or_default().push(field.clone());
        }

        debug!("Split channels: {:?}", groups.keys().collect::<Vec<_>>());

        groups.into_values().map(Telegram::from_fields).collect()
    }
}

fn validate_checksum(buf: &[u8]) -> Result<(), P1Error> {
    if buf.len() <= P1_CHECKSUM_TRAILER_LEN {
        return Err(P1Error::TruncatedFrame(buf.len()));
    }

    let covered = buf.len() - P1_CHECKSUM_TRAILER_LEN;
    let digits = &buf[covered..covered + 4];
    let digits =
        std::str::from_utf8(digits).map_err(|_| P1Error::MalformedChecksum(hex::encode(digits)))?;
    let expected = u16::from_str_radix(digits, 16)
        .map_err(|_| P1Error::MalformedChecksum(digits.to_string()))?;

    let calculated = crc16(&buf[..covered]);

    if calculated != expected {
        return Err(P1Error::ChecksumMismatch {
            expected,
            calculated,
        });
    }

    Ok(())
}
