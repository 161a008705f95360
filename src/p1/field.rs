//! # P1 Data Fields
//!
//! This module provides the decoded representation of a single P1 data line
//! (one OBIS reference plus its parenthesized values) and the decoders for
//! the value encodings that appear on the P1 bus: octet strings, TST time
//! stamps, bare and unit-suffixed floats, the long power failure log, and
//! the gas meter reading.
//!
//! A line follows `reference(value)[(value)...]`, where the reference is
//! `medium-channel:a.b.c`. The line grammar is parsed with `nom`; what the
//! individual values mean is decided by the registered decoder for the
//! reference (see [`crate::p1::registry`]).

use crate::error::P1Error;
use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use nom::{
    bytes::complete::take_while,
    character::complete::{char, digit1, one_of},
    combinator::map_res,
    multi::many1,
    sequence::delimited,
    IResult,
};

use super::telegram::RecordValue;

/// A parsed OBIS reference: `medium-channel:a.b.c`.
///
/// The channel digit decides which sub-meter a field belongs to (0 is the
/// electricity meter itself, 1+ are bus-attached devices such as a gas
/// meter, 3 carries only version metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObisReference {
    pub medium: u16,
    pub channel: u8,
    pub code: [u16; 3],
}

fn obis_reference(input: &str) -> IResult<&str, ObisReference> {
    let (input, medium) = map_res(digit1, str::parse::<u16>)(input)?;
    let (input, _) = char('-')(input)?;
    let (input, channel) = one_of("0123456789")(input)?;
    let (input, _) = char(':')(input)?;
    let (input, a) = map_res(digit1, str::parse::<u16>)(input)?;
    let (input, _) = char('.')(input)?;
    let (input, b) = map_res(digit1, str::parse::<u16>)(input)?;
    let (input, _) = char('.')(input)?;
    let (input, c) = map_res(digit1, str::parse::<u16>)(input)?;

    Ok((
        input,
        ObisReference {
            medium,
            channel: channel as u8 - b'0',
            code: [a, b, c],
        },
    ))
}

fn value_group(input: &str) -> IResult<&str, &str> {
    delimited(char('('), take_while(|c| c != ')'), char(')'))(input)
}

/// Splits a data line into its OBIS reference and the raw value strings.
///
/// Returns the reference as text (for diagnostics and registry dispatch),
/// its parsed form, and the values still undecoded. Trailing bytes after
/// the last value group are ignored.
pub fn parse_line(line: &str) -> Result<(String, ObisReference, Vec<&str>), P1Error> {
    let (rest, reference) =
        obis_reference(line).map_err(|_| P1Error::MalformedReference(line.to_string()))?;
    let reference_text = &line[..line.len() - rest.len()];

    let (_, values) =
        many1(value_group)(rest).map_err(|_| P1Error::MalformedLine(line.to_string()))?;

    Ok((reference_text.to_string(), reference, values))
}

/// One entry of the long power failure log: when power returned, and for
/// how many seconds it had been gone.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEvent {
    pub ended_at: DateTime<FixedOffset>,
    pub duration_secs: f64,
}

/// The decoded value of a P1 field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Hex-encoded octet string (identifiers, version, user messages)
    OctetString(Vec<u8>),
    /// A TST time stamp
    Timestamp(DateTime<FixedOffset>),
    /// A bare decimal value (counters)
    Float(f64),
    /// A decimal value with a unit suffix, e.g. `000051.775*kWh`
    UnitFloat { value: f64, unit: String },
    /// The long power failure event log
    FailureLog(Vec<FailureEvent>),
    /// A gas meter volume together with the (possibly stale) reading time
    GasReading {
        read_at: DateTime<FixedOffset>,
        volume: f64,
    },
}

/// The closed set of value decoders a reference can be registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDecoder {
    OctetString,
    Timestamp,
    Float,
    UnitFloat,
    FailureLog,
    GasReading,
}

impl FieldDecoder {
    /// Decodes the raw value strings of a line into a [`FieldKind`].
    pub fn decode(self, values: &[&str]) -> Result<FieldKind, P1Error> {
        match self {
            FieldDecoder::OctetString => Ok(FieldKind::OctetString(decode_octet_string(
                first_value(values)?,
            )?)),
            FieldDecoder::Timestamp => Ok(FieldKind::Timestamp(decode_tst(first_value(values)?)?)),
            FieldDecoder::Float => Ok(FieldKind::Float(decode_float(first_value(values)?)?)),
            FieldDecoder::UnitFloat => {
                let (value, unit) = decode_unit_float(first_value(values)?)?;
                Ok(FieldKind::UnitFloat { value, unit })
            }
            FieldDecoder::FailureLog => decode_failure_log(values),
            FieldDecoder::GasReading => {
                if values.len() < 2 {
                    return Err(P1Error::InvalidValue(
                        "gas reading needs a time stamp and a volume".to_string(),
                    ));
                }
                let read_at = decode_tst(values[0])?;
                let (volume, _) = decode_unit_float(values[1])?;
                Ok(FieldKind::GasReading { read_at, volume })
            }
        }
    }
}

fn first_value<'a>(values: &[&'a str]) -> Result<&'a str, P1Error> {
    values
        .first()
        .copied()
        .ok_or_else(|| P1Error::InvalidValue("missing value".to_string()))
}

/// Decodes a hex-encoded P1 octet string.
pub fn decode_octet_string(value: &str) -> Result<Vec<u8>, P1Error> {
    hex::decode(value).map_err(|_| P1Error::InvalidValue(value.to_string()))
}

/// Decodes a P1 TST time stamp, `YYMMDDhhmmss` plus a DST marker.
///
/// The standard does not name a time zone, only a summer/winter marker:
/// `S` means UTC+2 and `W` means UTC+1, with no DST table lookup.
pub fn decode_tst(value: &str) -> Result<DateTime<FixedOffset>, P1Error> {
    let offset_secs = match value.as_bytes().last() {
        Some(b'S') => 2 * 3600,
        Some(b'W') => 3600,
        _ => return Err(P1Error::InvalidTimestamp(value.to_string())),
    };
    let offset = FixedOffset::east_opt(offset_secs).expect("static offset in range");

    let digits = &value[..value.len() - 1];
    let naive = NaiveDateTime::parse_from_str(digits, "%y%m%d%H%M%S")
        .map_err(|_| P1Error::InvalidTimestamp(value.to_string()))?;

    match offset.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        _ => Err(P1Error::InvalidTimestamp(value.to_string())),
    }
}

/// Decodes a bare decimal value.
pub fn decode_float(value: &str) -> Result<f64, P1Error> {
    value
        .parse::<f64>()
        .map_err(|_| P1Error::InvalidValue(value.to_string()))
}

/// Decodes a decimal value with a `*unit` suffix.
pub fn decode_unit_float(value: &str) -> Result<(f64, String), P1Error> {
    let (number, unit) = value
        .split_once('*')
        .ok_or_else(|| P1Error::InvalidValue(value.to_string()))?;
    Ok((decode_float(number)?, unit.to_string()))
}

fn decode_failure_log(values: &[&str]) -> Result<FieldKind, P1Error> {
    if values.len() < 2 {
        return Err(P1Error::InvalidValue(
            "failure log needs a count and an OBIS code".to_string(),
        ));
    }

    let stated: usize = values[0]
        .parse()
        .map_err(|_| P1Error::InvalidValue(values[0].to_string()))?;

    // values[1] is an OBIS code of unclear meaning; the remaining values
    // come in (end time stamp, duration) pairs
    let entries = &values[2..];
    if entries.len() != stated * 2 {
        return Err(P1Error::InconsistentLog {
            stated,
            found: entries.len(),
        });
    }

    let mut log = Vec::with_capacity(stated);
    for pair in entries.chunks_exact(2) {
        let ended_at = decode_tst(pair[0])?;
        let (duration_secs, _) = decode_unit_float(pair[1])?;
        log.push(FailureEvent {
            ended_at,
            duration_secs,
        });
    }

    Ok(FieldKind::FailureLog(log))
}

/// A decoded P1 data field.
///
/// Fields are immutable once decoded. The output name stem comes from the
/// registry entry that matched the line's reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    reference: String,
    channel: u8,
    name: &'static str,
    kind: FieldKind,
    device_id_candidate: bool,
}

impl Field {
    pub(crate) fn new(
        reference: String,
        channel: u8,
        name: &'static str,
        kind: FieldKind,
        device_id_candidate: bool,
    ) -> Self {
        Field {
            reference,
            channel,
            name,
            kind,
            device_id_candidate,
        }
    }

    /// The OBIS reference text this field was decoded from.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The channel digit parsed from the reference.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The registered output name stem.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether this field can date the whole telegram.
    pub fn is_timestamp_candidate(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Timestamp(_) | FieldKind::GasReading { .. }
        )
    }

    /// Whether this field can identify the sending device.
    pub fn is_device_id_candidate(&self) -> bool {
        self.device_id_candidate
    }

    /// The field's time stamp as UTC Unix seconds, for candidates.
    pub fn unix_timestamp(&self) -> Option<i64> {
        match &self.kind {
            FieldKind::Timestamp(ts) => Some(ts.timestamp()),
            FieldKind::GasReading { read_at, .. } => Some(read_at.timestamp()),
            _ => None,
        }
    }

    /// The device identifier carried by this field, for candidates.
    pub fn device_id(&self) -> Option<String> {
        if !self.device_id_candidate {
            return None;
        }
        match &self.kind {
            FieldKind::OctetString(bytes) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        }
    }

    /// The field's contribution to an output record.
    ///
    /// A field with a single named sub-value is keyed by its bare name; one
    /// with several gets `<name>_<sub-value>` keys. Octet strings and the
    /// failure log expose no sub-values.
    pub fn record_values(&self) -> Vec<(String, RecordValue)> {
        match &self.kind {
            FieldKind::OctetString(_) | FieldKind::FailureLog(_) => Vec::new(),
            FieldKind::Timestamp(ts) => {
                vec![(self.name.to_string(), RecordValue::Int(ts.timestamp()))]
            }
            FieldKind::Float(value) | FieldKind::UnitFloat { value, .. } => {
                vec![(self.name.to_string(), RecordValue::Float(*value))]
            }
            FieldKind::GasReading { read_at, volume } => vec![
                (
                    format!("{}_timestamp", self.name),
                    RecordValue::Int(read_at.timestamp()),
                ),
                (format!("{}_volume", self.name), RecordValue::Float(*volume)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_single_value() {
        let (text, reference, values) = parse_line("1-0:1.8.1(000051.775*kWh)").unwrap();
        assert_eq!(text, "1-0:1.8.1");
        assert_eq!(reference.medium, 1);
        assert_eq!(reference.channel, 0);
        assert_eq!(reference.code, [1, 8, 1]);
        assert_eq!(values, vec!["000051.775*kWh"]);
    }

    #[test]
    fn test_parse_line_multiple_values() {
        let (_, _, values) =
            parse_line("1-0:99.97.0(1)(0-0:96.7.19)(000101000006W)(2147483647*s)").unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[1], "0-0:96.7.19");
    }

    #[test]
    fn test_parse_line_empty_value() {
        let (_, _, values) = parse_line("0-0:96.13.0()").unwrap();
        assert_eq!(values, vec![""]);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(parse_line("hello world").is_err());
        assert!(parse_line("1-0:1.8.1").is_err());
    }

    #[test]
    fn test_decode_tst_winter() {
        let ts = decode_tst("171105201324W").unwrap();
        assert_eq!(ts.timestamp(), 1_509_909_204);
    }

    #[test]
    fn test_decode_tst_summer() {
        // Same wall clock, one hour earlier in UTC than the winter reading
        let winter = decode_tst("171105201324W").unwrap();
        let summer = decode_tst("171105201324S").unwrap();
        assert_eq!(winter.timestamp() - summer.timestamp(), 3600);
    }

    #[test]
    fn test_decode_tst_missing_marker() {
        assert!(matches!(
            decode_tst("171105201324"),
            Err(P1Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_decode_unit_float() {
        let (value, unit) = decode_unit_float("00016.713*m3").unwrap();
        assert_eq!(value, 16.713);
        assert_eq!(unit, "m3");
        assert!(decode_unit_float("16.713").is_err());
    }

    #[test]
    fn test_decode_failure_log_length_check() {
        let err = FieldDecoder::FailureLog
            .decode(&["2", "0-0:96.7.19", "000101000006W", "2147483647*s"])
            .unwrap_err();
        assert!(matches!(
            err,
            P1Error::InconsistentLog {
                stated: 2,
                found: 2
            }
        ));
    }

    #[test]
    fn test_decode_empty_failure_log() {
        let kind = FieldDecoder::FailureLog.decode(&["0", "0-0:96.7.19"]).unwrap();
        assert_eq!(kind, FieldKind::FailureLog(Vec::new()));
    }
}
