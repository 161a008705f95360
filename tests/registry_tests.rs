//! Integration tests for the field registry and the individual value
//! decoders, driven through realistic P1 data lines.

use p1mqtt_rs::p1::field::FailureEvent;
use p1mqtt_rs::p1::{FieldDecoder, FieldKind, FieldRegistry, FieldSpec, ObisPattern, RecordValue};
use p1mqtt_rs::P1Error;

fn registry() -> FieldRegistry {
    FieldRegistry::with_default_fields()
}

/// An octet string decodes to its raw bytes and produces no record keys.
#[test]
fn test_octet_string_field() {
    let field = registry()
        .decode("0-0:96.1.1(4530303437303030303037363330383137)")
        .unwrap();

    assert_eq!(
        field.kind(),
        &FieldKind::OctetString(b"E0047000007630817".to_vec())
    );
    assert!(field.record_values().is_empty());
    assert!(field.is_device_id_candidate());
    assert_eq!(field.device_id().as_deref(), Some("E0047000007630817"));
}

/// The telegram clock field is a time stamp candidate keyed by its bare
/// name.
#[test]
fn test_timestamp_field() {
    let field = registry().decode("0-0:1.0.0(171105201324W)").unwrap();

    assert!(field.is_timestamp_candidate());
    assert_eq!(field.unix_timestamp(), Some(1509909204));
    assert_eq!(
        field.record_values(),
        vec![("p1_timestamp".to_string(), RecordValue::Int(1509909204))]
    );
}

/// A bare counter decodes as a float keyed by its bare name.
#[test]
fn test_float_field() {
    let field = registry().decode("0-0:96.7.21(00003)").unwrap();

    assert_eq!(field.kind(), &FieldKind::Float(3.0));
    assert_eq!(
        field.record_values(),
        vec![(
            "p1_power_failure_count".to_string(),
            RecordValue::Float(3.0)
        )]
    );
}

/// A unit float keeps its unit in the field but publishes only the value.
#[test]
fn test_unit_float_field() {
    let field = registry().decode("1-0:1.8.1(000051.775*kWh)").unwrap();

    assert_eq!(
        field.kind(),
        &FieldKind::UnitFloat {
            value: 51.775,
            unit: "kWh".to_string()
        }
    );
    assert_eq!(
        field.record_values(),
        vec![(
            "p1_energy_consumed_tariff1".to_string(),
            RecordValue::Float(51.775)
        )]
    );
}

/// The failure log decodes its (end time, duration) pairs and publishes
/// nothing.
#[test]
fn test_failure_log_field() {
    let field = registry()
        .decode("1-0:99.97.0(1)(0-0:96.7.19)(000101000006W)(2147483647*s)")
        .unwrap();

    match field.kind() {
        FieldKind::FailureLog(log) => {
            assert_eq!(log.len(), 1);
            let FailureEvent {
                ended_at,
                duration_secs,
            } = &log[0];
            // 2000-01-01 00:00:06 at UTC+1
            assert_eq!(ended_at.timestamp(), 946681206);
            assert_eq!(*duration_secs, 2147483647.0);
        }
        other => panic!("expected failure log, got {other:?}"),
    }
    assert!(field.record_values().is_empty());
    assert!(!field.is_timestamp_candidate());
}

/// A failure log whose value count contradicts its stated entry count is
/// rejected.
#[test]
fn test_failure_log_inconsistent_length() {
    assert!(matches!(
        registry().decode("1-0:99.97.0(2)(0-0:96.7.19)(000101000006W)(2147483647*s)"),
        Err(P1Error::InconsistentLog {
            stated: 2,
            found: 2
        })
    ));
}

/// The gas reading is a two-value field: multi-value naming applies, and
/// it dates its channel.
#[test]
fn test_gas_reading_field() {
    let field = registry()
        .decode("0-1:24.2.1(171105201000W)(00016.713*m3)")
        .unwrap();

    assert!(field.is_timestamp_candidate());
    assert_eq!(field.unix_timestamp(), Some(1509909000));
    assert_eq!(field.channel(), 1);
    assert_eq!(
        field.record_values(),
        vec![
            (
                "p1_gas_consumed_timestamp".to_string(),
                RecordValue::Int(1509909000)
            ),
            ("p1_gas_consumed_volume".to_string(), RecordValue::Float(16.713)),
        ]
    );
}

/// Timestamps without their DST marker are invalid.
#[test]
fn test_timestamp_without_marker() {
    assert!(matches!(
        registry().decode("0-0:1.0.0(171105201324)"),
        Err(P1Error::InvalidTimestamp(_))
    ));
}

/// A unit float without a unit separator is invalid.
#[test]
fn test_unit_float_without_separator() {
    assert!(matches!(
        registry().decode("1-0:1.8.1(000051.775)"),
        Err(P1Error::InvalidValue(_))
    ));
}

/// Unmatched references name the offending tag.
#[test]
fn test_unknown_reference_names_the_tag() {
    match registry().decode("1-0:98.76.5(00000)") {
        Err(P1Error::UnknownReference(reference)) => assert_eq!(reference, "1-0:98.76.5"),
        other => panic!("expected unknown reference, got {other:?}"),
    }
}

/// Registration order decides dispatch for overlapping patterns.
#[test]
fn test_first_match_wins() {
    let mut registry = FieldRegistry::new();
    registry
        .register(
            ObisPattern::exact(0, 1, 24, 2, 1),
            FieldSpec::new("channel_one_gas", FieldDecoder::GasReading),
        )
        .unwrap();
    registry
        .register(
            ObisPattern::any_channel(0, 24, 2, 1),
            FieldSpec::new("any_channel_gas", FieldDecoder::GasReading),
        )
        .unwrap();

    let field = registry
        .decode("0-1:24.2.1(171105201000W)(00016.713*m3)")
        .unwrap();
    assert_eq!(field.name(), "channel_one_gas");

    let field = registry
        .decode("0-2:24.2.1(171105201000W)(00016.713*m3)")
        .unwrap();
    assert_eq!(field.name(), "any_channel_gas");
}

/// The same pattern cannot be registered twice, but distinct channels can.
#[test]
fn test_duplicate_registration() {
    let mut registry = FieldRegistry::new();
    let spec = FieldSpec::new("gas", FieldDecoder::GasReading);

    registry
        .register(ObisPattern::exact(0, 1, 24, 2, 1), spec)
        .unwrap();
    registry
        .register(ObisPattern::exact(0, 2, 24, 2, 1), spec)
        .unwrap();
    assert!(matches!(
        registry.register(ObisPattern::exact(0, 1, 24, 2, 1), spec),
        Err(P1Error::DuplicateRegistration(_))
    ));
}
