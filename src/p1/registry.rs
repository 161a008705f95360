//! # P1 Field Registry
//!
//! This module maps OBIS reference patterns to field decoders. The registry
//! is an explicit, ordered list built at startup: dispatch is first-match in
//! registration order, so overlapping patterns resolve the same way every
//! run. Registering the same pattern twice is an error.
//!
//! [`FieldRegistry::with_default_fields`] installs the references a DSMR
//! 2.2–5.0 electricity meter emits, including the wildcard-channel gas and
//! sub-device references.

use std::fmt;

use crate::error::P1Error;
use crate::p1::field::{Field, FieldDecoder, ObisReference};

/// Channel part of an [`ObisPattern`]: a fixed digit or any channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObisChannel {
    Exact(u8),
    Any,
}

/// A pattern over OBIS references: fixed medium and code, exact or wildcard
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObisPattern {
    medium: u16,
    channel: ObisChannel,
    code: [u16; 3],
}

impl ObisPattern {
    /// A pattern matching one exact reference.
    pub const fn exact(medium: u16, channel: u8, a: u16, b: u16, c: u16) -> Self {
        ObisPattern {
            medium,
            channel: ObisChannel::Exact(channel),
            code: [a, b, c],
        }
    }

    /// A pattern matching a reference on any channel, for fields that
    /// bus-attached sub-devices report on their own channel.
    pub const fn any_channel(medium: u16, a: u16, b: u16, c: u16) -> Self {
        ObisPattern {
            medium,
            channel: ObisChannel::Any,
            code: [a, b, c],
        }
    }

    /// Whether `reference` falls under this pattern.
    pub fn matches(&self, reference: &ObisReference) -> bool {
        if self.medium != reference.medium || self.code != reference.code {
            return false;
        }
        match self.channel {
            ObisChannel::Exact(channel) => channel == reference.channel,
            ObisChannel::Any => true,
        }
    }
}

impl fmt::Display for ObisPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            ObisChannel::Exact(channel) => write!(f, "{}-{}", self.medium, channel)?,
            ObisChannel::Any => write!(f, "{}-*", self.medium)?,
        }
        write!(f, ":{}.{}.{}", self.code[0], self.code[1], self.code[2])
    }
}

/// What to do with a line whose reference matched: the output name stem,
/// the value decoder, and whether the field identifies the device.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    name: &'static str,
    decoder: FieldDecoder,
    device_id: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, decoder: FieldDecoder) -> Self {
        FieldSpec {
            name,
            decoder,
            device_id: false,
        }
    }

    /// A spec whose octet string doubles as the device identifier.
    pub const fn device_id(name: &'static str, decoder: FieldDecoder) -> Self {
        FieldSpec {
            name,
            decoder,
            device_id: true,
        }
    }
}

/// Ordered mapping from OBIS patterns to field decoders.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    entries: Vec<(ObisPattern, FieldSpec)>,
}

impl FieldRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        FieldRegistry::default()
    }

    /// Creates a registry with the standard DSMR field set installed.
    pub fn with_default_fields() -> Self {
        let mut registry = FieldRegistry::new();
        registry
            .register_default_fields()
            .expect("default field table contains a duplicate pattern");
        registry
    }

    /// Appends a pattern/decoder pair to the dispatch list.
    ///
    /// Dispatch is first-match in registration order; registering a pattern
    /// that is already present is rejected rather than silently shadowed.
    pub fn register(&mut self, pattern: ObisPattern, spec: FieldSpec) -> Result<(), P1Error> {
        if self.entries.iter().any(|(existing, _)| *existing == pattern) {
            return Err(P1Error::DuplicateRegistration(pattern.to_string()));
        }
        self.entries.push((pattern, spec));
        Ok(())
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes one data line into a [`Field`].
    ///
    /// The first registered pattern matching the line's reference wins.
    pub fn decode(&self, line: &str) -> Result<Field, P1Error> {
        let (reference_text, reference, values) = super::field::parse_line(line)?;

        let spec = self
            .entries
            .iter()
            .find(|(pattern, _)| pattern.matches(&reference))
            .map(|(_, spec)| spec)
            .ok_or_else(|| P1Error::UnknownReference(reference_text.clone()))?;

        let kind = spec.decoder.decode(&values)?;

        Ok(Field::new(
            reference_text,
            reference.channel,
            spec.name,
            kind,
            spec.device_id,
        ))
    }

    fn register_default_fields(&mut self) -> Result<(), P1Error> {
        use FieldDecoder::*;

        let defaults: &[(ObisPattern, FieldSpec)] = &[
            (
                ObisPattern::exact(1, 3, 0, 2, 8),
                FieldSpec::new("p1_version", OctetString),
            ),
            (
                ObisPattern::exact(0, 0, 1, 0, 0),
                FieldSpec::new("p1_timestamp", Timestamp),
            ),
            (
                ObisPattern::exact(0, 0, 96, 1, 1),
                FieldSpec::device_id("p1_equipment_identifier", OctetString),
            ),
            (
                ObisPattern::exact(1, 0, 1, 8, 1),
                FieldSpec::new("p1_energy_consumed_tariff1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 1, 8, 2),
                FieldSpec::new("p1_energy_consumed_tariff2", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 2, 8, 1),
                FieldSpec::new("p1_energy_produced_tariff1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 2, 8, 2),
                FieldSpec::new("p1_energy_produced_tariff2", UnitFloat),
            ),
            (
                ObisPattern::exact(0, 0, 96, 14, 0),
                FieldSpec::new("p1_energy_tariff", OctetString),
            ),
            (
                ObisPattern::exact(1, 0, 1, 7, 0),
                FieldSpec::new("p1_actual_power_consuming", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 2, 7, 0),
                FieldSpec::new("p1_actual_power_producing", UnitFloat),
            ),
            (
                ObisPattern::exact(0, 0, 96, 7, 21),
                FieldSpec::new("p1_power_failure_count", Float),
            ),
            (
                ObisPattern::exact(0, 0, 96, 7, 9),
                FieldSpec::new("p1_long_power_failure_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 99, 97, 0),
                FieldSpec::new("p1_long_failure_log", FailureLog),
            ),
            (
                ObisPattern::exact(1, 0, 32, 32, 0),
                FieldSpec::new("p1_voltage_sag_l1_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 52, 32, 0),
                FieldSpec::new("p1_voltage_sag_l2_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 72, 32, 0),
                FieldSpec::new("p1_voltage_sag_l3_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 32, 36, 0),
                FieldSpec::new("p1_voltage_swell_l1_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 52, 36, 0),
                FieldSpec::new("p1_voltage_swell_l2_count", Float),
            ),
            (
                ObisPattern::exact(1, 0, 72, 36, 0),
                FieldSpec::new("p1_voltage_swell_l3_count", Float),
            ),
            (
                ObisPattern::exact(0, 0, 96, 13, 1),
                FieldSpec::new("p1_user_message_numeric", OctetString),
            ),
            (
                ObisPattern::exact(0, 0, 96, 13, 0),
                FieldSpec::new("p1_user_message_text", OctetString),
            ),
            (
                ObisPattern::exact(1, 0, 31, 7, 0),
                FieldSpec::new("p1_current_l1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 51, 7, 0),
                FieldSpec::new("p1_current_l2", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 71, 7, 0),
                FieldSpec::new("p1_current_l3", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 32, 7, 0),
                FieldSpec::new("p1_voltage_l1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 52, 7, 0),
                FieldSpec::new("p1_voltage_l2", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 72, 7, 0),
                FieldSpec::new("p1_voltage_l3", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 21, 7, 0),
                FieldSpec::new("p1_actual_power_consuming_l1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 41, 7, 0),
                FieldSpec::new("p1_actual_power_consuming_l2", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 61, 7, 0),
                FieldSpec::new("p1_actual_power_consuming_l3", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 22, 7, 0),
                FieldSpec::new("p1_actual_power_producing_l1", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 42, 7, 0),
                FieldSpec::new("p1_actual_power_producing_l2", UnitFloat),
            ),
            (
                ObisPattern::exact(1, 0, 62, 7, 0),
                FieldSpec::new("p1_actual_power_producing_l3", UnitFloat),
            ),
            (
                ObisPattern::any_channel(0, 24, 1, 0),
                FieldSpec::new("p1_device_type", Float),
            ),
            (
                ObisPattern::any_channel(0, 96, 1, 0),
                FieldSpec::device_id("p1_gas_equipment_identifier", OctetString),
            ),
            (
                ObisPattern::any_channel(0, 24, 2, 1),
                FieldSpec::new("p1_gas_consumed", GasReading),
            ),
        ];

        for (pattern, spec) in defaults {
            self.register(*pattern, *spec)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p1::field::FieldKind;

    #[test]
    fn test_default_registry_size() {
        let registry = FieldRegistry::with_default_fields();
        assert_eq!(registry.len(), 36);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = FieldRegistry::new();
        let pattern = ObisPattern::exact(1, 0, 1, 8, 1);
        let spec = FieldSpec::new("energy", FieldDecoder::UnitFloat);

        registry.register(pattern, spec).unwrap();
        assert!(matches!(
            registry.register(pattern, spec),
            Err(P1Error::DuplicateRegistration(_))
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let registry = FieldRegistry::with_default_fields();
        assert!(matches!(
            registry.decode("1-0:98.76.5(00000)"),
            Err(P1Error::UnknownReference(_))
        ));
    }

    #[test]
    fn test_wildcard_channel_dispatch() {
        let registry = FieldRegistry::with_default_fields();

        let field = registry
            .decode("0-1:24.2.1(171105201000W)(00016.713*m3)")
            .unwrap();
        assert_eq!(field.channel(), 1);
        assert!(matches!(field.kind(), FieldKind::GasReading { .. }));

        let field = registry
            .decode("0-2:24.2.1(171105201000W)(00016.713*m3)")
            .unwrap();
        assert_eq!(field.channel(), 2);
    }

    #[test]
    fn test_first_match_prefers_registration_order() {
        // 0-0:96.1.1 is registered exactly before the 0-*:96.1.0 wildcard;
        // both channel-0 identifiers must resolve to their exact entries
        let registry = FieldRegistry::with_default_fields();
        let field = registry.decode("0-0:96.1.1(4530)").unwrap();
        assert_eq!(field.name(), "p1_equipment_identifier");
        let field = registry.decode("0-0:96.1.0(4530)").unwrap();
        assert_eq!(field.name(), "p1_gas_equipment_identifier");
    }
}
