use super::record::{TelemetryRecord, Vector3};
use thiserror::Error;

pub const PACKET_START: char = '<';
pub const PACKET_END: char = '>';
pub const FIELD_SEPARATOR: char = ',';
pub const FIELD_COUNT: usize = 16;

/// Positional field names, used in diagnostics.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "n", "lat", "lng", "alt", "pres", "temp", "ax", "ay", "az", "gx", "gy", "gz", "mx", "my", "mz",
    "parachute",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line is not wrapped in a packet envelope")]
    MissingEnvelope,
    #[error("expected {expected} fields, found {actual}")]
    FieldCount { expected: usize, actual: usize },
    #[error("field {index} ({name}) is not valid: {value:?}")]
    InvalidField {
        index: usize,
        name: &'static str,
        value: String,
    },
}

/// Returns the packet body if `line` carries the `<...>` envelope.
pub fn strip_envelope(line: &str) -> Option<&str> {
    line.strip_prefix(PACKET_START)?.strip_suffix(PACKET_END)
}

/// Decodes one already-trimmed line into a record.
///
/// Either every one of the sixteen fields converts or the whole packet is
/// rejected; no partially filled record is ever returned. `nan` and `inf`
/// parse as floats but are rejected, since no sensor reports them and JSON
/// cannot carry them.
pub fn decode_packet(line: &str) -> Result<TelemetryRecord, DecodeError> {
    let body = strip_envelope(line).ok_or(DecodeError::MissingEnvelope)?;
    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::FieldCount {
            expected: FIELD_COUNT,
            actual: fields.len(),
        });
    }

    let float = |index: usize| -> Result<f64, DecodeError> {
        fields[index]
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| invalid(index, fields[index]))
    };
    let vector = |first: usize| -> Result<Vector3, DecodeError> {
        Ok(Vector3::new(float(first)?, float(first + 1)?, float(first + 2)?))
    };

    let sequence = fields[0]
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(0, fields[0]))?;

    Ok(TelemetryRecord {
        sequence,
        latitude: float(1)?,
        longitude: float(2)?,
        altitude: float(3)?,
        pressure: float(4)?,
        temperature: float(5)?,
        acceleration: vector(6)?,
        angular_rate: vector(9)?,
        magnetic_field: vector(12)?,
        parachute_deployed: parse_parachute(fields[15]),
    })
}

/// Only the literal `true` (any case, surrounding whitespace ignored) means deployed.
pub fn parse_parachute(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case("true")
}

fn invalid(index: usize, value: &str) -> DecodeError {
    DecodeError::InvalidField {
        index,
        name: FIELD_NAMES[index],
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str =
        "<12,19.5,-99.1,305.2,1002.3,24.1,0.01,0.02,9.81,0.1,0.2,0.3,20.1,5.2,-3.4,true>";

    fn with_parachute(text: &str) -> String {
        format!("<1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,{}>", text)
    }

    #[test]
    fn decodes_reference_packet() {
        let record = decode_packet(REFERENCE).unwrap();
        assert_eq!(record.sequence, 12);
        assert_eq!(record.latitude, 19.5);
        assert_eq!(record.longitude, -99.1);
        assert_eq!(record.altitude, 305.2);
        assert_eq!(record.pressure, 1002.3);
        assert_eq!(record.temperature, 24.1);
        assert_eq!(record.acceleration, Vector3::new(0.01, 0.02, 9.81));
        assert_eq!(record.angular_rate, Vector3::new(0.1, 0.2, 0.3));
        assert_eq!(record.magnetic_field, Vector3::new(20.1, 5.2, -3.4));
        assert!(record.parachute_deployed);
    }

    #[test]
    fn formatted_record_decodes_to_itself() {
        let record = decode_packet(REFERENCE).unwrap();
        assert_eq!(record.to_string(), REFERENCE);

        let mut odd = record;
        odd.latitude = -0.000123456789;
        odd.pressure = 1.0e-7;
        odd.magnetic_field.z = 123456789.125;
        odd.parachute_deployed = false;
        assert_eq!(decode_packet(&odd.to_string()).unwrap(), odd);
    }

    #[test]
    fn rejects_lines_without_envelope() {
        assert_eq!(
            decode_packet("hello world"),
            Err(DecodeError::MissingEnvelope)
        );
        assert_eq!(
            decode_packet(REFERENCE.trim_end_matches('>')),
            Err(DecodeError::MissingEnvelope)
        );
        assert_eq!(
            decode_packet(REFERENCE.trim_start_matches('<')),
            Err(DecodeError::MissingEnvelope)
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(
            decode_packet("<1,2,3>"),
            Err(DecodeError::FieldCount {
                expected: 16,
                actual: 3
            })
        );
        assert_eq!(
            decode_packet("<>"),
            Err(DecodeError::FieldCount {
                expected: 16,
                actual: 1
            })
        );
        let seventeen = REFERENCE.replace(",true>", ",true,1>");
        assert!(matches!(
            decode_packet(&seventeen),
            Err(DecodeError::FieldCount { actual: 17, .. })
        ));
    }

    #[test]
    fn non_numeric_field_discards_whole_packet() {
        let bad = REFERENCE.replace("1002.3", "abc");
        assert_eq!(
            decode_packet(&bad),
            Err(DecodeError::InvalidField {
                index: 4,
                name: "pres",
                value: "abc".into()
            })
        );

        let empty_mag = REFERENCE.replace("-3.4", "");
        assert!(matches!(
            decode_packet(&empty_mag),
            Err(DecodeError::InvalidField { index: 14, .. })
        ));
    }

    #[test]
    fn sequence_must_be_a_non_negative_integer() {
        for bad in ["-1", "1.5", "x"] {
            let line = REFERENCE.replacen("12", bad, 1);
            assert!(
                matches!(
                    decode_packet(&line),
                    Err(DecodeError::InvalidField { index: 0, .. })
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn fields_tolerate_surrounding_whitespace() {
        let padded = "< 3 , 1.0,2.0 ,3,4,5,6,7,8,9,10,11,12,13,14, TRUE >";
        let record = decode_packet(padded).unwrap();
        assert_eq!(record.sequence, 3);
        assert_eq!(record.longitude, 2.0);
        assert!(record.parachute_deployed);
    }

    #[test]
    fn parachute_is_true_only_for_literal_true() {
        for deployed in ["true", "TRUE", "True", " tRuE "] {
            assert!(
                decode_packet(&with_parachute(deployed))
                    .unwrap()
                    .parachute_deployed,
                "{deployed:?}"
            );
        }
        for stowed in ["False", "false", "1", "", "verdadero", "truee", "yes"] {
            assert!(
                !decode_packet(&with_parachute(stowed))
                    .unwrap()
                    .parachute_deployed,
                "{stowed:?}"
            );
        }
    }

    #[test]
    fn duplicate_and_gapped_sequences_are_accepted() {
        let first = decode_packet(&with_parachute("false")).unwrap();
        let again = decode_packet(&with_parachute("false")).unwrap();
        assert_eq!(first.sequence, again.sequence);
        let jump = decode_packet("<4000000000,0,0,0,0,0,0,0,0,0,0,0,0,0,0,false>").unwrap();
        assert_eq!(jump.sequence, 4_000_000_000);
        let wide = decode_packet("<4294967296,0,0,0,0,0,0,0,0,0,0,0,0,0,0,false>").unwrap();
        assert_eq!(wide.sequence, 4_294_967_296);
    }

    #[test]
    fn non_finite_readings_discard_whole_packet() {
        let nan_lat = REFERENCE.replacen("19.5", "nan", 1);
        assert_eq!(
            decode_packet(&nan_lat),
            Err(DecodeError::InvalidField {
                index: 1,
                name: "lat",
                value: "nan".into()
            })
        );
        for bad in ["inf", "-inf", "infinity", "NaN"] {
            let line = REFERENCE.replacen("305.2", bad, 1);
            assert!(
                matches!(
                    decode_packet(&line),
                    Err(DecodeError::InvalidField { index: 3, .. })
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn decoded_record_always_serializes_to_json_numbers() {
        let record = decode_packet(REFERENCE).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("null"), "{json}");
        assert!(serde_json::from_str::<TelemetryRecord>(&json).is_ok());
    }
}
