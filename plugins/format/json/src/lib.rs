use relay_api::{Codec, RawRecord, RelayError};

/// Record decoder для строк устройства: `{"topic":"..","payload":".."}`.
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, data: &[u8]) -> Result<RawRecord, RelayError> {
        let s = std::str::from_utf8(data)?;
        let record: RawRecord = serde_json::from_str(s)?;
        if record.topic.is_empty() {
            return Err(RelayError::format_err("JSON codec: empty topic"));
        }
        Ok(record)
    }

    fn encode(&self, record: &RawRecord) -> Result<Vec<u8>, RelayError> {
        Ok(serde_json::to_vec(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_api::ErrorKind;

    #[test]
    fn decodes_device_line() {
        let rec = JsonCodec.decode(br#"{"topic":"water","payload":"{\"t\":1}"}"#).unwrap();
        assert_eq!(rec.topic, "water");
        assert_eq!(rec.payload, r#"{"t":1}"#);
    }

    #[test]
    fn malformed_lines_are_format_errors() {
        for line in [
            &b"not json"[..],
            br#"{"payload":"x"}"#,
            br#"{"topic":"","payload":"x"}"#,
            b"\xff\xfe",
        ] {
            let err = JsonCodec.decode(line).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{line:?}");
        }
    }

    #[test]
    fn encodes_same_shape_as_input() {
        let bytes = JsonCodec.encode(&RawRecord::new("rpm", r#"{"r":5}"#)).unwrap();
        assert_eq!(bytes, br#"{"topic":"rpm","payload":"{\"r\":5}"}"#);
    }
}
