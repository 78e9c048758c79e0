use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Wire-level unit for every push message: `{type, data, timestamp}`.
/// `type` is an open discriminator; anything the backend sends parses, and
/// classification happens afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEnvelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PushEnvelope {
    /// Alert-creation family: these carry a raw alert record in `data`.
    pub fn is_alert(&self) -> bool {
        matches!(self.kind.as_str(), "alert" | "new_alert")
    }

    pub fn is_update(&self) -> bool {
        self.kind == "update"
    }
}

pub fn parse_push_envelope(payload: &mut [u8]) -> Result<PushEnvelope, AppError> {
    let envelope: PushEnvelope = simd_json::serde::from_slice(payload)?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alert_envelope() {
        let mut payload =
            br#"{"type":"alert","data":{"severity":"high"},"timestamp":"2026-03-15T12:00:00"}"#
                .to_vec();
        let envelope = parse_push_envelope(&mut payload).expect("alert envelope should parse");

        assert!(envelope.is_alert());
        assert_eq!(envelope.data["severity"], "high");
        assert_eq!(envelope.timestamp.as_deref(), Some("2026-03-15T12:00:00"));
    }

    #[test]
    fn missing_type_parses_as_unclassified() {
        let mut payload = br#"{"data":{"x":1}}"#.to_vec();
        let envelope = parse_push_envelope(&mut payload).expect("typeless envelope should parse");

        assert_eq!(envelope.kind, "");
        assert!(!envelope.is_alert());
        assert!(!envelope.is_update());
    }

    #[test]
    fn rejects_non_json_payload() {
        let mut payload = b"not json at all".to_vec();
        assert!(parse_push_envelope(&mut payload).is_err());
    }

    #[test]
    fn new_alert_is_in_the_alert_family() {
        let mut payload = br#"{"type":"new_alert","data":{}}"#.to_vec();
        let envelope = parse_push_envelope(&mut payload).expect("envelope should parse");
        assert!(envelope.is_alert());
    }
}
