//! Decode cascade
//!
//! Classifies a payload by trial, in a fixed order:
//!
//! 1. absent payload: [`DecodeOutcome::Empty`]
//! 2. each registry candidate in order; the first that parses wins
//! 3. strict UTF-8 followed by a JSON parse
//! 4. raw capture (lossy text, hex, base64)
//!
//! [`classify`] is total. A candidate rejecting the bytes is an ordinary
//! branch, and the raw capture is built only from encodings defined for
//! every byte sequence, so step 4 cannot fail.
//!
//! Winning a step means "the first interpretation that accepted the bytes".
//! Binary schemas are not self-describing and can mis-parse as the wrong
//! type; the candidate order is a prior, not a proof.

use base64::{engine::general_purpose::STANDARD, Engine};
use blockhouse_schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome kind recorded for structured-text payloads.
pub const STRUCTURED_TEXT_KIND: &str = "JSON";
/// Outcome kind recorded for raw captures.
pub const RAW_CAPTURE_KIND: &str = "Raw";
/// Outcome kind recorded for absent payloads.
pub const EMPTY_KIND: &str = "Empty";
/// Outcome kind recorded when an outcome carries no usable name.
pub const UNKNOWN_KIND: &str = "Unknown";

/// Three renderings of the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapture {
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    pub string: String,
    /// Lowercase hex.
    pub hex: String,
    /// Standard, padded base64.
    pub base64: String,
}

impl RawCapture {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            string: String::from_utf8_lossy(bytes).into_owned(),
            hex: hex::encode(bytes),
            base64: STANDARD.encode(bytes),
        }
    }
}

/// The single classification of one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Parsed by the named registry candidate.
    SchemaType { name: String, value: Value },
    /// UTF-8 text holding a JSON document.
    StructuredText(Value),
    /// Nothing understood the bytes; kept verbatim.
    RawCapture(RawCapture),
    /// The message had no payload.
    Empty,
}

impl DecodeOutcome {
    /// Tag recorded as the record's `message_type`.
    pub fn kind(&self) -> &str {
        match self {
            DecodeOutcome::SchemaType { name, .. } if name.is_empty() => UNKNOWN_KIND,
            DecodeOutcome::SchemaType { name, .. } => name,
            DecodeOutcome::StructuredText(_) => STRUCTURED_TEXT_KIND,
            DecodeOutcome::RawCapture(_) => RAW_CAPTURE_KIND,
            DecodeOutcome::Empty => EMPTY_KIND,
        }
    }

    pub fn is_schema_decoded(&self) -> bool {
        matches!(self, DecodeOutcome::SchemaType { .. })
    }

    /// Whether the payload was understood.
    ///
    /// A raw capture is stored but not understood, so it counts as
    /// unsuccessful, as does an empty payload.
    pub fn decode_succeeded(&self) -> bool {
        matches!(
            self,
            DecodeOutcome::SchemaType { .. } | DecodeOutcome::StructuredText(_)
        )
    }

    /// The outcome's value as a JSON document. `Empty` renders as `{}`.
    pub fn summary_value(&self) -> Value {
        match self {
            DecodeOutcome::SchemaType { value, .. } => value.clone(),
            DecodeOutcome::StructuredText(value) => value.clone(),
            DecodeOutcome::RawCapture(raw) => json!({
                "string": raw.string,
                "hex": raw.hex,
                "base64": raw.base64,
            }),
            DecodeOutcome::Empty => json!({}),
        }
    }

    /// Serialized summary stored in `decoded_data`. Size is not capped.
    pub fn summary(&self) -> String {
        self.summary_value().to_string()
    }
}

/// Classify `payload` against `registry`. Never fails.
pub fn classify(payload: Option<&[u8]>, registry: &SchemaRegistry) -> DecodeOutcome {
    let Some(bytes) = payload else {
        return DecodeOutcome::Empty;
    };

    for candidate in registry.candidates() {
        match candidate.decode(bytes) {
            Ok(value) => {
                return DecodeOutcome::SchemaType {
                    name: candidate.name().to_string(),
                    value,
                };
            }
            Err(e) => {
                tracing::debug!(candidate = candidate.name(), error = %e, "schema candidate rejected payload");
            }
        }
    }

    if let Some(value) = parse_structured_text(bytes) {
        return DecodeOutcome::StructuredText(value);
    }

    DecodeOutcome::RawCapture(RawCapture::from_bytes(bytes))
}

fn parse_structured_text(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?;
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockhouse_schema::{DecodeError, SchemaCandidate};
    use std::sync::Arc;

    /// Accepts payloads starting with `prefix`.
    struct PrefixCandidate {
        name: &'static str,
        prefix: &'static [u8],
    }

    impl SchemaCandidate for PrefixCandidate {
        fn name(&self) -> &str {
            self.name
        }

        fn decode(&self, payload: &[u8]) -> Result<Value, DecodeError> {
            if payload.starts_with(self.prefix) {
                Ok(json!({ "len": payload.len() }))
            } else {
                Err(DecodeError::WireFormat("prefix mismatch".to_string()))
            }
        }
    }

    fn registry(candidates: Vec<PrefixCandidate>) -> SchemaRegistry {
        SchemaRegistry::from_candidates(
            candidates
                .into_iter()
                .map(|c| Arc::new(c) as Arc<dyn SchemaCandidate>)
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_absent_payload_is_empty() {
        let outcome = classify(None, &SchemaRegistry::empty());
        assert_eq!(outcome, DecodeOutcome::Empty);
        assert_eq!(outcome.kind(), "Empty");
        assert!(!outcome.is_schema_decoded());
        assert!(!outcome.decode_succeeded());
        assert_eq!(outcome.summary(), "{}");
    }

    #[test]
    fn test_first_accepting_candidate_wins() {
        let reg = registry(vec![
            PrefixCandidate { name: "Block", prefix: b"BLK" },
            PrefixCandidate { name: "Tx", prefix: b"B" },
        ]);
        let outcome = classify(Some(&b"BLK-1"[..]), &reg);
        assert_eq!(outcome.kind(), "Block");

        let outcome = classify(Some(&b"BX"[..]), &reg);
        assert_eq!(outcome.kind(), "Tx");
        assert!(outcome.is_schema_decoded());
        assert!(outcome.decode_succeeded());
    }

    #[test]
    fn test_rejected_by_all_candidates_falls_back_to_json() {
        let reg = registry(vec![PrefixCandidate { name: "Block", prefix: b"BLK" }]);
        let outcome = classify(Some(&br#"{"a":1}"#[..]), &reg);
        assert_eq!(outcome, DecodeOutcome::StructuredText(json!({"a": 1})));
        assert_eq!(outcome.kind(), "JSON");
        assert!(outcome.decode_succeeded());
        assert!(!outcome.is_schema_decoded());
    }

    #[test]
    fn test_json_scalars_are_structured_text() {
        let outcome = classify(Some(&b"42"[..]), &SchemaRegistry::empty());
        assert_eq!(outcome, DecodeOutcome::StructuredText(json!(42)));
    }

    #[test]
    fn test_plain_text_is_raw() {
        let outcome = classify(Some(&b"hello world"[..]), &SchemaRegistry::empty());
        match outcome {
            DecodeOutcome::RawCapture(raw) => {
                assert_eq!(raw.string, "hello world");
                assert_eq!(raw.hex, "68656c6c6f20776f726c64");
                assert_eq!(raw.base64, "aGVsbG8gd29ybGQ=");
            }
            other => panic!("expected raw capture, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_raw_with_lossy_string() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        let outcome = classify(Some(&bytes[..]), &SchemaRegistry::empty());
        assert_eq!(outcome.kind(), "Raw");
        assert!(!outcome.decode_succeeded());
        assert!(!outcome.is_schema_decoded());
        match outcome {
            DecodeOutcome::RawCapture(raw) => {
                assert_eq!(raw.hex, "deadbeef");
                assert_eq!(raw.base64, "3q2+7w==");
                assert!(raw.string.contains('\u{FFFD}'));
            }
            other => panic!("expected raw capture, got {:?}", other),
        }
    }

    #[test]
    fn test_present_but_empty_payload_is_not_empty_outcome() {
        let outcome = classify(Some(&[][..]), &SchemaRegistry::empty());
        assert_eq!(outcome.kind(), "Raw");

        let reg = registry(vec![PrefixCandidate { name: "Any", prefix: b"" }]);
        assert_eq!(classify(Some(&[][..]), &reg).kind(), "Any");
    }

    #[test]
    fn test_raw_summary_shape() {
        let outcome = DecodeOutcome::RawCapture(RawCapture::from_bytes(b"\x01"));
        let summary: Value = serde_json::from_str(&outcome.summary()).unwrap();
        assert_eq!(summary["hex"], "01");
        assert_eq!(summary["base64"], "AQ==");
        assert_eq!(summary["string"], "\u{1}");
    }

    #[test]
    fn test_unnamed_schema_outcome_is_unknown() {
        let outcome = DecodeOutcome::SchemaType {
            name: String::new(),
            value: json!({}),
        };
        assert_eq!(outcome.kind(), UNKNOWN_KIND);
    }
}
