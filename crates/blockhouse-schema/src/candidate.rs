//! Schema candidates
//!
//! A candidate is one named binary decoder the cascade may try against a
//! payload. Payloads carry no type tag, so a successful decode only means the
//! bytes were structurally valid for that type.

use prost_reflect::{DynamicMessage, MessageDescriptor, SerializeOptions};
use serde_json::Value;

use crate::error::DecodeError;

/// One named binary decoder.
pub trait SchemaCandidate: Send + Sync {
    /// Name recorded as the outcome kind when this candidate wins.
    fn name(&self) -> &str;

    /// Interpret `payload` as this type and render it as a JSON value.
    fn decode(&self, payload: &[u8]) -> Result<Value, DecodeError>;
}

/// A protobuf message type resolved from a descriptor pool.
///
/// Rendering follows the shape downstream queries expect: 64-bit integers as
/// strings, enums by name, bytes as base64 and every field present, defaults
/// included.
#[derive(Debug, Clone)]
pub struct ProtobufCandidate {
    name: String,
    descriptor: MessageDescriptor,
}

impl ProtobufCandidate {
    /// Wrap a message descriptor. The candidate is named after the message's
    /// short name (`ConfirmedBlock`, not `solana.storage.ConfirmedBlock.ConfirmedBlock`).
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            descriptor,
        }
    }

    /// Fully-qualified protobuf name of the message type.
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    fn serialize_options() -> SerializeOptions {
        SerializeOptions::new()
            .stringify_64_bit_integers(true)
            .use_enum_numbers(false)
            .skip_default_fields(false)
    }
}

impl SchemaCandidate for ProtobufCandidate {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, payload: &[u8]) -> Result<Value, DecodeError> {
        let message = DynamicMessage::decode(self.descriptor.clone(), payload)?;
        let value =
            message.serialize_with_options(serde_json::value::Serializer, &Self::serialize_options())?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_reflect::DescriptorPool;
    use prost_types::{
        field_descriptor_proto::{Label, Type},
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    };

    fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn test_pool() -> DescriptorPool {
        let file = FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Slot".to_string()),
                field: vec![
                    field("slot", 1, Type::Uint64),
                    field("label", 2, Type::String),
                    field("hash", 3, Type::Bytes),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
    }

    fn slot_candidate() -> ProtobufCandidate {
        let pool = test_pool();
        ProtobufCandidate::new(pool.get_message_by_name("test.Slot").unwrap())
    }

    #[test]
    fn test_name_is_short_name() {
        let candidate = slot_candidate();
        assert_eq!(candidate.name(), "Slot");
        assert_eq!(candidate.full_name(), "test.Slot");
    }

    #[test]
    fn test_decode_renders_longs_as_strings_and_bytes_as_base64() {
        let candidate = slot_candidate();
        let mut message = DynamicMessage::new(candidate.descriptor.clone());
        message.set_field_by_name("slot", prost_reflect::Value::U64(42));
        message.set_field_by_name(
            "hash",
            prost_reflect::Value::Bytes(prost::bytes::Bytes::from_static(&[0xde, 0xad])),
        );
        let bytes = message.encode_to_vec();

        let value = candidate.decode(&bytes).unwrap();
        assert_eq!(value["slot"], "42");
        assert_eq!(value["hash"], "3q0=");
        // Defaults are rendered too.
        assert_eq!(value["label"], "");
    }

    #[test]
    fn test_decode_empty_payload_yields_defaults() {
        let candidate = slot_candidate();
        let value = candidate.decode(&[]).unwrap();
        assert_eq!(value["slot"], "0");
    }

    #[test]
    fn test_decode_truncated_varint_fails() {
        let candidate = slot_candidate();
        // Field 1 (varint) with a continuation bit and nothing after it.
        let result = candidate.decode(&[0x08, 0xff]);
        assert!(matches!(result, Err(DecodeError::WireFormat(_))));
    }

    #[test]
    fn test_decode_invalid_utf8_string_fails() {
        let candidate = slot_candidate();
        // Field 2 (length-delimited string) holding 0xff.
        let result = candidate.decode(&[0x12, 0x01, 0xff]);
        assert!(result.is_err());
    }
}
