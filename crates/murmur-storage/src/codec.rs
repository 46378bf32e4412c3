// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record codec: typed values to and from their persisted string form.
//!
//! Every record is wrapped in a versioned envelope, `{"v":1,"data":...}`.
//! Field schemas come from the serde derives on the domain types, and
//! timestamps encode as tagged `{"$ts": ...}` objects so they decode back
//! into real points in time.

use serde::Serialize;
use serde::de::DeserializeOwned;

use murmur_core::MurmurError;

/// Envelope version written by [`encode`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    v: u32,
    data: &'a T,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    v: u32,
    data: serde_json::Value,
}

/// Encode `value` into its persisted representation.
pub fn encode<T: Serialize>(value: &T) -> Result<String, MurmurError> {
    serde_json::to_string(&EnvelopeRef {
        v: FORMAT_VERSION,
        data: value,
    })
    .map_err(|e| serialization("failed to encode record", e))
}

/// Decode a persisted representation back into `T`.
///
/// Malformed input, an unknown envelope version, or data that does not fit
/// `T` all yield [`MurmurError::Serialization`].
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, MurmurError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| serialization("malformed record envelope", e))?;
    if envelope.v != FORMAT_VERSION {
        return Err(MurmurError::Serialization {
            message: format!("unsupported record version {}", envelope.v),
            source: None,
        });
    }
    serde_json::from_value(envelope.data).map_err(|e| serialization("failed to decode record", e))
}

fn serialization(context: &str, e: serde_json::Error) -> MurmurError {
    MurmurError::Serialization {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{
        Attachment, AttachmentKind, Conversation, Draft, GenerationMetadata, Message, Role,
        Specialist, Timestamp,
    };
    use proptest::prelude::*;

    fn sample_conversation() -> Conversation {
        let created = Timestamp::from_parts(1_760_000_000, 123_456_789).unwrap();
        let mut conv = Conversation::new("c-1", "Trip planning", Some(Specialist::Research), created);
        conv.messages.push(Message {
            id: "m-1".into(),
            role: Role::User,
            content: "Find flights to Lisbon".into(),
            timestamp: Timestamp::from_parts(1_760_000_001, 1).unwrap(),
            attachments: vec![Attachment {
                id: "a-1".into(),
                name: "itinerary.pdf".into(),
                mime_type: "application/pdf".into(),
                kind: AttachmentKind::Document,
                size_bytes: 2048,
                uri: "file:///tmp/itinerary.pdf".into(),
                upload_progress: 100,
            }],
            metadata: None,
            is_typing: false,
        });
        conv.messages.push(Message {
            id: "m-2".into(),
            role: Role::Assistant,
            content: "Here are three options.".into(),
            timestamp: Timestamp::from_parts(1_760_000_002, 999_999_999).unwrap(),
            attachments: Vec::new(),
            metadata: Some(GenerationMetadata {
                model: Some("local-small".into()),
                tokens_used: 42,
            }),
            is_typing: false,
        });
        conv.message_count = 2;
        conv.tokens_used = 42;
        conv.tags.insert("travel".into());
        conv.is_favorite = true;
        conv.owner_id = Some("user-9".into());
        conv.touch(Timestamp::from_parts(1_760_000_002, 999_999_999).unwrap());
        conv
    }

    #[test]
    fn conversation_round_trips_exactly() {
        let conv = sample_conversation();
        let encoded = encode(&conv).unwrap();
        let decoded: Conversation = decode(&encoded).unwrap();
        assert_eq!(decoded, conv);
        assert_eq!(decoded.messages[1].timestamp, conv.messages[1].timestamp);
    }

    #[test]
    fn timestamps_are_tagged_in_the_envelope() {
        let draft = Draft {
            text: "half a thought".into(),
            saved_at: Timestamp::from_parts(1_700_000_000, 5_000_000).unwrap(),
        };
        let encoded = encode(&draft).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["v"], 1);
        assert!(value["data"]["saved_at"]["$ts"].is_string());
    }

    #[test]
    fn bare_string_timestamp_is_rejected() {
        let raw = r#"{"v":1,"data":{"text":"x","saved_at":"2026-01-01T00:00:00Z"}}"#;
        let result: Result<Draft, _> = decode(raw);
        assert!(matches!(result, Err(MurmurError::Serialization { .. })));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let raw = r#"{"v":2,"data":{}}"#;
        let err = decode::<Draft>(raw).unwrap_err();
        assert!(err.to_string().contains("unsupported record version 2"));
    }

    #[test]
    fn garbage_input_is_a_serialization_error() {
        for raw in ["", "not json", "{", r#"{"data":{}}"#, "[1,2,3]"] {
            let result = decode::<Conversation>(raw);
            assert!(
                matches!(result, Err(MurmurError::Serialization { .. })),
                "input {raw:?} should fail cleanly"
            );
        }
    }

    #[test]
    fn typing_flag_is_not_written() {
        let mut conv = sample_conversation();
        conv.messages[1].is_typing = true;
        let encoded = encode(&conv).unwrap();
        assert!(!encoded.contains("is_typing"));
        let decoded: Conversation = decode(&encoded).unwrap();
        assert!(!decoded.messages[1].is_typing);
    }

    proptest! {
        #[test]
        fn arbitrary_conversations_round_trip(
            secs in 0i64..4_000_000_000,
            nanos in 0u32..1_000_000_000,
            title in "\\PC{0,40}",
            contents in proptest::collection::vec("\\PC{0,60}", 0..6),
            tags in proptest::collection::btree_set("[a-z]{1,8}", 0..4),
            favorite in any::<bool>(),
            archived in any::<bool>(),
        ) {
            let base = Timestamp::from_parts(secs, nanos).unwrap();
            let mut conv = Conversation::new("c-prop", title, None, base);
            for (i, content) in contents.into_iter().enumerate() {
                conv.messages.push(Message {
                    id: format!("m-{i}"),
                    role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                    content,
                    timestamp: Timestamp::from_parts(secs + i as i64, nanos).unwrap(),
                    attachments: Vec::new(),
                    metadata: None,
                    is_typing: false,
                });
            }
            conv.message_count = conv.messages.len();
            conv.tags = tags;
            conv.is_favorite = favorite;
            conv.is_archived = archived;

            let decoded: Conversation = decode(&encode(&conv).unwrap()).unwrap();
            prop_assert_eq!(decoded, conv);
        }
    }
}
