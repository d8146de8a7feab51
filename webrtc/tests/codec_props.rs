//! Property tests for the signaling codec

use proptest::prelude::*;
use reflect_webrtc::{
    signal::{decode, encode},
    ReflectError, SdpKind, SessionPayload, SignalEnvelope,
};

fn sdp_kind() -> impl Strategy<Value = SdpKind> {
    prop_oneof![
        Just(SdpKind::Offer),
        Just(SdpKind::Pranswer),
        Just(SdpKind::Answer),
        Just(SdpKind::Rollback),
    ]
}

fn envelope() -> impl Strategy<Value = SignalEnvelope> {
    (sdp_kind(), any::<String>(), any::<String>())
        .prop_map(|(kind, sdp, uuid)| SignalEnvelope::new(SessionPayload::new(kind, sdp), uuid))
}

proptest! {
    #[test]
    fn decode_inverts_encode(original in envelope()) {
        let text = encode(&original).unwrap();
        let decoded: SignalEnvelope = decode(&text).unwrap();
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn encoding_is_canonical(original in envelope()) {
        let text = encode(&original).unwrap();
        let decoded: SignalEnvelope = decode(&text).unwrap();
        prop_assert_eq!(encode(&decoded).unwrap(), text);
    }

    #[test]
    fn envelope_without_payload_never_decodes(uuid in any::<String>()) {
        let text = serde_json::json!({ "uuid": uuid }).to_string();
        let result = decode::<SignalEnvelope>(&text);
        prop_assert!(matches!(result, Err(ReflectError::Decode(_))));
    }

    #[test]
    fn truncated_text_never_decodes(original in envelope(), cut in 1usize..16) {
        let text = encode(&original).unwrap();
        let mut end = text.len().saturating_sub(cut);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = &text[..end];
        prop_assert!(decode::<SignalEnvelope>(truncated).is_err());
    }
}
