//! Header/framing properties exercised end-to-end at the crate boundary.

use kenning_proto::{Flags, FlowControl, MessageHeader, MessageType, ProtocolError};
use proptest::prelude::*;

fn arbitrary_message_type() -> impl Strategy<Value = MessageType> {
    (0u8..MessageType::COUNT).prop_map(|v| MessageType::try_from(v).unwrap())
}

fn arbitrary_flow_control() -> impl Strategy<Value = FlowControl> {
    (0u8..4).prop_map(|v| FlowControl::try_from(v).unwrap())
}

proptest! {
    #[test]
    fn header_encoding_is_little_endian_and_invertible(
        message_type in arbitrary_message_type(),
        flow_control in arbitrary_flow_control(),
        flags in any::<u16>(),
        payload_size in any::<u32>(),
    ) {
        let header = MessageHeader::new(message_type, flow_control, Flags::from_raw(flags), payload_size);
        let bytes = header.to_bytes();

        prop_assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), payload_size);
        prop_assert_eq!(u16::from_le_bytes(bytes[2..4].try_into().unwrap()), flags);

        let parsed = MessageHeader::from_bytes(&bytes).expect("round trip should parse");
        prop_assert_eq!(parsed.message_type().unwrap(), message_type);
        prop_assert_eq!(parsed.flow_control().unwrap(), flow_control);
        prop_assert_eq!(parsed.payload_size(), payload_size);
    }

    #[test]
    fn is_request_is_exactly_request_and_retransmit(raw in 0u8..4) {
        let flow = FlowControl::try_from(raw).unwrap();
        prop_assert_eq!(flow.is_request(), raw == 0 || raw == 1);
    }
}

#[test]
fn message_type_above_defined_set_is_flagged_on_access_not_decode() {
    let mut bytes = [0u8; MessageHeader::SIZE];
    bytes[0] = 13; // first value past MessageType::Logs
    let header = MessageHeader::from_bytes(&bytes).expect("header decode only checks length");
    assert!(matches!(header.message_type(), Err(ProtocolError::InvalidMessageType(13))));
}
