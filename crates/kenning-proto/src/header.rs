//! Fixed 8-byte message header, little-endian.
//!
//! Layout:
//! ```text
//! byte 0     : bits 0..5 = message_type, bits 6..7 = flow_control
//! byte 1     : checksum (reserved, always 0 on emit)
//! bytes 2..3 : flags (little-endian u16)
//! bytes 4..7 : payload_size (little-endian u32)
//! ```

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Flags, FlowControl, MessageType, error::ProtocolError};

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawHeader {
    type_and_flow: u8,
    checksum: u8,
    flags: [u8; 2],
    payload_size: [u8; 4],
}

/// The 8-byte message header.
#[derive(Clone, Copy)]
pub struct MessageHeader {
    raw: RawHeader,
}

impl MessageHeader {
    /// Size of the serialized header in bytes.
    pub const SIZE: usize = 8;

    /// Build a new header.
    ///
    /// `checksum` is always emitted as 0 (reserved field, never computed by
    /// this protocol).
    #[must_use]
    pub fn new(
        message_type: MessageType,
        flow_control: FlowControl,
        flags: Flags,
        payload_size: u32,
    ) -> Self {
        let type_and_flow = u8::from(message_type) | (u8::from(flow_control) << 6);
        Self {
            raw: RawHeader {
                type_and_flow,
                checksum: 0,
                flags: flags.raw().to_le_bytes(),
                payload_size: payload_size.to_le_bytes(),
            },
        }
    }

    /// Parse a header from the first [`Self::SIZE`] bytes of `bytes`.
    ///
    /// This only checks that enough bytes are present; an out-of-range
    /// `message_type` is reported later by [`Self::message_type`], since the
    /// protocol engine still needs `payload_size` from a header carrying an
    /// invalid type in order to drain the offending payload.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::HeaderTooShort`] if fewer than 8 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (raw, _rest) = RawHeader::read_from_prefix(bytes).map_err(|_| {
            ProtocolError::HeaderTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        Ok(Self { raw })
    }

    /// Serialize the header to its 8-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = self.raw.as_bytes();
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// The message type. Always `Ok` for a header returned by
    /// [`Self::from_bytes`] or [`Self::new`].
    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        MessageType::try_from(self.raw.type_and_flow & 0x3f)
    }

    /// The flow-control class.
    pub fn flow_control(&self) -> Result<FlowControl, ProtocolError> {
        FlowControl::try_from(self.raw.type_and_flow >> 6)
    }

    /// The reserved checksum byte. Always 0 unless constructed otherwise.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.raw.checksum
    }

    /// Override the checksum byte. Exists as an extension point; nothing in
    /// this protocol computes or verifies it.
    pub fn set_checksum(&mut self, checksum: u8) {
        self.raw.checksum = checksum;
    }

    /// The 16-bit flags field.
    #[must_use]
    pub fn flags(&self) -> Flags {
        Flags::from_raw(u16::from_le_bytes(self.raw.flags))
    }

    /// Overwrite the flags field.
    pub fn set_flags(&mut self, flags: Flags) {
        self.raw.flags = flags.raw().to_le_bytes();
    }

    /// The payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_le_bytes(self.raw.payload_size)
    }

    /// Overwrite the payload size field.
    pub fn set_payload_size(&mut self, payload_size: u32) {
        self.raw.payload_size = payload_size.to_le_bytes();
    }
}

impl std::fmt::Debug for MessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHeader")
            .field("message_type", &self.message_type())
            .field("flow_control", &self.flow_control())
            .field("checksum", &self.checksum())
            .field("flags", &self.flags())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}

impl PartialEq for MessageHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for MessageHeader {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::MessageType;

    impl Arbitrary for MessageHeader {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            (0u8..MessageType::COUNT, 0u8..4, any::<u16>(), any::<u32>())
                .prop_map(|(message_type, flow_control, flags, payload_size)| {
                    let message_type = MessageType::try_from(message_type).unwrap();
                    let flow_control = FlowControl::try_from(flow_control).unwrap();
                    Self::new(message_type, flow_control, Flags::from_raw(flags), payload_size)
                })
                .boxed()
        }
    }

    #[test]
    fn header_size_is_eight_bytes() {
        assert_eq!(MessageHeader::SIZE, 8);
    }

    proptest! {
        #[test]
        fn header_round_trip(header in any::<MessageHeader>()) {
            let bytes = header.to_bytes();
            let parsed = MessageHeader::from_bytes(&bytes).expect("should parse");
            prop_assert_eq!(header, parsed);
        }
    }

    #[test]
    fn little_endian_layout() {
        let header = MessageHeader::new(
            MessageType::Iospec,
            FlowControl::Transmission,
            Flags::EMPTY,
            0x0403_0201,
        );
        let bytes = header.to_bytes();
        // byte0: type=7, flow=3 -> 0b11_000111 = 0xC7
        assert_eq!(bytes[0], 0b1100_0111);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2..4], [0, 0]);
        assert_eq!(bytes[4..8], [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn rejects_short_buffer() {
        let short = [0u8; 4];
        assert!(matches!(
            MessageHeader::from_bytes(&short),
            Err(ProtocolError::HeaderTooShort { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn decodes_but_flags_invalid_message_type_on_access() {
        let mut bytes = [0u8; 8];
        bytes[0] = 63; // type=63, out of range
        let header = MessageHeader::from_bytes(&bytes).expect("header itself decodes");
        assert!(matches!(header.message_type(), Err(ProtocolError::InvalidMessageType(63))));
    }
}
