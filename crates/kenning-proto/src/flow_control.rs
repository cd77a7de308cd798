//! Flow-control class carried in the top two bits of header byte 0.

use crate::error::ProtocolError;

/// The 2-bit flow-control class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlowControl {
    /// A request originated by the host, expecting a response.
    Request = 0,
    /// A host-initiated retry of a request. Reserved: nothing in this
    /// implementation produces it, but receivers treat it like `Request`.
    RequestRetransmit = 1,
    /// A bare acknowledgement, carrying no payload semantics of its own.
    Acknowledge = 2,
    /// A device-originated response or log-forwarding message.
    Transmission = 3,
}

impl FlowControl {
    /// Short diagnostic name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::RequestRetransmit => "REQUEST_RETRANSMIT",
            Self::Acknowledge => "ACKNOWLEDGE",
            Self::Transmission => "TRANSMISSION",
        }
    }

    /// Whether this flow-control value marks a request awaiting a response.
    ///
    /// Bound explicitly to `Request | RequestRetransmit` rather than left
    /// implicit, per the protocol's own design note.
    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(self, Self::Request | Self::RequestRetransmit)
    }
}

impl TryFrom<u8> for FlowControl {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Request),
            1 => Ok(Self::RequestRetransmit),
            2 => Ok(Self::Acknowledge),
            3 => Ok(Self::Transmission),
            other => Err(ProtocolError::InvalidFlowControl(other)),
        }
    }
}

impl From<FlowControl> for u8 {
    fn from(value: FlowControl) -> Self {
        value as Self
    }
}
