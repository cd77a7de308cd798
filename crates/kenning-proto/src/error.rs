//! Wire-format errors: malformed headers and out-of-range tag values.

use thiserror::Error;

/// Errors raised while decoding a header or its tagged fields.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than [`crate::MessageHeader::SIZE`] bytes were available.
    #[error("header truncated: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// `message_type` field did not name a defined message type.
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    /// `flow_control` field did not name a defined flow-control class.
    #[error("invalid flow control value: {0}")]
    InvalidFlowControl(u8),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = core::result::Result<T, ProtocolError>;
