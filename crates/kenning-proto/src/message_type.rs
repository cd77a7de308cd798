//! Message type enum.
//!
//! Tagged variant replacing the original's `X`-macro enum generator, per
//! the protocol's own design note: a closed union that carries its own
//! [`MessageType::name`] for diagnostics instead of a generated string table.

use crate::error::ProtocolError;

/// The 6-bit message type carried in byte 0 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Session keep-alive / handshake.
    Ping = 0,
    /// Reserved status query, unused by any handler.
    Status = 1,
    /// Streamed input tensor data.
    Data = 2,
    /// Streamed model weights.
    Model = 3,
    /// Run inference on the currently loaded input.
    Process = 4,
    /// Fetch the inference output tensor.
    Output = 5,
    /// Fetch runtime statistics.
    Stats = 6,
    /// Streamed model input/output specification.
    Iospec = 7,
    /// Unsupported: model optimizer listing.
    Optimizers = 8,
    /// Unsupported: model optimization request.
    OptimizeModel = 9,
    /// Streamed runtime extension binary.
    Runtime = 10,
    /// Unoptimized model variant, unused by any handler.
    UnoptimizedModel = 11,
    /// Forwarded log record (reserved for the optional log sink).
    Logs = 12,
}

impl MessageType {
    /// Exclusive upper bound on valid message type values.
    pub const COUNT: u8 = 13;

    /// Short diagnostic name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Status => "STATUS",
            Self::Data => "DATA",
            Self::Model => "MODEL",
            Self::Process => "PROCESS",
            Self::Output => "OUTPUT",
            Self::Stats => "STATS",
            Self::Iospec => "IOSPEC",
            Self::Optimizers => "OPTIMIZERS",
            Self::OptimizeModel => "OPTIMIZE_MODEL",
            Self::Runtime => "RUNTIME",
            Self::UnoptimizedModel => "UNOPTIMIZED_MODEL",
            Self::Logs => "LOGS",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ping),
            1 => Ok(Self::Status),
            2 => Ok(Self::Data),
            3 => Ok(Self::Model),
            4 => Ok(Self::Process),
            5 => Ok(Self::Output),
            6 => Ok(Self::Stats),
            7 => Ok(Self::Iospec),
            8 => Ok(Self::Optimizers),
            9 => Ok(Self::OptimizeModel),
            10 => Ok(Self::Runtime),
            11 => Ok(Self::UnoptimizedModel),
            12 => Ok(Self::Logs),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value as Self
    }
}
