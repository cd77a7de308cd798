//! Byte-oriented full-duplex transport contract.

use thiserror::Error;

/// Errors a [`Transport`] implementation can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has not been initialized / opened.
    #[error("transport uninitialized")]
    Uninit,
    /// No byte arrived before the inter-byte timeout elapsed.
    #[error("transport read timed out")]
    Timeout,
    /// The requested operation is not supported by this transport.
    #[error("operation not supported by this transport")]
    Nosys,
    /// The underlying device is busy and could not service the request.
    #[error("transport busy")]
    Busy,
}

/// A byte-oriented full-duplex stream with bounded-time blocking reads.
///
/// Implementations block on [`Transport::read`] until `len` bytes have
/// arrived or an inter-byte gap exceeds a configured timeout, in which case
/// they return [`TransportError::Timeout`].
pub trait Transport {
    /// Write `bytes` to the transport, blocking until fully written.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `len` bytes.
    ///
    /// If `buf` is `Some`, the first `len` bytes of `buf` are filled. If
    /// `buf` is `None`, `len` bytes are read and discarded — used to drain
    /// an offending payload while keeping the wire aligned.
    fn read(&mut self, buf: Option<&mut [u8]>, len: usize) -> Result<(), TransportError>;
}
