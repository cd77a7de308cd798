//! A blocking [`Transport`] over a real serial port.
//!
//! Grounded on spec §4.1 and the teacher's transport/protocol boundary
//! (transport concerns stay behind the [`Transport`] trait rather than
//! leaking into the protocol engine); the teacher's own transport is
//! QUIC/tokio-specific and not reused directly, since this link is a single
//! blocking byte stream, not an async multiplexed one.

use std::time::Duration;

use kenning_core::{Transport, TransportError};

/// How many bytes to write or read before cooperatively yielding the
/// current thread. Mirrors `CONFIG_NRF_UART_SLEEP_AFTER_POLL_WORKAROUND`:
/// some UART drivers stall other work if polled in a tight loop across a
/// large transfer.
pub const YIELD_EVERY_N_BYTES: usize = 256;

/// Wraps a `serialport::SerialPort` behind the [`Transport`] contract.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `path` at `baud_rate`, with `timeout` as the inter-byte read
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Nosys`] if the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open().map_err(|_| TransportError::Nosys)?;
        Ok(Self { port })
    }
}

fn classify_io_error(err: &std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Busy,
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        use std::io::Write as _;
        for (i, chunk) in bytes.chunks(YIELD_EVERY_N_BYTES).enumerate() {
            if i > 0 {
                std::thread::yield_now();
            }
            self.port.write_all(chunk).map_err(|err| classify_io_error(&err))?;
        }
        Ok(())
    }

    fn read(&mut self, buf: Option<&mut [u8]>, len: usize) -> Result<(), TransportError> {
        use std::io::Read as _;
        match buf {
            Some(dst) => {
                let mut offset = 0;
                while offset < len {
                    if offset > 0 {
                        std::thread::yield_now();
                    }
                    let take = (len - offset).min(YIELD_EVERY_N_BYTES);
                    self.port.read_exact(&mut dst[offset..offset + take]).map_err(|err| classify_io_error(&err))?;
                    offset += take;
                }
            },
            None => {
                let mut discard = [0u8; YIELD_EVERY_N_BYTES];
                let mut remaining = len;
                while remaining > 0 {
                    let take = remaining.min(discard.len());
                    self.port.read_exact(&mut discard[..take]).map_err(|err| classify_io_error(&err))?;
                    remaining -= take;
                }
            },
        }
        Ok(())
    }
}
