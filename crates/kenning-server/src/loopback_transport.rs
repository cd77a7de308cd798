//! An in-memory [`Transport`] for deterministic end-to-end tests, filling
//! the role the teacher's simulation harness fills for its own protocol —
//! without needing a full discrete-event network simulator, since this
//! protocol has exactly one peer and no reordering to model.

use std::collections::VecDeque;

use kenning_core::{Transport, TransportError};

/// Queues written bytes into `outbound` and serves `read` from `inbound`,
/// which a test preloads with the bytes a real host would have sent.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

impl LoopbackTransport {
    /// A transport whose `read`s will be served from `bytes`.
    #[must_use]
    pub fn with_inbound(bytes: &[u8]) -> Self {
        Self { inbound: bytes.iter().copied().collect(), outbound: Vec::new() }
    }

    /// Queue more bytes to be served by subsequent `read`s, e.g. a second
    /// request sent after inspecting the first response.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Everything written so far.
    #[must_use]
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Take and clear everything written so far.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for LoopbackTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buf: Option<&mut [u8]>, len: usize) -> Result<(), TransportError> {
        if self.inbound.len() < len {
            return Err(TransportError::Timeout);
        }
        match buf {
            Some(dst) => {
                for slot in dst.iter_mut().take(len) {
                    if let Some(byte) = self.inbound.pop_front() {
                        *slot = byte;
                    }
                }
            },
            None => {
                for _ in 0..len {
                    self.inbound.pop_front();
                }
            },
        }
        Ok(())
    }
}
