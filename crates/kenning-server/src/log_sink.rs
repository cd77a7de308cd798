//! Optional log forwarding: buffers formatted log lines and exposes them for
//! the server loop to flush as one `LOGS` transmission per iteration.
//!
//! Grounded on `logger.c`: a length-prefixed buffer (`[len:u8][bytes]…`)
//! with each message capped at 255 bytes, a reentrancy guard against logs
//! produced while already formatting/buffering one, and enable/disable
//! toggled by the session handshake (`logger_start`/`logger_stop`) rather
//! than always-on. Unlike the original, this layer cannot call
//! `protocol_transmit` directly — a `tracing_subscriber::Layer` has no
//! handle to the dispatcher's transport — so it only buffers; the server
//! loop drains `LogSinkHandle::take_outbox` and transmits it explicitly,
//! mirroring how the original's `send_all_messages` is itself invoked
//! explicitly from call sites rather than from inside the backend API.

use std::{cell::RefCell, fmt::Write as _, rc::Rc};

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const MAX_SINGLE_MESSAGE_LEN: usize = 0xFF;

struct Inner {
    enabled: bool,
    sending: bool,
    capacity: usize,
    buffer: Vec<u8>,
    outbox: Vec<u8>,
}

impl Inner {
    fn new(capacity: usize) -> Self {
        Self { enabled: false, sending: false, capacity, buffer: Vec::new(), outbox: Vec::new() }
    }

    fn push_message(&mut self, message: &str) {
        // Leave room for the 1-byte length prefix.
        let room = self.capacity.saturating_sub(self.buffer.len() + 1);
        if room == 0 {
            return;
        }
        let len = message.len().min(MAX_SINGLE_MESSAGE_LEN).min(room);
        self.buffer.push(len as u8);
        self.buffer.extend_from_slice(&message.as_bytes()[..len]);
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.outbox.append(&mut self.buffer);
    }
}

/// A cheaply cloneable handle to the log sink's shared state, used by the
/// server loop to enable/disable the sink and to drain pending frames.
#[derive(Clone)]
pub struct LogSinkHandle {
    inner: Rc<RefCell<Inner>>,
}

impl LogSinkHandle {
    /// Turn the sink on. Mirrors `logger_start`.
    pub fn enable(&self) {
        self.inner.borrow_mut().enabled = true;
    }

    /// Turn the sink off and drop anything not yet flushed. Mirrors
    /// `logger_stop`, which must run before the transport it would have
    /// written to goes away.
    pub fn disable(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.enabled = false;
        inner.buffer.clear();
    }

    /// Take whatever flushed bytes are pending, leaving the outbox empty.
    /// The caller is responsible for transmitting them as one `LOGS`
    /// message.
    pub fn take_outbox(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().outbox)
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }
}

/// A [`tracing_subscriber::Layer`] that forwards formatted log lines into a
/// [`LogSinkHandle`]-shared buffer instead of (or alongside) a terminal
/// writer.
pub struct KenningLogLayer {
    inner: Rc<RefCell<Inner>>,
}

impl KenningLogLayer {
    /// Build a layer and the handle used to drive it, with `capacity` bytes
    /// of buffer (`CONFIG_KENNING_LOG_BUFFER_SIZE`).
    #[must_use]
    pub fn new(capacity: usize) -> (Self, LogSinkHandle) {
        let inner = Rc::new(RefCell::new(Inner::new(capacity)));
        (Self { inner: Rc::clone(&inner) }, LogSinkHandle { inner })
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for KenningLogLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut inner = self.inner.borrow_mut();
        if !inner.enabled || inner.sending {
            return;
        }
        inner.sending = true;

        let mut visitor = MessageVisitor { message: String::new() };
        event.record(&mut visitor);
        inner.push_message(&visitor.message);
        inner.flush();

        inner.sending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_sets_enabled_flag() {
        let (_layer, handle) = KenningLogLayer::new(64);
        assert!(!handle.inner.borrow().enabled);
        handle.enable();
        assert!(handle.inner.borrow().enabled);
    }

    #[test]
    fn push_then_flush_moves_bytes_to_outbox() {
        let (_layer, handle) = KenningLogLayer::new(64);
        handle.enable();
        {
            let mut inner = handle.inner.borrow_mut();
            inner.push_message("hi");
            inner.flush();
        }
        let out = handle.take_outbox();
        assert_eq!(out[0], 2);
        assert_eq!(&out[1..3], b"hi");
    }

    #[test]
    fn overlong_message_is_truncated_to_255_bytes() {
        let (_layer, handle) = KenningLogLayer::new(4096);
        {
            let mut inner = handle.inner.borrow_mut();
            inner.push_message(&"x".repeat(300));
        }
        assert_eq!(handle.inner.borrow().buffer[0], 0xFF);
    }

    #[test]
    fn buffer_stops_accepting_once_capacity_is_reached() {
        let (_layer, handle) = KenningLogLayer::new(4);
        let mut inner = handle.inner.borrow_mut();
        inner.push_message("ab");
        let before = inner.buffer.len();
        inner.push_message("more");
        assert_eq!(inner.buffer.len(), before);
    }

    #[test]
    fn disable_clears_unflushed_buffer() {
        let (_layer, handle) = KenningLogLayer::new(64);
        {
            let mut inner = handle.inner.borrow_mut();
            inner.push_message("pending");
        }
        handle.disable();
        assert!(handle.inner.borrow().buffer.is_empty());
    }

    #[test]
    fn take_outbox_empties_it() {
        let (_layer, handle) = KenningLogLayer::new(64);
        handle.enable();
        {
            let mut inner = handle.inner.borrow_mut();
            inner.push_message("x");
            inner.flush();
        }
        assert!(!handle.take_outbox().is_empty());
        assert!(handle.take_outbox().is_empty());
    }
}
