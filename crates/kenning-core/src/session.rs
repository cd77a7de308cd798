//! The PING-driven session handshake.

use thiserror::Error;

/// Connection state toggled by PING's general flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake has completed, or the last one ended it.
    Disconnected,
    /// A PING with `success` has completed the handshake.
    Connected,
}

/// Errors [`Session::handle_ping`] can report.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A `success`-only PING arrived while already connected.
    #[error("session already connected")]
    AlreadyConnected,
}

/// Tracks connection state across PING messages.
///
/// `fail` is processed before `success` within one call, so a PING with
/// both flags set disconnects and then immediately reconnects — the
/// "end-then-begin" semantics the protocol calls for — without ever
/// reporting [`SessionError::AlreadyConnected`].
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl Session {
    /// A fresh, disconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self { state: SessionState::Disconnected }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process one PING's general `success`/`fail` flags.
    pub fn handle_ping(&mut self, success: bool, fail: bool) -> Result<(), SessionError> {
        if fail {
            self.state = SessionState::Disconnected;
        }
        if success {
            if self.state == SessionState::Connected {
                return Err(SessionError::AlreadyConnected);
            }
            self.state = SessionState::Connected;
        }
        Ok(())
    }
}
