//! The event loop: `init_server` then `listen`/`dispatch` forever.
//!
//! Grounded on `inference_server.c`'s `init_server`/`wait_for_protocol_event`/
//! `handle_protocol_event`. The dispatch step itself lives in
//! [`kenning_core::Dispatcher`]; this module only adds the server-level
//! concerns the dispatcher does not know about — wiring the log sink's
//! enable/disable to session transitions, and deciding which errors end the
//! loop versus which are just logged and retried.

use kenning_core::{Dispatcher, DispatchError, ExtensionSupport, ProtocolCoreError, RuntimeBackend, SessionState, Transport, TransportError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{config::ServerConfig, log_sink::LogSinkHandle};

/// Errors that terminate the server loop outright. A plain transport
/// timeout is not one of these — see [`InferenceServer::tick`].
#[derive(Error, Debug)]
pub enum ServerError {
    /// The dispatcher's underlying engine failed in a way that was not a
    /// plain timeout.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Owns a [`Dispatcher`] plus the log sink wiring and transmits its pending
/// frames each tick.
pub struct InferenceServer<T: Transport> {
    dispatcher: Dispatcher<T>,
    log_sink: Option<LogSinkHandle>,
    last_session_state: SessionState,
}

impl<T: Transport> InferenceServer<T> {
    /// Build a server, running the dispatcher's own `init` step
    /// (`backend.init` plus IOSPEC loader installation).
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Dispatcher::new`] returns.
    pub fn new(
        transport: T,
        config: &ServerConfig,
        backend: Box<dyn RuntimeBackend>,
        extension: Option<ExtensionSupport>,
        log_sink: Option<LogSinkHandle>,
    ) -> Result<Self, DispatchError> {
        let dispatcher = Dispatcher::new(
            transport,
            config.message_recv_buffer_size,
            config.max_outgoing_message_size,
            config.response_payload_size,
            backend,
            extension,
        )?;
        info!("inference server initialized");
        Ok(Self { dispatcher, log_sink, last_session_state: SessionState::Disconnected })
    }

    /// Run one `listen`/`dispatch` cycle.
    ///
    /// A plain transport timeout is logged and swallowed, since waiting for
    /// the next frame with nothing on the wire is the server's steady
    /// state, not a failure; any other error propagates so the caller can
    /// decide whether to restart the transport.
    pub fn tick(&mut self) -> Result<(), ServerError> {
        match self.dispatcher.run_once() {
            Ok(()) => {},
            Err(DispatchError::Protocol(ProtocolCoreError::Transport(TransportError::Timeout))) => {
                warn!("listen timed out, retrying");
            },
            Err(err) => {
                error!(error = %err, "dispatch error");
                return Err(err.into());
            },
        }
        self.sync_log_sink();
        self.flush_log_sink()?;
        Ok(())
    }

    /// Run forever, one [`InferenceServer::tick`] per iteration.
    ///
    /// # Errors
    ///
    /// Propagates the first non-timeout error from `tick`.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.tick()?;
        }
    }

    fn sync_log_sink(&mut self) {
        let Some(sink) = &self.log_sink else { return };
        let state = self.dispatcher.session().state();
        if state != self.last_session_state {
            match state {
                SessionState::Connected => sink.enable(),
                SessionState::Disconnected => sink.disable(),
            }
            self.last_session_state = state;
        }
    }

    /// Drain whatever the log layer buffered this tick and send it as one
    /// `LOGS` transmission, mirroring `send_all_messages` being invoked
    /// explicitly by the original's own event loop rather than from inside
    /// the logging backend.
    fn flush_log_sink(&mut self) -> Result<(), ServerError> {
        let Some(sink) = &self.log_sink else { return Ok(()) };
        let outbox = sink.take_outbox();
        if outbox.is_empty() {
            return Ok(());
        }
        self.dispatcher.transmit_logs(&outbox)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kenning_core::SessionState;
    use kenning_proto::{Flags, FlowControl, MessageHeader, MessageType};
    use kenning_runtime_stub::StubBackend;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::loopback_transport::LoopbackTransport;

    fn ping(success: bool, fail: bool) -> Vec<u8> {
        let mut flags = Flags::EMPTY;
        flags.set_success(success);
        flags.set_fail(fail);
        MessageHeader::new(MessageType::Ping, FlowControl::Request, flags, 0).to_bytes().to_vec()
    }

    #[test]
    fn tick_connects_session_and_enables_log_sink() {
        let transport = LoopbackTransport::with_inbound(&ping(true, false));
        let config = ServerConfig::default();
        let (_layer, sink) = crate::log_sink::KenningLogLayer::new(64);
        let mut server =
            InferenceServer::new(transport, &config, Box::new(StubBackend::default()), None, Some(sink.clone()))
                .unwrap();

        server.tick().unwrap();

        assert_eq!(server.dispatcher.session().state(), SessionState::Connected);
        assert!(sink.is_enabled());
    }

    #[test]
    fn tick_on_empty_transport_times_out_without_erroring() {
        let transport = LoopbackTransport::with_inbound(&[]);
        let config = ServerConfig::default();
        let mut server =
            InferenceServer::new(transport, &config, Box::new(StubBackend::default()), None, None).unwrap();

        server.tick().unwrap();
    }

    #[test]
    fn tick_flushes_pending_log_sink_bytes_as_a_logs_message() {
        let transport = LoopbackTransport::with_inbound(&ping(true, false));
        let config = ServerConfig::default();
        let (layer, sink) = crate::log_sink::KenningLogLayer::new(64);
        sink.enable();
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
            tracing::info!("hello");
        });

        let mut server =
            InferenceServer::new(transport, &config, Box::new(StubBackend::default()), None, Some(sink))
                .unwrap();
        server.tick().unwrap();

        let wire = server.dispatcher.transport_mut().take_outbound();
        let mut offset = 0;
        let mut saw_logs = false;
        while offset < wire.len() {
            let header = MessageHeader::from_bytes(&wire[offset..offset + MessageHeader::SIZE]).unwrap();
            if header.message_type() == Ok(MessageType::Logs) {
                saw_logs = true;
                assert!(header.payload_size() > 0);
            }
            offset += MessageHeader::SIZE + header.payload_size() as usize;
        }
        assert!(saw_logs);
    }
}
