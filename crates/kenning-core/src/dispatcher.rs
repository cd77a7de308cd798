//! Routes a received [`Event`] to its handler and emits exactly one
//! response per request, per the callback dispatcher contract.

use std::{cell::RefCell, rc::Rc};

use kenning_proto::{Flags, LoaderType, MessageType};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    backend::{BackendError, RuntimeBackend},
    loader::Loader,
    model::{ModelError, ModelLifecycle},
    protocol::{Event, ProtocolCoreError, ProtocolEngine},
    registry::{LoaderRegistry, Priority},
    session::{Session, SessionError},
    transport::Transport,
};

/// Errors the dispatcher surfaces from a single `run_once` call.
///
/// None of these are fatal to the server: the caller logs and re-listens,
/// per the protocol's "the server does not terminate" guarantee.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The protocol engine failed to receive or send a frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolCoreError),
    /// The model layer rejected an operation.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The session handshake rejected a PING.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The backend failed outside the model layer's own calls (e.g. during
    /// an extension swap).
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A RUNTIME message arrived but no extension support was configured.
    #[error("extension support not enabled")]
    ExtensionNotEnabled,
}

/// Wires together the RUNTIME loader and the swap logic needed to install a
/// freshly streamed extension blob as the active backend.
///
/// Loading the blob itself (resolving symbols, however that is done) is
/// inherently platform-specific and lives outside this crate; `swap` is the
/// seam the hosting server crate plugs into.
pub struct ExtensionSupport {
    /// The loader installed at [`LoaderType::Runtime`] to receive the blob.
    pub loader: Box<dyn Loader>,
    /// Observes the bytes `loader` accumulates.
    pub blob: Rc<RefCell<Vec<u8>>>,
    /// Builds a new backend from the accumulated blob bytes.
    pub swap: Box<dyn FnMut(&[u8]) -> Result<Box<dyn RuntimeBackend>, BackendError>>,
}

/// What [`Dispatcher`] keeps of an [`ExtensionSupport`] after installing its
/// loader into the registry: the loader itself is no longer needed here
/// once the registry owns it.
struct ExtensionRuntime {
    blob: Rc<RefCell<Vec<u8>>>,
    swap: Box<dyn FnMut(&[u8]) -> Result<Box<dyn RuntimeBackend>, BackendError>>,
}

/// Drives one [`ProtocolEngine`] through the dispatch loop, owning the
/// loader registry, model lifecycle, and session state it reads and
/// mutates.
pub struct Dispatcher<T: Transport> {
    engine: ProtocolEngine<T>,
    registry: LoaderRegistry,
    model: ModelLifecycle,
    session: Session,
    response_buf: Vec<u8>,
    extension: Option<ExtensionRuntime>,
}

impl<T: Transport> Dispatcher<T> {
    /// Build a dispatcher, immediately running `init_server`'s model-layer
    /// half: backend `init` plus IOSPEC loader installation.
    pub fn new(
        transport: T,
        staging_size: usize,
        max_outgoing: u32,
        response_payload_size: usize,
        backend: Box<dyn RuntimeBackend>,
        extension: Option<ExtensionSupport>,
    ) -> Result<Self, DispatchError> {
        let mut registry = LoaderRegistry::new();
        let mut model = ModelLifecycle::new(backend);
        model.init(&mut registry)?;

        let extension = extension.map(|support| {
            registry.install(Priority::Core, LoaderType::Runtime, support.loader);
            ExtensionRuntime { blob: support.blob, swap: support.swap }
        });

        Ok(Self {
            engine: ProtocolEngine::new(transport, staging_size, max_outgoing),
            registry,
            model,
            session: Session::new(),
            response_buf: vec![0u8; response_payload_size],
            extension,
        })
    }

    /// The session's current state, for diagnostics.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The wrapped transport, for callers that drive it directly (serial
    /// port setup, loopback-backed integration tests).
    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.transport_mut()
    }

    /// Transmit `payload` as one or more `LOGS` frames, out of band from the
    /// request/response cycle `run_once` drives.
    ///
    /// # Errors
    ///
    /// Propagates a transport failure from the underlying engine.
    pub fn transmit_logs(&mut self, payload: &[u8]) -> Result<(), DispatchError> {
        self.engine.transmit(MessageType::Logs, Flags::EMPTY, payload).map_err(DispatchError::Protocol)
    }

    /// Block on one `listen`, then dispatch and (if the message was a
    /// request) respond.
    pub fn run_once(&mut self) -> Result<(), DispatchError> {
        let event = self.engine.listen(&mut self.registry)?;
        self.dispatch(event)
    }

    fn dispatch(&mut self, event: Event) -> Result<(), DispatchError> {
        let mut response_flags = Flags::EMPTY;
        response_flags.set_is_zephyr(true);

        let outcome = self.handle(&event);
        let payload_len = match &outcome {
            Ok(len) => {
                response_flags.set_success(true);
                *len
            },
            Err(err) => {
                warn!(message_type = event.message_type.name(), error = %err, "handler failed");
                response_flags.set_fail(true);
                0
            },
        };

        if event.is_request {
            let payload = std::mem::take(&mut self.response_buf);
            let result = self.engine.transmit(event.message_type, response_flags, &payload[..payload_len]);
            self.response_buf = payload;
            result?;
        }

        // A handler failure has already been turned into a wire-level fail
        // response above; it does not make `run_once` itself fail, since
        // the server is required to keep serving after one.
        let _ = outcome;
        Ok(())
    }

    fn handle(&mut self, event: &Event) -> Result<usize, DispatchError> {
        match event.message_type {
            MessageType::Ping => {
                self.session.handle_ping(event.flags.success(), event.flags.fail())?;
                Ok(0)
            },
            MessageType::Data => {
                self.model.load_input(event.payload_size as usize)?;
                Ok(0)
            },
            MessageType::Model => {
                self.model.load_weights()?;
                Ok(0)
            },
            MessageType::Iospec => {
                let handle = self.model.iospec_handle().ok_or(ModelError::MalformedSpec)?;
                let bytes = handle.borrow().clone();
                self.model.load_struct(&bytes)?;
                Ok(0)
            },
            MessageType::Process => {
                let start_ns = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_or(0, |d| d.as_nanos() as u64);
                self.model.run_bench(start_ns)?;
                Ok(0)
            },
            MessageType::Output => {
                let mut buf = std::mem::take(&mut self.response_buf);
                let result = self.model.output(&mut buf);
                self.response_buf = buf;
                Ok(result?)
            },
            MessageType::Stats => {
                let mut buf = std::mem::take(&mut self.response_buf);
                let result = self.model.statistics(&mut buf);
                self.response_buf = buf;
                Ok(result?)
            },
            MessageType::Runtime => self.handle_runtime_swap(),
            MessageType::Optimizers | MessageType::OptimizeModel => {
                info!(message_type = event.message_type.name(), "unsupported, returning success with no payload");
                Ok(0)
            },
            MessageType::Status | MessageType::UnoptimizedModel | MessageType::Logs => {
                warn!(message_type = event.message_type.name(), "no handler for this message type");
                Ok(0)
            },
        }
    }

    fn handle_runtime_swap(&mut self) -> Result<usize, DispatchError> {
        let support = self.extension.as_mut().ok_or(DispatchError::ExtensionNotEnabled)?;
        let blob = support.blob.borrow().clone();
        let new_backend = (support.swap)(&blob)?;

        self.model.deinit(&mut self.registry)?;
        self.model.replace_backend(new_backend);
        self.model.init(&mut self.registry)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use kenning_proto::{FlowControl, MessageHeader};

    use super::*;
    use crate::{
        backend::StatRecord,
        transport::TransportError,
    };

    struct MockTransport {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl MockTransport {
        fn with_inbound(bytes: &[u8]) -> Self {
            Self { inbound: bytes.iter().copied().collect(), outbound: Vec::new() }
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.outbound.extend_from_slice(bytes);
            Ok(())
        }

        fn read(&mut self, buf: Option<&mut [u8]>, len: usize) -> Result<(), TransportError> {
            if self.inbound.len() < len {
                return Err(TransportError::Timeout);
            }
            match buf {
                Some(buf) => {
                    for slot in buf.iter_mut().take(len) {
                        *slot = self.inbound.pop_front().unwrap();
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

    struct NullBackend;

    impl RuntimeBackend for NullBackend {
        fn init(&mut self, _registry: &mut LoaderRegistry) -> Result<(), BackendError> {
            Ok(())
        }

        fn init_weights(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn init_input(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn run(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn get_output(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
            buf.fill(0);
            Ok(buf.len())
        }

        fn get_statistics(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
            let bytes = StatRecord::new("noop", crate::backend::StatType::Default, 0).to_bytes();
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }

        fn deinit(&mut self, _registry: &mut LoaderRegistry) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn dispatcher_with(wire: &[u8]) -> Dispatcher<MockTransport> {
        let transport = MockTransport::with_inbound(wire);
        Dispatcher::new(transport, 64, 64, 256, Box::new(NullBackend), None).unwrap()
    }

    #[test]
    fn ping_ack_round_trip() {
        let mut flags = Flags::EMPTY;
        flags.set_success(true);
        let header = MessageHeader::new(MessageType::Ping, FlowControl::Request, flags, 0);

        let mut dispatcher = dispatcher_with(&header.to_bytes());
        dispatcher.run_once().unwrap();

        let wire = &dispatcher.engine.transport_mut().outbound;
        let response = MessageHeader::from_bytes(wire).unwrap();
        assert_eq!(response.message_type().unwrap(), MessageType::Ping);
        assert_eq!(response.flow_control().unwrap(), FlowControl::Transmission);
        assert!(response.flags().success());
        assert!(response.flags().is_zephyr());
        assert!(response.flags().first());
        assert!(response.flags().last());
        assert_eq!(response.payload_size(), 0);
    }

    #[test]
    fn unknown_message_type_is_logged_and_succeeds() {
        let header = MessageHeader::new(MessageType::Status, FlowControl::Request, Flags::EMPTY, 0);
        let mut dispatcher = dispatcher_with(&header.to_bytes());
        dispatcher.run_once().unwrap();

        let wire = &dispatcher.engine.transport_mut().outbound;
        let response = MessageHeader::from_bytes(wire).unwrap();
        assert!(response.flags().success());
    }

    #[test]
    fn runtime_without_extension_support_is_rejected_at_listen() {
        let header = MessageHeader::new(MessageType::Runtime, FlowControl::Request, Flags::EMPTY, 4);
        let mut dispatcher = dispatcher_with(&header.to_bytes());
        let err = dispatcher.run_once().unwrap_err();
        assert!(matches!(err, DispatchError::Protocol(ProtocolCoreError::FlowControlError)));
    }
}
