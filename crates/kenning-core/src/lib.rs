//! Transport-agnostic protocol engine, loader registry, model lifecycle,
//! and runtime-backend contract for the inference server.
//!
//! [`kenning_proto`] defines the wire format; this crate drives it: a
//! [`protocol::ProtocolEngine`] turns bytes into [`protocol::Event`]s, a
//! [`registry::LoaderRegistry`] routes streamed payloads to
//! [`loader::Loader`]s, a [`model::ModelLifecycle`] enforces the model
//! state machine against a pluggable [`backend::RuntimeBackend`], and
//! [`dispatcher::Dispatcher`] ties all of it to one request/response cycle.

pub mod backend;
pub mod dispatcher;
pub mod loader;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use backend::{BackendError, RuntimeBackend, StatRecord, StatType};
pub use kenning_proto::LoaderType;
pub use dispatcher::{DispatchError, Dispatcher, ExtensionSupport};
pub use loader::{BufferLoader, Loader, LoaderError, SharedBufferLoader};
pub use model::{ModelError, ModelLifecycle, ModelState};
pub use protocol::{Event, ProtocolCoreError, ProtocolEngine};
pub use registry::{LoaderRegistry, Priority};
pub use session::{Session, SessionError, SessionState};
pub use transport::{Transport, TransportError};
