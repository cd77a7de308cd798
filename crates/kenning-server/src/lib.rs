//! Concrete transports, extension loading, optional log forwarding, and the
//! event loop binding them all to [`kenning_core::Dispatcher`].
//!
//! [`kenning_core`] and [`kenning_proto`] are transport- and
//! platform-agnostic; this crate supplies the parts that are not: a serial
//! port, a dynamically loaded extension backend, a hardware-register
//! word-stream loader, and the `tracing`-backed log sink the PING handshake
//! toggles on and off.

pub mod config;
pub mod extension;
pub mod hw_stream_loader;
pub mod log_sink;
pub mod loopback_transport;
pub mod serial_transport;
pub mod server;

pub use config::{Args, ServerConfig};
pub use extension::{build_extension_support, DynamicBackend, ExtensionLoader};
pub use hw_stream_loader::{HardwareStreamLoader, WordBlock};
pub use log_sink::{KenningLogLayer, LogSinkHandle};
pub use loopback_transport::LoopbackTransport;
pub use serial_transport::SerialTransport;
pub use server::{InferenceServer, ServerError};
