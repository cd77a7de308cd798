//! Server configuration: the six tunable knobs from spec §4.9, plus the CLI
//! surface that overrides them.
//!
//! Grounded on `lockframe-server`'s `ServerRuntimeConfig`/`DriverConfig`
//! split: a plain config struct with documented defaults, built from a
//! `clap::Parser` args struct at the CLI boundary rather than threading
//! `Args` itself through the rest of the crate.

use std::time::Duration;

use clap::Parser;

/// Default payload capacity for the dispatcher's response buffer.
pub const DEFAULT_RESPONSE_PAYLOAD_SIZE: usize = 4096;
/// Default size of the staging buffer `listen` reads payload chunks into.
pub const DEFAULT_MESSAGE_RECV_BUFFER_SIZE: usize = 4096;
/// Default cap on one outgoing frame's payload size.
pub const DEFAULT_MAX_OUTGOING_MESSAGE_SIZE: u32 = 4096;
/// Default log sink buffer capacity.
pub const DEFAULT_LOG_BUFFER_SIZE: usize = 1024;
/// Default heap budget for a streamed extension blob.
pub const DEFAULT_EXTENSION_HEAP_SIZE: usize = 65536;
/// Default inter-byte transport read timeout, in milliseconds.
pub const DEFAULT_TRANSPORT_TIMEOUT_MS: u64 = 500;

/// The six knobs the inference server is configured by.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Capacity of the buffer `OUTPUT`/`STATS` responses are serialized into.
    pub response_payload_size: usize,
    /// Capacity of the staging buffer used while streaming a payload into a
    /// loader.
    pub message_recv_buffer_size: usize,
    /// Cap on one outgoing frame's payload size; larger responses fragment.
    pub max_outgoing_message_size: u32,
    /// Capacity of the optional log sink's buffer.
    pub log_buffer_size: usize,
    /// Maximum size a streamed extension blob may announce.
    pub extension_heap_size: usize,
    /// Inter-byte transport read timeout, in milliseconds.
    pub transport_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            response_payload_size: DEFAULT_RESPONSE_PAYLOAD_SIZE,
            message_recv_buffer_size: DEFAULT_MESSAGE_RECV_BUFFER_SIZE,
            max_outgoing_message_size: DEFAULT_MAX_OUTGOING_MESSAGE_SIZE,
            log_buffer_size: DEFAULT_LOG_BUFFER_SIZE,
            extension_heap_size: DEFAULT_EXTENSION_HEAP_SIZE,
            transport_timeout_ms: DEFAULT_TRANSPORT_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// The inter-byte read timeout as a [`Duration`].
    #[must_use]
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }
}

/// Inference server CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "kenning-server")]
#[command(about = "Embedded ML inference server over a framed serial protocol")]
#[command(version)]
pub struct Args {
    /// Serial port to open (e.g. `/dev/ttyACM0`, `COM3`)
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    pub port: String,

    /// Serial baud rate
    #[arg(short, long, default_value = "115200")]
    pub baud: u32,

    /// Response payload buffer size, in bytes
    #[arg(long, default_value_t = DEFAULT_RESPONSE_PAYLOAD_SIZE)]
    pub response_payload_size: usize,

    /// Staging buffer size for received payloads, in bytes
    #[arg(long, default_value_t = DEFAULT_MESSAGE_RECV_BUFFER_SIZE)]
    pub message_recv_buffer_size: usize,

    /// Maximum payload size of one outgoing frame, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_OUTGOING_MESSAGE_SIZE)]
    pub max_outgoing_message_size: u32,

    /// Log sink buffer size, in bytes
    #[arg(long, default_value_t = DEFAULT_LOG_BUFFER_SIZE)]
    pub log_buffer_size: usize,

    /// Maximum size a streamed extension blob may announce, in bytes
    #[arg(long, default_value_t = DEFAULT_EXTENSION_HEAP_SIZE)]
    pub extension_heap_size: usize,

    /// Inter-byte transport read timeout, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TRANSPORT_TIMEOUT_MS)]
    pub transport_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        Self {
            response_payload_size: args.response_payload_size,
            message_recv_buffer_size: args.message_recv_buffer_size,
            max_outgoing_message_size: args.max_outgoing_message_size,
            log_buffer_size: args.log_buffer_size,
            extension_heap_size: args.extension_heap_size,
            transport_timeout_ms: args.transport_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.response_payload_size, 4096);
        assert_eq!(config.message_recv_buffer_size, 4096);
        assert_eq!(config.max_outgoing_message_size, 4096);
        assert_eq!(config.log_buffer_size, 1024);
        assert_eq!(config.extension_heap_size, 65536);
        assert_eq!(config.transport_timeout_ms, 500);
    }

    #[test]
    fn transport_timeout_converts_milliseconds() {
        let config = ServerConfig { transport_timeout_ms: 250, ..ServerConfig::default() };
        assert_eq!(config.transport_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn args_default_to_the_same_values_as_server_config_default() {
        let args = Args::parse_from(["kenning-server"]);
        let config: ServerConfig = (&args).into();
        assert_eq!(config.response_payload_size, ServerConfig::default().response_payload_size);
        assert_eq!(config.max_outgoing_message_size, ServerConfig::default().max_outgoing_message_size);
    }
}
