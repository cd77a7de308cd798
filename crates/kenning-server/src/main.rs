//! Inference server binary.
//!
//! # Usage
//!
//! ```bash
//! kenning-server --port /dev/ttyACM0 --baud 115200
//! ```

use std::time::Duration;

use clap::Parser;
use kenning_runtime_stub::StubBackend;
use kenning_server::{
    config::{Args, ServerConfig},
    extension::build_extension_support,
    log_sink::KenningLogLayer,
    serial_transport::SerialTransport,
    server::InferenceServer,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config: ServerConfig = (&args).into();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let (log_layer, log_sink) = KenningLogLayer::new(config.log_buffer_size);

    tracing_subscriber::registry().with(fmt::layer()).with(log_layer).with(filter).init();

    tracing::info!("inference server starting");
    tracing::info!(port = %args.port, baud = args.baud, "opening serial transport");

    let transport = SerialTransport::open(&args.port, args.baud, Duration::from_millis(config.transport_timeout_ms))?;
    let backend = Box::new(StubBackend::default());
    let extension = Some(build_extension_support(config.extension_heap_size));

    let mut server = InferenceServer::new(transport, &config, backend, extension, Some(log_sink))?;
    server.run()?;

    Ok(())
}
