//! Wire format for the embedded inference server protocol: the 8-byte
//! header, its tagged fields, and the packed model specification.
//!
//! This crate is intentionally inert: it encodes and decodes bytes and
//! carries no I/O, state machine, or dispatch logic. See `kenning-core` for
//! the protocol engine built on top of it.

mod data_type;
pub mod error;
mod flags;
mod flow_control;
mod header;
mod loader_type;
mod message_type;
mod model_spec;

pub use data_type::DataTypeCode;
pub use error::ProtocolError;
pub use flags::Flags;
pub use flow_control::FlowControl;
pub use header::MessageHeader;
pub use loader_type::LoaderType;
pub use message_type::MessageType;
pub use model_spec::{DataType, MAX_DIM, MAX_IN, MAX_NAME, MAX_OUT, ModelSpec};
