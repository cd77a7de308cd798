//! The protocol engine: turns transport bytes into logical events and back.
//!
//! Grounded on `kenning_protocol.c`'s `protocol_listen`/`protocol_transmit`.

use kenning_proto::{Flags, FlowControl, MessageHeader, MessageType};
use thiserror::Error;

use crate::{
    loader::LoaderError,
    registry::LoaderRegistry,
    transport::{Transport, TransportError},
};

/// A received logical message.
///
/// Unlike the wire frame, this carries no payload bytes: by the time
/// `listen` returns, any payload has already been streamed into whichever
/// loader the registry resolved for this message type. Callers that need
/// the bytes read them back out of that loader.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// The message type.
    pub message_type: MessageType,
    /// The flow-control class as received.
    pub flow_control: FlowControl,
    /// The flags as received.
    pub flags: Flags,
    /// Size of the payload that was streamed (0 if none).
    pub payload_size: u32,
    /// Whether this message expects a response.
    ///
    /// Bound explicitly to `flow_control ∈ {Request, RequestRetransmit}`.
    pub is_request: bool,
}

/// Errors the protocol engine can surface.
#[derive(Error, Debug)]
pub enum ProtocolCoreError {
    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The header's `message_type` field did not name a defined type.
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),
    /// A loader rejected payload bytes (most commonly, ran out of space).
    #[error(transparent)]
    Loader(#[from] LoaderError),
    /// `payload_size > 0` but no loader is installed for this message type.
    #[error("no loader installed for this message type")]
    FlowControlError,
    /// A loader overran its capacity while receiving this message's payload.
    #[error("message too big for its loader")]
    MsgTooBig,
}

/// Drives a [`Transport`] through the framed receive/transmit protocol.
pub struct ProtocolEngine<T: Transport> {
    transport: T,
    staging: Vec<u8>,
    max_outgoing: u32,
}

impl<T: Transport> ProtocolEngine<T> {
    /// Build an engine over `transport`.
    ///
    /// `staging_size` bounds how many payload bytes are read into memory at
    /// once during `listen` (`MESSAGE_RECV_BUFFER_SIZE`); `max_outgoing`
    /// bounds how large one outbound frame's payload may be
    /// (`MAX_OUTGOING_MESSAGE_SIZE`).
    #[must_use]
    pub fn new(transport: T, staging_size: usize, max_outgoing: u32) -> Self {
        Self { transport, staging: vec![0u8; staging_size.max(1)], max_outgoing: max_outgoing.max(1) }
    }

    /// The wrapped transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn drain(&mut self, len: usize) -> Result<(), TransportError> {
        if len == 0 {
            return Ok(());
        }
        // Discard in bounded chunks through the null-buffer read, same as
        // the staged payload read path, so a single oversized drain cannot
        // demand an unbounded allocation.
        let chunk = self.staging.len();
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(chunk);
            self.transport.read(None, take)?;
            remaining -= take;
        }
        Ok(())
    }

    /// Receive one logical message, blocking up to the transport's timeout.
    ///
    /// 1. Reads one header. An out-of-range `message_type` drains
    ///    `payload_size` bytes and fails with [`ProtocolCoreError::InvalidMessageType`].
    /// 2. `payload_size == 0` returns immediately with an empty event.
    /// 3. Resolves a loader via `registry`. No loader drains the payload and
    ///    fails with [`ProtocolCoreError::FlowControlError`].
    /// 4. Streams the payload into the loader in `staging`-sized chunks. A
    ///    loader overflow drains the remainder and fails with
    ///    [`ProtocolCoreError::MsgTooBig`].
    pub fn listen(&mut self, registry: &mut LoaderRegistry) -> Result<Event, ProtocolCoreError> {
        let mut header_bytes = [0u8; MessageHeader::SIZE];
        self.transport.read(Some(&mut header_bytes), MessageHeader::SIZE)?;
        let header =
            MessageHeader::from_bytes(&header_bytes).expect("fixed-size buffer always decodes");

        let payload_size = header.payload_size();
        let message_type = match header.message_type() {
            Ok(mt) => mt,
            Err(_) => {
                self.drain(payload_size as usize)?;
                return Err(ProtocolCoreError::InvalidMessageType(header_bytes[0] & 0x3f));
            },
        };
        let flow_control = header.flow_control().unwrap_or(FlowControl::Request);
        let flags = header.flags();
        let is_request = flow_control.is_request();

        if payload_size == 0 {
            return Ok(Event { message_type, flow_control, flags, payload_size: 0, is_request });
        }

        let loader_type = message_type.loader_type();
        let Some(loader) = registry.resolve(loader_type) else {
            self.drain(payload_size as usize)?;
            return Err(ProtocolCoreError::FlowControlError);
        };

        loader.reset(payload_size as usize)?;

        let Self { transport, staging, .. } = self;
        let mut remaining = payload_size as usize;
        while remaining > 0 {
            let take = remaining.min(staging.len());
            transport.read(Some(&mut staging[..take]), take)?;
            match loader.save(&staging[..take]) {
                Ok(()) => {},
                Err(LoaderError::NotEnoughMemory { .. }) => {
                    remaining -= take;
                    self.drain(remaining)?;
                    return Err(ProtocolCoreError::MsgTooBig);
                },
                Err(other) => return Err(other.into()),
            }
            remaining -= take;
        }

        Ok(Event { message_type, flow_control, flags, payload_size, is_request })
    }

    /// Transmit `payload` as one or more fragments of at most `max_outgoing`
    /// bytes each, with `first`/`last`/`has_payload` set per spec and
    /// `flow_control` forced to [`FlowControl::Transmission`].
    pub fn transmit(
        &mut self,
        message_type: MessageType,
        mut flags: Flags,
        payload: &[u8],
    ) -> Result<(), ProtocolCoreError> {
        let max_outgoing = self.max_outgoing as usize;
        let total = payload.len();
        let message_count = if total == 0 { 1 } else { total.div_ceil(max_outgoing) };

        let mut offset = 0;
        for i in 0..message_count {
            let chunk_len = (total - offset).min(max_outgoing);
            flags.set_is_host_message(false);
            flags.set_has_payload(chunk_len > 0);
            flags.set_first(i == 0);
            flags.set_last(i == message_count - 1);

            let header =
                MessageHeader::new(message_type, FlowControl::Transmission, flags, chunk_len as u32);
            self.transport.write(&header.to_bytes())?;
            if chunk_len > 0 {
                self.transport.write(&payload[offset..offset + chunk_len])?;
            }
            offset += chunk_len;
        }

        Ok(())
    }
}
