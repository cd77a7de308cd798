//! Byte-level end-to-end scenarios over a [`LoopbackTransport`], exercising
//! the wire protocol the way a real host would drive it: raw frames in,
//! raw frames out, no internal-state inspection.

use kenning_core::{BackendError, Dispatcher, ExtensionSupport, RuntimeBackend};
use kenning_proto::{DataType, DataTypeCode, Flags, FlowControl, MessageHeader, MessageType, ModelSpec};
use kenning_runtime_stub::StubBackend;
use kenning_server::LoopbackTransport;

fn frame(message_type: MessageType, flow: FlowControl, flags: Flags, payload: &[u8]) -> Vec<u8> {
    let mut wire = MessageHeader::new(message_type, flow, flags, payload.len() as u32).to_bytes().to_vec();
    wire.extend_from_slice(payload);
    wire
}

fn request(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
    frame(message_type, FlowControl::Request, Flags::EMPTY, payload)
}

/// Run one request/response cycle and return the decoded response header
/// plus its payload bytes.
fn round_trip(dispatcher: &mut Dispatcher<LoopbackTransport>, wire_request: &[u8]) -> (MessageHeader, Vec<u8>) {
    dispatcher.transport_mut().push_inbound(wire_request);
    dispatcher.run_once().unwrap();
    let wire = dispatcher.transport_mut().take_outbound();
    let header = MessageHeader::from_bytes(&wire[..MessageHeader::SIZE]).unwrap();
    let payload = wire[MessageHeader::SIZE..].to_vec();
    (header, payload)
}

fn dispatcher_with_stub() -> Dispatcher<LoopbackTransport> {
    let transport = LoopbackTransport::with_inbound(&[]);
    Dispatcher::new(transport, 64, 64, 4096, Box::new(StubBackend::default()), None).unwrap()
}

/// One input tensor (4 `f32`s, 16 bytes), one output tensor (50 `f32`s, 200
/// bytes) — large enough that `OUTPUT` must fragment under a small
/// `max_outgoing`.
fn spec_bytes() -> Vec<u8> {
    let mut spec = ModelSpec::from_exact_bytes(&vec![0u8; ModelSpec::SIZE]).unwrap();
    spec.num_input = 1;
    spec.num_input_dim[0] = 1;
    spec.input_shape[0][0] = 4;
    spec.input_data_type[0] = DataType { code: DataTypeCode::Float as u8, bits: 32 };
    spec.num_output = 1;
    spec.num_output_dim[0] = 1;
    spec.output_shape[0][0] = 50;
    spec.output_data_type[0] = DataType { code: DataTypeCode::Float as u8, bits: 32 };
    spec.to_bytes()
}

#[test]
fn ping_request_gets_a_success_ack() {
    let mut dispatcher = dispatcher_with_stub();
    let mut flags = Flags::EMPTY;
    flags.set_success(true);
    let (header, _payload) = round_trip(&mut dispatcher, &request(MessageType::Ping, &[]));

    assert_eq!(header.message_type().unwrap(), MessageType::Ping);
    assert_eq!(header.flow_control().unwrap(), FlowControl::Transmission);
    assert!(header.flags().success());
    assert!(header.flags().is_zephyr());
    assert_eq!(header.payload_size(), 0);
}

#[test]
fn valid_model_spec_is_accepted() {
    let mut dispatcher = dispatcher_with_stub();
    let (header, _) = round_trip(&mut dispatcher, &request(MessageType::Iospec, &spec_bytes()));
    assert!(header.flags().success());
}

#[test]
fn malformed_model_spec_is_rejected() {
    let mut dispatcher = dispatcher_with_stub();
    let mut spec = ModelSpec::from_exact_bytes(&spec_bytes()).unwrap();
    spec.num_input = 0;
    let (header, _) = round_trip(&mut dispatcher, &request(MessageType::Iospec, &spec.to_bytes()));
    assert!(header.flags().fail());
    assert!(!header.flags().success());
}

#[test]
fn data_with_wrong_length_is_rejected() {
    let mut dispatcher = dispatcher_with_stub();
    round_trip(&mut dispatcher, &request(MessageType::Iospec, &spec_bytes()));
    round_trip(&mut dispatcher, &request(MessageType::Model, &[]));

    let (header, _) = round_trip(&mut dispatcher, &request(MessageType::Data, &[0u8; 4]));
    assert!(header.flags().fail());
}

#[test]
fn output_larger_than_max_outgoing_fragments_into_four_frames() {
    let transport = LoopbackTransport::with_inbound(&[]);
    let mut dispatcher = Dispatcher::new(transport, 64, 64, 4096, Box::new(StubBackend::default()), None).unwrap();

    round_trip(&mut dispatcher, &request(MessageType::Iospec, &spec_bytes()));
    round_trip(&mut dispatcher, &request(MessageType::Model, &[]));
    round_trip(&mut dispatcher, &request(MessageType::Data, &[0u8; 16]));
    round_trip(&mut dispatcher, &request(MessageType::Process, &[]));

    dispatcher.transport_mut().push_inbound(&request(MessageType::Output, &[]));
    dispatcher.run_once().unwrap();
    let wire = dispatcher.transport_mut().take_outbound();

    let mut offset = 0;
    let mut sizes = Vec::new();
    let mut flags_seen = Vec::new();
    while offset < wire.len() {
        let header = MessageHeader::from_bytes(&wire[offset..offset + MessageHeader::SIZE]).unwrap();
        sizes.push(header.payload_size());
        flags_seen.push((header.flags().first(), header.flags().last()));
        offset += MessageHeader::SIZE + header.payload_size() as usize;
    }

    assert_eq!(sizes, vec![64, 64, 64, 8]);
    assert_eq!(flags_seen, vec![(true, false), (false, false), (false, false), (false, true)]);
}

struct FakeSwapBackend;

impl RuntimeBackend for FakeSwapBackend {
    fn init(&mut self, _registry: &mut kenning_core::LoaderRegistry) -> Result<(), BackendError> {
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
        Ok(buf.len().min(0))
    }

    fn deinit(&mut self, _registry: &mut kenning_core::LoaderRegistry) -> Result<(), BackendError> {
        Ok(())
    }
}

#[test]
fn runtime_swap_streams_blob_through_the_size_prefixed_loader() {
    use kenning_server::extension::ExtensionLoader;

    let (loader, blob) = ExtensionLoader::new(1024);
    let received = std::rc::Rc::new(std::cell::RefCell::new(None));
    let received_for_closure = std::rc::Rc::clone(&received);

    let swap: Box<dyn FnMut(&[u8]) -> Result<Box<dyn RuntimeBackend>, BackendError>> =
        Box::new(move |bytes: &[u8]| {
            *received_for_closure.borrow_mut() = Some(bytes.to_vec());
            Ok(Box::new(FakeSwapBackend) as Box<dyn RuntimeBackend>)
        });
    let support = ExtensionSupport { loader: Box::new(loader), blob, swap };

    let transport = LoopbackTransport::with_inbound(&[]);
    let mut dispatcher =
        Dispatcher::new(transport, 64, 64, 4096, Box::new(StubBackend::default()), Some(support)).unwrap();

    let mut payload = 4u32.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
    let (header, _) = round_trip(&mut dispatcher, &request(MessageType::Runtime, &payload));

    assert!(header.flags().success());
    assert_eq!(received.borrow().as_deref(), Some(&[0xaa, 0xbb, 0xcc, 0xdd][..]));
}
