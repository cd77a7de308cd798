//! Dynamically loaded extension backends.
//!
//! Grounded on `runtime_wrapper.h`'s `RUNTIME_LL_EXTENSION_SYMBOLS` and
//! `inference_server.c`'s `save_runtime`/`prepare_llext_loader`: the
//! original resolves a freshly flashed ELF's `runtime_*` symbols against an
//! in-memory loader (`llext.c`). This crate's hosted analogue is
//! `libloading` against a dynamic library written to a temp file, the
//! idiomatic way a long-running Rust process loads code at runtime.
//!
//! `unsafe_code` is scoped to this module alone; every other module in the
//! workspace keeps the deny.

#![allow(unsafe_code)]

use std::{cell::RefCell, rc::Rc};

use kenning_core::{
    BackendError, ExtensionSupport, Loader, LoaderError, LoaderRegistry, LoaderType, Priority,
    RuntimeBackend, SharedBufferLoader,
};
use libloading::{Library, Symbol};
use tempfile::NamedTempFile;

/// The symbol names the original calls `RUNTIME_LL_EXTENSION_SYMBOLS`.
mod symbols {
    pub const INIT: &[u8] = b"runtime_init\0";
    pub const INIT_WEIGHTS: &[u8] = b"runtime_init_weights\0";
    pub const INIT_INPUT: &[u8] = b"runtime_init_input\0";
    pub const RUN_MODEL: &[u8] = b"runtime_run_model\0";
    pub const RUN_MODEL_BENCH: &[u8] = b"runtime_run_model_bench\0";
    pub const GET_MODEL_OUTPUT: &[u8] = b"runtime_get_model_output\0";
    pub const GET_STATISTICS: &[u8] = b"runtime_get_statistics\0";
    pub const DEINIT: &[u8] = b"runtime_deinit\0";
}

enum LoadState {
    AwaitingSize,
    Streaming,
}

/// The RUNTIME loader: the stream must open with a 4-byte little-endian
/// total-size prefix (mirroring `save_runtime`'s first-call convention),
/// validated against a configured heap budget before any bytes are
/// accepted.
pub struct ExtensionLoader {
    state: LoadState,
    heap_cap: usize,
    announced: usize,
    buf: Rc<RefCell<Vec<u8>>>,
}

impl ExtensionLoader {
    /// Build a loader bounded to `heap_cap` bytes, returning it alongside a
    /// handle that observes the accumulated blob.
    #[must_use]
    pub fn new(heap_cap: usize) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        (Self { state: LoadState::AwaitingSize, heap_cap, announced: 0, buf: Rc::clone(&buf) }, buf)
    }
}

impl Loader for ExtensionLoader {
    fn reset(&mut self, _expected_size: usize) -> Result<(), LoaderError> {
        self.state = LoadState::AwaitingSize;
        self.announced = 0;
        self.buf.borrow_mut().clear();
        Ok(())
    }

    fn save(&mut self, chunk: &[u8]) -> Result<(), LoaderError> {
        let mut chunk = chunk;
        if matches!(self.state, LoadState::AwaitingSize) {
            if chunk.len() < 4 {
                return Err(LoaderError::InvalidInput("extension stream must open with a 4-byte size prefix"));
            }
            let announced = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
            if announced > self.heap_cap {
                return Err(LoaderError::NotEnoughMemory { written: 0, attempted: announced, max_size: self.heap_cap });
            }
            self.announced = announced;
            self.buf.borrow_mut().reserve(announced);
            self.state = LoadState::Streaming;
            chunk = &chunk[4..];
        }

        let mut buf = self.buf.borrow_mut();
        let attempted = chunk.len();
        if buf.len() + attempted > self.announced {
            let room = self.announced.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..room]);
            return Err(LoaderError::NotEnoughMemory { written: buf.len(), attempted, max_size: self.announced });
        }
        buf.extend_from_slice(chunk);
        Ok(())
    }

    fn written(&self) -> usize {
        self.buf.borrow().len()
    }

    fn max_size(&self) -> usize {
        self.announced
    }
}

/// A [`RuntimeBackend`] resolved from a dynamically loaded library.
///
/// The original's `runtime_init_weights`/`runtime_init_input`/
/// `runtime_get_model_output` take no (or minimal) explicit pointer
/// arguments, relying on a shared static memory arena that a hosted
/// dynamically loaded library has no equivalent of. This backend adapts
/// those three calls to take an explicit `(ptr, len)` pair instead;
/// `runtime_get_statistics`'s signature is carried over unchanged, since the
/// original already passes its buffer explicitly.
pub struct DynamicBackend {
    library: Library,
    _tempfile: NamedTempFile,
    model_bytes: Rc<RefCell<Vec<u8>>>,
    data_bytes: Rc<RefCell<Vec<u8>>>,
    model_capacity: usize,
    data_capacity: usize,
}

impl DynamicBackend {
    /// Write `blob` to a temp file and open it as a dynamic library.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Generic`] if the blob cannot be written to
    /// disk or `dlopen`-equivalent loading fails.
    pub fn from_blob(blob: &[u8], model_capacity: usize, data_capacity: usize) -> Result<Self, BackendError> {
        use std::io::Write as _;

        let mut tempfile = NamedTempFile::new().map_err(|_| BackendError::Generic("could not create temp file for extension blob"))?;
        tempfile.write_all(blob).map_err(|_| BackendError::Generic("could not write extension blob to disk"))?;
        tempfile.flush().map_err(|_| BackendError::Generic("could not flush extension blob to disk"))?;

        // SAFETY: the loaded library's code runs with this process's full
        // privileges, same as any other dynamically loaded library; no
        // additional invariant is established or relied on here beyond what
        // `libloading::Library::new` itself documents.
        let library = unsafe { Library::new(tempfile.path()) }
            .map_err(|_| BackendError::Generic("could not load extension as a dynamic library"))?;

        Ok(Self {
            library,
            _tempfile: tempfile,
            model_bytes: Rc::new(RefCell::new(Vec::new())),
            data_bytes: Rc::new(RefCell::new(Vec::new())),
            model_capacity,
            data_capacity,
        })
    }

    fn call_status(&self, symbol_name: &[u8]) -> Result<(), BackendError> {
        // SAFETY: `symbol_name` names a function documented by
        // `runtime_wrapper.h` to take no arguments and return an `i32`
        // status; the extension blob is expected to export exactly that
        // signature under this name.
        unsafe {
            let symbol: Symbol<unsafe extern "C" fn() -> i32> =
                self.library.get(symbol_name).map_err(|_| BackendError::Generic("missing extension symbol"))?;
            if symbol() == 0 {
                Ok(())
            } else {
                Err(BackendError::Generic("extension call returned an error status"))
            }
        }
    }

    fn call_status_with_buf(&self, symbol_name: &[u8], bytes: &[u8]) -> Result<(), BackendError> {
        // SAFETY: see `call_status`; this variant's exported signature takes
        // a `(*const u8, usize)` pair instead of no arguments.
        unsafe {
            let symbol: Symbol<unsafe extern "C" fn(*const u8, usize) -> i32> =
                self.library.get(symbol_name).map_err(|_| BackendError::Generic("missing extension symbol"))?;
            if symbol(bytes.as_ptr(), bytes.len()) == 0 {
                Ok(())
            } else {
                Err(BackendError::Generic("extension call returned an error status"))
            }
        }
    }
}

impl RuntimeBackend for DynamicBackend {
    fn init(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError> {
        self.call_status(symbols::INIT)?;
        registry.install(
            Priority::Backend,
            LoaderType::Model,
            Box::new(SharedBufferLoader::from_handle(Rc::clone(&self.model_bytes), self.model_capacity)),
        );
        registry.install(
            Priority::Backend,
            LoaderType::Data,
            Box::new(SharedBufferLoader::from_handle(Rc::clone(&self.data_bytes), self.data_capacity)),
        );
        Ok(())
    }

    fn init_weights(&mut self) -> Result<(), BackendError> {
        let bytes = self.model_bytes.borrow().clone();
        self.call_status_with_buf(symbols::INIT_WEIGHTS, &bytes)
    }

    fn init_input(&mut self) -> Result<(), BackendError> {
        let bytes = self.data_bytes.borrow().clone();
        self.call_status_with_buf(symbols::INIT_INPUT, &bytes)
    }

    fn run(&mut self) -> Result<(), BackendError> {
        self.call_status(symbols::RUN_MODEL)
    }

    fn run_bench(&mut self) -> Result<u64, BackendError> {
        let start = std::time::Instant::now();
        self.call_status(symbols::RUN_MODEL_BENCH)?;
        Ok(u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX))
    }

    fn get_output(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        // SAFETY: see `call_status`; `runtime_get_model_output` is adapted
        // to take an explicit `(*mut u8, usize)` destination.
        unsafe {
            let symbol: Symbol<unsafe extern "C" fn(*mut u8, usize) -> i32> = self
                .library
                .get(symbols::GET_MODEL_OUTPUT)
                .map_err(|_| BackendError::Generic("missing extension symbol"))?;
            if symbol(buf.as_mut_ptr(), buf.len()) == 0 {
                Ok(buf.len())
            } else {
                Err(BackendError::Generic("extension call returned an error status"))
            }
        }
    }

    fn get_statistics(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        let mut out_size: usize = 0;
        // SAFETY: signature carried over unchanged from `runtime_wrapper.h`.
        unsafe {
            let symbol: Symbol<unsafe extern "C" fn(usize, *mut u8, *mut usize) -> i32> = self
                .library
                .get(symbols::GET_STATISTICS)
                .map_err(|_| BackendError::Generic("missing extension symbol"))?;
            if symbol(buf.len(), buf.as_mut_ptr(), std::ptr::addr_of_mut!(out_size)) == 0 {
                Ok(out_size)
            } else {
                Err(BackendError::Generic("extension call returned an error status"))
            }
        }
    }

    fn deinit(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError> {
        registry.clear(Priority::Backend, LoaderType::Model);
        registry.clear(Priority::Backend, LoaderType::Data);
        self.call_status(symbols::DEINIT)
    }
}

/// Build the [`ExtensionSupport`] a [`kenning_core::Dispatcher`] installs:
/// an [`ExtensionLoader`] feeding an [`ExtensionRuntime`]-internal blob, and
/// a `swap` closure that opens the accumulated bytes as a [`DynamicBackend`].
#[must_use]
pub fn build_extension_support(heap_cap: usize) -> ExtensionSupport {
    let (loader, blob) = ExtensionLoader::new(heap_cap);
    let swap: Box<dyn FnMut(&[u8]) -> Result<Box<dyn RuntimeBackend>, BackendError>> =
        Box::new(move |bytes: &[u8]| -> Result<Box<dyn RuntimeBackend>, BackendError> {
            let backend = DynamicBackend::from_blob(bytes, heap_cap, heap_cap)?;
            Ok(Box::new(backend) as Box<dyn RuntimeBackend>)
        });
    ExtensionSupport { loader: Box::new(loader), blob, swap }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_stream_opening_with_fewer_than_four_bytes() {
        let (mut loader, _blob) = ExtensionLoader::new(1024);
        let err = loader.save(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidInput(_)));
    }

    #[test]
    fn rejects_announced_size_over_heap_cap() {
        let (mut loader, _blob) = ExtensionLoader::new(8);
        let announced = 1024u32.to_le_bytes();
        let err = loader.save(&announced).unwrap_err();
        assert!(matches!(err, LoaderError::NotEnoughMemory { .. }));
    }

    #[test]
    fn streams_blob_after_size_prefix() {
        let (mut loader, blob) = ExtensionLoader::new(1024);
        let mut chunk = 4u32.to_le_bytes().to_vec();
        chunk.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        loader.save(&chunk).unwrap();
        assert_eq!(&*blob.borrow(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(loader.written(), 4);
    }

    #[test]
    fn reset_clears_state_back_to_awaiting_size() {
        let (mut loader, blob) = ExtensionLoader::new(1024);
        let mut chunk = 4u32.to_le_bytes().to_vec();
        chunk.extend_from_slice(&[1, 2, 3, 4]);
        loader.save(&chunk).unwrap();

        loader.reset(0).unwrap();
        assert_eq!(loader.written(), 0);
        assert!(blob.borrow().is_empty());

        let err = loader.save(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidInput(_)));
    }

    #[test]
    fn overflow_beyond_announced_size_is_rejected() {
        let (mut loader, _blob) = ExtensionLoader::new(1024);
        let mut chunk = 2u32.to_le_bytes().to_vec();
        chunk.extend_from_slice(&[1, 2, 3]);
        let err = loader.save(&chunk).unwrap_err();
        assert!(matches!(err, LoaderError::NotEnoughMemory { .. }));
    }
}
