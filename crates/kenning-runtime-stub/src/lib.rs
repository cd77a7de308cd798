//! A no-op [`RuntimeBackend`] with no compute kernels of its own.
//!
//! Grounded on `stub.c`: every lifecycle call succeeds unconditionally,
//! output is a deterministic run of zero bytes, and the one statistic it
//! reports is the wall-clock duration of the most recent `run`/`run_bench`.
//! Useful for exercising the protocol engine, dispatcher, and model
//! lifecycle end to end without a real compute backend attached.

use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use kenning_core::{
    BackendError, LoaderRegistry, LoaderType, Priority, RuntimeBackend, SharedBufferLoader,
    StatRecord, StatType,
};

/// Default capacity reserved for the MODEL and DATA loaders this backend
/// installs. The stub never reads the bytes it receives, so this only
/// bounds how much a caller may stream before `NOT_ENOUGH_MEMORY`.
pub const DEFAULT_LOADER_CAPACITY: usize = 64 * 1024;

/// The stub backend.
pub struct StubBackend {
    model_capacity: usize,
    data_capacity: usize,
    model_bytes: Rc<RefCell<Vec<u8>>>,
    data_bytes: Rc<RefCell<Vec<u8>>>,
    last_run: Option<Duration>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(DEFAULT_LOADER_CAPACITY, DEFAULT_LOADER_CAPACITY)
    }
}

impl StubBackend {
    /// Build a stub backend whose MODEL and DATA loaders accept up to
    /// `model_capacity`/`data_capacity` bytes respectively.
    #[must_use]
    pub fn new(model_capacity: usize, data_capacity: usize) -> Self {
        Self {
            model_capacity,
            data_capacity,
            model_bytes: Rc::new(RefCell::new(Vec::new())),
            data_bytes: Rc::new(RefCell::new(Vec::new())),
            last_run: None,
        }
    }
}

impl RuntimeBackend for StubBackend {
    fn init(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError> {
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
        Ok(())
    }

    fn init_input(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn run(&mut self) -> Result<(), BackendError> {
        self.last_run = Some(Duration::ZERO);
        Ok(())
    }

    fn run_bench(&mut self) -> Result<u64, BackendError> {
        let start = Instant::now();
        self.run()?;
        let elapsed = start.elapsed();
        self.last_run = Some(elapsed);
        Ok(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }

    fn get_output(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn get_statistics(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        let nanos = self.last_run.map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        let record = StatRecord::new("inference_time_ns", StatType::InferenceTime, nanos);
        let bytes = record.to_bytes();
        if buf.len() < bytes.len() {
            return Err(BackendError::Generic("statistics buffer too small"));
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn deinit(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError> {
        registry.clear(Priority::Backend, LoaderType::Model);
        registry.clear(Priority::Backend, LoaderType::Data);
        self.model_bytes.borrow_mut().clear();
        self.data_bytes.borrow_mut().clear();
        self.last_run = None;
        Ok(())
    }
}
