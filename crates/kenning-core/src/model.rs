//! The model lifecycle state machine.
//!
//! Grounded on `model.h`'s state enum and the structural-validation rules
//! the original applies to a freshly streamed `model_spec` before accepting
//! it. This module owns no backend; it asks a [`crate::backend::RuntimeBackend`]
//! to do the actual compute work and only enforces state ordering and tensor
//! shape bookkeeping itself.

use std::{cell::RefCell, rc::Rc};

use kenning_proto::{DataTypeCode, LoaderType, ModelSpec};
use thiserror::Error;

use crate::{
    backend::{BackendError, RuntimeBackend},
    loader::SharedBufferLoader,
    registry::{LoaderRegistry, Priority},
};

/// The model lifecycle's states, in the order preconditions require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelState {
    /// No backend is attached yet.
    Uninit,
    /// `init` has run; the backend is ready to receive a structure.
    Initialized,
    /// A valid `model_spec` has been committed.
    StructLoaded,
    /// Weights have been committed.
    WeightsLoaded,
    /// Input has been committed.
    InputLoaded,
    /// `run`/`run_bench` has completed against the loaded input.
    InferenceDone,
}

/// Errors the model layer can report.
#[derive(Error, Debug)]
pub enum ModelError {
    /// An operation's state precondition was not met; the state is
    /// unchanged.
    #[error("invalid state: {operation} requires at least {required:?}, currently {actual:?}")]
    InvalidState {
        /// Name of the operation that was rejected.
        operation: &'static str,
        /// The minimum state the operation requires.
        required: ModelState,
        /// The state the model was actually in.
        actual: ModelState,
    },
    /// The IOSPEC payload's length did not equal `size_of::<ModelSpec>()`.
    #[error("model spec has the wrong length")]
    MalformedSpec,
    /// A tensor in an otherwise well-formed spec failed a validation rule.
    #[error("tensor validation failed: {0}")]
    InvalidTensor(&'static str),
    /// `load_input_from_loader`'s `expected` did not match `get_input_size()`.
    #[error("input size mismatch: expected {expected}, got {actual}")]
    InputSizeMismatch {
        /// The size `get_input_size()` computed.
        expected: usize,
        /// The size the caller actually streamed.
        actual: usize,
    },
    /// The caller's output buffer was smaller than `get_output_size()`.
    #[error("output buffer too small: need {needed}, got {given}")]
    OutputBufferTooSmall {
        /// The size `get_output_size()` computed.
        needed: usize,
        /// The size of the buffer the caller actually supplied.
        given: usize,
    },
    /// The attached backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn require(operation: &'static str, actual: ModelState, required: ModelState) -> Result<(), ModelError> {
    if actual >= required {
        Ok(())
    } else {
        Err(ModelError::InvalidState { operation, required, actual })
    }
}

fn validate_tensor_set(
    count: u8,
    max: usize,
    dims: &[u8],
    shapes: &[[u32; kenning_proto::MAX_DIM]],
    dtypes: &[kenning_proto::DataType],
) -> Result<(), ModelError> {
    if count == 0 || count as usize > max {
        return Err(ModelError::InvalidTensor("num_tensors out of range"));
    }
    for i in 0..count as usize {
        let num_dim = dims[i];
        if num_dim == 0 || num_dim as usize > kenning_proto::MAX_DIM {
            return Err(ModelError::InvalidTensor("num_dim out of range"));
        }
        if shapes[i][..num_dim as usize].iter().any(|&d| d == 0) {
            return Err(ModelError::InvalidTensor("tensor dimension must be strictly positive"));
        }
        let dtype = dtypes[i];
        if dtype.bits % 8 != 0 {
            return Err(ModelError::InvalidTensor("bits not a multiple of 8"));
        }
        if DataTypeCode::try_from(dtype.code).is_err() {
            return Err(ModelError::InvalidTensor("data type code out of range"));
        }
    }
    Ok(())
}

fn tensor_set_size(count: u8, dims: &[u8], shapes: &[[u32; kenning_proto::MAX_DIM]], dtypes: &[kenning_proto::DataType]) -> usize {
    let mut total = 0usize;
    for i in 0..count as usize {
        let num_dim = dims[i] as usize;
        let elements: usize = shapes[i][..num_dim].iter().map(|&d| d as usize).product();
        let bytes_per_element = (dtypes[i].bits as usize).div_ceil(8);
        total += elements * bytes_per_element;
    }
    total
}

/// Owns the current model state, spec, and a pluggable backend.
///
/// The backend is boxed rather than generic so a RUNTIME extension swap can
/// replace it with a different concrete type at runtime, mirroring the
/// original's vtable-of-function-pointers swap.
pub struct ModelLifecycle {
    backend: Box<dyn RuntimeBackend>,
    state: ModelState,
    spec: Option<ModelSpec>,
    last_run_ns: Option<(u64, u64)>,
    iospec_handle: Option<Rc<RefCell<Vec<u8>>>>,
}

impl ModelLifecycle {
    /// Build a lifecycle wrapping `backend`, starting in [`ModelState::Uninit`].
    #[must_use]
    pub fn new(backend: Box<dyn RuntimeBackend>) -> Self {
        Self { backend, state: ModelState::Uninit, spec: None, last_run_ns: None, iospec_handle: None }
    }

    /// The handle observing the IOSPEC loader this lifecycle installed
    /// during `init`, if any. The dispatcher reads the committed bytes back
    /// out of this after `listen` streams an IOSPEC payload in.
    #[must_use]
    pub fn iospec_handle(&self) -> Option<Rc<RefCell<Vec<u8>>>> {
        self.iospec_handle.clone()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// The committed model spec, if any.
    #[must_use]
    pub fn spec(&self) -> Option<&ModelSpec> {
        self.spec.as_ref()
    }

    /// Initialize the backend and install the IOSPEC loader, advancing to
    /// [`ModelState::Initialized`].
    pub fn init(&mut self, registry: &mut LoaderRegistry) -> Result<(), ModelError> {
        self.backend.init(registry)?;
        let (loader, handle) = SharedBufferLoader::new(ModelSpec::SIZE);
        registry.install(Priority::Core, LoaderType::Iospec, Box::new(loader));
        self.iospec_handle = Some(handle);
        self.state = ModelState::Initialized;
        Ok(())
    }

    /// Validate and commit a freshly streamed model spec.
    pub fn load_struct(&mut self, bytes: &[u8]) -> Result<(), ModelError> {
        require("load_struct_from_loader", self.state, ModelState::Initialized)?;

        let spec = ModelSpec::from_exact_bytes(bytes).ok_or(ModelError::MalformedSpec)?;
        let input_shape = spec.input_shape;
        let output_shape = spec.output_shape;
        validate_tensor_set(
            spec.num_input,
            kenning_proto::MAX_IN,
            &spec.num_input_dim,
            &input_shape,
            &spec.input_data_type,
        )?;
        validate_tensor_set(
            spec.num_output,
            kenning_proto::MAX_OUT,
            &spec.num_output_dim,
            &output_shape,
            &spec.output_data_type,
        )?;

        self.spec = Some(spec);
        self.state = ModelState::StructLoaded;
        Ok(())
    }

    /// `Σ over inputs of prod(shape) * ceil(bits/8)`.
    pub fn input_size(&self) -> Result<usize, ModelError> {
        require("get_input_size", self.state, ModelState::StructLoaded)?;
        let spec = self.spec.as_ref().expect("StructLoaded implies spec is set");
        let input_shape = spec.input_shape;
        Ok(tensor_set_size(spec.num_input, &spec.num_input_dim, &input_shape, &spec.input_data_type))
    }

    /// `Σ over outputs of prod(shape) * ceil(bits/8)`.
    pub fn output_size(&self) -> Result<usize, ModelError> {
        require("get_output_size", self.state, ModelState::StructLoaded)?;
        let spec = self.spec.as_ref().expect("StructLoaded implies spec is set");
        let output_shape = spec.output_shape;
        Ok(tensor_set_size(spec.num_output, &spec.num_output_dim, &output_shape, &spec.output_data_type))
    }

    /// Delegate weight loading to the backend and advance to
    /// [`ModelState::WeightsLoaded`].
    pub fn load_weights(&mut self) -> Result<(), ModelError> {
        require("load_weights_from_loader", self.state, ModelState::StructLoaded)?;
        self.backend.init_weights()?;
        self.state = ModelState::WeightsLoaded;
        Ok(())
    }

    /// Commit streamed input after checking `expected == input_size()`, and
    /// advance to [`ModelState::InputLoaded`].
    pub fn load_input(&mut self, expected: usize) -> Result<(), ModelError> {
        require("load_input_from_loader", self.state, ModelState::WeightsLoaded)?;
        let actual = self.input_size()?;
        if expected != actual {
            return Err(ModelError::InputSizeMismatch { expected, actual });
        }
        self.backend.init_input()?;
        self.state = ModelState::InputLoaded;
        Ok(())
    }

    /// Run inference and advance to [`ModelState::InferenceDone`].
    pub fn run(&mut self) -> Result<(), ModelError> {
        require("run", self.state, ModelState::InputLoaded)?;
        self.backend.run()?;
        self.last_run_ns = None;
        self.state = ModelState::InferenceDone;
        Ok(())
    }

    /// Run inference with timing capture, recording `(start_ns, delta_ns)`.
    pub fn run_bench(&mut self, start_ns: u64) -> Result<(), ModelError> {
        require("run_bench", self.state, ModelState::InputLoaded)?;
        let delta_ns = self.backend.run_bench()?;
        self.last_run_ns = Some((start_ns, delta_ns));
        self.state = ModelState::InferenceDone;
        Ok(())
    }

    /// The `(start_ns, delta_ns)` pair recorded by the most recent
    /// `run_bench`, if any.
    #[must_use]
    pub fn last_run_ns(&self) -> Option<(u64, u64)> {
        self.last_run_ns
    }

    /// Copy the inference output into `buf`, which must be at least
    /// `output_size()` bytes.
    pub fn output(&mut self, buf: &mut [u8]) -> Result<usize, ModelError> {
        require("get_output", self.state, ModelState::InferenceDone)?;
        let needed = self.output_size()?;
        if buf.len() < needed {
            return Err(ModelError::OutputBufferTooSmall { needed, given: buf.len() });
        }
        Ok(self.backend.get_output(&mut buf[..needed])?)
    }

    /// Serialize the backend's statistics records into `buf`, returning the
    /// number of bytes written.
    pub fn statistics(&mut self, buf: &mut [u8]) -> Result<usize, ModelError> {
        require("get_statistics", self.state, ModelState::WeightsLoaded)?;
        Ok(self.backend.get_statistics(buf)?)
    }

    /// Tear down the current backend and reset to [`ModelState::Uninit`],
    /// discarding any committed spec and the IOSPEC loader.
    pub fn deinit(&mut self, registry: &mut LoaderRegistry) -> Result<(), ModelError> {
        self.backend.deinit(registry)?;
        registry.clear(Priority::Core, LoaderType::Iospec);
        self.iospec_handle = None;
        self.spec = None;
        self.last_run_ns = None;
        self.state = ModelState::Uninit;
        Ok(())
    }

    /// Replace the backend outright, e.g. after a RUNTIME extension swap.
    /// Leaves the model state at [`ModelState::Uninit`]; the caller is
    /// expected to `init` the new backend next.
    pub fn replace_backend(&mut self, backend: Box<dyn RuntimeBackend>) {
        self.backend = backend;
        self.spec = None;
        self.last_run_ns = None;
        self.state = ModelState::Uninit;
    }

    /// The wrapped backend.
    pub fn backend_mut(&mut self) -> &mut dyn RuntimeBackend {
        self.backend.as_mut()
    }
}
