//! The runtime-backend contract: a pluggable implementation of the compute
//! step, called by [`crate::model::ModelLifecycle`].
//!
//! Modeled as a value containing eight function-valued fields, per the
//! protocol's own design note; here that value is a trait object rather
//! than a vtable struct, since Rust traits give us the same dispatch
//! without the `unsafe` function-pointer plumbing the original needs.

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::registry::LoaderRegistry;

/// Errors a [`RuntimeBackend`] can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend has not been initialized.
    #[error("backend uninitialized")]
    Uninit,
    /// The backend failed for a reason with no more specific variant.
    #[error("backend error: {0}")]
    Generic(&'static str),
    /// No backend is currently attached (e.g. mid extension swap).
    #[error("no backend attached")]
    NoBackend,
}

/// The compute contract every backend implements: structure/weight/input
/// staging, inference, output and statistics retrieval, and teardown.
///
/// The backend owns its own loaders for MODEL and DATA payloads and
/// installs them into `registry` at [`crate::registry::Priority::Backend`]
/// during `init`, removing them again in `deinit`.
pub trait RuntimeBackend {
    /// Bring the backend up and install its MODEL/DATA loaders into
    /// `registry`. Called once per attach (including after an extension
    /// swap).
    fn init(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError>;

    /// Commit weights the loader has already staged.
    fn init_weights(&mut self) -> Result<(), BackendError>;

    /// Commit input the loader has already staged.
    fn init_input(&mut self) -> Result<(), BackendError>;

    /// Run inference on the committed input.
    fn run(&mut self) -> Result<(), BackendError>;

    /// Run inference with timing capture, returning the elapsed nanoseconds.
    ///
    /// The default wraps [`RuntimeBackend::run`] with a backend-supplied
    /// zero duration; a real backend overrides this to measure the actual
    /// elapsed time.
    fn run_bench(&mut self) -> Result<u64, BackendError> {
        self.run()?;
        Ok(0)
    }

    /// Copy the inference output into `buf`, returning bytes written.
    fn get_output(&mut self, buf: &mut [u8]) -> Result<usize, BackendError>;

    /// Serialize this backend's statistics records into `buf`, returning
    /// bytes written.
    fn get_statistics(&mut self, buf: &mut [u8]) -> Result<usize, BackendError>;

    /// Tear the backend down, releasing any resources it holds and
    /// withdrawing its loaders from `registry`.
    fn deinit(&mut self, registry: &mut LoaderRegistry) -> Result<(), BackendError>;
}

/// A statistics record's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum StatType {
    /// Unclassified measurement.
    Default = 0,
    /// A memory-allocation count or size.
    Allocation = 1,
    /// An inference duration, in nanoseconds.
    InferenceTime = 2,
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawStatRecord {
    name: [u8; 32],
    kind: u64,
    value: u64,
}

/// A single statistics record, `{name: ASCII[32], type: u64, value: u64}`,
/// serialized as an exact 48-byte wire record.
#[derive(Clone, Copy)]
pub struct StatRecord {
    raw: RawStatRecord,
}

impl StatRecord {
    /// Size of one serialized record in bytes.
    pub const SIZE: usize = core::mem::size_of::<RawStatRecord>();

    /// Build a record. `name` is truncated to 31 bytes if longer (the 32nd
    /// byte is always left 0 as an implicit terminator).
    #[must_use]
    pub fn new(name: &str, kind: StatType, value: u64) -> Self {
        let mut name_bytes = [0u8; 32];
        let bytes = name.as_bytes();
        let len = bytes.len().min(31);
        name_bytes[..len].copy_from_slice(&bytes[..len]);
        Self { raw: RawStatRecord { name: name_bytes, kind: kind as u64, value } }
    }

    /// Serialize to the fixed 48-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = self.raw.as_bytes();
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }
}
