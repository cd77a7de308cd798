//! The loader abstraction: a sink object the protocol engine writes
//! streamed payload bytes into, decoupling reception from storage
//! destination.

use std::{cell::RefCell, rc::Rc};

use thiserror::Error;

/// Errors a [`Loader`] can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// `written + n` would exceed `max_size`.
    #[error("loader out of space: {written} + {attempted} > {max_size}")]
    NotEnoughMemory {
        /// Bytes already written.
        written: usize,
        /// Bytes this call attempted to append.
        attempted: usize,
        /// Capacity of the loader.
        max_size: usize,
    },
    /// The loader received a chunk it could not interpret (e.g. the
    /// extension loader's size prefix arriving in fewer than 4 bytes).
    #[error("loader rejected input: {0}")]
    InvalidInput(&'static str),
}

/// A payload sink: `reset` prepares it for up to `n` bytes, `save` appends a
/// chunk. Three realizations exist in this workspace: a flat buffer (below),
/// a hardware-register word stream (`kenning-server::hw_stream_loader`), and
/// a heap-allocated extension blob (`kenning-server::extension`).
pub trait Loader {
    /// Prepare to receive up to `expected_size` bytes; resets `written` to 0.
    fn reset(&mut self, expected_size: usize) -> Result<(), LoaderError>;

    /// Append `chunk`. Fails with [`LoaderError::NotEnoughMemory`] if this
    /// would push `written` past `max_size`; `written` is left pinned at
    /// `max_size` when that happens, never exceeding it.
    fn save(&mut self, chunk: &[u8]) -> Result<(), LoaderError>;

    /// Bytes written since the last `reset`.
    fn written(&self) -> usize;

    /// Capacity in bytes.
    fn max_size(&self) -> usize;
}

/// A loader that copies bytes verbatim into an owned, bounded buffer.
///
/// Grounded on the original's `buf_save`/`buf_save_one`/`buf_reset`: a flat
/// destination with no interpretation of the bytes it receives. Used for
/// the IOSPEC loader installed by the model lifecycle, and as the default
/// MODEL/DATA loaders before a backend installs its own.
pub struct BufferLoader {
    buf: Vec<u8>,
    max_size: usize,
}

impl BufferLoader {
    /// Create a loader bounded to `max_size` bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self { buf: Vec::with_capacity(max_size), max_size }
    }

    /// The bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Loader for BufferLoader {
    fn reset(&mut self, _expected_size: usize) -> Result<(), LoaderError> {
        self.buf.clear();
        Ok(())
    }

    fn save(&mut self, chunk: &[u8]) -> Result<(), LoaderError> {
        let attempted = chunk.len();
        if self.buf.len() + attempted > self.max_size {
            let room = self.max_size.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..room]);
            return Err(LoaderError::NotEnoughMemory {
                written: self.buf.len(),
                attempted,
                max_size: self.max_size,
            });
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn written(&self) -> usize {
        self.buf.len()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

/// A [`BufferLoader`] whose contents are shared via `Rc<RefCell<>>` with a
/// reader outside the registry.
///
/// Used for the IOSPEC loader: the dispatcher installs one half into the
/// registry so the protocol engine can stream into it, and keeps the other
/// half to read the committed bytes back out once `listen` returns. Single
/// ownership would work too, but the registry only ever hands back
/// `&mut dyn Loader`, not the concrete type, so there is no way to recover
/// the bytes through that interface alone. `Rc<RefCell<>>`, not
/// `Arc<Mutex<>>`, because the event loop this runs in is single-threaded.
pub struct SharedBufferLoader {
    buf: Rc<RefCell<Vec<u8>>>,
    max_size: usize,
}

impl SharedBufferLoader {
    /// Create a loader bounded to `max_size` bytes, returning it alongside a
    /// handle that observes the same underlying buffer.
    #[must_use]
    pub fn new(max_size: usize) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::with_capacity(max_size)));
        (Self { buf: Rc::clone(&buf), max_size }, buf)
    }

    /// Wrap an existing handle instead of allocating a new one, so a caller
    /// that already holds the `Rc` (e.g. a backend re-installing its own
    /// loader on every `init`) can keep observing the same buffer.
    #[must_use]
    pub fn from_handle(buf: Rc<RefCell<Vec<u8>>>, max_size: usize) -> Self {
        Self { buf, max_size }
    }
}

impl Loader for SharedBufferLoader {
    fn reset(&mut self, _expected_size: usize) -> Result<(), LoaderError> {
        self.buf.borrow_mut().clear();
        Ok(())
    }

    fn save(&mut self, chunk: &[u8]) -> Result<(), LoaderError> {
        let mut buf = self.buf.borrow_mut();
        let attempted = chunk.len();
        if buf.len() + attempted > self.max_size {
            let room = self.max_size.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..room]);
            return Err(LoaderError::NotEnoughMemory {
                written: buf.len(),
                attempted,
                max_size: self.max_size,
            });
        }
        buf.extend_from_slice(chunk);
        Ok(())
    }

    fn written(&self) -> usize {
        self.buf.borrow().len()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}
