//! Two-layer loader registry.
//!
//! A tagged destination table: `[priority][loader_type] -> loader`. Lookups
//! walk from low to high priority and return the highest-priority non-empty
//! entry, so a backend can override a core default without removing it.
//! Grounded on `g_ldr_tables[LDR_TABLE_COUNT][NUM_LOADER_TYPES]`.

use kenning_proto::LoaderType;

use crate::loader::Loader;

const SLOT_COUNT: usize = 4; // Data, Model, Iospec, Runtime (None is never stored)

fn slot(loader_type: LoaderType) -> Option<usize> {
    match loader_type {
        LoaderType::None => None,
        LoaderType::Data => Some(0),
        LoaderType::Model => Some(1),
        LoaderType::Iospec => Some(2),
        LoaderType::Runtime => Some(3),
    }
}

/// Which row of the registry an install targets.
///
/// Per the protocol's design note, higher-priority entries override lower
/// ones: [`Priority::Backend`] beats [`Priority::Core`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Core-installed defaults (e.g. the IOSPEC loader from `model_init`).
    Core = 0,
    /// Installed by the active runtime backend during its own `init`.
    Backend = 1,
}

/// The two-priority-row loader table.
pub struct LoaderRegistry {
    rows: [[Option<Box<dyn Loader>>; SLOT_COUNT]; 2],
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { rows: [[None, None, None, None], [None, None, None, None]] }
    }

    /// Install a loader at `priority` for `loader_type`, replacing any
    /// previous loader in that slot.
    ///
    /// No-op if `loader_type` is [`LoaderType::None`] (nothing ever streams
    /// into it).
    pub fn install(&mut self, priority: Priority, loader_type: LoaderType, loader: Box<dyn Loader>) {
        if let Some(idx) = slot(loader_type) {
            self.rows[priority as usize][idx] = Some(loader);
        }
    }

    /// Remove whatever loader occupies `priority`/`loader_type`, if any.
    pub fn clear(&mut self, priority: Priority, loader_type: LoaderType) {
        if let Some(idx) = slot(loader_type) {
            self.rows[priority as usize][idx] = None;
        }
    }

    /// Resolve the active loader for `loader_type`: the backend row if
    /// occupied, else the core row, else `None`.
    pub fn resolve(&mut self, loader_type: LoaderType) -> Option<&mut dyn Loader> {
        let idx = slot(loader_type)?;
        if self.rows[Priority::Backend as usize][idx].is_some() {
            match &mut self.rows[Priority::Backend as usize][idx] {
                Some(loader) => Some(&mut **loader),
                None => None,
            }
        } else {
            match &mut self.rows[Priority::Core as usize][idx] {
                Some(loader) => Some(&mut **loader),
                None => None,
            }
        }
    }
}
