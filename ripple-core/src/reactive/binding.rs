//! Render bindings.
//!
//! A view layer re-renders a fragment when the cell behind it changes. It
//! does so through a [`VersionBinding`]: a version counter bumped by the
//! cell's version setters, which run last in every notification pass, after
//! computeds and effects have settled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph::{CellHandle, Reactive, ReactiveNode};
use crate::reactive::subscriber::Trigger;

type BumpFn = dyn Fn(u64) + Send + Sync;

/// A version counter attached to one cell.
///
/// The cell only holds the binding's setter weakly. Dropping the binding
/// unregisters it.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{Runtime, Signal, VersionBinding};
///
/// let title = Signal::new(String::from("draft"));
/// let binding = VersionBinding::attach(&title);
///
/// title.set(String::from("final")).unwrap();
/// assert_eq!(binding.version(), 0);
///
/// Runtime::tick();
/// assert_eq!(binding.version(), 1);
/// ```
pub struct VersionBinding {
    cell: CellHandle,
    version: Arc<AtomicU64>,
    setter: Trigger,
}

impl VersionBinding {
    /// Attach a version counter to `cell`.
    pub fn attach(cell: &impl Reactive) -> Self {
        Self::register(cell.handle(), Arc::new(AtomicU64::new(0)), None)
    }

    /// Attach a version counter that also reports each new version to
    /// `on_bump`, typically a re-render request.
    pub fn attach_with<F>(cell: &impl Reactive, on_bump: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let on_bump: Box<BumpFn> = Box::new(on_bump);
        Self::register(cell.handle(), Arc::new(AtomicU64::new(0)), Some(on_bump))
    }

    fn register(cell: CellHandle, version: Arc<AtomicU64>, on_bump: Option<Box<BumpFn>>) -> Self {
        let counter = version.clone();
        let setter: Trigger = Arc::new(move || {
            let next = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(on_bump) = &on_bump {
                on_bump(next);
            }
        });
        cell.node().channels().add_version_setter(&setter);
        Self {
            cell,
            version,
            setter,
        }
    }

    /// Number of committed changes seen so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn cell(&self) -> &CellHandle {
        &self.cell
    }
}

impl Drop for VersionBinding {
    fn drop(&mut self) {
        self.cell.node().channels().remove_version_setter(&self.setter);
    }
}

impl std::fmt::Debug for VersionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionBinding")
            .field("cell", &self.cell)
            .field("version", &self.version())
            .finish()
    }
}
