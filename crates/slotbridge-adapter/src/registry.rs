#![forbid(unsafe_code)]

//! Slot render registry: the adapter's state mirror of the engine's slots.
//!
//! The only writer is the reflow notifier's target ([`SlotRegistry::apply`]),
//! plus [`SlotRegistry::clear`] on deactivation. Each apply replaces the
//! whole snapshot and raises the pending-reflow flag; the adapter clears the
//! flag when it issues the post-render `update_size`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotbridge_core::RenderingSnapshot;

struct RegistryState<N, C> {
    snapshot: RenderingSnapshot<N, C>,
    needs_resize: bool,
    version: u64,
    applied: u64,
}

/// Shared handle to the adapter's slot state.
pub struct SlotRegistry<N, C> {
    state: Rc<RefCell<RegistryState<N, C>>>,
}

impl<N, C> SlotRegistry<N, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RegistryState {
                snapshot: RenderingSnapshot::empty(),
                needs_resize: false,
                version: 0,
                applied: 0,
            })),
        }
    }

    /// Replace the snapshot and mark a reflow as pending.
    pub fn apply(&self, snapshot: RenderingSnapshot<N, C>) {
        let mut state = self.state.borrow_mut();
        state.snapshot = snapshot;
        state.needs_resize = true;
        state.version += 1;
        state.applied += 1;
    }

    /// Drop every slot and any pending reflow.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.snapshot = RenderingSnapshot::empty();
        state.needs_resize = false;
        state.version += 1;
    }

    /// Clear the pending-reflow flag, returning whether it was set.
    pub fn take_needs_resize(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().needs_resize)
    }

    #[must_use]
    pub fn needs_resize(&self) -> bool {
        self.state.borrow().needs_resize
    }

    #[must_use]
    pub fn snapshot(&self) -> RenderingSnapshot<N, C> {
        self.state.borrow().snapshot.clone()
    }

    /// Increments on every state change. Hosts compare it to decide whether
    /// a re-render is due.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    #[must_use]
    pub fn applied_count(&self) -> u64 {
        self.state.borrow().applied
    }
}

impl<N, C> Clone for SlotRegistry<N, C> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<N, C> Default for SlotRegistry<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: fmt::Debug, C> fmt::Debug for SlotRegistry<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SlotRegistry")
            .field("version", &state.version)
            .field("needs_resize", &state.needs_resize)
            .field("slots", &state.snapshot)
            .finish()
    }
}
