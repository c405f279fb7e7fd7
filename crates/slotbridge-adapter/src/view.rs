#![forbid(unsafe_code)]

//! Output of [`EngineAdapter::render`](crate::EngineAdapter::render).
//!
//! The root element itself is the adapter's container; the engine manages
//! every other node under it directly. The declarative side only sees the
//! portals, one per active slot, keyed by slot id.

use slotbridge_core::SlotId;

/// Content to mount into an engine-owned container.
#[derive(Debug, Clone, PartialEq)]
pub struct Portal<N, C> {
    /// Reconciliation key.
    pub key: SlotId,
    /// Target container node.
    pub container: N,
    pub content: C,
}

/// The adapter's render result: a root holding only portals.
#[derive(Debug, Clone, PartialEq)]
pub struct RootView<N, C> {
    /// Portals in slot id order.
    pub portals: Vec<Portal<N, C>>,
    /// State-mirror version this view was rendered from.
    pub registry_version: u64,
}

impl<N, C> RootView<N, C> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.portals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    #[must_use]
    pub fn portal(&self, key: &SlotId) -> Option<&Portal<N, C>> {
        self.portals.iter().find(|p| &p.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SlotId> {
        self.portals.iter().map(|p| &p.key)
    }
}
