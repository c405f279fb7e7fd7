#![forbid(unsafe_code)]

//! Keyed portal reconciliation.
//!
//! Stands in for the host framework's reconciler: given consecutive
//! [`RootView`]s it works out which portals to mount, update or unmount,
//! matching portals by key.
//!
//! # Invariants
//!
//! 1. After [`PortalReconciler::reconcile`], the mounted set equals the
//!    view's portals exactly.
//! 2. A portal whose key survives but whose container changed is unmounted
//!    from the old container and mounted into the new one.
//! 3. Unchanged portals produce no operation.

use std::collections::BTreeMap;

use slotbridge_adapter::RootView;
use slotbridge_core::SlotId;

/// Where portal content lands.
pub trait PortalTarget<N, C> {
    fn mount(&mut self, container: &N, content: &C);
    fn unmount(&mut self, container: &N);
}

/// One reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalOp<N, C> {
    Mount { key: SlotId, container: N, content: C },
    Update { key: SlotId, container: N, content: C },
    Unmount { key: SlotId, container: N },
}

impl<N, C> PortalOp<N, C> {
    #[must_use]
    pub fn key(&self) -> &SlotId {
        match self {
            Self::Mount { key, .. } | Self::Update { key, .. } | Self::Unmount { key, .. } => key,
        }
    }
}

/// Tracks mounted portals by key.
#[derive(Debug)]
pub struct PortalReconciler<N, C> {
    mounted: BTreeMap<SlotId, (N, C)>,
}

impl<N: Clone + PartialEq, C: Clone + PartialEq> PortalReconciler<N, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounted: BTreeMap::new(),
        }
    }

    /// Diff `view` against the mounted set and apply the result to `target`.
    pub fn reconcile(
        &mut self,
        view: &RootView<N, C>,
        target: &mut impl PortalTarget<N, C>,
    ) -> Vec<PortalOp<N, C>> {
        let mut ops = Vec::new();
        let mut next = BTreeMap::new();

        for portal in &view.portals {
            match self.mounted.remove(&portal.key) {
                Some((container, content)) if container == portal.container => {
                    if content != portal.content {
                        ops.push(PortalOp::Update {
                            key: portal.key.clone(),
                            container: container.clone(),
                            content: portal.content.clone(),
                        });
                    }
                }
                Some((container, _)) => {
                    ops.push(PortalOp::Unmount {
                        key: portal.key.clone(),
                        container,
                    });
                    ops.push(PortalOp::Mount {
                        key: portal.key.clone(),
                        container: portal.container.clone(),
                        content: portal.content.clone(),
                    });
                }
                None => ops.push(PortalOp::Mount {
                    key: portal.key.clone(),
                    container: portal.container.clone(),
                    content: portal.content.clone(),
                }),
            }
            next.insert(
                portal.key.clone(),
                (portal.container.clone(), portal.content.clone()),
            );
        }

        // Whatever is left was not in the view.
        for (key, (container, _)) in std::mem::take(&mut self.mounted) {
            ops.push(PortalOp::Unmount { key, container });
        }
        self.mounted = next;

        for op in &ops {
            match op {
                PortalOp::Mount {
                    container, content, ..
                }
                | PortalOp::Update {
                    container, content, ..
                } => target.mount(container, content),
                PortalOp::Unmount { container, .. } => target.unmount(container),
            }
        }
        ops
    }

    #[must_use]
    pub fn is_mounted(&self, key: &SlotId) -> bool {
        self.mounted.contains_key(key)
    }

    #[must_use]
    pub fn mounted_content(&self, key: &SlotId) -> Option<&C> {
        self.mounted.get(key).map(|(_, content)| content)
    }

    pub fn mounted_keys(&self) -> impl Iterator<Item = &SlotId> {
        self.mounted.keys()
    }

    /// Mounted portals as `(key, container, content)`, in key order.
    pub fn mounted(&self) -> impl Iterator<Item = (&SlotId, &N, &C)> {
        self.mounted
            .iter()
            .map(|(key, (container, content))| (key, container, content))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }
}

impl<N: Clone + PartialEq, C: Clone + PartialEq> Default for PortalReconciler<N, C> {
    fn default() -> Self {
        Self::new()
    }
}
