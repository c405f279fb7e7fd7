#![forbid(unsafe_code)]

//! Slot store: the channel through which an engine publishes its slots.
//!
//! The engine calls [`CustomRenderingStore::handle`] (usually through the
//! closure from [`CustomRenderingStore::handler`]) whenever a slot is
//! created, changes props, or is destroyed. Each effective change publishes
//! a fresh [`RenderingSnapshot`] to every subscriber.
//!
//! # Invariants
//!
//! 1. Snapshots are replaced wholesale, never mutated in place.
//! 2. `revision` increments exactly once per published snapshot.
//! 3. Subscribers are notified in registration order, with no internal
//!    borrow held (a subscriber may call back into the store).
//! 4. A store that has published at least once replays its current snapshot
//!    to each new subscriber immediately.
//! 5. Dropping a [`StoreSubscription`] stops delivery before the next
//!    publish.
//!
//! # Failure Modes
//!
//! - **Unknown removal**: an inactive descriptor for an id the store does not
//!   hold is ignored (no publish).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::rendering::{CustomRendering, RenderingHandler, RenderingSnapshot};

type ListenerRc<N, C> = Rc<dyn Fn(&RenderingSnapshot<N, C>)>;
type ListenerWeak<N, C> = Weak<dyn Fn(&RenderingSnapshot<N, C>)>;

struct StoreInner<N, C> {
    snapshot: RenderingSnapshot<N, C>,
    revision: u64,
    listeners: Vec<ListenerWeak<N, C>>,
}

/// Engine-side store of active custom renderings.
///
/// Cloning creates a new handle to the same store.
pub struct CustomRenderingStore<N, C> {
    inner: Rc<RefCell<StoreInner<N, C>>>,
}

impl<N: Clone + 'static, C: 'static> CustomRenderingStore<N, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                snapshot: RenderingSnapshot::empty(),
                revision: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Record a slot creation, update or destruction.
    ///
    /// Active descriptors are inserted or replace the previous descriptor
    /// with the same id; inactive ones remove it.
    pub fn handle(&self, rendering: CustomRendering<N, C>) {
        let published = {
            let mut inner = self.inner.borrow_mut();
            let mut slots = inner.snapshot.to_map();
            let id = rendering.id.clone();
            if rendering.is_active {
                slots.insert(id.clone(), rendering);
            } else if slots.remove(&id).is_none() {
                trace!(slot = %id, "removal of unknown slot ignored");
                return;
            }
            inner.snapshot = RenderingSnapshot::from_map(slots);
            inner.revision += 1;
            trace!(slot = %id, revision = inner.revision, slots = inner.snapshot.len(), "slot store published");
            inner.snapshot.clone()
        };
        self.publish(&published);
    }

    /// Closure handed to the engine as its custom-rendering callback.
    #[must_use]
    pub fn handler(&self) -> RenderingHandler<N, C> {
        let store = self.clone();
        Rc::new(move |rendering| store.handle(rendering))
    }

    /// Register a listener for published snapshots.
    ///
    /// If the store already published, the listener receives the current
    /// snapshot before this call returns.
    pub fn subscribe(&self, listener: impl Fn(&RenderingSnapshot<N, C>) + 'static) -> StoreSubscription {
        let strong: ListenerRc<N, C> = Rc::new(listener);
        let replay = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.push(Rc::downgrade(&strong));
            (inner.revision > 0).then(|| inner.snapshot.clone())
        };
        if let Some(snapshot) = replay {
            strong(&snapshot);
        }
        StoreSubscription {
            _guard: Box::new(strong),
        }
    }

    fn publish(&self, snapshot: &RenderingSnapshot<N, C>) {
        let listeners: Vec<ListenerRc<N, C>> = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.retain(|w| w.strong_count() > 0);
            inner.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in &listeners {
            listener(snapshot);
        }
    }
}

impl<N, C> CustomRenderingStore<N, C> {
    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RenderingSnapshot<N, C> {
        self.inner.borrow().snapshot.clone()
    }

    /// Number of snapshots published so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    /// Registered listeners, including dropped ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl<N: Clone + 'static, C: 'static> Default for CustomRenderingStore<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, C> Clone for CustomRenderingStore<N, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<N: fmt::Debug, C> fmt::Debug for CustomRenderingStore<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CustomRenderingStore")
            .field("revision", &inner.revision)
            .field("slots", &inner.snapshot)
            .field("listener_count", &inner.listeners.len())
            .finish()
    }
}

/// RAII guard for a store listener.
///
/// Dropping it makes the listener unreachable; the store prunes the dead
/// entry on its next publish.
pub struct StoreSubscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for StoreSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSubscription").finish_non_exhaustive()
    }
}
