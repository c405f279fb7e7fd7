#![forbid(unsafe_code)]

//! A deterministic host framework for one [`EngineAdapter`].
//!
//! `TestHost` plays the declarative framework's part: it owns the adapter,
//! commits renders by reconciling portals into a [`TestDom`], runs the
//! post-update effect after each commit, and drives frames through a
//! [`FrameClock`] so tests decide exactly when debounced slot deliveries
//! happen.
//!
//! # Commit cycle
//!
//! ```text
//! set_props / frame delivery
//!   └─ render ──> reconcile portals ──> Commit event ──> did_update
//!                                                         ├─ reset_options
//!                                                         └─ update_size
//! ```
//!
//! A render failure is captured in the host's error boundary; the commit and
//! its post-update effect are skipped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotbridge_adapter::{
    AdapterConfig, AdapterError, AdapterPhase, AdapterStats, EngineAdapter, UpdateReport,
};
use slotbridge_core::{FlushSync, FrameClock, Options, SlotId};
use tracing::{debug, warn};

use crate::dom::{NodeId, TestDom};
use crate::fake_engine::{FakeEngine, FakeEngineApi, FakeEngineConfig};
use crate::reconciler::PortalReconciler;
use crate::timeline::{Timeline, TimelineEvent};

struct HostInner {
    adapter: EngineAdapter<FakeEngine>,
    reconciler: PortalReconciler<NodeId, String>,
    dom: TestDom,
    timeline: Timeline,
    rendered_version: Option<u64>,
    error_boundary: Option<AdapterError>,
}

impl HostInner {
    /// Render, commit, then run the post-update effect against `previous`.
    fn commit(&mut self, previous: &Options<String>) -> Option<UpdateReport> {
        let view = match self.adapter.render() {
            Ok(view) => view,
            Err(err) => {
                warn!(error = %err, "render failed, captured by error boundary");
                self.error_boundary = Some(err);
                return None;
            }
        };
        let ops = self.reconciler.reconcile(&view, &mut self.dom);
        debug!(
            ops = ops.len(),
            portals = view.len(),
            version = view.registry_version,
            "host committed"
        );
        self.rendered_version = Some(view.registry_version);
        self.timeline.record(TimelineEvent::Commit {
            keys: view.keys().map(|k| k.to_string()).collect(),
            version: view.registry_version,
        });
        Some(self.adapter.did_update(previous))
    }

    fn is_dirty(&self) -> bool {
        self.rendered_version != Some(self.adapter.registry().version())
    }
}

/// Commits state changes made inside a frame delivery.
struct HostFlush {
    host: Weak<RefCell<HostInner>>,
}

impl FlushSync for HostFlush {
    fn flush_sync(&self, update: Box<dyn FnOnce() + '_>) {
        update();
        let Some(host) = self.host.upgrade() else {
            return;
        };
        let mut inner = host.borrow_mut();
        if inner.is_dirty() {
            let props = inner.adapter.props().clone();
            inner.commit(&props);
        }
    }
}

/// Drives one adapter through its lifecycle.
pub struct TestHost {
    inner: Rc<RefCell<HostInner>>,
    clock: FrameClock,
    dom: TestDom,
    timeline: Timeline,
    root: NodeId,
}

impl TestHost {
    /// A host holding an unmounted adapter.
    #[must_use]
    pub fn new(props: Options<String>, config: AdapterConfig) -> Self {
        let dom = TestDom::new();
        let timeline = Timeline::new();
        let root = dom.create_node(None);
        let inner = HostInner {
            adapter: EngineAdapter::new(props, config),
            reconciler: PortalReconciler::new(),
            dom: dom.clone(),
            timeline: timeline.clone(),
            rendered_version: None,
            error_boundary: None,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
            clock: FrameClock::new(),
            dom,
            timeline,
            root,
        }
    }

    /// First render plus activation of a [`FakeEngine`].
    ///
    /// Slots the engine reports while rendering arrive at the next frame.
    pub fn mount(&self, engine: FakeEngineConfig) -> Result<(), AdapterError> {
        let mut inner = self.inner.borrow_mut();
        match inner.adapter.render() {
            Ok(view) => inner.rendered_version = Some(view.registry_version),
            Err(err) => inner.error_boundary = Some(err),
        }
        let flusher = Rc::new(HostFlush {
            host: Rc::downgrade(&self.inner),
        });
        inner.adapter.activate(
            self.root,
            Rc::new(self.clock.clone()),
            flusher,
            FakeEngine::factory(self.dom.clone(), self.timeline.clone(), engine),
        )
    }

    /// Re-render with new props, returning what the post-update effect did.
    ///
    /// `None` if the render failed.
    pub fn set_props(&self, props: Options<String>) -> Option<UpdateReport> {
        let mut inner = self.inner.borrow_mut();
        let previous = inner.adapter.set_props(props);
        inner.commit(&previous)
    }

    /// Re-render with the props unchanged.
    pub fn rerender(&self) -> Option<UpdateReport> {
        let mut inner = self.inner.borrow_mut();
        let props = inner.adapter.props().clone();
        inner.commit(&props)
    }

    /// Fire one frame. Returns how many callbacks ran.
    pub fn run_frame(&self) -> usize {
        self.clock.run_frame()
    }

    /// Fire frames until none are pending, up to `max_frames`.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        self.clock.run_until_idle(max_frames)
    }

    /// Deactivate the adapter and remove its portals.
    pub fn unmount(&self) -> Result<(), AdapterError> {
        let mut inner = self.inner.borrow_mut();
        inner.adapter.deactivate()?;
        let HostInner {
            adapter,
            reconciler,
            dom,
            error_boundary,
            ..
        } = &mut *inner;
        match adapter.render() {
            Ok(view) => {
                reconciler.reconcile(&view, dom);
            }
            Err(err) => *error_boundary = Some(err),
        }
        Ok(())
    }

    /// Imperative handle to the engine.
    pub fn api(&self) -> Result<FakeEngineApi, AdapterError> {
        self.inner.borrow().adapter.api()
    }

    /// Mounted portals as `(key, container, content)`.
    #[must_use]
    pub fn portals(&self) -> Vec<(SlotId, NodeId, String)> {
        self.inner
            .borrow()
            .reconciler
            .mounted()
            .map(|(key, node, content)| (key.clone(), *node, content.clone()))
            .collect()
    }

    #[must_use]
    pub fn portal_count(&self) -> usize {
        self.inner.borrow().reconciler.len()
    }

    /// Content mounted for `key`, if any.
    #[must_use]
    pub fn portal_content(&self, key: &str) -> Option<String> {
        self.inner
            .borrow()
            .reconciler
            .mounted_content(&SlotId::from(key))
            .cloned()
    }

    /// Message of the error captured by the error boundary, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner
            .borrow()
            .error_boundary
            .as_ref()
            .map(ToString::to_string)
    }

    pub fn take_error(&self) -> Option<AdapterError> {
        self.inner.borrow_mut().error_boundary.take()
    }

    #[must_use]
    pub fn phase(&self) -> AdapterPhase {
        self.inner.borrow().adapter.phase()
    }

    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        self.inner.borrow().adapter.stats()
    }

    #[must_use]
    pub fn props(&self) -> Options<String> {
        self.inner.borrow().adapter.props().clone()
    }

    /// Run `f` against the adapter.
    pub fn with_adapter<R>(&self, f: impl FnOnce(&EngineAdapter<FakeEngine>) -> R) -> R {
        f(&self.inner.borrow().adapter)
    }

    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[must_use]
    pub fn dom(&self) -> &TestDom {
        &self.dom
    }

    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The adapter's root container.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }
}

impl std::fmt::Debug for TestHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TestHost")
            .field("adapter", &inner.adapter)
            .field("portals", &inner.reconciler.len())
            .field("rendered_version", &inner.rendered_version)
            .field("pending_frames", &self.clock.pending_count())
            .finish()
    }
}
