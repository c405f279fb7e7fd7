#![forbid(unsafe_code)]

//! The adapter component.
//!
//! [`EngineAdapter`] is driven by the host framework's lifecycle:
//!
//! | Host hook          | Adapter call                 |
//! |--------------------|------------------------------|
//! | first mount        | [`activate`]                 |
//! | props change       | [`set_props`] then render    |
//! | any render         | [`render`]                   |
//! | after each update  | [`did_update`]               |
//! | unmount            | [`deactivate`]               |
//!
//! # Invariants
//!
//! 1. At most one engine per adapter; constructed once, destroyed once.
//! 2. `render` projects the state mirror only. Before activation and after
//!    deactivation the mirror is empty, so no portals are emitted.
//! 3. In `did_update`, `reset_options` (if any) always precedes
//!    `update_size` (if any), and `update_size` runs at most once per call.
//! 4. Deactivation drops the store subscription and the notifier before the
//!    engine is destroyed, so a frame that fires afterwards finds nothing to
//!    deliver to.
//!
//! [`activate`]: EngineAdapter::activate
//! [`set_props`]: EngineAdapter::set_props
//! [`render`]: EngineAdapter::render
//! [`did_update`]: EngineAdapter::did_update
//! [`deactivate`]: EngineAdapter::deactivate

use std::fmt;
use std::rc::Rc;

use slotbridge_core::{
    CustomRenderingStore, EngineError, FlushSync, FrameScheduler, MetaMap, OptionValue, Options,
    ReflowNotifier, ReflowStats, RenderingSnapshot, StoreSubscription, compute_updates,
};
use tracing::{debug, info, info_span, trace, warn};

use crate::config::{AdapterConfig, RemovedKeyPolicy};
use crate::engine::{Engine, EngineInit, EngineOptions};
use crate::error::AdapterError;
use crate::registry::SlotRegistry;
use crate::view::{Portal, RootView};

type SnapshotOf<E> = RenderingSnapshot<<E as Engine>::Node, <E as Engine>::Content>;

/// Where the adapter is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterPhase {
    /// Constructed, not activated yet.
    Idle,
    /// Engine is live.
    Active,
    /// Engine construction failed; nothing else will work.
    Failed,
    /// Engine was destroyed.
    Deactivated,
}

/// Counters for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// `reset_options` calls issued.
    pub resets: u64,
    /// `update_size` calls issued.
    pub resizes: u64,
    /// Slot snapshots applied to the state mirror.
    pub snapshots_applied: u64,
}

/// What a [`EngineAdapter::did_update`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Keys forwarded to `reset_options`, empty if no reset was issued.
    pub reset_keys: Vec<String>,
    /// Whether `update_size` was issued.
    pub resized: bool,
}

struct ActiveEngine<E: Engine> {
    engine: E,
    store: CustomRenderingStore<E::Node, E::Content>,
    notifier: ReflowNotifier<SnapshotOf<E>>,
    subscription: StoreSubscription,
}

/// Hosts one imperative engine inside a declarative component.
pub struct EngineAdapter<E: Engine> {
    config: AdapterConfig,
    props: Options<E::Content>,
    registry: SlotRegistry<E::Node, E::Content>,
    phase: AdapterPhase,
    active: Option<ActiveEngine<E>>,
    meta_version: u64,
    resets: u64,
    resizes: u64,
}

impl<E: Engine> EngineAdapter<E> {
    /// Create an idle adapter with its initial configuration.
    #[must_use]
    pub fn new(props: Options<E::Content>, config: AdapterConfig) -> Self {
        Self {
            config,
            props,
            registry: SlotRegistry::new(),
            phase: AdapterPhase::Idle,
            active: None,
            meta_version: 0,
            resets: 0,
            resizes: 0,
        }
    }

    /// Construct the engine and start mirroring its slots.
    ///
    /// `container` is the adapter's root node. Snapshot deliveries are
    /// scheduled on `frames` and committed through `flusher`.
    pub fn activate<F>(
        &mut self,
        container: E::Node,
        frames: Rc<dyn FrameScheduler>,
        flusher: Rc<dyn FlushSync>,
        factory: F,
    ) -> Result<(), AdapterError>
    where
        F: FnOnce(E::Node, EngineInit<E::Node, E::Content>) -> Result<E, EngineError>,
    {
        match self.phase {
            AdapterPhase::Idle => {}
            AdapterPhase::Active => return Err(AdapterError::AlreadyActive),
            AdapterPhase::Failed => return Err(AdapterError::Unusable),
            AdapterPhase::Deactivated => return Err(AdapterError::Deactivated),
        }
        let _span = info_span!("activate", adapter = %self.config.label).entered();

        let store = CustomRenderingStore::new();
        let init = EngineInit {
            options: self.props.clone(),
            handle_custom_rendering: store.handler(),
            custom_rendering_meta_map: self.next_meta_map(),
        };
        let mut engine = match factory(container, init) {
            Ok(engine) => engine,
            Err(err) => {
                warn!(error = %err, "engine construction failed");
                self.phase = AdapterPhase::Failed;
                return Err(AdapterError::Construction(err));
            }
        };
        engine.render();

        let notifier = {
            let registry = self.registry.clone();
            ReflowNotifier::new(frames, flusher, move |snapshot: SnapshotOf<E>| {
                trace!(slots = snapshot.len(), "slot snapshot applied");
                registry.apply(snapshot);
            })
        };
        let subscription = {
            let notifier = notifier.clone();
            store.subscribe(move |snapshot| notifier.notify(snapshot.clone()))
        };

        info!(
            options = self.props.len(),
            slots = store.snapshot().len(),
            "engine activated"
        );
        self.active = Some(ActiveEngine {
            engine,
            store,
            notifier,
            subscription,
        });
        self.phase = AdapterPhase::Active;
        Ok(())
    }

    /// Record a new configuration, returning the previous one.
    ///
    /// The host renders next and then calls [`did_update`](Self::did_update)
    /// with the returned snapshot.
    pub fn set_props(&mut self, props: Options<E::Content>) -> Options<E::Content> {
        std::mem::replace(&mut self.props, props)
    }

    /// Post-render effect: forward configuration changes, then reflow if new
    /// slot content was rendered.
    ///
    /// A no-op unless active.
    pub fn did_update(&mut self, previous: &Options<E::Content>) -> UpdateReport {
        let mut report = UpdateReport::default();
        if self.active.is_none() {
            trace!(phase = ?self.phase, "update ignored while inactive");
            return report;
        }

        let diff = compute_updates(previous, &self.props);
        let mut changed = diff.updates;
        if self.config.removed_keys == RemovedKeyPolicy::Unset && !diff.removed.is_empty() {
            let mut builder = changed.to_builder();
            for key in &diff.removed {
                builder.insert(key.as_str(), OptionValue::Unset);
            }
            changed = builder.build();
        } else if !diff.removed.is_empty() {
            debug!(removed = ?diff.removed, "removed options not forwarded");
        }

        if !changed.is_empty() {
            report.reset_keys = changed.keys().map(str::to_owned).collect();
            let payload = EngineOptions {
                options: changed,
                custom_rendering_meta_map: self.next_meta_map(),
            };
            debug!(
                keys = ?report.reset_keys,
                meta_version = payload.custom_rendering_meta_map.version(),
                "resetting engine options"
            );
            if let Some(active) = self.active.as_mut() {
                active
                    .engine
                    .reset_options(payload, self.config.recurring_reset);
            }
            self.resets += 1;
        }

        if self.registry.take_needs_resize() {
            if let Some(active) = self.active.as_mut() {
                active.engine.update_size();
            }
            self.resizes += 1;
            report.resized = true;
            debug!(slots = self.registry.snapshot().len(), "engine size updated");
        }
        report
    }

    /// Project the current slots into keyed portals.
    ///
    /// Generator failures propagate unchanged.
    pub fn render(&self) -> Result<RootView<E::Node, E::Content>, AdapterError> {
        let snapshot = self.registry.snapshot();
        let mut portals = Vec::with_capacity(snapshot.len());
        for slot in snapshot.iter() {
            let content = slot
                .resolve_content()
                .map_err(|source| AdapterError::Generator {
                    slot: slot.id.clone(),
                    source,
                })?;
            portals.push(Portal {
                key: slot.id.clone(),
                container: slot.container_el.clone(),
                content,
            });
        }
        Ok(RootView {
            portals,
            registry_version: self.registry.version(),
        })
    }

    /// Tear down: stop slot delivery and destroy the engine.
    pub fn deactivate(&mut self) -> Result<(), AdapterError> {
        let Some(mut active) = self.active.take() else {
            return Err(match self.phase {
                AdapterPhase::Failed => AdapterError::Unusable,
                AdapterPhase::Deactivated => AdapterError::Deactivated,
                _ => AdapterError::Inactive,
            });
        };
        let _span = info_span!("deactivate", adapter = %self.config.label).entered();

        drop(active.subscription);
        active.notifier.cancel();
        drop(active.notifier);
        self.registry.clear();
        let live_slots = active.store.snapshot().len();
        active.engine.destroy();
        self.phase = AdapterPhase::Deactivated;
        info!(
            live_slots,
            resets = self.resets,
            resizes = self.resizes,
            "engine destroyed"
        );
        Ok(())
    }

    /// Handle to the live engine for imperative callers.
    pub fn api(&self) -> Result<E::Api, AdapterError> {
        match &self.active {
            Some(active) => Ok(active.engine.api()),
            None => Err(AdapterError::Inactive),
        }
    }

    /// The live engine, if active.
    #[must_use]
    pub fn engine(&self) -> Option<&E> {
        self.active.as_ref().map(|a| &a.engine)
    }

    #[must_use]
    pub fn props(&self) -> &Options<E::Content> {
        &self.props
    }

    #[must_use]
    pub fn registry(&self) -> &SlotRegistry<E::Node, E::Content> {
        &self.registry
    }

    #[must_use]
    pub fn phase(&self) -> AdapterPhase {
        self.phase
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            resets: self.resets,
            resizes: self.resizes,
            snapshots_applied: self.registry.applied_count(),
        }
    }

    /// Debounce counters of the live notifier.
    #[must_use]
    pub fn reflow_stats(&self) -> Option<ReflowStats> {
        self.active.as_ref().map(|a| a.notifier.stats())
    }

    fn next_meta_map(&mut self) -> MetaMap<E::Content> {
        self.meta_version += 1;
        MetaMap::from_options(&self.props, self.meta_version)
    }
}

impl<E: Engine> Drop for EngineAdapter<E> {
    fn drop(&mut self) {
        if self.active.is_some() {
            warn!(adapter = %self.config.label, "adapter dropped while active");
            let _ = self.deactivate();
        }
    }
}

impl<E: Engine> fmt::Debug for EngineAdapter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("label", &self.config.label)
            .field("phase", &self.phase)
            .field("options", &self.props.len())
            .field("slots", &self.registry.snapshot().len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use slotbridge_core::{
        CustomRendering, FrameClock, Generator, GeneratorError, ImmediateFlush, RenderProps,
        RenderingHandler,
    };
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Render,
        Reset(Vec<String>, bool),
        UpdateSize,
        Destroy,
    }

    struct StubEngine {
        calls: Rc<RefCell<Vec<Call>>>,
        meta: MetaMap<String>,
    }

    impl Engine for StubEngine {
        type Node = u32;
        type Content = String;
        type Api = Rc<RefCell<Vec<Call>>>;

        fn render(&mut self) {
            self.calls.borrow_mut().push(Call::Render);
        }

        fn update_size(&mut self) {
            self.calls.borrow_mut().push(Call::UpdateSize);
        }

        fn reset_options(&mut self, options: EngineOptions<String>, is_recurring: bool) {
            self.meta = options.custom_rendering_meta_map;
            let keys = options.options.keys().map(str::to_owned).collect();
            self.calls.borrow_mut().push(Call::Reset(keys, is_recurring));
        }

        fn destroy(&mut self) {
            self.calls.borrow_mut().push(Call::Destroy);
        }

        fn api(&self) -> Self::Api {
            Rc::clone(&self.calls)
        }
    }

    struct Fixture {
        adapter: EngineAdapter<StubEngine>,
        clock: FrameClock,
        calls: Rc<RefCell<Vec<Call>>>,
        handler: Rc<RefCell<Option<RenderingHandler<u32, String>>>>,
    }

    fn label_generator() -> Generator<String> {
        Generator::from_fn(|props: &RenderProps| {
            format!("label:{}", props["text"].as_str().unwrap_or_default())
        })
    }

    fn fixture(props: Options<String>) -> Fixture {
        fixture_with(props, AdapterConfig::default())
    }

    fn fixture_with(props: Options<String>, config: AdapterConfig) -> Fixture {
        let clock = FrameClock::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let handler = Rc::new(RefCell::new(None));
        let mut adapter: EngineAdapter<StubEngine> = EngineAdapter::new(props, config);
        let (c, h) = (Rc::clone(&calls), Rc::clone(&handler));
        adapter
            .activate(0, Rc::new(clock.clone()), Rc::new(ImmediateFlush), move |_, init| {
                *h.borrow_mut() = Some(Rc::clone(&init.handle_custom_rendering));
                Ok(StubEngine {
                    calls: c,
                    meta: init.custom_rendering_meta_map,
                })
            })
            .unwrap();
        Fixture {
            adapter,
            clock,
            calls,
            handler,
        }
    }

    impl Fixture {
        fn emit(&self, rendering: CustomRendering<u32, String>) {
            let handler = self.handler.borrow().clone().unwrap();
            handler(rendering);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    #[test]
    fn render_before_activation_is_empty() {
        let adapter: EngineAdapter<StubEngine> =
            EngineAdapter::new(Options::new(), AdapterConfig::default());
        let view = adapter.render().unwrap();
        assert!(view.is_empty());
        assert_eq!(adapter.phase(), AdapterPhase::Idle);
        assert!(matches!(adapter.api(), Err(AdapterError::Inactive)));
    }

    #[test]
    fn activation_renders_engine_once() {
        let fx = fixture(Options::new());
        assert_eq!(fx.calls(), vec![Call::Render]);
        assert_eq!(fx.adapter.phase(), AdapterPhase::Active);
        assert!(fx.adapter.api().is_ok());
    }

    #[test]
    fn second_activation_is_rejected() {
        let mut fx = fixture(Options::new());
        let err = fx
            .adapter
            .activate(
                1,
                Rc::new(fx.clock.clone()),
                Rc::new(ImmediateFlush),
                |_, _| Err(EngineError::new("unused")),
            )
            .unwrap_err();
        assert!(matches!(err, AdapterError::AlreadyActive));
        assert_eq!(fx.calls(), vec![Call::Render]);
    }

    #[test]
    fn construction_failure_leaves_adapter_unusable() {
        let clock = FrameClock::new();
        let mut adapter: EngineAdapter<StubEngine> =
            EngineAdapter::new(Options::new(), AdapterConfig::default());
        let err = adapter
            .activate(0, Rc::new(clock.clone()), Rc::new(ImmediateFlush), |_, _| {
                Err(EngineError::new("no container"))
            })
            .unwrap_err();
        assert!(matches!(err, AdapterError::Construction(_)));
        assert_eq!(err.to_string(), "engine construction failed: no container");
        assert_eq!(adapter.phase(), AdapterPhase::Failed);

        let retry = adapter
            .activate(0, Rc::new(clock), Rc::new(ImmediateFlush), |_, _| {
                Err(EngineError::new("unreachable"))
            })
            .unwrap_err();
        assert!(matches!(retry, AdapterError::Unusable));
        assert!(matches!(adapter.deactivate(), Err(AdapterError::Unusable)));
    }

    #[test]
    fn meta_map_carries_content_options() {
        let generator = label_generator();
        let props = Options::builder()
            .set("locale", "en")
            .set("eventContent", generator.clone())
            .build();
        let fx = fixture(props);
        let meta = &fx.adapter.engine().unwrap().meta;
        assert_eq!(meta.version(), 1);
        assert!(meta.get("eventContent").unwrap().same_as(&generator));
        assert!(meta.get("locale").is_none());
    }

    #[test]
    fn changed_prop_resets_with_fresh_meta_map() {
        let mut fx = fixture(Options::builder().set("locale", "en").build());
        let next = fx.adapter.props().to_builder().set("locale", "fr").build();
        let prev = fx.adapter.set_props(next);
        let report = fx.adapter.did_update(&prev);

        assert_eq!(report.reset_keys, vec!["locale".to_string()]);
        assert!(!report.resized);
        assert_eq!(
            fx.calls(),
            vec![Call::Render, Call::Reset(vec!["locale".to_string()], true)]
        );
        assert_eq!(fx.adapter.engine().unwrap().meta.version(), 2);
    }

    #[test]
    fn identical_props_do_not_reset() {
        let mut fx = fixture(Options::builder().set("locale", "en").build());
        let same = fx.adapter.props().clone();
        let prev = fx.adapter.set_props(same);
        let report = fx.adapter.did_update(&prev);
        assert_eq!(report, UpdateReport::default());
        assert_eq!(fx.calls(), vec![Call::Render]);
    }

    #[test]
    fn removed_keys_ignored_by_default() {
        let mut fx = fixture(Options::builder().set("locale", "en").set("height", 400i64).build());
        let next = fx.adapter.props().to_builder().remove("height").build();
        let prev = fx.adapter.set_props(next);
        assert!(fx.adapter.did_update(&prev).reset_keys.is_empty());
        assert_eq!(fx.calls(), vec![Call::Render]);
    }

    #[test]
    fn removed_keys_forwarded_as_unset_when_configured() {
        let mut fx = fixture_with(
            Options::builder().set("locale", "en").set("height", 400i64).build(),
            AdapterConfig::default().with_removed_keys(RemovedKeyPolicy::Unset),
        );
        let next = fx.adapter.props().to_builder().remove("height").build();
        let prev = fx.adapter.set_props(next);
        let report = fx.adapter.did_update(&prev);
        assert_eq!(report.reset_keys, vec!["height".to_string()]);
    }

    #[test]
    fn recurring_flag_follows_config() {
        let mut fx = fixture_with(
            Options::builder().set("locale", "en").build(),
            AdapterConfig::default().with_recurring_reset(false),
        );
        let prev = fx
            .adapter
            .set_props(Options::builder().set("locale", "de").build());
        fx.adapter.did_update(&prev);
        assert_eq!(fx.calls()[1], Call::Reset(vec!["locale".to_string()], false));
    }

    #[test]
    fn slot_snapshot_arrives_on_next_frame() {
        let mut fx = fixture(Options::new());
        fx.emit(CustomRendering::new("a", 11, label_generator(), json!({"text": "hi"})));
        assert!(fx.adapter.render().unwrap().is_empty());

        fx.clock.run_frame();
        let view = fx.adapter.render().unwrap();
        assert_eq!(view.len(), 1);
        let portal = view.portal(&"a".into()).unwrap();
        assert_eq!(portal.container, 11);
        assert_eq!(portal.content, "label:hi");

        let prev = fx.adapter.props().clone();
        let report = fx.adapter.did_update(&prev);
        assert!(report.resized);
        assert_eq!(fx.calls(), vec![Call::Render, Call::UpdateSize]);
        assert!(!fx.adapter.did_update(&prev).resized);
    }

    #[test]
    fn reset_precedes_resize() {
        let mut fx = fixture(Options::builder().set("locale", "en").build());
        fx.emit(CustomRendering::new("a", 11, label_generator(), json!({"text": "x"})));
        fx.clock.run_frame();

        let prev = fx
            .adapter
            .set_props(Options::builder().set("locale", "fr").build());
        fx.adapter.render().unwrap();
        fx.adapter.did_update(&prev);
        assert_eq!(
            fx.calls(),
            vec![
                Call::Render,
                Call::Reset(vec!["locale".to_string()], true),
                Call::UpdateSize
            ]
        );
    }

    #[test]
    fn generator_failure_propagates() {
        let fx = fixture(Options::new());
        let failing: Generator<String> = Generator::func(|_| Err(GeneratorError::new("bad props")));
        fx.emit(CustomRendering::new("broken", 3, failing, json!({})));
        fx.clock.run_frame();

        match fx.adapter.render() {
            Err(AdapterError::Generator { slot, source }) => {
                assert_eq!(slot.as_str(), "broken");
                assert_eq!(source.message(), "bad props");
            }
            other => panic!("expected generator error, got {other:?}"),
        }
    }

    #[test]
    fn deactivate_destroys_once_and_clears_state() {
        let mut fx = fixture(Options::new());
        fx.emit(CustomRendering::new("a", 11, label_generator(), json!({"text": "x"})));
        fx.clock.run_frame();
        assert_eq!(fx.adapter.render().unwrap().len(), 1);

        fx.adapter.deactivate().unwrap();
        assert_eq!(fx.calls(), vec![Call::Render, Call::Destroy]);
        assert!(fx.adapter.render().unwrap().is_empty());
        assert!(matches!(fx.adapter.api(), Err(AdapterError::Inactive)));
        assert!(matches!(fx.adapter.deactivate(), Err(AdapterError::Deactivated)));

        let prev = fx.adapter.props().clone();
        assert_eq!(fx.adapter.did_update(&prev), UpdateReport::default());
        assert_eq!(fx.calls().len(), 2);
    }

    #[test]
    fn pending_delivery_is_cancelled_on_deactivate() {
        let mut fx = fixture(Options::new());
        fx.emit(CustomRendering::new("a", 11, label_generator(), json!({"text": "x"})));
        assert_eq!(fx.clock.pending_count(), 1);

        fx.adapter.deactivate().unwrap();
        assert_eq!(fx.clock.pending_count(), 0);
        fx.clock.run_frame();
        assert!(fx.adapter.render().unwrap().is_empty());

        // The engine may still report slots while tearing down; nothing is scheduled.
        fx.emit(CustomRendering::new("b", 12, label_generator(), json!({"text": "y"})));
        assert_eq!(fx.clock.pending_count(), 0);
    }

    #[test]
    fn dropping_active_adapter_destroys_engine() {
        let fx = fixture(Options::new());
        let calls = Rc::clone(&fx.calls);
        drop(fx);
        assert_eq!(*calls.borrow(), vec![Call::Render, Call::Destroy]);
    }

    #[test]
    fn stats_track_activity() {
        let mut fx = fixture(Options::builder().set("locale", "en").build());
        fx.emit(CustomRendering::new("a", 1, label_generator(), json!({"text": "x"})));
        fx.emit(CustomRendering::new("b", 2, label_generator(), json!({"text": "y"})));
        fx.clock.run_frame();
        let prev = fx
            .adapter
            .set_props(Options::builder().set("locale", "fr").build());
        fx.adapter.did_update(&prev);

        let stats = fx.adapter.stats();
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.resizes, 1);
        assert_eq!(stats.snapshots_applied, 1);
        let reflow = fx.adapter.reflow_stats().unwrap();
        assert_eq!(reflow.deliveries, 1);
        assert_eq!(reflow.coalesced, 1);
    }
}
