#![forbid(unsafe_code)]

//! A scriptable [`Engine`] for tests.
//!
//! `FakeEngine` owns a subtree of a [`TestDom`]. Each slot it creates gets a
//! fresh node under the engine root and is reported through the
//! custom-rendering handler with the generator the current meta map holds
//! for the slot's kind. Tests drive slot creation, prop changes and removal
//! through [`FakeEngineApi`].
//!
//! Every engine call is appended to the shared [`Timeline`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use slotbridge_adapter::{Engine, EngineInit, EngineOptions};
use slotbridge_core::{
    CustomRendering, EngineError, Generator, MetaMap, OptionValue, RenderingHandler, SlotId,
};
use tracing::{debug, trace};

use crate::dom::{NodeId, TestDom};
use crate::timeline::{Timeline, TimelineEvent};

/// A slot the engine creates during its initial render.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSpec {
    /// Meta-map key whose generator renders this slot.
    pub kind: String,
    pub id: String,
    pub props: Value,
}

impl SlotSpec {
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>, props: Value) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            props,
        }
    }
}

/// Construction-time behaviour of a [`FakeEngine`].
#[derive(Debug, Clone, Default)]
pub struct FakeEngineConfig {
    pub initial_slots: Vec<SlotSpec>,
    /// Fail construction with this message.
    pub fail_with: Option<String>,
}

impl FakeEngineConfig {
    #[must_use]
    pub fn with_slot(mut self, slot: SlotSpec) -> Self {
        self.initial_slots.push(slot);
        self
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

#[derive(Debug)]
struct SlotState {
    kind: String,
    node: NodeId,
    props: Value,
}

struct EngineState {
    root: NodeId,
    handler: RenderingHandler<NodeId, String>,
    meta: MetaMap<String>,
    applied: BTreeMap<String, OptionValue<String>>,
    slots: BTreeMap<SlotId, SlotState>,
    resizes: u32,
    destroyed: bool,
}

impl EngineState {
    fn descriptor(&self, id: &SlotId, slot: &SlotState) -> CustomRendering<NodeId, String> {
        let generator = match self.meta.get(&slot.kind) {
            Some(generator) => generator.clone(),
            None => {
                trace!(kind = %slot.kind, "no generator for slot kind, using empty content");
                Generator::value(String::new())
            }
        };
        CustomRendering::new(id.clone(), slot.node, generator, slot.props.clone())
    }
}

type SharedState = Rc<RefCell<EngineState>>;

/// Scriptable engine that reports slots into a [`TestDom`].
pub struct FakeEngine {
    state: SharedState,
    dom: TestDom,
    timeline: Timeline,
    initial_slots: Vec<SlotSpec>,
}

impl FakeEngine {
    /// Factory for [`EngineAdapter::activate`].
    ///
    /// [`EngineAdapter::activate`]: slotbridge_adapter::EngineAdapter::activate
    pub fn factory(
        dom: TestDom,
        timeline: Timeline,
        config: FakeEngineConfig,
    ) -> impl FnOnce(NodeId, EngineInit<NodeId, String>) -> Result<FakeEngine, EngineError> {
        move |container, init| {
            if let Some(message) = config.fail_with {
                return Err(EngineError::new(message));
            }
            let root = dom.create_node(Some(container));
            let applied: BTreeMap<String, OptionValue<String>> = init
                .options
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect();
            timeline.record(TimelineEvent::EngineConstructed {
                options: applied.keys().cloned().collect(),
            });
            Ok(FakeEngine {
                state: Rc::new(RefCell::new(EngineState {
                    root,
                    handler: init.handle_custom_rendering,
                    meta: init.custom_rendering_meta_map,
                    applied,
                    slots: BTreeMap::new(),
                    resizes: 0,
                    destroyed: false,
                })),
                dom,
                timeline,
                initial_slots: config.initial_slots,
            })
        }
    }

    fn api_handle(&self) -> FakeEngineApi {
        FakeEngineApi {
            state: Rc::clone(&self.state),
            dom: self.dom.clone(),
        }
    }
}

impl Engine for FakeEngine {
    type Node = NodeId;
    type Content = String;
    type Api = FakeEngineApi;

    fn render(&mut self) {
        self.timeline.record(TimelineEvent::EngineRender);
        let api = self.api_handle();
        for slot in std::mem::take(&mut self.initial_slots) {
            api.add_slot(&slot.kind, slot.id.as_str(), slot.props);
        }
    }

    fn update_size(&mut self) {
        self.state.borrow_mut().resizes += 1;
        self.timeline.record(TimelineEvent::UpdateSize);
    }

    fn reset_options(&mut self, options: EngineOptions<String>, is_recurring: bool) {
        let keys: Vec<String> = options.options.keys().map(str::to_owned).collect();
        self.timeline.record(TimelineEvent::ResetOptions {
            keys,
            recurring: is_recurring,
            meta_version: options.custom_rendering_meta_map.version(),
        });

        let (handler, reemit) = {
            let mut state = self.state.borrow_mut();
            if !is_recurring {
                state.applied.clear();
            }
            for (key, value) in options.options.iter() {
                if value.is_unset() {
                    state.applied.remove(key);
                } else {
                    state.applied.insert(key.to_owned(), value.clone());
                }
            }

            let previous = std::mem::replace(&mut state.meta, options.custom_rendering_meta_map);
            let changed_kinds: Vec<String> = state
                .slots
                .values()
                .map(|slot| slot.kind.clone())
                .filter(|kind| match (previous.get(kind), state.meta.get(kind)) {
                    (Some(a), Some(b)) => !a.same_as(b),
                    (None, None) => false,
                    _ => true,
                })
                .collect();
            let reemit: Vec<_> = state
                .slots
                .iter()
                .filter(|(_, slot)| changed_kinds.contains(&slot.kind))
                .map(|(id, slot)| state.descriptor(id, slot))
                .collect();
            (Rc::clone(&state.handler), reemit)
        };
        if !reemit.is_empty() {
            debug!(slots = reemit.len(), "re-emitting slots after generator change");
        }
        for rendering in reemit {
            handler(rendering);
        }
    }

    fn destroy(&mut self) {
        let (handler, removed, root) = {
            let mut state = self.state.borrow_mut();
            state.destroyed = true;
            let slots = std::mem::take(&mut state.slots);
            let removed: Vec<_> = slots
                .iter()
                .map(|(id, slot)| state.descriptor(id, slot).deactivated())
                .collect();
            (Rc::clone(&state.handler), removed, state.root)
        };
        for rendering in removed {
            handler(rendering);
        }
        self.dom.detach(root);
        self.timeline.record(TimelineEvent::Destroy);
    }

    fn api(&self) -> FakeEngineApi {
        self.api_handle()
    }
}

/// Imperative handle to a [`FakeEngine`]. Cloning shares the engine.
///
/// Every mutator is a no-op returning `None`/`false` once the engine is
/// destroyed.
#[derive(Clone)]
pub struct FakeEngineApi {
    state: SharedState,
    dom: TestDom,
}

impl FakeEngineApi {
    /// Create a slot of `kind` and report it. Returns its container node.
    pub fn add_slot(&self, kind: &str, id: impl Into<SlotId>, props: Value) -> Option<NodeId> {
        let id = id.into();
        let (handler, rendering, node) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return None;
            }
            let node = self.dom.create_node(Some(state.root));
            let slot = SlotState {
                kind: kind.to_owned(),
                node,
                props,
            };
            let rendering = state.descriptor(&id, &slot);
            state.slots.insert(id, slot);
            (Rc::clone(&state.handler), rendering, node)
        };
        handler(rendering);
        Some(node)
    }

    /// Replace a slot's render props and report it.
    pub fn update_slot(&self, id: &SlotId, props: Value) -> bool {
        let (handler, rendering) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return false;
            }
            let Some(slot) = state.slots.get_mut(id) else {
                return false;
            };
            slot.props = props;
            let Some(slot) = state.slots.get(id) else {
                return false;
            };
            (Rc::clone(&state.handler), state.descriptor(id, slot))
        };
        handler(rendering);
        true
    }

    /// Destroy a slot, report it inactive and detach its node.
    pub fn remove_slot(&self, id: &SlotId) -> bool {
        let (handler, rendering, node) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return false;
            }
            let Some(slot) = state.slots.remove(id) else {
                return false;
            };
            let rendering = state.descriptor(id, &slot).deactivated();
            (Rc::clone(&state.handler), rendering, slot.node)
        };
        handler(rendering);
        self.dom.detach(node);
        true
    }

    /// Currently applied value of an option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<OptionValue<String>> {
        self.state.borrow().applied.get(key).cloned()
    }

    /// Keys of every applied option.
    #[must_use]
    pub fn option_keys(&self) -> Vec<String> {
        self.state.borrow().applied.keys().cloned().collect()
    }

    #[must_use]
    pub fn slot_node(&self, id: &SlotId) -> Option<NodeId> {
        self.state.borrow().slots.get(id).map(|slot| slot.node)
    }

    #[must_use]
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.state.borrow().slots.keys().cloned().collect()
    }

    /// Version of the meta map the engine currently holds.
    #[must_use]
    pub fn meta_version(&self) -> u64 {
        self.state.borrow().meta.version()
    }

    #[must_use]
    pub fn resize_count(&self) -> u32 {
        self.state.borrow().resizes
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.state.borrow().root
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }
}

impl std::fmt::Debug for FakeEngineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FakeEngineApi")
            .field("root", &state.root)
            .field("slots", &state.slots.len())
            .field("options", &state.applied.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
