#![forbid(unsafe_code)]

//! Custom-rendering slot descriptors and the snapshots that carry them.
//!
//! An engine reports every region whose content must come from the
//! declarative side as a [`CustomRendering`]. The descriptor names the slot
//! ([`SlotId`]), the engine-owned container node, the [`Generator`] that
//! produces content and the slot-specific [`RenderProps`] fed to it.
//!
//! # Invariants
//!
//! 1. A [`RenderingSnapshot`] is never mutated after construction; every
//!    change produces a new snapshot (new allocation), so `ptr_eq` is a valid
//!    change detector.
//! 2. [`MetaMap`] only holds `Content` options, keyed by option name.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::GeneratorError;
use crate::options::{OptionValue, Options};

/// Slot-specific data passed to a content generator.
pub type RenderProps = serde_json::Value;

/// Signature of a content-producing function.
pub type GeneratorFn<C> = dyn Fn(&RenderProps) -> Result<C, GeneratorError>;

/// Callback an engine uses to report slot creation, updates and destruction.
pub type RenderingHandler<N, C> = Rc<dyn Fn(CustomRendering<N, C>)>;

/// Opaque slot identity, stable across updates of the same logical slot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(Rc<str>);

impl SlotId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Rc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({:?})", &*self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SlotId {
    fn from(id: String) -> Self {
        Self(Rc::from(id))
    }
}

/// How a slot obtains its content.
///
/// Either a pure function of the slot's render props, or a precomputed
/// value used as-is. Both variants are shared handles: cloning a generator
/// keeps its identity, which is what option diffing compares.
pub enum Generator<C> {
    /// Content computed from render props.
    Func(Rc<GeneratorFn<C>>),
    /// Precomputed content.
    Value(Rc<C>),
}

impl<C> Generator<C> {
    /// Wrap a fallible content function.
    pub fn func(f: impl Fn(&RenderProps) -> Result<C, GeneratorError> + 'static) -> Self {
        Self::Func(Rc::new(f))
    }

    /// Wrap a content function that cannot fail.
    pub fn from_fn(f: impl Fn(&RenderProps) -> C + 'static) -> Self {
        Self::Func(Rc::new(move |props: &RenderProps| Ok(f(props))))
    }

    /// Wrap precomputed content.
    pub fn value(content: C) -> Self {
        Self::Value(Rc::new(content))
    }

    #[must_use]
    pub fn is_func(&self) -> bool {
        matches!(self, Self::Func(_))
    }

    /// Identity comparison: two generators are the same only if they share
    /// the same allocation.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Func(a), Self::Func(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Self::Value(a), Self::Value(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<C: Clone> Generator<C> {
    /// Produce content for the given props.
    ///
    /// Functions are invoked; precomputed values are cloned. Failures are
    /// returned unchanged for the caller to propagate.
    pub fn resolve(&self, props: &RenderProps) -> Result<C, GeneratorError> {
        match self {
            Self::Func(f) => f(props),
            Self::Value(content) => Ok(C::clone(content)),
        }
    }
}

impl<C> Clone for Generator<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Func(f) => Self::Func(Rc::clone(f)),
            Self::Value(v) => Self::Value(Rc::clone(v)),
        }
    }
}

impl<C> fmt::Debug for Generator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(func) => write!(f, "Generator::Func({:p})", Rc::as_ptr(func)),
            Self::Value(value) => write!(f, "Generator::Value({:p})", Rc::as_ptr(value)),
        }
    }
}

/// Descriptor of one engine slot that needs adapter-rendered content.
///
/// Authored exclusively by the engine. `is_active == false` reports that the
/// slot was destroyed; the store drops it from the next snapshot.
pub struct CustomRendering<N, C> {
    pub id: SlotId,
    pub container_el: N,
    pub generator_meta: Generator<C>,
    pub render_props: RenderProps,
    pub is_active: bool,
}

impl<N, C> CustomRendering<N, C> {
    /// An active descriptor.
    pub fn new(
        id: impl Into<SlotId>,
        container_el: N,
        generator_meta: Generator<C>,
        render_props: RenderProps,
    ) -> Self {
        Self {
            id: id.into(),
            container_el,
            generator_meta,
            render_props,
            is_active: true,
        }
    }

    /// The same descriptor, marked destroyed.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl<N, C: Clone> CustomRendering<N, C> {
    /// Resolve this slot's content through its generator.
    pub fn resolve_content(&self) -> Result<C, GeneratorError> {
        self.generator_meta.resolve(&self.render_props)
    }
}

impl<N: Clone, C> Clone for CustomRendering<N, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            container_el: self.container_el.clone(),
            generator_meta: self.generator_meta.clone(),
            render_props: self.render_props.clone(),
            is_active: self.is_active,
        }
    }
}

impl<N: fmt::Debug, C> fmt::Debug for CustomRendering<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRendering")
            .field("id", &self.id)
            .field("container_el", &self.container_el)
            .field("generator_meta", &self.generator_meta)
            .field("render_props", &self.render_props)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Immutable point-in-time set of all slots requiring adapter content.
///
/// Cloning shares the same map. A new snapshot is built for every change.
pub struct RenderingSnapshot<N, C> {
    slots: Rc<BTreeMap<SlotId, CustomRendering<N, C>>>,
}

impl<N, C> RenderingSnapshot<N, C> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: Rc::new(BTreeMap::new()),
        }
    }

    pub(crate) fn from_map(slots: BTreeMap<SlotId, CustomRendering<N, C>>) -> Self {
        Self {
            slots: Rc::new(slots),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &SlotId) -> Option<&CustomRendering<N, C>> {
        self.slots.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SlotId) -> bool {
        self.slots.contains_key(id)
    }

    /// Slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CustomRendering<N, C>> {
        self.slots.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SlotId> {
        self.slots.keys()
    }

    /// Whether both handles refer to the same snapshot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slots, &other.slots)
    }
}

impl<N: Clone, C> RenderingSnapshot<N, C> {
    pub(crate) fn to_map(&self) -> BTreeMap<SlotId, CustomRendering<N, C>> {
        BTreeMap::clone(&self.slots)
    }
}

impl<N, C> Clone for RenderingSnapshot<N, C> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<N, C> Default for RenderingSnapshot<N, C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<N: fmt::Debug, C> fmt::Debug for RenderingSnapshot<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slots.iter()).finish()
    }
}

/// Versioned table of content generators keyed by slot kind.
///
/// Built from the `Content` entries of a configuration snapshot. The engine
/// looks up a slot kind here to find the generator for new slots; nothing
/// else from the configuration is reachable through it.
pub struct MetaMap<C> {
    version: u64,
    entries: Rc<BTreeMap<String, Generator<C>>>,
}

impl<C> MetaMap<C> {
    /// Collect every `Content` option of `options`.
    #[must_use]
    pub fn from_options(options: &Options<C>, version: u64) -> Self {
        let entries = options
            .iter()
            .filter_map(|(key, value)| match value {
                OptionValue::Content(generator) => Some((key.to_owned(), generator.clone())),
                _ => None,
            })
            .collect();
        Self {
            version,
            entries: Rc::new(entries),
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Generator<C>> {
        self.entries.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Clone for MetaMap<C> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<C> fmt::Debug for MetaMap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMap")
            .field("version", &self.version)
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
