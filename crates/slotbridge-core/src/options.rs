#![forbid(unsafe_code)]

//! Configuration snapshots.
//!
//! [`Options`] is the full set of named input options at one point in time.
//! A snapshot is immutable and shared: cloning it keeps its identity, and
//! [`Options::ptr_eq`] lets the diff skip per-key scanning when nothing was
//! replaced.
//!
//! Values compare by *identity*, not structure (see [`OptionValue::same_as`]):
//! scalars and text compare by value, shared values (`Json`, `Content`,
//! `Callback`) by allocation. Two structurally equal JSON objects built
//! separately are therefore different values.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::rendering::Generator;

/// Callback option such as an event handler.
pub type OptionCallback = Rc<dyn Fn(&serde_json::Value)>;

/// A single option value.
pub enum OptionValue<C> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    /// Structured data, compared by allocation.
    Json(Rc<serde_json::Value>),
    /// A slot content generator supplied as an ordinary option.
    Content(Generator<C>),
    Callback(OptionCallback),
    /// Explicitly cleared. Only produced when removed keys are forwarded.
    Unset,
}

impl<C> OptionValue<C> {
    /// Wrap a callback option.
    pub fn callback(f: impl Fn(&serde_json::Value) + 'static) -> Self {
        Self::Callback(Rc::new(f))
    }

    /// Wrap structured data in a fresh allocation.
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(Rc::new(value))
    }

    /// Identity comparison used by the option diff.
    ///
    /// Floats use IEEE equality, so `NaN` never equals itself.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => Rc::ptr_eq(a, b),
            (Self::Content(a), Self::Content(b)) => a.same_as(b),
            (Self::Callback(a), Self::Callback(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Self::Unset, Self::Unset) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_content(&self) -> Option<&Generator<C>> {
        match self {
            Self::Content(g) => Some(g),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl<C> Clone for OptionValue<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Bool(b) => Self::Bool(*b),
            Self::Int(i) => Self::Int(*i),
            Self::Float(x) => Self::Float(*x),
            Self::Text(s) => Self::Text(Rc::clone(s)),
            Self::Json(v) => Self::Json(Rc::clone(v)),
            Self::Content(g) => Self::Content(g.clone()),
            Self::Callback(f) => Self::Callback(Rc::clone(f)),
            Self::Unset => Self::Unset,
        }
    }
}

impl<C> fmt::Debug for OptionValue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Text(s) => write!(f, "Text({:?})", &**s),
            Self::Json(v) => write!(f, "Json({v})"),
            Self::Content(g) => write!(f, "Content({g:?})"),
            Self::Callback(cb) => write!(f, "Callback({:p})", Rc::as_ptr(cb)),
            Self::Unset => f.write_str("Unset"),
        }
    }
}

impl<C> From<bool> for OptionValue<C> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<C> From<i64> for OptionValue<C> {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<C> From<i32> for OptionValue<C> {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl<C> From<f64> for OptionValue<C> {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<C> From<&str> for OptionValue<C> {
    fn from(value: &str) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl<C> From<String> for OptionValue<C> {
    fn from(value: String) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl<C> From<serde_json::Value> for OptionValue<C> {
    fn from(value: serde_json::Value) -> Self {
        Self::json(value)
    }
}

impl<C> From<Generator<C>> for OptionValue<C> {
    fn from(value: Generator<C>) -> Self {
        Self::Content(value)
    }
}

/// Immutable configuration snapshot.
pub struct Options<C> {
    entries: Rc<BTreeMap<String, OptionValue<C>>>,
}

impl<C> Options<C> {
    /// An empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Rc::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn builder() -> OptionsBuilder<C> {
        OptionsBuilder::new()
    }

    /// A builder pre-filled with this snapshot's entries.
    ///
    /// The built snapshot is a new identity even if nothing is changed.
    #[must_use]
    pub fn to_builder(&self) -> OptionsBuilder<C> {
        OptionsBuilder {
            entries: BTreeMap::clone(&self.entries),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue<C>> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue<C>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether both handles refer to the same snapshot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<C> Clone for Options<C> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<C> Default for Options<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Options<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<C, K: Into<String>> FromIterator<(K, OptionValue<C>)> for Options<C> {
    fn from_iter<I: IntoIterator<Item = (K, OptionValue<C>)>>(iter: I) -> Self {
        Self {
            entries: Rc::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

/// Builder for [`Options`].
pub struct OptionsBuilder<C> {
    entries: BTreeMap<String, OptionValue<C>>,
}

impl<C> OptionsBuilder<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Set an option, replacing any previous value.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue<C>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue<C>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Drop an option.
    #[must_use]
    pub fn remove(mut self, key: &str) -> Self {
        self.entries.remove(key);
        self
    }

    #[must_use]
    pub fn build(self) -> Options<C> {
        Options {
            entries: Rc::new(self.entries),
        }
    }
}

impl<C> Default for OptionsBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
