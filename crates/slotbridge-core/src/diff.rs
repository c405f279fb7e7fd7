#![forbid(unsafe_code)]

//! Shallow diff between two configuration snapshots.
//!
//! # Semantics
//!
//! - Same snapshot (pointer identity): empty diff, no per-key scan.
//! - Every key of `current` whose value is not [`OptionValue::same_as`] the
//!   previous value (or is new) lands in [`OptionsDiff::updates`].
//! - Keys present only in `previous` are reported in
//!   [`OptionsDiff::removed`] but never appear in `updates`. Whether they are
//!   forwarded is the caller's policy.
//!
//! [`OptionValue::same_as`]: crate::options::OptionValue::same_as

use crate::options::{Options, OptionsBuilder};

/// Result of [`compute_updates`].
pub struct OptionsDiff<C> {
    /// Changed or added keys with their current values.
    pub updates: Options<C>,
    /// Keys that disappeared, in key order.
    pub removed: Vec<String>,
}

impl<C> OptionsDiff<C> {
    /// No changed or added keys. Removals do not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    #[must_use]
    pub fn has_removals(&self) -> bool {
        !self.removed.is_empty()
    }
}

impl<C> std::fmt::Debug for OptionsDiff<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsDiff")
            .field("updates", &self.updates)
            .field("removed", &self.removed)
            .finish()
    }
}

/// Compute the minimal set of changed top-level options.
#[must_use]
pub fn compute_updates<C>(previous: &Options<C>, current: &Options<C>) -> OptionsDiff<C> {
    if previous.ptr_eq(current) {
        return OptionsDiff {
            updates: Options::new(),
            removed: Vec::new(),
        };
    }

    let mut updates = OptionsBuilder::new();
    for (key, value) in current.iter() {
        let unchanged = previous.get(key).is_some_and(|old| old.same_as(value));
        if !unchanged {
            updates.insert(key, value.clone());
        }
    }

    let removed = previous
        .keys()
        .filter(|key| !current.contains_key(key))
        .map(str::to_owned)
        .collect();

    OptionsDiff {
        updates: updates.build(),
        removed,
    }
}
