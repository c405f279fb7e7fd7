#![forbid(unsafe_code)]

//! Adapter configuration.

/// What to do with option keys that disappear between two configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovedKeyPolicy {
    /// Do not forward removals. The engine keeps its last value; the
    /// generator table is resent in full regardless.
    #[default]
    Ignore,
    /// Forward each removed key as `OptionValue::Unset`.
    Unset,
}

/// Configuration for [`EngineAdapter`](crate::EngineAdapter).
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Name recorded on tracing spans.
    pub label: String,
    /// `is_recurring` flag passed to `reset_options`.
    pub recurring_reset: bool,
    /// Handling of removed option keys.
    pub removed_keys: RemovedKeyPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            label: "engine".to_string(),
            recurring_reset: true,
            removed_keys: RemovedKeyPolicy::Ignore,
        }
    }
}

impl AdapterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracing label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the `is_recurring` flag for option resets.
    #[must_use]
    pub fn with_recurring_reset(mut self, recurring: bool) -> Self {
        self.recurring_reset = recurring;
        self
    }

    /// Set the removed-key policy.
    #[must_use]
    pub fn with_removed_keys(mut self, policy: RemovedKeyPolicy) -> Self {
        self.removed_keys = policy;
        self
    }
}
