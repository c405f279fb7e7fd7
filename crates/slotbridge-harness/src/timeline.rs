#![forbid(unsafe_code)]

//! Ordered record of host commits and engine calls.
//!
//! The fake engine and the test host append to one shared [`Timeline`], so
//! tests can assert relative ordering (a resize after the commit that
//! rendered new slot content, a reset before that resize, and so on).

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    /// The engine factory ran.
    EngineConstructed { options: Vec<String> },
    /// Initial engine render.
    EngineRender,
    /// `reset_options` with the forwarded keys.
    ResetOptions {
        keys: Vec<String>,
        recurring: bool,
        meta_version: u64,
    },
    UpdateSize,
    Destroy,
    /// The host committed a render of the adapter.
    Commit { keys: Vec<String>, version: u64 },
}

impl TimelineEvent {
    /// Short name for filtering.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EngineConstructed { .. } => "engine_constructed",
            Self::EngineRender => "engine_render",
            Self::ResetOptions { .. } => "reset_options",
            Self::UpdateSize => "update_size",
            Self::Destroy => "destroy",
            Self::Commit { .. } => "commit",
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::EngineConstructed { options } => json!({"event": self.kind(), "options": options}),
            Self::ResetOptions {
                keys,
                recurring,
                meta_version,
            } => json!({
                "event": self.kind(),
                "keys": keys,
                "recurring": recurring,
                "meta_version": meta_version,
            }),
            Self::Commit { keys, version } => {
                json!({"event": self.kind(), "keys": keys, "version": version})
            }
            Self::EngineRender | Self::UpdateSize | Self::Destroy => json!({"event": self.kind()}),
        }
    }
}

/// Shared, append-only event log. Cloning shares the log.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Rc<RefCell<Vec<TimelineEvent>>>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TimelineEvent) {
        self.events.borrow_mut().push(event);
    }

    #[must_use]
    pub fn events(&self) -> Vec<TimelineEvent> {
        self.events.borrow().clone()
    }

    /// Event kinds in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(TimelineEvent::kind).collect()
    }

    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    /// Events recorded from index `from` onwards.
    #[must_use]
    pub fn since(&self, from: usize) -> Vec<TimelineEvent> {
        self.events.borrow().iter().skip(from).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// One JSON object per line.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.events
            .borrow()
            .iter()
            .map(|e| e.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
