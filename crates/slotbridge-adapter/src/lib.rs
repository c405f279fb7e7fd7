#![forbid(unsafe_code)]

//! Adapter that hosts an imperative rendering engine inside a declarative
//! component tree.
//!
//! # Role in slotbridge
//! The engine decides *which* slots exist; the declarative side decides
//! *what they show*. [`EngineAdapter`] owns one engine per activation, mirrors
//! the engine's slot store into component state, projects that state into
//! keyed portals, forwards configuration changes as minimal option resets,
//! and asks the engine to reflow after new slot content has been rendered.
//!
//! # Lifecycle (driven by the host)
//! ```text
//! new(props) → render()               // empty root, no portals
//!            → activate(..)           // construct engine, engine.render(), subscribe
//! frame      → snapshot delivered     // state mirror replaced, reflow pending
//!            → render() → did_update  // portals, then reset_options?, update_size
//! set_props  → render() → did_update(prev)
//! deactivate()                        // unsubscribe, cancel frame, engine.destroy()
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod view;

pub use adapter::{AdapterPhase, AdapterStats, EngineAdapter, UpdateReport};
pub use config::{AdapterConfig, RemovedKeyPolicy};
pub use engine::{Engine, EngineInit, EngineOptions};
pub use error::AdapterError;
pub use registry::SlotRegistry;
pub use view::{Portal, RootView};
