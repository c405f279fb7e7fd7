#![forbid(unsafe_code)]

//! Test harness and reference fixtures for slotbridge.
//!
//! Provides the pieces a real host framework and engine would supply, in a
//! deterministic, inspectable form:
//!
//! - [`dom::TestDom`]: externally-owned nodes that portals mount into.
//! - [`reconciler::PortalReconciler`]: keyed portal reconciliation.
//! - [`fake_engine::FakeEngine`]: a scriptable engine that reports slots.
//! - [`host::TestHost`]: drives an adapter through mount, updates, frames and
//!   unmount, committing renders synchronously.
//! - [`timeline::Timeline`]: ordered record of commits and engine calls.
//! - [`logging::init_test_logging`]: `tracing` output for test runs.

pub mod dom;
pub mod fake_engine;
pub mod host;
pub mod logging;
pub mod reconciler;
pub mod timeline;

pub use dom::{NodeId, TestDom};
pub use fake_engine::{FakeEngine, FakeEngineApi, FakeEngineConfig, SlotSpec};
pub use host::TestHost;
pub use logging::init_test_logging;
pub use reconciler::{PortalOp, PortalReconciler, PortalTarget};
pub use timeline::{Timeline, TimelineEvent};
