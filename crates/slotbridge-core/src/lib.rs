#![forbid(unsafe_code)]

//! Core: options, slot descriptors, the slot store and frame-synced reflow.
//!
//! # Role in slotbridge
//! `slotbridge-core` holds everything the adapter composes but that has no
//! knowledge of a concrete engine: configuration snapshots and their diff,
//! the custom-rendering slot descriptors an engine reports, the store that
//! publishes slot snapshots, and the debouncer that defers snapshot delivery
//! to the next frame boundary.
//!
//! # How it fits in the system
//! The adapter (`slotbridge-adapter`) owns an engine and wires a
//! [`store::CustomRenderingStore`] into it. The store pushes
//! [`rendering::RenderingSnapshot`]s through a [`reflow::ReflowNotifier`],
//! which is scheduled on a [`frame::FrameScheduler`] supplied by the host.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`); the host drives it
//! from its UI thread.

pub mod diff;
pub mod error;
pub mod frame;
pub mod options;
pub mod reflow;
pub mod rendering;
pub mod store;

pub use diff::{OptionsDiff, compute_updates};
pub use error::{EngineError, GeneratorError};
pub use frame::{FrameClock, FrameRequestId, FrameScheduler};
pub use options::{OptionValue, Options, OptionsBuilder};
pub use reflow::{FlushSync, ImmediateFlush, ReflowNotifier, ReflowStats};
pub use rendering::{
    CustomRendering, Generator, MetaMap, RenderProps, RenderingHandler, RenderingSnapshot, SlotId,
};
pub use store::{CustomRenderingStore, StoreSubscription};
