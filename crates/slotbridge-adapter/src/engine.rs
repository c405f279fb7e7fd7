#![forbid(unsafe_code)]

//! The interface the adapter needs from an imperative engine.
//!
//! Construction is not part of the trait: the host passes a factory closure
//! to [`EngineAdapter::activate`], which receives the adapter's root
//! container and an [`EngineInit`].
//!
//! [`EngineAdapter::activate`]: crate::adapter::EngineAdapter::activate

use std::fmt;

use slotbridge_core::{MetaMap, Options, RenderingHandler};

/// Everything an engine receives at construction.
pub struct EngineInit<N, C> {
    /// Full input configuration.
    pub options: Options<C>,
    /// Callback for slot creation, updates and destruction.
    pub handle_custom_rendering: RenderingHandler<N, C>,
    /// Generators for each slot kind.
    pub custom_rendering_meta_map: MetaMap<C>,
}

impl<N, C> fmt::Debug for EngineInit<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInit")
            .field("options", &self.options)
            .field("custom_rendering_meta_map", &self.custom_rendering_meta_map)
            .finish_non_exhaustive()
    }
}

/// Payload of an option reset: the changed options plus the current
/// generator table, which is always sent.
pub struct EngineOptions<C> {
    pub options: Options<C>,
    pub custom_rendering_meta_map: MetaMap<C>,
}

impl<C> Clone for EngineOptions<C> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            custom_rendering_meta_map: self.custom_rendering_meta_map.clone(),
        }
    }
}

impl<C> fmt::Debug for EngineOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("options", &self.options)
            .field("custom_rendering_meta_map", &self.custom_rendering_meta_map)
            .finish()
    }
}

/// An externally-owned engine with its own subtree and scheduling.
pub trait Engine {
    /// Container node handle (engine-owned DOM-like node).
    type Node: Clone + 'static;
    /// Content type produced by slot generators.
    type Content: Clone + 'static;
    /// Handle given to imperative callers.
    type Api;

    /// Initial render. Called once, right after construction.
    fn render(&mut self);

    /// Recompute sizes after slot content changed.
    fn update_size(&mut self);

    /// Apply changed options. With `is_recurring`, each key is last-write-wins
    /// over the previously applied configuration.
    fn reset_options(&mut self, options: EngineOptions<Self::Content>, is_recurring: bool);

    /// Release every owned node and listener. Called exactly once.
    fn destroy(&mut self);

    /// Handle for direct imperative control.
    fn api(&self) -> Self::Api;
}
