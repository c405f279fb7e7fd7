#![forbid(unsafe_code)]

//! Adapter errors.

use slotbridge_core::{EngineError, GeneratorError, SlotId};

/// Failures surfaced by [`EngineAdapter`](crate::EngineAdapter).
///
/// Nothing here is retried. A construction failure leaves the adapter
/// permanently unusable.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("engine construction failed: {0}")]
    Construction(#[source] EngineError),

    #[error("adapter is unusable after a failed activation")]
    Unusable,

    #[error("adapter is already active")]
    AlreadyActive,

    #[error("adapter was deactivated")]
    Deactivated,

    #[error("adapter is not active")]
    Inactive,

    #[error("content generation failed for slot {slot}")]
    Generator {
        slot: SlotId,
        #[source]
        source: GeneratorError,
    },
}
