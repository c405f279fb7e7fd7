#![forbid(unsafe_code)]

//! Error types shared by engines and content generators.

/// The engine could not be constructed or refused an operation.
///
/// Engines are external collaborators, so the error only carries a message
/// and an optional source.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl EngineError {
    /// Create an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message without the source chain.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A slot content generator failed to produce content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content generator failed: {message}")]
pub struct GeneratorError {
    message: String,
}

impl GeneratorError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
