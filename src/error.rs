//! Error types for the turn-taking coordinator.

/// Top-level error type for the voice coordination system.
///
/// Environmental failures (no speech, low confidence, transient recognizer
/// errors) are absorbed at the session boundary and surfaced as empty
/// listening results, never as errors. Only conditions the caller must act
/// on reach this type.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Microphone or recognition permission denied. Terminal: listening
    /// must not be retried automatically.
    #[error("microphone permission denied")]
    Permission,

    /// Speech recognition capability error.
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// Speech synthesis capability error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Text generator error.
    #[error("generator error: {0}")]
    Generator(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
