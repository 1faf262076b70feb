//! Adapter contracts for the host-provided speech capabilities.
//!
//! The coordinator does no speech-to-text or text-to-speech itself; it
//! orchestrates capabilities the host environment exposes. Each capability
//! is a trait seam so frontends can plug in platform services and tests can
//! script them.

use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Settings passed to the recognizer when opening a session.
#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    /// Keep the session open across pauses in speech.
    pub continuous: bool,
    /// Deliver provisional results before they are final.
    pub interim_results: bool,
    /// Maximum alternatives per result.
    pub max_alternatives: u32,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// One candidate transcription of an utterance.
#[derive(Debug, Clone)]
pub struct RecognizedAlternative {
    /// The transcribed text, untrimmed.
    pub transcript: String,
    /// Recognizer-reported confidence in `[0, 1]`.
    pub confidence: f32,
}

/// A recognition result delivered by the capability.
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Candidate transcriptions, best first.
    pub alternatives: Vec<RecognizedAlternative>,
    /// Whether this result is final or may still change.
    pub is_final: bool,
    /// Index of this result within the session.
    pub result_index: usize,
}

/// Recognizer error codes, mirroring the host capability's taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    /// No usable speech was detected before the capability gave up. Benign.
    NoSpeech,
    /// Microphone or recognition permission denied or revoked. Terminal.
    NotAllowed,
    /// Any other capability error, recoverable at the session level.
    Other(String),
}

/// Events a recognition session delivers, in order.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// The capability has started capturing.
    Started,
    /// A recognition result.
    Result(RecognitionResult),
    /// A capability error.
    Error(RecognizerError),
    /// The session ended, whether by completion, timeout, or [`SessionControl::stop`].
    /// Adapters must always deliver this last.
    End,
}

/// Control handle for a live recognition session.
pub trait SessionControl: Send + Sync {
    /// Stop the session. The adapter must then deliver [`RecognizerEvent::End`]
    /// so pending consumers resolve rather than hang.
    fn stop(&self);
}

/// A live recognition session: an ordered event stream plus its control.
pub struct RecognitionSession {
    /// Session events, ending with [`RecognizerEvent::End`].
    pub events: mpsc::UnboundedReceiver<RecognizerEvent>,
    /// Stops the session.
    pub control: Arc<dyn SessionControl>,
}

/// Speech recognition capability.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Open a fresh recognition session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Permission`] when recognition is not
    /// allowed, or a recognizer error when the session cannot be opened.
    async fn open(&self, settings: &RecognizerSettings) -> Result<RecognitionSession>;
}

/// A synthesis voice offered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Host-assigned voice name, used for selection.
    pub name: String,
    /// BCP-47 language tag.
    pub lang: String,
}

/// Text to synthesize, with an optional voice override.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// The text to speak.
    pub text: String,
    /// Voice to use; `None` means the host default.
    pub voice: Option<Voice>,
}

/// Speech synthesis capability.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// List available voices, resolving once the host's voice list is
    /// populated (some hosts load it asynchronously).
    async fn voices(&self) -> Result<Vec<Voice>>;

    /// Speak one utterance, resolving when playback ends.
    ///
    /// [`Synthesizer::cancel`] must make an in-flight call resolve
    /// immediately rather than hang.
    ///
    /// # Errors
    ///
    /// Returns a synthesis error when the utterance cannot be spoken.
    async fn speak(&self, utterance: Utterance) -> Result<()>;

    /// Cancel the in-flight utterance, if any. Synchronous and idempotent.
    fn cancel(&self);
}

/// Microphone access capability.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Request microphone access.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Permission`] when the user denies
    /// access. Initialization must treat this as fatal.
    async fn request_access(&self) -> Result<()>;
}

/// Streaming text generation capability.
///
/// The transport behind the stream (HTTP, local model, ...) is the host's
/// concern; the coordinator only consumes the chunk sequence.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `prompt` as a lazy, finite, non-restartable
    /// sequence of incremental text chunks.
    ///
    /// # Errors
    ///
    /// Returns a generator error when the stream cannot be started; errors
    /// mid-stream are delivered as stream items.
    async fn generate(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}
