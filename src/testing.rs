//! Scripted capability implementations for tests and the demo binary.
//!
//! These adapters honor the capability contracts exactly (one `End` event
//! per recognition session, cancel resolves the in-flight speak) so the
//! coordinator can be exercised without any host speech services.

use crate::capability::{
    Microphone, RecognitionResult, RecognitionSession, RecognizedAlternative, Recognizer,
    RecognizerError, RecognizerEvent, RecognizerSettings, SessionControl, Synthesizer,
    TextGenerator, Utterance, Voice,
};
use crate::error::{Result, VoiceError};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Microphone that grants or denies access.
pub struct ScriptedMicrophone {
    allow: bool,
}

impl ScriptedMicrophone {
    /// Microphone whose permission prompt is accepted.
    pub fn allowed() -> Self {
        Self { allow: true }
    }

    /// Microphone whose permission prompt is denied.
    pub fn denied() -> Self {
        Self { allow: false }
    }
}

#[async_trait]
impl Microphone for ScriptedMicrophone {
    async fn request_access(&self) -> Result<()> {
        if self.allow {
            Ok(())
        } else {
            Err(VoiceError::Permission)
        }
    }
}

/// One scripted listening session outcome.
#[derive(Debug, Clone)]
pub enum ScriptedListen {
    /// Deliver a recognition result.
    Result(RecognitionResult),
    /// Report `no-speech`.
    Silence,
    /// Report `not-allowed`.
    Revoked,
    /// Report another recognizer error code.
    Fail(String),
    /// End the session without any result.
    EndOnly,
    /// Deliver nothing until the session is stopped.
    Pending,
}

impl ScriptedListen {
    /// A confident final result for `transcript`.
    pub fn hear(transcript: &str) -> Self {
        Self::result(transcript, 0.9, true)
    }

    /// A result with an explicit confidence and finality.
    pub fn result(transcript: &str, confidence: f32, is_final: bool) -> Self {
        Self::Result(RecognitionResult {
            alternatives: vec![RecognizedAlternative {
                transcript: transcript.to_owned(),
                confidence,
            }],
            is_final,
            result_index: 0,
        })
    }

    /// A recognizer error with the given code.
    pub fn fail(code: &str) -> Self {
        Self::Fail(code.to_owned())
    }
}

/// Recognizer that plays back a script, one entry per opened session.
///
/// An exhausted script reports silence, so a conversation loop keeps
/// behaving like one in a quiet room.
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<ScriptedListen>>,
    opened: AtomicUsize,
}

impl ScriptedRecognizer {
    /// Recognizer with an empty script (every session reports silence).
    pub fn new() -> Self {
        Self::with_script([])
    }

    /// Recognizer that plays back `script` in order.
    pub fn with_script(script: impl IntoIterator<Item = ScriptedListen>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Number of sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

struct ScriptedControl {
    events: mpsc::UnboundedSender<RecognizerEvent>,
    stopped: AtomicBool,
}

impl SessionControl for ScriptedControl {
    fn stop(&self) {
        // Deliver End exactly once, no matter how often stop is called.
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(RecognizerEvent::End);
        }
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn open(&self, _settings: &RecognizerSettings) -> Result<RecognitionSession> {
        self.opened.fetch_add(1, Ordering::Relaxed);
        let step = lock(&self.script)
            .pop_front()
            .unwrap_or(ScriptedListen::Silence);

        let (tx, rx) = mpsc::unbounded_channel();
        let control = Arc::new(ScriptedControl {
            events: tx.clone(),
            stopped: AtomicBool::new(false),
        });

        let _ = tx.send(RecognizerEvent::Started);
        match step {
            ScriptedListen::Result(result) => {
                let _ = tx.send(RecognizerEvent::Result(result));
            }
            ScriptedListen::Silence => {
                let _ = tx.send(RecognizerEvent::Error(RecognizerError::NoSpeech));
            }
            ScriptedListen::Revoked => {
                let _ = tx.send(RecognizerEvent::Error(RecognizerError::NotAllowed));
            }
            ScriptedListen::Fail(code) => {
                let _ = tx.send(RecognizerEvent::Error(RecognizerError::Other(code)));
            }
            ScriptedListen::EndOnly => {
                control.stop();
            }
            ScriptedListen::Pending => {}
        }

        Ok(RecognitionSession {
            events: rx,
            control,
        })
    }
}

/// Synthesizer that records what it is asked to speak.
pub struct ScriptedSynthesizer {
    voices: Vec<Voice>,
    delay: Mutex<Duration>,
    spoken: Mutex<Vec<String>>,
    cancelled: Notify,
}

impl ScriptedSynthesizer {
    /// Synthesizer with one default voice and instant playback.
    pub fn new() -> Self {
        Self {
            voices: vec![Voice {
                name: "Test Voice".to_owned(),
                lang: "en-US".to_owned(),
            }],
            delay: Mutex::new(Duration::ZERO),
            spoken: Mutex::new(Vec::new()),
            cancelled: Notify::new(),
        }
    }

    /// Replace the offered voice list.
    pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
        self.voices = voices;
        self
    }

    /// Simulate playback taking `delay` per utterance.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Change the simulated playback time for subsequent utterances.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Make subsequent utterances complete instantly.
    pub fn finish_instantly(&self) {
        self.set_delay(Duration::ZERO);
    }

    /// Utterances spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).clone()
    }
}

impl Default for ScriptedSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn voices(&self) -> Result<Vec<Voice>> {
        Ok(self.voices.clone())
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        lock(&self.spoken).push(utterance.text);
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.cancelled.notified() => {}
            }
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.notify_waiters();
    }
}

/// Generator that streams scripted replies, one per prompt.
///
/// An exhausted script yields an empty stream. Prompts are recorded for
/// assertions.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Vec<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Generator with no scripted replies.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply as the chunk sequence its stream will yield.
    pub fn push_reply(&self, chunks: impl IntoIterator<Item = &'static str>) {
        lock(&self.replies).push_back(chunks.into_iter().map(str::to_owned).collect());
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        lock(&self.prompts).push(prompt.to_owned());
        let chunks = lock(&self.replies).pop_front().unwrap_or_default();
        Ok(Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        }))
    }
}
