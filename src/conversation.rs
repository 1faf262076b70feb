//! Conversation loop driving the listen/reply alternation.

use crate::capability::{Microphone, Recognizer, Synthesizer, TextGenerator, Voice};
use crate::config::{CoordinatorConfig, SynthConfig};
use crate::error::Result;
use crate::listen::Listener;
use crate::speech::SpeechOutput;
use crate::turn::{TurnGate, TurnState};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The host capabilities a conversation is built from.
pub struct Capabilities {
    /// Microphone access, requested once at initialization.
    pub microphone: Arc<dyn Microphone>,
    /// Speech recognition.
    pub recognizer: Arc<dyn Recognizer>,
    /// Speech synthesis.
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Streaming reply generation.
    pub generator: Arc<dyn TextGenerator>,
}

/// Top-level driver alternating listening sessions and spoken replies.
pub struct Conversation {
    config: CoordinatorConfig,
    gate: Arc<TurnGate>,
    speech: SpeechOutput,
    listener: Listener,
    generator: Arc<dyn TextGenerator>,
    cancel: CancellationToken,
}

impl Conversation {
    /// Initialize a conversation: request microphone access, resolve the
    /// preferred synthesis voice, and speak the ready announcement.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Permission`] when microphone access is
    /// denied (fatal, no retry), or a capability error from voice listing.
    pub async fn initialize(config: CoordinatorConfig, caps: Capabilities) -> Result<Self> {
        caps.microphone.request_access().await?;

        let voice = resolve_voice(caps.synthesizer.as_ref(), &config.synth).await?;
        let gate = Arc::new(TurnGate::new());
        let speech = SpeechOutput::new(
            Arc::clone(&gate),
            Arc::clone(&caps.synthesizer),
            voice,
        );
        let listener = Listener::new(
            Arc::clone(&gate),
            caps.recognizer,
            speech.clone(),
            config.listen.clone(),
        );

        if !config.synth.ready_announcement.is_empty() {
            speech.enqueue(&config.synth.ready_announcement).await;
        }

        Ok(Self {
            config,
            gate,
            speech,
            listener,
            generator: caps.generator,
            cancel: CancellationToken::new(),
        })
    }

    /// Run the conversation until [`Conversation::shutdown`] is called.
    ///
    /// Speaks the greeting, then alternates listening and replying. Empty
    /// listening results (silence, low confidence, recoverable recognizer
    /// errors) are answered with the fixed reprompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Permission`] if recognition permission
    /// is denied or revoked; all other turn-level failures are absorbed.
    pub async fn run(&self) -> Result<()> {
        info!("conversation loop starting");
        self.speech.enqueue(&self.config.conversation.greeting);
        self.await_speech().await;

        while !self.cancel.is_cancelled() {
            let heard = tokio::select! {
                () = self.cancel.cancelled() => break,
                heard = self.listener.listen(false) => heard?,
            };
            if self.cancel.is_cancelled() {
                break;
            }

            if heard.is_empty() {
                debug!("nothing usable heard, reprompting");
                self.speech.enqueue(&self.config.conversation.reprompt);
            } else {
                info!("heard: {heard:?}");
                self.respond(&heard).await;
            }
            self.await_speech().await;

            // Let residual audio settle before capturing again.
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.conversation.inter_turn_delay()) => {}
            }
        }

        info!("conversation loop ended");
        Ok(())
    }

    /// Stream a reply to `prompt`, speaking completed sentences as they
    /// arrive. Generator failures end the reply turn; they are not fatal.
    async fn respond(&self, prompt: &str) {
        let mut stream = match self.generator.generate(prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("reply generation failed: {e}");
                return;
            }
        };

        let mut scanner = crate::sentence::SentenceScanner::new();
        loop {
            let chunk = tokio::select! {
                () = self.cancel.cancelled() => break,
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(chunk)) => {
                    for sentence in scanner.push(&chunk) {
                        self.speech.enqueue(&sentence);
                    }
                }
                Some(Err(e)) => {
                    warn!("reply stream error: {e}");
                    break;
                }
                None => break,
            }
        }
        if !scanner.tail().is_empty() {
            debug!("discarding unterminated reply tail: {:?}", scanner.tail());
        }
    }

    /// Wait for all queued speech to finish, or for shutdown.
    async fn await_speech(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = self.speech.drained() => {}
        }
    }

    /// Request shutdown: end the loop and unwind whatever the turn is
    /// doing. An active synthesis is cancelled, an active recognition
    /// session is stopped, and pending listen futures resolve rather than
    /// hang.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.speech.stop();
        self.listener.stop();
    }

    /// Cancellation token observed by the loop, for external wiring.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current turn state.
    pub fn state(&self) -> TurnState {
        self.gate.state()
    }

    /// Subscribe to turn state transitions, e.g. for a UI state indicator.
    pub fn turn_states(&self) -> watch::Receiver<TurnState> {
        self.gate.subscribe()
    }

    /// The speech output queue, for speaking outside the loop (e.g. host
    /// notifications).
    pub fn speech(&self) -> &SpeechOutput {
        &self.speech
    }
}

/// Pick the preferred voice from the synthesizer's list, if present.
async fn resolve_voice(synth: &dyn Synthesizer, config: &SynthConfig) -> Result<Option<Voice>> {
    let voices = synth.voices().await?;
    let voice = voices.into_iter().find(|v| v.name == config.preferred_voice);
    match &voice {
        Some(v) => info!("using voice {:?} ({})", v.name, v.lang),
        None => warn!(
            "preferred voice {:?} not offered by host, using default",
            config.preferred_voice
        ),
    }
    Ok(voice)
}
