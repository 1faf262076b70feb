//! One-shot listening sessions over the recognition capability.
//!
//! Each call to [`Listener::listen`] opens a fresh recognizer session,
//! takes exactly one result from its event stream, and tears the session
//! down. Environmental failures (no speech, low confidence, transient
//! recognizer errors) resolve as an empty string so the conversation loop
//! can treat them uniformly as "nothing usable was heard".

use crate::capability::{
    RecognitionResult, RecognitionSession, Recognizer, RecognizerError, RecognizerEvent,
    RecognizerSettings, SessionControl,
};
use crate::config::ListenConfig;
use crate::error::{Result, VoiceError};
use crate::speech::SpeechOutput;
use crate::turn::{Turn, TurnGate, TurnState};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Opens one-shot recognition sessions gated by the [`TurnGate`].
pub struct Listener {
    gate: Arc<TurnGate>,
    recognizer: Arc<dyn Recognizer>,
    speech: SpeechOutput,
    config: ListenConfig,
    /// Control of the active session, for external [`Listener::stop`].
    active: Mutex<Option<Arc<dyn SessionControl>>>,
}

impl Listener {
    /// Create a listener.
    ///
    /// `speech` is needed for the force-interrupt path, which stops an
    /// in-flight utterance before claiming the channel.
    pub fn new(
        gate: Arc<TurnGate>,
        recognizer: Arc<dyn Recognizer>,
        speech: SpeechOutput,
        config: ListenConfig,
    ) -> Self {
        Self {
            gate,
            recognizer,
            speech,
            config,
            active: Mutex::new(None),
        }
    }

    /// Listen for one utterance.
    ///
    /// When the channel is busy and `force_interrupt` is false, resolves
    /// immediately with an empty string; competing listen requests are
    /// never queued. With `force_interrupt`, an active utterance is
    /// cancelled first and the channel is forced back to idle.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Permission`] when recognition is denied or
    /// revoked; callers must not retry automatically. All other recognizer
    /// failures resolve as `Ok("")`.
    pub async fn listen(&self, force_interrupt: bool) -> Result<String> {
        if !force_interrupt && self.gate.state() != TurnState::Idle {
            return Ok(String::new());
        }
        if force_interrupt && self.gate.state() == TurnState::Speaking {
            self.speech.stop();
            self.gate.exit();
        }
        if !self.gate.try_enter(Turn::Listening) {
            return Ok(String::new());
        }
        // Teardown lives in the claim's Drop so it also runs when this
        // future is dropped mid-session (e.g. loop cancellation): the
        // session is stopped and the gate returned to idle either way.
        let mut claim = ListenClaim {
            listener: self,
            control: None,
        };

        let session = self.recognizer.open(&self.settings()).await?;
        let RecognitionSession { mut events, control } = session;
        claim.control = Some(Arc::clone(&control));
        *self.lock_active() = Some(control);

        match self.config.timeout() {
            Some(bound) => {
                match tokio::time::timeout(bound, self.await_one_result(&mut events)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        info!("listening session timed out after {bound:?}");
                        Ok(String::new())
                    }
                }
            }
            None => self.await_one_result(&mut events).await,
        }
    }

    /// Stop the active recognition session, if any.
    ///
    /// The adapter then delivers its end event, resolving the pending
    /// [`Listener::listen`] future with an empty string.
    pub fn stop(&self) {
        if let Some(control) = self.lock_active().as_ref() {
            control.stop();
        }
    }

    fn settings(&self) -> RecognizerSettings {
        RecognizerSettings {
            continuous: self.config.continuous,
            interim_results: self.config.interim_results,
            max_alternatives: self.config.max_alternatives,
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn SessionControl>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn await_one_result(
        &self,
        events: &mut mpsc::UnboundedReceiver<RecognizerEvent>,
    ) -> Result<String> {
        loop {
            match events.recv().await {
                Some(RecognizerEvent::Started) => continue,
                Some(RecognizerEvent::Result(result)) => return Ok(self.extract_text(&result)),
                Some(RecognizerEvent::Error(RecognizerError::NoSpeech)) => {
                    // Benign: silence is a normal listening outcome.
                    debug!("no speech detected");
                    return Ok(String::new());
                }
                Some(RecognizerEvent::Error(RecognizerError::NotAllowed)) => {
                    error!("recognition permission revoked mid-session");
                    return Err(VoiceError::Permission);
                }
                Some(RecognizerEvent::Error(RecognizerError::Other(code))) => {
                    warn!("recognizer error: {code}");
                    return Ok(String::new());
                }
                Some(RecognizerEvent::End) | None => return Ok(String::new()),
            }
        }
    }

    /// Apply the confidence gate to a recognition result.
    ///
    /// Final results are accepted at or above the final floor; interim
    /// results must exceed the stricter interim floor. Accepted transcripts
    /// are whitespace-trimmed, everything else yields an empty string.
    fn extract_text(&self, result: &RecognitionResult) -> String {
        let Some(best) = result.alternatives.first() else {
            return String::new();
        };
        let accepted = if result.is_final {
            best.confidence >= self.config.final_confidence_floor
        } else {
            best.confidence > self.config.interim_confidence_floor
        };
        if accepted {
            best.transcript.trim().to_owned()
        } else {
            debug!(
                "rejected {} result (confidence {:.2})",
                if result.is_final { "final" } else { "interim" },
                best.confidence
            );
            String::new()
        }
    }
}

/// One listening session's claim on the gate.
///
/// Dropping the claim stops the capability session, clears the active
/// control, and releases the gate. Running this in `Drop` keeps
/// [`Listener::listen`] cancel-safe: a caller that drops the future
/// mid-session cannot strand the gate in `Listening` or leave a stale
/// control behind.
struct ListenClaim<'a> {
    listener: &'a Listener,
    control: Option<Arc<dyn SessionControl>>,
}

impl Drop for ListenClaim<'_> {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.stop();
        }
        *self.listener.lock_active() = None;
        self.listener.gate.release(Turn::Listening);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::capability::{RecognizedAlternative, Synthesizer};
    use crate::testing::{ScriptedListen, ScriptedRecognizer, ScriptedSynthesizer};
    use std::time::Duration;

    fn listener_with(recognizer: Arc<ScriptedRecognizer>) -> (Arc<TurnGate>, Listener) {
        let gate = Arc::new(TurnGate::new());
        let synth = Arc::new(ScriptedSynthesizer::new());
        let speech = SpeechOutput::new(Arc::clone(&gate), synth as Arc<dyn Synthesizer>, None);
        let listener = Listener::new(
            Arc::clone(&gate),
            recognizer as Arc<dyn Recognizer>,
            speech,
            ListenConfig::default(),
        );
        (gate, listener)
    }

    fn result(transcript: &str, confidence: f32, is_final: bool) -> RecognitionResult {
        RecognitionResult {
            alternatives: vec![RecognizedAlternative {
                transcript: transcript.to_owned(),
                confidence,
            }],
            is_final,
            result_index: 0,
        }
    }

    #[tokio::test]
    async fn resolves_with_recognized_phrase() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::hear(
            "  what is the capital of France  ",
        )]));
        let (gate, listener) = listener_with(recognizer);

        let heard = listener.listen(false).await.unwrap();
        assert_eq!(heard, "what is the capital of France");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn busy_gate_resolves_empty_without_queuing() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::hear("hi")]));
        let (gate, listener) = listener_with(recognizer);

        assert!(gate.try_enter(Turn::Speaking));
        let heard = listener.listen(false).await.unwrap();
        assert_eq!(heard, "");
        // The listen did not touch the gate.
        assert_eq!(gate.state(), TurnState::Speaking);
    }

    #[tokio::test]
    async fn confidence_gate_on_final_results() {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let (_gate, listener) = listener_with(recognizer);

        assert_eq!(listener.extract_text(&result("too quiet", 0.29, true)), "");
        assert_eq!(
            listener.extract_text(&result("just enough", 0.31, true)),
            "just enough"
        );
    }

    #[tokio::test]
    async fn confidence_gate_on_interim_results() {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let (_gate, listener) = listener_with(recognizer);

        assert_eq!(listener.extract_text(&result("maybe", 0.59, false)), "");
        assert_eq!(
            listener.extract_text(&result("clearly", 0.61, false)),
            "clearly"
        );
    }

    #[tokio::test]
    async fn no_speech_is_benign() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::Silence]));
        let (gate, listener) = listener_with(recognizer);

        assert_eq!(listener.listen(false).await.unwrap(), "");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn permission_revocation_is_terminal() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::Revoked]));
        let (gate, listener) = listener_with(recognizer);

        let err = listener.listen(false).await.unwrap_err();
        assert!(matches!(err, VoiceError::Permission));
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn other_errors_resolve_empty() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::fail(
            "audio-capture",
        )]));
        let (gate, listener) = listener_with(recognizer);

        assert_eq!(listener.listen(false).await.unwrap(), "");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn end_without_result_resolves_empty() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::EndOnly]));
        let (gate, listener) = listener_with(recognizer);

        assert_eq!(listener.listen(false).await.unwrap(), "");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn stop_resolves_a_pending_listen() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::Pending]));
        let (gate, listener) = listener_with(recognizer);
        let listener = Arc::new(listener);

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.listen(false).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(gate.state(), TurnState::Listening);

        listener.stop();
        let heard = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("listen must resolve after stop")
            .unwrap()
            .unwrap();
        assert_eq!(heard, "");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn dropped_listen_releases_the_gate() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::Pending]));
        let (gate, listener) = listener_with(recognizer);
        let listener = Arc::new(listener);

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.listen(false).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(gate.state(), TurnState::Listening);

        // Dropping the in-flight listen (a cancelled caller) must tear the
        // session down, not strand the gate.
        pending.abort();
        let _ = pending.await;
        assert_eq!(gate.state(), TurnState::Idle);
        assert!(listener.lock_active().is_none());
    }

    #[tokio::test]
    async fn stop_after_a_dropped_listen_is_a_no_op() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([
            ScriptedListen::Pending,
            ScriptedListen::hear("still works"),
        ]));
        let (gate, listener) = listener_with(recognizer);
        let listener = Arc::new(listener);

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.listen(false).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        pending.abort();
        let _ = pending.await;

        // No stale control is left behind; a later stop touches nothing and
        // the listener still works.
        listener.stop();
        assert_eq!(gate.state(), TurnState::Idle);
        assert_eq!(listener.listen(false).await.unwrap(), "still works");
    }

    #[tokio::test]
    async fn force_interrupt_stops_speech_and_listens() {
        let gate = Arc::new(TurnGate::new());
        let synth =
            Arc::new(ScriptedSynthesizer::new().with_delay(Duration::from_secs(3600)));
        let speech = SpeechOutput::new(
            Arc::clone(&gate),
            Arc::clone(&synth) as Arc<dyn Synthesizer>,
            None,
        );
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::hear(
            "stop talking",
        )]));
        let listener = Listener::new(
            Arc::clone(&gate),
            recognizer as Arc<dyn Recognizer>,
            speech.clone(),
            ListenConfig::default(),
        );

        speech.enqueue("a very long monologue");
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(gate.state(), TurnState::Speaking);

        let heard = tokio::time::timeout(Duration::from_secs(1), listener.listen(true))
            .await
            .expect("forced listen must not wait for playback")
            .unwrap();
        assert_eq!(heard, "stop talking");
        assert_eq!(gate.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn explicit_timeout_resolves_empty() {
        let recognizer = Arc::new(ScriptedRecognizer::with_script([ScriptedListen::Pending]));
        let gate = Arc::new(TurnGate::new());
        let synth = Arc::new(ScriptedSynthesizer::new());
        let speech = SpeechOutput::new(Arc::clone(&gate), synth as Arc<dyn Synthesizer>, None);
        let config = ListenConfig {
            timeout_ms: Some(10),
            ..ListenConfig::default()
        };
        let listener = Listener::new(
            Arc::clone(&gate),
            recognizer as Arc<dyn Recognizer>,
            speech,
            config,
        );

        assert_eq!(listener.listen(false).await.unwrap(), "");
        assert_eq!(gate.state(), TurnState::Idle);
    }
}
