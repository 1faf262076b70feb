//! Serialized speech output.
//!
//! Speech requests can arrive faster than they can be spoken. [`SpeechOutput`]
//! queues them and drains the queue with at most one flush task per
//! instance, so utterances are never interleaved, dropped, or spoken twice.

use crate::capability::{Synthesizer, Utterance, Voice};
use crate::turn::{Turn, TurnGate};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Completion future for a flush of the utterance queue.
///
/// All callers that enqueue (or wait) while the same flush is in progress
/// observe the same logical completion point.
pub type Flush = Shared<BoxFuture<'static, ()>>;

fn resolved_flush() -> Flush {
    futures_util::future::ready(()).boxed().shared()
}

struct QueueState {
    /// Pending utterances, insertion order = speaking order.
    queue: VecDeque<String>,
    /// The in-flight flush, if any. Created on the empty→non-empty
    /// transition, cleared under the same lock as the final empty check.
    flush: Option<Flush>,
}

struct Inner {
    gate: Arc<TurnGate>,
    synth: Arc<dyn Synthesizer>,
    voice: Option<Voice>,
    state: Mutex<QueueState>,
}

/// FIFO speech output queue with a single shared flush per drain.
#[derive(Clone)]
pub struct SpeechOutput {
    inner: Arc<Inner>,
}

impl SpeechOutput {
    /// Create a queue speaking through `synth` with an optional fixed voice.
    pub fn new(gate: Arc<TurnGate>, synth: Arc<dyn Synthesizer>, voice: Option<Voice>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate,
                synth,
                voice,
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    flush: None,
                }),
            }),
        }
    }

    /// Queue `text` for synthesis and return the flush completion.
    ///
    /// The returned future resolves once everything queued so far,
    /// including this item, has been spoken. Empty or whitespace-only text
    /// queues nothing but still returns the current flush, so a caller can
    /// wait for "all speech so far finished".
    pub fn enqueue(&self, text: &str) -> Flush {
        let trimmed = text.trim();
        let mut state = self.inner.lock_state();
        if !trimmed.is_empty() {
            state.queue.push_back(trimmed.to_owned());
        }
        if let Some(flush) = &state.flush {
            return flush.clone();
        }
        if state.queue.is_empty() {
            return resolved_flush();
        }

        let (done_tx, done_rx) = oneshot::channel::<()>();
        // The drain task resolves the sender; a dropped sender (task
        // aborted at runtime shutdown) still resolves the waiters.
        let flush: Flush = done_rx.map(|_| ()).boxed().shared();
        state.flush = Some(flush.clone());
        drop(state);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drain().await;
            let _ = done_tx.send(());
        });
        flush
    }

    /// The current flush, or an already-resolved future when idle.
    pub fn drained(&self) -> Flush {
        match &self.inner.lock_state().flush {
            Some(flush) => flush.clone(),
            None => resolved_flush(),
        }
    }

    /// Cancel the active synthesis immediately.
    ///
    /// The synthesizer's cancel resolves the in-flight speak call, which
    /// unblocks the flush. Unspoken queue contents are retained: stop means
    /// "stop now", not "flush pending".
    pub fn stop(&self) {
        self.inner.synth.cancel();
    }

    /// Number of utterances still waiting to be spoken.
    pub fn pending(&self) -> usize {
        self.inner.lock_state().queue.len()
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn drain(self: Arc<Self>) {
        loop {
            // Pop and the final empty check share one lock acquisition:
            // an enqueue either lands before the pop (picked up by this
            // loop) or after the flush is cleared (starts a new one).
            let next = {
                let mut state = self.lock_state();
                match state.queue.pop_front() {
                    Some(text) => Some(text),
                    None => {
                        state.flush = None;
                        None
                    }
                }
            };
            let Some(text) = next else { return };
            self.speak_one(text).await;
        }
    }

    async fn speak_one(&self, text: String) {
        // Wait out a busy gate (e.g. an active listening session) rather
        // than dropping the utterance.
        self.gate.enter_when_idle(Turn::Speaking).await;
        debug!("speaking: {text:?}");
        let utterance = Utterance {
            text,
            voice: self.voice.clone(),
        };
        if let Err(e) = self.synth.speak(utterance).await {
            warn!("synthesis failed: {e}");
        }
        // Release only our own claim: a force-interrupted listen may have
        // already re-claimed the channel after cancelling this utterance.
        self.gate.release(Turn::Speaking);
    }
}
