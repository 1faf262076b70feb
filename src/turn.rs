//! Exclusive turn state for the shared acoustic channel.
//!
//! The microphone and the speaker share the acoustic channel: listening
//! while speaking risks the synthesized voice being captured as input. The
//! [`TurnGate`] is the single software proxy enforcing at-most-one
//! concurrent claim across both.

use tokio::sync::watch;

/// Who currently holds the acoustic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Nobody. Both listening and speaking may be entered.
    #[default]
    Idle,
    /// A recognition session is capturing.
    Listening,
    /// A synthesis utterance is playing.
    Speaking,
}

/// A turn that can be requested from the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Claim the channel for speech capture.
    Listening,
    /// Claim the channel for speech output.
    Speaking,
}

impl From<Turn> for TurnState {
    fn from(turn: Turn) -> Self {
        match turn {
            Turn::Listening => TurnState::Listening,
            Turn::Speaking => TurnState::Speaking,
        }
    }
}

/// Gate owning the exclusive turn state.
///
/// Transitions are only `Idle → {Listening, Speaking}` and back to `Idle`;
/// there is no direct `Listening ↔ Speaking` path. Every transition is
/// published on a watch channel; a lagging or dropped observer can never
/// affect the gate.
#[derive(Debug)]
pub struct TurnGate {
    state: watch::Sender<TurnState>,
}

impl TurnGate {
    /// Create a gate in the [`TurnState::Idle`] state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        Self { state }
    }

    /// Current state.
    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Try to claim the channel for `turn`.
    ///
    /// Succeeds only from [`TurnState::Idle`]; otherwise the state is left
    /// unchanged and `false` is returned, meaning "busy, do not proceed".
    pub fn try_enter(&self, turn: Turn) -> bool {
        self.state.send_if_modified(|state| {
            if *state == TurnState::Idle {
                *state = turn.into();
                true
            } else {
                false
            }
        })
    }

    /// Return to [`TurnState::Idle`] unconditionally. Idempotent; observers
    /// are only notified on an actual transition.
    pub fn exit(&self) {
        self.state.send_if_modified(|state| {
            if *state == TurnState::Idle {
                false
            } else {
                *state = TurnState::Idle;
                true
            }
        });
    }

    /// Return to [`TurnState::Idle`] only if `turn` currently holds the
    /// channel.
    ///
    /// Used by a claim holder to release its own turn without clobbering a
    /// claim someone else took after a forced [`TurnGate::exit`].
    pub fn release(&self, turn: Turn) {
        let held: TurnState = turn.into();
        self.state.send_if_modified(|state| {
            if *state == held {
                *state = TurnState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Wait until the channel is free, then claim it for `turn`.
    ///
    /// Used by the speech output queue so queued utterances wait out a
    /// busy gate instead of being dropped.
    pub async fn enter_when_idle(&self, turn: Turn) {
        let mut rx = self.state.subscribe();
        loop {
            if self.try_enter(turn) {
                return;
            }
            // The sender lives in self, so the channel cannot close here;
            // wait_for checks the current value before suspending.
            if rx.wait_for(|state| *state == TurnState::Idle).await.is_err() {
                return;
            }
        }
    }

    /// Subscribe to state transitions, e.g. for a UI state indicator.
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}
