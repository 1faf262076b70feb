//! Confab: turn-taking coordination for voice assistant frontends.
//!
//! A voice assistant client has two independent, callback-driven
//! capabilities (speech capture and speech synthesis) that share one
//! acoustic channel with no built-in coordination. This crate arbitrates
//! between "listening", "speaking", and "idle", serializes outgoing speech
//! so utterances are never interleaved or dropped, and drives the
//! conversational loop that alternates capturing user speech and speaking
//! generated replies.
//!
//! # Architecture
//!
//! Leaf to root:
//! - **Capability adapters** ([`capability`]): trait seams over the host's
//!   recognition, synthesis, microphone, and text-generation services
//! - **Turn gate** ([`turn`]): the exclusive idle/listening/speaking state
//! - **Speech output queue** ([`speech`]): FIFO utterance queue with one
//!   shared flush per drain
//! - **Listening session** ([`listen`]): one-shot recognition with
//!   confidence gating
//! - **Conversation loop** ([`conversation`]): alternates listening and
//!   sentence-streamed replies, with cancellation

pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod listen;
pub mod sentence;
pub mod speech;
pub mod testing;
pub mod turn;

pub use capability::{Microphone, Recognizer, Synthesizer, TextGenerator, Utterance, Voice};
pub use config::CoordinatorConfig;
pub use conversation::{Capabilities, Conversation};
pub use error::{Result, VoiceError};
pub use listen::Listener;
pub use sentence::SentenceScanner;
pub use speech::SpeechOutput;
pub use turn::{Turn, TurnGate, TurnState};
