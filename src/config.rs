//! Configuration types for the turn-taking coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for a voice coordinator session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Speech synthesis settings.
    pub synth: SynthConfig,
    /// Listening session settings.
    pub listen: ListenConfig,
    /// Conversation loop settings.
    pub conversation: ConversationConfig,
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Preferred synthesis voice, matched by name against the host's
    /// voice list. Falls back to the host default when absent.
    pub preferred_voice: String,
    /// BCP-47 language tag for synthesized speech.
    pub lang: String,
    /// Spoken once after initialization succeeds. Empty disables it.
    pub ready_announcement: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            preferred_voice: "Google US English".to_owned(),
            lang: "en-US".to_owned(),
            ready_announcement: "ready".to_owned(),
        }
    }
}

/// Listening session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Minimum confidence for accepting a final recognition result.
    pub final_confidence_floor: f32,
    /// Confidence an interim (not yet final) result must exceed to be
    /// accepted. Stricter than the final floor since interim results may
    /// still change.
    pub interim_confidence_floor: f32,
    /// Whether the recognizer should keep the session open across pauses.
    pub continuous: bool,
    /// Whether the recognizer should deliver interim results.
    pub interim_results: bool,
    /// Maximum alternatives requested per result.
    pub max_alternatives: u32,
    /// Optional hard bound on a listening session in milliseconds.
    ///
    /// `None` relies on the recognizer's own end-of-session behavior,
    /// which is the only timeout some hosts provide.
    pub timeout_ms: Option<u64>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            final_confidence_floor: 0.3,
            interim_confidence_floor: 0.6,
            continuous: true,
            interim_results: false,
            max_alternatives: 1,
            timeout_ms: None,
        }
    }
}

impl ListenConfig {
    /// Session timeout as a [`Duration`], if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Conversation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Spoken once when the loop starts.
    pub greeting: String,
    /// Spoken when a listening session yields no usable speech.
    pub reprompt: String,
    /// Delay between turns in milliseconds, so capture is not re-triggered
    /// on residual audio from the previous turn.
    pub inter_turn_delay_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: "hi".to_owned(),
            reprompt: "ask me another question".to_owned(),
            inter_turn_delay_ms: 1000,
        }
    }
}

impl ConversationConfig {
    /// Inter-turn delay as a [`Duration`].
    pub fn inter_turn_delay(&self) -> Duration {
        Duration::from_millis(self.inter_turn_delay_ms)
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::VoiceError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.listen.final_confidence_floor, 0.3);
        assert_eq!(config.listen.interim_confidence_floor, 0.6);
        assert_eq!(config.conversation.inter_turn_delay_ms, 1000);
        assert_eq!(config.conversation.reprompt, "ask me another question");
        assert!(config.listen.timeout().is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: CoordinatorConfig = toml::from_str(
            r#"
            [synth]
            preferred_voice = "Daniel"

            [listen]
            timeout_ms = 8000
            "#,
        )
        .unwrap();
        assert_eq!(config.synth.preferred_voice, "Daniel");
        assert_eq!(config.synth.lang, "en-US");
        assert_eq!(config.listen.timeout(), Some(Duration::from_secs(8)));
        assert_eq!(config.listen.final_confidence_floor, 0.3);
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = CoordinatorConfig::default();
        config.conversation.greeting = "hello there".to_owned();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = CoordinatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.conversation.greeting, "hello there");
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = CoordinatorConfig::from_file(std::path::Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(CoordinatorConfig::from_file(&path).is_err());
    }
}
