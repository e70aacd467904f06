//! Typing session data types
//!
//! This module defines the records that flow through the typing-metrics pipeline:
//! raw key events, the enhanced keystroke records built from them, and the session
//! summary handed to the persistence collaborator.

use serde::{Deserialize, Serialize};

/// Key literal reported by the UI for the backspace key
pub const BACKSPACE_KEY: &str = "Backspace";

/// Key literal for Enter
pub const ENTER_KEY: &str = "Enter";

/// A raw key-down or key-up event as reported by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key literal (a single character or a key name such as `Backspace`)
    pub key: String,
    /// Event time in milliseconds
    pub timestamp: i64,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, timestamp: i64) -> Self {
        Self {
            key: key.into(),
            timestamp,
        }
    }
}

/// One entry of the coarse key-down log used for rhythm and hesitation analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeLogEntry {
    /// Key-down time in milliseconds
    pub timestamp: i64,
    /// Key literal
    #[serde(default)]
    pub key: String,
}

impl KeystrokeLogEntry {
    pub fn new(timestamp: i64, key: impl Into<String>) -> Self {
        Self {
            timestamp,
            key: key.into(),
        }
    }
}

/// A completed key-down/key-up pair with timing and correctness detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedKeystroke {
    /// Key-down time in milliseconds
    pub timestamp: i64,
    /// Key literal
    pub key: String,
    /// Key hold duration (key-down to key-up) in milliseconds
    pub dwell_time: u64,
    /// Gap from the previous key-up to this key-down in milliseconds
    pub flight_time: u64,
    /// Position in the target sentence when the key went down
    pub character_index: usize,
    /// Whether the key was the backspace key
    pub is_backspace: bool,
    /// Whether the key literal mismatched the expected target character
    pub is_error: bool,
    /// Expected target character (empty when past the end of the sentence)
    pub target_char: String,
}

/// Aggregate keystroke statistics for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Number of enhanced keystroke records
    pub total_keystrokes: u32,
    /// Mean dwell time in milliseconds (outliers excluded)
    pub avg_dwell_time: u64,
    /// Mean flight time in milliseconds (outliers excluded)
    pub avg_flight_time: u64,
    /// Dwell time standard deviation in milliseconds
    pub dwell_time_std_dev: u64,
    /// Flight time standard deviation in milliseconds
    pub flight_time_std_dev: u64,
    /// Keystrokes flagged as errors
    pub error_count: u32,
    /// Backspace keystrokes
    pub backspace_count: u32,
    /// Error percentage of all keystrokes (one decimal)
    pub error_rate: f64,
}

/// Pause statistics over a keystroke log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HesitationStats {
    /// Gaps at or above the hesitation threshold
    pub hesitation_count: u32,
    /// Mean hesitation gap in milliseconds
    pub avg_hesitation_time: u64,
    /// Sum of hesitation gaps in milliseconds
    pub total_pause_time: u64,
}

/// Cadence statistics over a keystroke log
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmStats {
    /// Mean inter-key interval in milliseconds
    pub rhythm: u64,
    /// Cadence evenness score (0-100, higher = more even)
    pub consistency: f64,
}

/// Display state of one target character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharFeedback {
    /// Not typed yet
    Pending,
    /// Typed exactly
    Correct,
    /// Last typed character, still a valid prefix of the target syllable
    Composing,
    /// Typed and wrong
    Incorrect,
}

/// Everything the summary builder needs once a sentence is finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    /// Sentence the user was asked to type
    pub target: String,
    /// Text the user actually typed
    pub typed: String,
    /// Session start time in milliseconds
    pub start_time: i64,
    /// Session end time in milliseconds
    pub end_time: i64,
    /// Coarse key-down log
    #[serde(default)]
    pub keystroke_log: Vec<KeystrokeLogEntry>,
    /// Enhanced records harvested from the keystroke collector
    #[serde(default)]
    pub keystrokes: Vec<EnhancedKeystroke>,
    /// Metrics harvested from the keystroke collector
    #[serde(default)]
    pub metrics: Option<SessionMetrics>,
}

/// The terminal record of one completed typing attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub target: String,
    pub typed: String,
    /// Session start time in milliseconds
    pub start_time: i64,
    /// Session end time in milliseconds
    pub end_time: i64,
    /// Elapsed time in milliseconds
    pub duration_ms: u64,
    /// Number of typed characters
    pub char_count: u32,
    /// Typing speed in jamo per minute
    pub typing_speed: u64,
    /// Legacy words-per-minute figure (five raw characters per word)
    pub wpm: f64,
    /// Accuracy percentage (one decimal)
    pub accuracy: f64,
    pub hesitation: HesitationStats,
    pub rhythm: RhythmStats,
    /// Advisory paste/implausible-speed flag
    pub is_abnormal: bool,
    pub metrics: SessionMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keystroke_log: Vec<KeystrokeLogEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keystrokes: Vec<EnhancedKeystroke>,
    /// Completion time (RFC 3339, UTC)
    pub completed_at: String,
}

/// Which part of the application produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Comparative sentence choice (profile discovery)
    Insight,
    /// Affirmation practice for an assigned profile
    Therapy,
}

/// Caller metadata attached to a session when it is saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub mode: SessionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_key: Option<String>,
}

impl SessionContext {
    pub fn insight() -> Self {
        Self {
            mode: SessionMode::Insight,
            sentence_id: None,
            profile_key: None,
        }
    }

    pub fn therapy(sentence_id: impl Into<String>, profile_key: impl Into<String>) -> Self {
        Self {
            mode: SessionMode::Therapy,
            sentence_id: Some(sentence_id.into()),
            profile_key: Some(profile_key.into()),
        }
    }
}

/// A session summary as owned by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    /// Save time (RFC 3339, UTC)
    pub saved_at: String,
    pub data_version: String,
    pub context: SessionContext,
    pub summary: SessionSummary,
    /// Whether the keystroke detail was stripped on archival
    #[serde(default)]
    pub is_archived: bool,
    /// Keystroke count, retained after archival strips the records
    #[serde(default)]
    pub keystroke_count: u32,
}

/// Running aggregate over all stored sessions of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAggregate {
    pub user_id: String,
    pub total_sessions: u32,
    pub insight_sessions: u32,
    pub therapy_sessions: u32,
    pub avg_typing_speed: f64,
    pub avg_accuracy: f64,
    pub avg_hesitation_count: f64,
    pub avg_rhythm: f64,
    pub avg_consistency: f64,
    pub avg_dwell_time: f64,
    pub avg_flight_time: f64,
    pub total_error_count: u64,
    pub total_backspace_count: u64,
    pub first_session_at: Option<String>,
    pub last_session_at: Option<String>,
    pub updated_at: Option<String>,
    pub data_version: String,
}
