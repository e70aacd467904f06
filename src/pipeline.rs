//! Pipeline orchestration
//!
//! This module provides the public API for TheraType.
//! It wires the keystroke collector, the analyses and the session store together, either
//! as a stateless one-shot over a finished session or as a stateful processor fed with
//! live key events.

use serde::{Deserialize, Serialize};

use crate::accuracy;
use crate::collector::KeystrokeCollector;
use crate::config::AnalyzerConfig;
use crate::error::TypingError;
use crate::speed::typing_speed;
use crate::storage::{InMemorySessionStore, SessionStore};
use crate::summary::SessionSummaryBuilder;
use crate::types::{
    CharFeedback, KeyEvent, KeystrokeLogEntry, SessionContext, SessionInput, StoredSession,
    ENTER_KEY,
};

/// Convert a finished session JSON document to summary JSON (stateless, one-shot).
///
/// # Arguments
/// * `input_json` - A serialized [`SessionInput`]
///
/// # Returns
/// Pretty-printed [`crate::types::SessionSummary`] JSON
///
/// # Example
/// ```ignore
/// let summary_json = session_to_summary_json(r#"{
///     "target": "안녕", "typed": "안녕", "start_time": 0, "end_time": 60000
/// }"#)?;
/// ```
pub fn session_to_summary_json(input_json: &str) -> Result<String, TypingError> {
    session_to_summary_json_with(input_json, &AnalyzerConfig::default())
}

/// [`session_to_summary_json`] with explicit thresholds
pub fn session_to_summary_json_with(
    input_json: &str,
    config: &AnalyzerConfig,
) -> Result<String, TypingError> {
    let input = parse_session_input(input_json)?;
    SessionSummaryBuilder::with_config(config.clone()).build_to_json(input)
}

/// Parse a [`SessionInput`] document
pub fn parse_session_input(input_json: &str) -> Result<SessionInput, TypingError> {
    serde_json::from_str(input_json).map_err(|e| TypingError::ParseError(e.to_string()))
}

/// Values the UI redraws on every keystroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFeedback {
    /// Display state of every target character
    pub feedback: Vec<CharFeedback>,
    /// Accuracy so far (one decimal)
    pub accuracy: f64,
    /// Jamo per minute so far
    pub typing_speed: u64,
}

/// Feedback for `typed` against `target` after `elapsed_ms` of typing
pub fn live_feedback(
    target: &str,
    typed: &str,
    elapsed_ms: u64,
    is_composing: bool,
) -> LiveFeedback {
    LiveFeedback {
        feedback: accuracy::character_feedback(target, typed),
        accuracy: accuracy::score(target, typed, is_composing),
        typing_speed: typing_speed(typed, elapsed_ms),
    }
}

/// Sentence currently being typed
#[derive(Debug, Clone)]
struct ActiveSentence {
    target: String,
    target_chars: Vec<char>,
    keystroke_log: Vec<KeystrokeLogEntry>,
    /// When the sentence was shown; the start time if no key is ever pressed
    shown_at: i64,
}

/// Stateful processor for live typing sessions with a persistent store.
///
/// Use this when key events arrive one by one from a UI: the processor records them,
/// answers live-feedback queries and saves each completed sentence to its store.
pub struct TypingProcessor<S: SessionStore = InMemorySessionStore> {
    config: AnalyzerConfig,
    builder: SessionSummaryBuilder,
    collector: KeystrokeCollector,
    active: Option<ActiveSentence>,
    store: S,
}

impl Default for TypingProcessor<InMemorySessionStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingProcessor<InMemorySessionStore> {
    /// Create a processor with default settings and an in-memory store
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    /// Create a processor with specific thresholds and an in-memory store
    pub fn with_config(config: AnalyzerConfig) -> Self {
        let store = InMemorySessionStore::with_config(&config);
        Self::with_store(store, config)
    }
}

impl<S: SessionStore> TypingProcessor<S> {
    /// Create a processor that saves completed sentences to `store`
    pub fn with_store(store: S, config: AnalyzerConfig) -> Self {
        Self {
            builder: SessionSummaryBuilder::with_config(config.clone()),
            config,
            collector: KeystrokeCollector::new(),
            active: None,
            store,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Target of the sentence in progress
    pub fn target(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.target.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn collector(&self) -> &KeystrokeCollector {
        &self.collector
    }

    /// Show a new sentence at `now` (ms), discarding any unfinished one
    ///
    /// The session clock starts at the first key-down, so reading time before typing
    /// does not count against speed.
    pub fn begin_sentence(&mut self, target: &str, now: i64) -> Result<(), TypingError> {
        if target.is_empty() {
            return Err(TypingError::InvalidSession(
                "target sentence is empty".to_string(),
            ));
        }

        if self.active.is_some() {
            tracing::debug!("discarding unfinished sentence");
        }

        self.collector.arm();
        self.active = Some(ActiveSentence {
            target: target.to_string(),
            target_chars: target.chars().collect(),
            keystroke_log: Vec::new(),
            shown_at: now,
        });
        Ok(())
    }

    /// Record a key-down; the cursor position is the length of `typed_so_far`
    ///
    /// Enter submits rather than types and is not recorded.
    pub fn key_down(&mut self, event: &KeyEvent, typed_so_far: &str) {
        let Some(active) = self.active.as_mut() else {
            tracing::trace!(key = %event.key, "key-down outside a sentence");
            return;
        };
        if event.key == ENTER_KEY {
            return;
        }

        let character_index = typed_so_far.chars().count();
        let target_char = active
            .target_chars
            .get(character_index)
            .map(char::to_string)
            .unwrap_or_default();

        active
            .keystroke_log
            .push(KeystrokeLogEntry::new(event.timestamp, event.key.clone()));
        self.collector
            .on_key_down(event, character_index, &target_char, typed_so_far);
    }

    pub fn key_up(&mut self, event: &KeyEvent, typed_so_far: &str) {
        if event.key == ENTER_KEY {
            return;
        }
        self.collector.on_key_up(event, typed_so_far);
    }

    pub fn composition_start(&mut self) {
        self.collector.on_composition_start();
    }

    pub fn composition_end(&mut self, composed: &str) {
        self.collector.on_composition_end(composed);
    }

    /// Feedback, accuracy and speed for `typed` at `now` (ms)
    pub fn live_feedback(&self, typed: &str, now: i64) -> Result<LiveFeedback, TypingError> {
        let active = self.active.as_ref().ok_or(TypingError::NoActiveSentence)?;
        let elapsed_ms = self
            .collector
            .start_time()
            .and_then(|start| u64::try_from(now.saturating_sub(start)).ok())
            .unwrap_or(0);

        Ok(live_feedback(
            &active.target,
            typed,
            elapsed_ms,
            self.collector.is_composing(),
        ))
    }

    /// Finish the sentence, build its summary and save it to the store
    pub fn complete(
        &mut self,
        typed: &str,
        end_time: i64,
        context: SessionContext,
    ) -> Result<StoredSession, TypingError> {
        let active = self.active.take().ok_or(TypingError::NoActiveSentence)?;

        self.collector.stop();
        let input = SessionInput {
            target: active.target,
            typed: typed.to_string(),
            start_time: self.collector.start_time().unwrap_or(active.shown_at),
            end_time,
            keystroke_log: active.keystroke_log,
            keystrokes: self.collector.get_keystrokes(),
            metrics: Some(self.collector.session_metrics_with(&self.config)),
        };
        self.collector.reset();

        let summary = self.builder.build(input);
        self.store.save(summary, context)
    }

    /// Drop the sentence in progress without saving anything
    pub fn abandon(&mut self) {
        self.active = None;
        self.collector.reset();
    }
}
