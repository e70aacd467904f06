//! Keystroke collection
//!
//! The collector pairs key-down and key-up events into enhanced keystroke records
//! carrying dwell and flight times, and folds them into per-session metrics.
//! One collector belongs to one sentence attempt; it is reset before the next begins.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;
use crate::stats::{mean, round1, round_whole, std_dev};
use crate::types::{EnhancedKeystroke, KeyEvent, SessionMetrics, BACKSPACE_KEY};

/// IME composition notifications
///
/// Both methods default to no-ops so that implementors only override what they track.
pub trait CompositionHooks {
    /// An IME composition has started
    fn begin_composition(&mut self) {}

    /// An IME composition has committed `composed`
    fn end_composition(&mut self, _composed: &str) {}
}

/// Lifecycle state of a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    #[default]
    Idle,
    Active,
}

/// A key that went down and has not come back up yet
#[derive(Debug, Clone)]
struct PendingKey {
    timestamp: i64,
    character_index: usize,
    target_char: String,
    flight_time: u64,
}

/// Per-sentence keystroke recorder
#[derive(Debug, Clone, Default)]
pub struct KeystrokeCollector {
    state: CollectorState,
    start_time: Option<i64>,
    last_key_up_time: Option<i64>,
    /// Keyed by key literal; a repeated key-down overwrites its entry
    pending: HashMap<String, PendingKey>,
    keystrokes: Vec<EnhancedKeystroke>,
    composing: bool,
}

impl KeystrokeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all buffers and begin recording at the current wall-clock time
    pub fn start(&mut self) {
        self.start_at(Utc::now().timestamp_millis());
    }

    /// Clear all buffers and begin recording at `timestamp` (ms)
    pub fn start_at(&mut self, timestamp: i64) {
        *self = Self {
            state: CollectorState::Active,
            start_time: Some(timestamp),
            ..Self::default()
        };
    }

    /// Clear all buffers and begin recording; the start time is taken from the first key-down
    pub fn arm(&mut self) {
        *self = Self {
            state: CollectorState::Active,
            ..Self::default()
        };
    }

    /// Stop recording; collected records stay readable until the next reset or start
    pub fn stop(&mut self) {
        self.state = CollectorState::Idle;
    }

    /// Return to a freshly constructed collector
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CollectorState::Active
    }

    /// Session start time in milliseconds, if started
    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    /// Whether an IME composition is currently in flight
    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Record a key-down
    ///
    /// `target_char` is the expected character at `character_index` (empty past the end
    /// of the sentence).
    pub fn on_key_down(
        &mut self,
        event: &KeyEvent,
        character_index: usize,
        target_char: &str,
        typed_so_far: &str,
    ) {
        if !self.is_active() {
            return;
        }
        if self.start_time.is_none() {
            self.start_time = Some(event.timestamp);
        }

        let flight_time = self
            .last_key_up_time
            .map(|last| elapsed_ms(last, event.timestamp))
            .unwrap_or(0);

        tracing::trace!(
            key = %event.key,
            character_index,
            typed_chars = typed_so_far.chars().count(),
            "key down"
        );

        self.pending.insert(
            event.key.clone(),
            PendingKey {
                timestamp: event.timestamp,
                character_index,
                target_char: target_char.to_string(),
                flight_time,
            },
        );
    }

    /// Record a key-up, completing the pending key-down for the same key
    ///
    /// A key-up without a pending key-down emits nothing.
    pub fn on_key_up(&mut self, event: &KeyEvent, typed_so_far: &str) {
        if !self.is_active() {
            return;
        }

        if let Some(pending) = self.pending.remove(&event.key) {
            let is_backspace = event.key == BACKSPACE_KEY;
            let is_error = !is_backspace
                && event.key.chars().count() == 1
                && !pending.target_char.is_empty()
                && event.key != pending.target_char;

            self.keystrokes.push(EnhancedKeystroke {
                timestamp: pending.timestamp,
                key: event.key.clone(),
                dwell_time: elapsed_ms(pending.timestamp, event.timestamp),
                flight_time: pending.flight_time,
                character_index: pending.character_index,
                is_backspace,
                is_error,
                target_char: pending.target_char,
            });
        } else {
            tracing::debug!(
                key = %event.key,
                typed_chars = typed_so_far.chars().count(),
                "dropping key-up without matching key-down"
            );
        }

        self.last_key_up_time = Some(event.timestamp);
    }

    pub fn on_composition_start(&mut self) {
        self.begin_composition();
    }

    pub fn on_composition_end(&mut self, composed: &str) {
        self.end_composition(composed);
    }

    /// Copy of every record collected so far
    pub fn get_keystrokes(&self) -> Vec<EnhancedKeystroke> {
        self.keystrokes.clone()
    }

    pub fn keystroke_count(&self) -> usize {
        self.keystrokes.len()
    }

    /// Session metrics with the default outlier ceilings
    pub fn session_metrics(&self) -> SessionMetrics {
        self.session_metrics_with(&AnalyzerConfig::default())
    }

    /// Session metrics; outliers are excluded from averages but never from counts
    pub fn session_metrics_with(&self, config: &AnalyzerConfig) -> SessionMetrics {
        fold_metrics(&self.keystrokes, config)
    }
}

/// Fold enhanced keystroke records into session metrics
///
/// Dwell and flight averages only use samples inside `(0, dwell_outlier_ms)` and
/// `(0, flight_outlier_ms)`; counts and the error rate use every record.
pub fn fold_metrics(keystrokes: &[EnhancedKeystroke], config: &AnalyzerConfig) -> SessionMetrics {
    if keystrokes.is_empty() {
        return SessionMetrics::default();
    }

    let dwell: Vec<f64> = keystrokes
        .iter()
        .map(|k| k.dwell_time)
        .filter(|&t| t > 0 && t < config.dwell_outlier_ms)
        .map(|t| t as f64)
        .collect();

    let flight: Vec<f64> = keystrokes
        .iter()
        .map(|k| k.flight_time)
        .filter(|&t| t > 0 && t < config.flight_outlier_ms)
        .map(|t| t as f64)
        .collect();

    let total = keystrokes.len();
    let error_count = keystrokes.iter().filter(|k| k.is_error).count();
    let backspace_count = keystrokes.iter().filter(|k| k.is_backspace).count();

    SessionMetrics {
        total_keystrokes: total as u32,
        avg_dwell_time: round_whole(mean(&dwell).unwrap_or(0.0)),
        avg_flight_time: round_whole(mean(&flight).unwrap_or(0.0)),
        dwell_time_std_dev: round_whole(sample_spread(&dwell)),
        flight_time_std_dev: round_whole(sample_spread(&flight)),
        error_count: error_count as u32,
        backspace_count: backspace_count as u32,
        error_rate: round1(error_count as f64 / total as f64 * 100.0),
    }
}

impl CompositionHooks for KeystrokeCollector {
    fn begin_composition(&mut self) {
        if self.is_active() {
            self.composing = true;
        }
    }

    fn end_composition(&mut self, composed: &str) {
        if self.composing {
            tracing::trace!(composed, "composition committed");
        }
        self.composing = false;
    }
}

/// Milliseconds from `from` to `to`, saturating at 0 when the clock went backwards
fn elapsed_ms(from: i64, to: i64) -> u64 {
    u64::try_from(to.saturating_sub(from)).unwrap_or(0)
}

/// Population standard deviation, 0 for fewer than two samples
fn sample_spread(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    std_dev(samples).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(collector: &mut KeystrokeCollector, key: &str, down: i64, up: i64, target: &str) {
        collector.on_key_down(&KeyEvent::new(key, down), 0, target, "");
        collector.on_key_up(&KeyEvent::new(key, up), "");
    }

    #[test]
    fn test_single_key_produces_one_record() {
        let mut collector = KeystrokeCollector::new();
        collector.start();
        press(&mut collector, "a", 1_000, 1_080, "a");

        let keystrokes = collector.get_keystrokes();
        assert_eq!(keystrokes.len(), 1);
        assert_eq!(keystrokes[0].dwell_time, 80);
        assert_eq!(keystrokes[0].flight_time, 0);
        assert!(!keystrokes[0].is_error);
    }

    #[test]
    fn test_key_up_without_key_down_is_dropped() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        collector.on_key_up(&KeyEvent::new("x", 100), "");
        assert!(collector.get_keystrokes().is_empty());

        // The orphan key-up still anchors the next flight time
        press(&mut collector, "a", 250, 300, "a");
        assert_eq!(collector.get_keystrokes()[0].flight_time, 150);
    }

    #[test]
    fn test_key_down_without_key_up_never_emits() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        collector.on_key_down(&KeyEvent::new("a", 10), 0, "a", "");
        collector.stop();
        assert!(collector.get_keystrokes().is_empty());
        assert_eq!(collector.session_metrics(), SessionMetrics::default());
    }

    #[test]
    fn test_inactive_collector_ignores_events() {
        let mut collector = KeystrokeCollector::new();
        press(&mut collector, "a", 0, 50, "a");
        assert_eq!(collector.keystroke_count(), 0);

        collector.start_at(0);
        collector.stop();
        press(&mut collector, "a", 100, 150, "a");
        assert_eq!(collector.keystroke_count(), 0);
    }

    #[test]
    fn test_key_repeat_overwrites_pending() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        collector.on_key_down(&KeyEvent::new("a", 100), 0, "a", "");
        collector.on_key_down(&KeyEvent::new("a", 160), 1, "b", "a");
        collector.on_key_up(&KeyEvent::new("a", 200), "aa");

        let keystrokes = collector.get_keystrokes();
        assert_eq!(keystrokes.len(), 1);
        assert_eq!(keystrokes[0].timestamp, 160);
        assert_eq!(keystrokes[0].dwell_time, 40);
        assert_eq!(keystrokes[0].character_index, 1);
        assert!(keystrokes[0].is_error);
    }

    #[test]
    fn test_flight_time_from_previous_key_up() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "a", 0, 100, "a");
        press(&mut collector, "b", 250, 320, "b");

        let keystrokes = collector.get_keystrokes();
        assert_eq!(keystrokes[1].flight_time, 150);
        assert_eq!(keystrokes[1].dwell_time, 70);
    }

    #[test]
    fn test_backwards_clock_saturates() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "a", 500, 400, "a");
        press(&mut collector, "b", 300, 350, "b");

        let keystrokes = collector.get_keystrokes();
        assert_eq!(keystrokes[0].dwell_time, 0);
        assert_eq!(keystrokes[1].flight_time, 0);
    }

    #[test]
    fn test_error_and_backspace_flags() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "x", 0, 50, "a");
        press(&mut collector, BACKSPACE_KEY, 100, 150, "a");
        press(&mut collector, "Shift", 200, 250, "b");
        press(&mut collector, "c", 300, 350, "");
        press(&mut collector, "d", 400, 450, "d");

        let flags: Vec<(bool, bool)> = collector
            .get_keystrokes()
            .iter()
            .map(|k| (k.is_backspace, k.is_error))
            .collect();
        assert_eq!(
            flags,
            vec![
                (false, true),
                (true, false),
                (false, false),
                (false, false),
                (false, false),
            ]
        );
    }

    #[test]
    fn test_metrics_exclude_outliers_from_averages_only() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "a", 0, 100, "a");
        press(&mut collector, "b", 300, 500, "b");
        // 3000 ms dwell is an outlier; 6000 ms flight is an outlier
        press(&mut collector, "x", 6_500, 9_500, "c");

        let metrics = collector.session_metrics();
        assert_eq!(metrics.total_keystrokes, 3);
        assert_eq!(metrics.avg_dwell_time, 150);
        assert_eq!(metrics.dwell_time_std_dev, 50);
        // Only the 200 ms flight is usable; the first key has no flight
        assert_eq!(metrics.avg_flight_time, 200);
        assert_eq!(metrics.flight_time_std_dev, 0);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.backspace_count, 0);
        assert_eq!(metrics.error_rate, 33.3);
    }

    #[test]
    fn test_metrics_with_custom_ceiling() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "a", 0, 100, "a");
        press(&mut collector, "b", 200, 500, "b");

        let config = AnalyzerConfig {
            dwell_outlier_ms: 250,
            ..AnalyzerConfig::default()
        };
        assert_eq!(collector.session_metrics_with(&config).avg_dwell_time, 100);
    }

    #[test]
    fn test_empty_metrics_are_zero() {
        let collector = KeystrokeCollector::new();
        assert_eq!(collector.session_metrics(), SessionMetrics::default());
    }

    #[test]
    fn test_stop_keeps_records_and_reset_clears() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(42);
        press(&mut collector, "a", 50, 90, "a");
        collector.stop();
        collector.stop();

        assert_eq!(collector.state(), CollectorState::Idle);
        assert_eq!(collector.keystroke_count(), 1);
        assert_eq!(collector.start_time(), Some(42));

        collector.reset();
        assert_eq!(collector.keystroke_count(), 0);
        assert_eq!(collector.start_time(), None);
    }

    #[test]
    fn test_start_clears_previous_sentence() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        press(&mut collector, "a", 0, 100, "a");
        collector.start_at(5_000);
        press(&mut collector, "b", 5_100, 5_150, "b");

        let keystrokes = collector.get_keystrokes();
        assert_eq!(keystrokes.len(), 1);
        assert_eq!(keystrokes[0].flight_time, 0);
    }

    #[test]
    fn test_armed_collector_starts_at_first_key_down() {
        let mut collector = KeystrokeCollector::new();
        collector.arm();
        assert!(collector.is_active());
        assert_eq!(collector.start_time(), None);

        press(&mut collector, "a", 4_000, 4_080, "a");
        press(&mut collector, "b", 4_300, 4_350, "b");
        assert_eq!(collector.start_time(), Some(4_000));
    }

    #[test]
    fn test_composition_tracking() {
        let mut collector = KeystrokeCollector::new();
        collector.start_at(0);
        assert!(!collector.is_composing());

        collector.on_composition_start();
        assert!(collector.is_composing());

        collector.on_composition_end("안");
        assert!(!collector.is_composing());
    }

    #[test]
    fn test_default_hooks_are_no_ops() {
        struct Silent;
        impl CompositionHooks for Silent {}

        let mut hooks = Silent;
        hooks.begin_composition();
        hooks.end_composition("녕");
    }
}
