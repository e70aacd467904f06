//! Session summary building
//!
//! Composes the speed, accuracy, hesitation, rhythm and anomaly analyses into one
//! immutable [`SessionSummary`]. Building performs no I/O; persisting the result is the
//! caller's job.

use chrono::{DateTime, TimeZone, Utc};

use crate::accuracy;
use crate::anomaly::is_abnormal_with;
use crate::collector::fold_metrics;
use crate::config::AnalyzerConfig;
use crate::error::TypingError;
use crate::rhythm::{analyze_hesitation_with, analyze_rhythm_with};
use crate::speed::{legacy_wpm, typing_speed};
use crate::types::{SessionInput, SessionSummary};

/// Builds session summaries against one analyzer configuration
#[derive(Debug, Clone, Default)]
pub struct SessionSummaryBuilder {
    config: AnalyzerConfig,
}

impl SessionSummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Build the summary of a finished sentence
    pub fn build(&self, input: SessionInput) -> SessionSummary {
        let duration_ms = u64::try_from(input.end_time.saturating_sub(input.start_time))
            .unwrap_or(0);
        let char_count = input.typed.chars().count();

        let speed = typing_speed(&input.typed, duration_ms);
        let wpm = legacy_wpm(char_count, duration_ms);
        let accuracy = accuracy::score(&input.target, &input.typed, false);
        let hesitation = analyze_hesitation_with(&input.keystroke_log, &self.config);
        let rhythm = analyze_rhythm_with(&input.keystroke_log, &self.config);
        let is_abnormal = is_abnormal_with(speed, &input.keystroke_log, &self.config);
        let metrics = input
            .metrics
            .unwrap_or_else(|| fold_metrics(&input.keystrokes, &self.config));

        tracing::debug!(
            duration_ms,
            typing_speed = speed,
            accuracy,
            is_abnormal,
            "built session summary"
        );

        SessionSummary {
            target: input.target,
            typed: input.typed,
            start_time: input.start_time,
            end_time: input.end_time,
            duration_ms,
            char_count: char_count as u32,
            typing_speed: speed,
            wpm,
            accuracy,
            hesitation,
            rhythm,
            is_abnormal,
            metrics,
            keystroke_log: input.keystroke_log,
            keystrokes: input.keystrokes,
            completed_at: completion_time(input.end_time).to_rfc3339(),
        }
    }

    /// Build the summary and encode it as pretty JSON
    pub fn build_to_json(&self, input: SessionInput) -> Result<String, TypingError> {
        let summary = self.build(input);
        serde_json::to_string_pretty(&summary).map_err(TypingError::JsonError)
    }
}

/// Build a summary with an explicit configuration
pub fn build_summary(input: SessionInput, config: &AnalyzerConfig) -> SessionSummary {
    SessionSummaryBuilder::with_config(config.clone()).build(input)
}

/// End time as a UTC instant; falls back to now for out-of-range timestamps
fn completion_time(end_time: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(end_time)
        .single()
        .unwrap_or_else(Utc::now)
}
