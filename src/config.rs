//! Analyzer configuration
//!
//! Every threshold used by the analyses lives here so that a host application can load
//! them from JSON. The defaults reproduce the reference behavior.

use serde::{Deserialize, Serialize};

use crate::error::TypingError;

/// Gap (ms) at or above which a pause counts as a hesitation
pub const DEFAULT_HESITATION_THRESHOLD_MS: u64 = 2_000;

/// Inter-key intervals (ms) at or above this are dropped from rhythm analysis
pub const DEFAULT_RHYTHM_OUTLIER_MS: u64 = 10_000;

/// Minimum usable intervals for a rhythm reading
pub const DEFAULT_MIN_RHYTHM_INTERVALS: usize = 3;

/// Dwell times (ms) at or above this are excluded from dwell statistics
pub const DEFAULT_DWELL_OUTLIER_MS: u64 = 2_000;

/// Flight times (ms) at or above this are excluded from flight statistics
pub const DEFAULT_FLIGHT_OUTLIER_MS: u64 = 5_000;

/// Speed (jamo/min) above which a session is flagged as implausible
pub const DEFAULT_MAX_PLAUSIBLE_SPEED: u64 = 150;

/// Gap (ms) below which every key of a session looks programmatic
pub const DEFAULT_PASTE_GAP_MS: u64 = 50;

/// Full-detail sessions kept before archival
pub const DEFAULT_MAX_RECENT_SESSIONS: usize = 50;

/// Thresholds for counting a therapy attempt towards mastery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryCriteria {
    /// Minimum accuracy percentage
    pub min_accuracy: f64,
    /// Minimum typing speed in jamo per minute
    pub min_speed: u64,
    /// Successful attempts needed to master a sentence
    pub required_attempts: usize,
}

impl Default for MasteryCriteria {
    fn default() -> Self {
        Self {
            min_accuracy: 90.0,
            min_speed: 100,
            required_attempts: 3,
        }
    }
}

/// Tunable thresholds for the typing analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub hesitation_threshold_ms: u64,
    pub rhythm_outlier_ms: u64,
    pub min_rhythm_intervals: usize,
    pub dwell_outlier_ms: u64,
    pub flight_outlier_ms: u64,
    pub max_plausible_speed: u64,
    pub paste_gap_ms: u64,
    pub max_recent_sessions: usize,
    pub mastery: MasteryCriteria,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            hesitation_threshold_ms: DEFAULT_HESITATION_THRESHOLD_MS,
            rhythm_outlier_ms: DEFAULT_RHYTHM_OUTLIER_MS,
            min_rhythm_intervals: DEFAULT_MIN_RHYTHM_INTERVALS,
            dwell_outlier_ms: DEFAULT_DWELL_OUTLIER_MS,
            flight_outlier_ms: DEFAULT_FLIGHT_OUTLIER_MS,
            max_plausible_speed: DEFAULT_MAX_PLAUSIBLE_SPEED,
            paste_gap_ms: DEFAULT_PASTE_GAP_MS,
            max_recent_sessions: DEFAULT_MAX_RECENT_SESSIONS,
            mastery: MasteryCriteria::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, TypingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, TypingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject thresholds that would make the analyses meaningless
    pub fn validate(&self) -> Result<(), TypingError> {
        let positive = [
            ("hesitation_threshold_ms", self.hesitation_threshold_ms),
            ("rhythm_outlier_ms", self.rhythm_outlier_ms),
            ("dwell_outlier_ms", self.dwell_outlier_ms),
            ("flight_outlier_ms", self.flight_outlier_ms),
            ("max_plausible_speed", self.max_plausible_speed),
            ("paste_gap_ms", self.paste_gap_ms),
        ];

        for (field, value) in positive {
            if value == 0 {
                return Err(TypingError::InvalidConfig(format!("{field} must be positive")));
            }
        }

        if self.max_recent_sessions == 0 {
            return Err(TypingError::InvalidConfig(
                "max_recent_sessions must be positive".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.mastery.min_accuracy) {
            return Err(TypingError::InvalidConfig(
                "mastery.min_accuracy must be within 0-100".to_string(),
            ));
        }

        if self.mastery.required_attempts == 0 {
            return Err(TypingError::InvalidConfig(
                "mastery.required_attempts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
