//! Rhythm and hesitation analysis
//!
//! Both analyses read the coarse key-down log, not the enhanced keystroke records.

use crate::config::AnalyzerConfig;
use crate::stats::{mean, round1, round_whole, std_dev};
use crate::types::{HesitationStats, KeystrokeLogEntry, RhythmStats};

/// Gaps between consecutive log entries in milliseconds
fn intervals(log: &[KeystrokeLogEntry]) -> impl Iterator<Item = i64> + '_ {
    log.windows(2)
        .map(|pair| pair[1].timestamp.saturating_sub(pair[0].timestamp))
}

/// Pause statistics with the default 2000 ms threshold
pub fn analyze_hesitation(log: &[KeystrokeLogEntry]) -> HesitationStats {
    analyze_hesitation_with(log, &AnalyzerConfig::default())
}

/// Count gaps at or above `hesitation_threshold_ms` and total their length
pub fn analyze_hesitation_with(
    log: &[KeystrokeLogEntry],
    config: &AnalyzerConfig,
) -> HesitationStats {
    if log.len() < 2 {
        return HesitationStats::default();
    }

    let threshold = i64::try_from(config.hesitation_threshold_ms).unwrap_or(i64::MAX);
    let pauses: Vec<u64> = intervals(log)
        .filter(|&gap| gap >= threshold)
        .map(|gap| gap as u64)
        .collect();

    let hesitation_count = pauses.len() as u32;
    let total_pause_time: u64 = pauses.iter().sum();
    let avg_hesitation_time = if pauses.is_empty() {
        0
    } else {
        round_whole(total_pause_time as f64 / pauses.len() as f64)
    };

    HesitationStats {
        hesitation_count,
        avg_hesitation_time,
        total_pause_time,
    }
}

/// Cadence statistics with the default outlier ceiling and interval minimum
pub fn analyze_rhythm(log: &[KeystrokeLogEntry]) -> RhythmStats {
    analyze_rhythm_with(log, &AnalyzerConfig::default())
}

/// Mean inter-key interval and cadence consistency
///
/// Formula: `consistency = clamp(100 - (σ / μ) × 100, 0, 100)`
/// Where σ is the population standard deviation and μ the mean of the intervals
/// below `rhythm_outlier_ms`.
///
/// Result: 100 = perfectly even cadence, approaching 0 as the cadence grows erratic
pub fn analyze_rhythm_with(log: &[KeystrokeLogEntry], config: &AnalyzerConfig) -> RhythmStats {
    let ceiling = i64::try_from(config.rhythm_outlier_ms).unwrap_or(i64::MAX);
    let usable: Vec<f64> = intervals(log)
        .filter(|&gap| gap < ceiling)
        .map(|gap| gap as f64)
        .collect();

    if usable.len() < config.min_rhythm_intervals {
        return RhythmStats::default();
    }

    let (Some(mean_interval), Some(spread)) = (mean(&usable), std_dev(&usable)) else {
        return RhythmStats::default();
    };

    if mean_interval <= 0.0 {
        return RhythmStats::default();
    }

    let consistency = (100.0 - spread / mean_interval * 100.0).clamp(0.0, 100.0);

    RhythmStats {
        rhythm: round_whole(mean_interval),
        consistency: round1(consistency),
    }
}
