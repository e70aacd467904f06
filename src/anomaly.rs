//! Anomaly detection
//!
//! Flags sessions whose speed or cadence is implausible for human typing. The flag is
//! advisory metadata on the summary; flagged sessions are still recorded.

use crate::config::AnalyzerConfig;
use crate::types::KeystrokeLogEntry;

/// Whether a session looks pasted or otherwise non-human, with default thresholds
pub fn is_abnormal(typing_speed: u64, log: &[KeystrokeLogEntry]) -> bool {
    is_abnormal_with(typing_speed, log, &AnalyzerConfig::default())
}

/// True when `typing_speed` exceeds `max_plausible_speed`, or when a log of more than two
/// entries has every consecutive gap below `paste_gap_ms`
pub fn is_abnormal_with(
    typing_speed: u64,
    log: &[KeystrokeLogEntry],
    config: &AnalyzerConfig,
) -> bool {
    if typing_speed > config.max_plausible_speed {
        tracing::debug!(
            typing_speed,
            ceiling = config.max_plausible_speed,
            "flagging implausible typing speed"
        );
        return true;
    }

    if log.len() <= 2 {
        return false;
    }

    let paste_gap = i64::try_from(config.paste_gap_ms).unwrap_or(i64::MAX);
    let uniform_burst = log
        .windows(2)
        .all(|pair| pair[1].timestamp.saturating_sub(pair[0].timestamp) < paste_gap);

    if uniform_burst {
        tracing::debug!(entries = log.len(), "flagging paste-like cadence");
    }
    uniform_burst
}
