//! Typing speed
//!
//! Two distinct figures are produced and must not be conflated:
//! - `typing_speed`: jamo per minute (타/분), the figure mastery thresholds use;
//! - `legacy_wpm`: raw characters / 5 per minute, kept for backward-compatible display.

use crate::jamo::count_jamo;
use crate::stats::{round1, round_whole};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Raw characters counted as one legacy "word"
const CHARS_PER_WORD: f64 = 5.0;

/// Jamo typed per minute, rounded; 0 when no time has elapsed
pub fn typing_speed(typed: &str, elapsed_ms: u64) -> u64 {
    if elapsed_ms == 0 {
        return 0;
    }
    let minutes = elapsed_ms as f64 / MS_PER_MINUTE;
    round_whole(count_jamo(typed) as f64 / minutes)
}

/// Legacy words per minute (one decimal); 0 when no time has elapsed
pub fn legacy_wpm(char_count: usize, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    let minutes = elapsed_ms as f64 / MS_PER_MINUTE;
    let words = char_count as f64 / CHARS_PER_WORD;
    round1(words / minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_speed_counts_jamo() {
        assert_eq!(typing_speed("안녕", 60_000), count_jamo("안녕") as u64);
        assert_eq!(typing_speed("안녕", 60_000), 6);
    }

    #[test]
    fn test_typing_speed_scales_with_time() {
        // 12 jamo in 30 seconds
        assert_eq!(typing_speed("안녕하세요", 30_000), 24);
    }

    #[test]
    fn test_zero_elapsed_time() {
        assert_eq!(typing_speed("안녕", 0), 0);
        assert_eq!(legacy_wpm(10, 0), 0.0);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(typing_speed("", 5_000), 0);
    }

    #[test]
    fn test_legacy_wpm() {
        // 25 characters = 5 words in one minute
        assert_eq!(legacy_wpm(25, 60_000), 5.0);
        // 12 characters in 40 seconds = 2.4 words / 0.667 min
        assert_eq!(legacy_wpm(12, 40_000), 3.6);
    }

    #[test]
    fn test_units_differ() {
        let text = "나는 나만의 속도로";
        let elapsed = 60_000;
        let speed = typing_speed(text, elapsed) as f64;
        let wpm = legacy_wpm(text.chars().count(), elapsed);
        assert!(speed > wpm);
    }
}
