//! Hangul-aware accuracy scoring
//!
//! Accuracy is measured in jamo against an exact prefix of the target, not by edit
//! distance. The last typed character gets full credit while it is still a valid jamo
//! prefix of its target syllable, so a correct composition in flight scores 100%.
//! Earlier characters are compared as committed text: exact matches earn their full jamo
//! count, mismatches earn the leading run of matching jamo.
//!
//! Composition credit only ever applies to the single last typed character. A burst of
//! committed text that lands mid-sentence is scored by the exact/partial-run rules.

use crate::jamo::{decompose, expand_compound, is_jamo_prefix};
use crate::stats::round1;
use crate::types::CharFeedback;

/// Accuracy percentage (0-100, one decimal) of `typed` against `target`
///
/// An empty target or empty input scores 100. `is_composing` is the UI's IME state; the
/// last-character prefix rule already recognizes in-flight compositions structurally.
pub fn score(target: &str, typed: &str, is_composing: bool) -> f64 {
    let target: Vec<char> = target.chars().collect();
    let typed: Vec<char> = typed.chars().collect();

    if target.is_empty() || typed.is_empty() {
        return 100.0;
    }

    let last = typed.len() - 1;
    let mut correct = 0usize;
    let mut total = 0usize;

    for (i, &typed_char) in typed.iter().enumerate() {
        // Overflow past the end of the target
        let Some(&target_char) = target.get(i) else {
            total += 1;
            continue;
        };

        let typed_jamo = decompose(typed_char);
        let target_jamo = decompose(target_char);

        if i == last && is_jamo_prefix(&typed_jamo, &target_jamo) {
            correct += typed_jamo.len();
            total += typed_jamo.len();
        } else if typed_char == target_char {
            correct += typed_jamo.len();
            total += typed_jamo.len();
        } else {
            let typed_expanded = expand_compound(&typed_jamo);
            let target_expanded = expand_compound(&target_jamo);
            let run = typed_expanded
                .iter()
                .zip(&target_expanded)
                .take_while(|(a, b)| a == b)
                .count();
            correct += run;
            total += typed_expanded.len().max(target_expanded.len());
        }
    }

    if total == 0 {
        return 100.0;
    }

    let accuracy = round1(correct as f64 / total as f64 * 100.0);
    tracing::trace!(correct, total, is_composing, accuracy, "scored accuracy");
    accuracy
}

/// Per-character display state for every character of `target`
pub fn character_feedback(target: &str, typed: &str) -> Vec<CharFeedback> {
    let typed: Vec<char> = typed.chars().collect();
    let last = typed.len().checked_sub(1);

    target
        .chars()
        .enumerate()
        .map(|(i, target_char)| match typed.get(i) {
            None => CharFeedback::Pending,
            Some(&typed_char) if typed_char == target_char => CharFeedback::Correct,
            Some(&typed_char) => {
                if Some(i) == last
                    && is_jamo_prefix(&decompose(typed_char), &decompose(target_char))
                {
                    CharFeedback::Composing
                } else {
                    CharFeedback::Incorrect
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::types::CharFeedback::*;

    #[test]
    fn test_exact_target_is_perfect() {
        for target in ["안녕하세요", "나는 나만의 속도로 성장하고 있다", "abc", "뭐 삶"] {
            assert_eq!(score(target, target, false), 100.0);
        }
    }

    #[test]
    fn test_nothing_typed_is_not_penalized() {
        assert_eq!(score("안녕하세요", "", false), 100.0);
        assert_eq!(score("", "anything", false), 100.0);
    }

    #[test]
    fn test_composing_prefix_scores_full() {
        assert_eq!(score("안녕하세요", "ㅇ", true), 100.0);
        assert_eq!(score("안녕하세요", "아", true), 100.0);
        assert_eq!(score("안녕하세요", "안", false), 100.0);
        assert_eq!(score("안녕하세요", "안ㄴ", true), 100.0);
        assert_eq!(score("안녕하세요", "안녀", true), 100.0);
    }

    #[test]
    fn test_composing_through_compound_jamo() {
        assert_eq!(score("뭐해", "무", true), 100.0);
        assert_eq!(score("삶", "살", true), 100.0);
    }

    #[test]
    fn test_substituted_jamo_degrades_monotonically() {
        let wrong = score("안녕하세요", "안냥", false);
        assert!(wrong < 100.0);
        assert!(wrong > 0.0);
        // 안 (3 of 3) + 냥 vs 녕 (1 of 3)
        assert_eq!(wrong, 66.7);
    }

    #[test]
    fn test_incomplete_syllable_mid_sentence() {
        // 아 (2 of 3) then 녕 (3 of 3)
        assert_eq!(score("안녕", "아녕", false), 83.3);
    }

    #[test]
    fn test_overflow_counts_against_denominator() {
        // 12 correct jamo, one overflow character
        assert_eq!(score("안녕하세요", "안녕하세요!", false), 92.3);
    }

    #[test]
    fn test_latin_mismatch() {
        assert_eq!(score("abc", "abd", false), 66.7);
        assert_eq!(score("abc", "xyz", false), 0.0);
    }

    #[test]
    fn test_partial_run_counts_expanded_jamo() {
        // 와 = ㅇ ㅗ ㅏ and 워 = ㅇ ㅜ ㅓ share only the initial (1 of 3), then 요 (2 of 2)
        assert_eq!(score("워요", "와요", false), 60.0);
    }

    #[test]
    fn test_feedback_pending_tail() {
        assert_eq!(character_feedback("abc", "ab"), vec![Correct, Correct, Pending]);
    }

    #[test]
    fn test_feedback_composing_initial_consonant() {
        assert_eq!(character_feedback("안", "ㅇ"), vec![Composing]);
    }

    #[test]
    fn test_feedback_nothing_typed() {
        assert_eq!(character_feedback("안녕", ""), vec![Pending, Pending]);
    }

    #[test]
    fn test_feedback_only_last_character_composes() {
        assert_eq!(character_feedback("안녕", "아녕"), vec![Incorrect, Correct]);
        assert_eq!(character_feedback("안녕", "아ㄴ"), vec![Incorrect, Composing]);
    }

    #[test]
    fn test_feedback_longer_than_target_syllable() {
        // 안 has one more jamo than 아, so it cannot be a prefix of it
        assert_eq!(character_feedback("아니", "안"), vec![Incorrect, Pending]);
    }

    #[test]
    fn test_feedback_non_prefix_mismatch() {
        assert_eq!(character_feedback("안녕", "안냥"), vec![Correct, Incorrect]);
        assert_eq!(character_feedback("abc", "abx"), vec![Correct, Correct, Incorrect]);
    }

    #[test]
    fn test_feedback_ignores_overflow() {
        assert_eq!(character_feedback("ab", "abcd"), vec![Correct, Correct]);
    }
}
