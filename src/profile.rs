//! Insight profiles and therapy mastery
//!
//! Insight mode asks the user to choose between paired sentences; each choice scores
//! one category up or down. The weakest category decides which therapy profile the user
//! practices. Therapy progress is tracked per sentence from stored sessions.
//!
//! These are engagement heuristics with no clinical validity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::MasteryCriteria;
use crate::error::TypingError;
use crate::types::{SessionSummary, StoredSession};

/// Score a category starts from; only categories strictly below it can decide a profile
const NEUTRAL_CEILING: f64 = 100.0;

/// Self-perception dimension probed by an insight sentence pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    SelfPerception,
    SelfWorth,
    SelfCompassion,
    StressResponse,
    FutureOrientation,
    EmotionRegulation,
    Perfectionism,
    Autonomy,
    GrowthMindset,
}

impl InsightCategory {
    pub const ALL: [InsightCategory; 9] = [
        InsightCategory::SelfPerception,
        InsightCategory::SelfWorth,
        InsightCategory::SelfCompassion,
        InsightCategory::StressResponse,
        InsightCategory::FutureOrientation,
        InsightCategory::EmotionRegulation,
        InsightCategory::Perfectionism,
        InsightCategory::Autonomy,
        InsightCategory::GrowthMindset,
    ];

    /// Therapy profile that trains this category
    pub fn profile(self) -> TherapyProfile {
        match self {
            InsightCategory::SelfPerception
            | InsightCategory::SelfWorth
            | InsightCategory::SelfCompassion => TherapyProfile::SelfEsteem,
            InsightCategory::StressResponse | InsightCategory::FutureOrientation => {
                TherapyProfile::StressManagement
            }
            InsightCategory::EmotionRegulation | InsightCategory::Perfectionism => {
                TherapyProfile::EmotionControl
            }
            InsightCategory::Autonomy | InsightCategory::GrowthMindset => {
                TherapyProfile::Motivation
            }
        }
    }
}

/// Affirmation set a user practices in therapy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TherapyProfile {
    #[default]
    SelfEsteem,
    StressManagement,
    EmotionControl,
    Motivation,
}

impl TherapyProfile {
    /// Stable key used in stored session contexts
    pub fn key(self) -> &'static str {
        match self {
            TherapyProfile::SelfEsteem => "self_esteem",
            TherapyProfile::StressManagement => "stress_management",
            TherapyProfile::EmotionControl => "emotion_control",
            TherapyProfile::Motivation => "motivation",
        }
    }
}

impl fmt::Display for TherapyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TherapyProfile {
    type Err = TypingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self_esteem" => Ok(TherapyProfile::SelfEsteem),
            "stress_management" => Ok(TherapyProfile::StressManagement),
            "emotion_control" => Ok(TherapyProfile::EmotionControl),
            "motivation" => Ok(TherapyProfile::Motivation),
            other => Err(TypingError::ParseError(format!(
                "unknown therapy profile: {other}"
            ))),
        }
    }
}

/// One insight-mode choice together with how it was typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSelection {
    pub category: InsightCategory,
    /// +1 for the positive sentence of the pair, -1 for the negative one
    pub weight: f64,
    /// Jamo per minute
    pub typing_speed: u64,
    pub accuracy: f64,
}

/// Sum of choice weights per category, in first-seen order
pub fn category_scores(selections: &[InsightSelection]) -> Vec<(InsightCategory, f64)> {
    let mut scores: Vec<(InsightCategory, f64)> = Vec::new();
    for selection in selections {
        match scores.iter_mut().find(|(c, _)| *c == selection.category) {
            Some((_, score)) => *score += selection.weight,
            None => scores.push((selection.category, selection.weight)),
        }
    }
    scores
}

/// Profile for the lowest-scoring category
///
/// Only scores strictly below 100 count and the first of equal lowest scores wins.
/// Without any such score the user gets [`TherapyProfile::SelfEsteem`].
pub fn assign_profile(scores: &[(InsightCategory, f64)]) -> TherapyProfile {
    let mut lowest: Option<InsightCategory> = None;
    let mut lowest_score = NEUTRAL_CEILING;

    for &(category, score) in scores {
        if score < lowest_score {
            lowest_score = score;
            lowest = Some(category);
        }
    }

    let profile = lowest.map(InsightCategory::profile).unwrap_or_default();
    tracing::debug!(?lowest, lowest_score, %profile, "assigned therapy profile");
    profile
}

/// Outcome of a completed insight run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub category_scores: Vec<(InsightCategory, f64)>,
    /// Mean typing speed, rounded
    pub avg_typing_speed: u64,
    /// Mean accuracy, rounded
    pub avg_accuracy: u64,
    pub profile: TherapyProfile,
}

impl InsightReport {
    pub fn from_selections(selections: &[InsightSelection]) -> Self {
        let category_scores = category_scores(selections);
        let profile = assign_profile(&category_scores);

        let (avg_typing_speed, avg_accuracy) = if selections.is_empty() {
            (0, 0)
        } else {
            let count = selections.len() as f64;
            let speed: f64 = selections.iter().map(|s| s.typing_speed as f64).sum();
            let accuracy: f64 = selections.iter().map(|s| s.accuracy).sum();
            (
                (speed / count).round() as u64,
                (accuracy / count).round().max(0.0) as u64,
            )
        };

        Self {
            category_scores,
            avg_typing_speed,
            avg_accuracy,
            profile,
        }
    }
}

/// Therapy progress over one profile's sentences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryProgress {
    pub mastered_count: usize,
    pub total_count: usize,
    /// Mastered sentence ids in sentence-list order
    pub mastered_sentences: Vec<String>,
    /// Mastered share as a whole percentage
    pub progress: u32,
}

/// Whether one attempt counts towards mastering its sentence
pub fn is_mastered_attempt(summary: &SessionSummary, criteria: &MasteryCriteria) -> bool {
    summary.accuracy >= criteria.min_accuracy && summary.typing_speed >= criteria.min_speed
}

fn attempts<'a>(
    history: &'a [StoredSession],
    sentence_id: &'a str,
) -> impl Iterator<Item = &'a StoredSession> + 'a {
    history
        .iter()
        .filter(move |s| s.context.sentence_id.as_deref() == Some(sentence_id))
}

fn is_mastered(history: &[StoredSession], sentence_id: &str, criteria: &MasteryCriteria) -> bool {
    attempts(history, sentence_id)
        .filter(|s| is_mastered_attempt(&s.summary, criteria))
        .count()
        >= criteria.required_attempts
}

/// Mastery of `sentence_ids` according to `history`
pub fn mastery_progress<S: AsRef<str>>(
    history: &[StoredSession],
    sentence_ids: &[S],
    criteria: &MasteryCriteria,
) -> MasteryProgress {
    let mastered_sentences: Vec<String> = sentence_ids
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| is_mastered(history, id, criteria))
        .map(str::to_string)
        .collect();

    let total_count = sentence_ids.len();
    let progress = if total_count == 0 {
        0
    } else {
        (mastered_sentences.len() as f64 / total_count as f64 * 100.0).round() as u32
    };

    MasteryProgress {
        mastered_count: mastered_sentences.len(),
        total_count,
        mastered_sentences,
        progress,
    }
}

/// Sentence to practice next
///
/// The unmastered sentence with the fewest attempts, first in list order on ties. Once
/// everything is mastered the first sentence comes back for review.
pub fn recommend_next_sentence<S: AsRef<str>>(
    history: &[StoredSession],
    sentence_ids: &[S],
    criteria: &MasteryCriteria,
) -> Option<String> {
    let first = sentence_ids.first()?.as_ref();

    let next = sentence_ids
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| !is_mastered(history, id, criteria))
        .map(|id| (id, attempts(history, id).count()))
        // min_by_key keeps the first of equal minima
        .min_by_key(|&(_, count)| count)
        .map(|(id, _)| id)
        .unwrap_or(first);

    Some(next.to_string())
}
