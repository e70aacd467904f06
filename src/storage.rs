//! Session storage
//!
//! The analyses hand finished summaries to a [`SessionStore`]. The in-memory store keeps
//! the most recent sessions in full, moves older ones to a compressed archive, and
//! maintains a running per-user aggregate. Its whole state serializes to JSON so a host
//! can persist it wherever it likes.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AnalyzerConfig, DEFAULT_MAX_RECENT_SESSIONS};
use crate::error::TypingError;
use crate::stats::round2;
use crate::types::{SessionContext, SessionMode, SessionSummary, StoredSession, UserAggregate};

/// Schema version stamped on stored sessions, aggregates and exports
pub const DATA_VERSION: &str = "2.0.0";

/// Persistence collaborator for finished sessions
pub trait SessionStore {
    /// Store a summary with its caller metadata, returning the stored record
    fn save(
        &mut self,
        summary: SessionSummary,
        context: SessionContext,
    ) -> Result<StoredSession, TypingError>;

    /// Stored sessions matching `filter`, newest first
    fn query(&self, filter: &SessionFilter) -> Vec<StoredSession>;

    /// Aggregate statistics over every stored session
    fn aggregate(&self) -> UserAggregate;
}

/// Selection criteria for [`SessionStore::query`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    pub include_archived: bool,
    pub mode: Option<SessionMode>,
    pub profile_key: Option<String>,
    /// Maximum number of results; 0 means unlimited
    pub limit: usize,
}

impl SessionFilter {
    /// Recent sessions of any mode
    pub fn recent() -> Self {
        Self::default()
    }

    /// Every stored session, archived ones included
    pub fn all() -> Self {
        Self::default().with_archived()
    }

    pub fn with_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_profile(mut self, profile_key: impl Into<String>) -> Self {
        self.profile_key = Some(profile_key.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, session: &StoredSession) -> bool {
        if let Some(mode) = self.mode {
            if session.context.mode != mode {
                return false;
            }
        }
        match &self.profile_key {
            Some(key) => session.context.profile_key.as_deref() == Some(key.as_str()),
            None => true,
        }
    }
}

/// Complete snapshot of a store, for handing to a backend or writing to a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreExport {
    pub user_id: String,
    pub recent_sessions: Vec<StoredSession>,
    pub archived_sessions: Vec<StoredSession>,
    pub aggregate: UserAggregate,
    pub exported_at: String,
    pub data_version: String,
}

impl UserAggregate {
    /// Aggregate of a user with no sessions
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_sessions: 0,
            insight_sessions: 0,
            therapy_sessions: 0,
            avg_typing_speed: 0.0,
            avg_accuracy: 0.0,
            avg_hesitation_count: 0.0,
            avg_rhythm: 0.0,
            avg_consistency: 0.0,
            avg_dwell_time: 0.0,
            avg_flight_time: 0.0,
            total_error_count: 0,
            total_backspace_count: 0,
            first_session_at: None,
            last_session_at: None,
            updated_at: None,
            data_version: DATA_VERSION.to_string(),
        }
    }

    /// Fold one more session into the running means
    fn record(&mut self, session: &StoredSession) {
        let n = self.total_sessions;
        let summary = &session.summary;

        self.total_sessions = n + 1;
        match session.context.mode {
            SessionMode::Insight => self.insight_sessions += 1,
            SessionMode::Therapy => self.therapy_sessions += 1,
        }

        // Sessions saved before jamo-based speed existed only carry wpm
        let speed = if summary.typing_speed > 0 {
            summary.typing_speed as f64
        } else {
            summary.wpm
        };

        self.avg_typing_speed = running_mean(self.avg_typing_speed, speed, n);
        self.avg_accuracy = running_mean(self.avg_accuracy, summary.accuracy, n);
        self.avg_hesitation_count = running_mean(
            self.avg_hesitation_count,
            f64::from(summary.hesitation.hesitation_count),
            n,
        );
        self.avg_rhythm = running_mean(self.avg_rhythm, summary.rhythm.rhythm as f64, n);
        self.avg_consistency = running_mean(self.avg_consistency, summary.rhythm.consistency, n);
        self.avg_dwell_time =
            running_mean(self.avg_dwell_time, summary.metrics.avg_dwell_time as f64, n);
        self.avg_flight_time =
            running_mean(self.avg_flight_time, summary.metrics.avg_flight_time as f64, n);
        self.total_error_count += u64::from(summary.metrics.error_count);
        self.total_backspace_count += u64::from(summary.metrics.backspace_count);

        let session_time = session_time(session);
        if self
            .first_session_at
            .as_deref()
            .map_or(true, |first| sort_key_of(&session_time) < sort_key_of(first))
        {
            self.first_session_at = Some(session_time.clone());
        }
        if self
            .last_session_at
            .as_deref()
            .map_or(true, |last| sort_key_of(&session_time) >= sort_key_of(last))
        {
            self.last_session_at = Some(session_time);
        }
        self.updated_at = Some(Utc::now().to_rfc3339());
    }
}

/// Incremental mean over `n` previous values, rounded to two decimals
fn running_mean(old_mean: f64, value: f64, n: u32) -> f64 {
    if !value.is_finite() {
        return old_mean;
    }
    if n == 0 {
        return value;
    }
    let n = f64::from(n);
    round2((old_mean * n + value) / (n + 1.0))
}

/// Completion time of a session, falling back to its save time
fn session_time(session: &StoredSession) -> String {
    if session.summary.completed_at.is_empty() {
        session.saved_at.clone()
    } else {
        session.summary.completed_at.clone()
    }
}

/// Milliseconds since the epoch of an RFC 3339 timestamp; unparseable values sort first
fn sort_key_of(timestamp: &str) -> i64 {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Strip keystroke detail from a session moving to the archive
fn compress(mut session: StoredSession) -> StoredSession {
    session.summary.keystroke_log = Vec::new();
    session.summary.keystrokes = Vec::new();
    session.is_archived = true;
    session
}

/// In-memory store with recent-session rotation and a running aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemorySessionStore {
    user_id: String,
    max_recent: usize,
    recent: VecDeque<StoredSession>,
    archived: Vec<StoredSession>,
    aggregate: UserAggregate,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECENT_SESSIONS)
    }
}

impl InMemorySessionStore {
    /// Create an empty store for a new anonymous user
    pub fn new(max_recent: usize) -> Self {
        let user_id = Uuid::new_v4().to_string();
        Self {
            aggregate: UserAggregate::empty(user_id.clone()),
            user_id,
            max_recent: max_recent.max(1),
            recent: VecDeque::with_capacity(max_recent),
            archived: Vec::new(),
        }
    }

    /// Create an empty store sized by `config.max_recent_sessions`
    pub fn with_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.max_recent_sessions)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn max_recent(&self) -> usize {
        self.max_recent
    }

    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }

    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    pub fn session_count(&self) -> usize {
        self.recent.len() + self.archived.len()
    }

    /// Rebuild the aggregate from every stored session, oldest first
    pub fn recalculate_aggregate(&mut self) -> UserAggregate {
        let mut sessions = self.query(&SessionFilter::all());
        sessions.reverse();

        let mut aggregate = UserAggregate::empty(self.user_id.clone());
        for session in &sessions {
            aggregate.record(session);
        }
        aggregate.updated_at = Some(Utc::now().to_rfc3339());

        tracing::debug!(sessions = sessions.len(), "recalculated aggregate");
        self.aggregate = aggregate.clone();
        aggregate
    }

    /// Snapshot of everything the store holds
    pub fn export(&self) -> StoreExport {
        StoreExport {
            user_id: self.user_id.clone(),
            recent_sessions: self.recent.iter().cloned().collect(),
            archived_sessions: self.archived.clone(),
            aggregate: self.aggregate.clone(),
            exported_at: Utc::now().to_rfc3339(),
            data_version: DATA_VERSION.to_string(),
        }
    }

    /// Load a store from JSON
    pub fn from_json(json: &str) -> Result<Self, TypingError> {
        let mut store: Self = serde_json::from_str(json)
            .map_err(|e| TypingError::StorageError(e.to_string()))?;
        if store.max_recent == 0 {
            return Err(TypingError::StorageError(
                "max_recent must be positive".to_string(),
            ));
        }
        store.rotate();
        Ok(store)
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, TypingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Delete every session and the aggregate; the user receives a new anonymous id
    pub fn clear(&mut self) {
        *self = Self::new(self.max_recent);
    }

    /// Delete the recent sessions, keeping the archive and aggregate
    pub fn clear_recent(&mut self) {
        self.recent.clear();
    }

    /// Move sessions beyond the recent window to the archive
    fn rotate(&mut self) {
        let mut moved = 0usize;
        while self.recent.len() > self.max_recent {
            if let Some(oldest) = self.recent.pop_front() {
                self.archived.push(compress(oldest));
                moved += 1;
            }
        }
        if moved > 0 {
            tracing::debug!(
                moved,
                archived = self.archived.len(),
                "archived sessions beyond recent window"
            );
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn save(
        &mut self,
        summary: SessionSummary,
        context: SessionContext,
    ) -> Result<StoredSession, TypingError> {
        let keystroke_count = if summary.keystrokes.is_empty() {
            summary.keystroke_log.len()
        } else {
            summary.keystrokes.len()
        };

        let session = StoredSession {
            session_id: Uuid::new_v4().to_string(),
            saved_at: Utc::now().to_rfc3339(),
            data_version: DATA_VERSION.to_string(),
            context,
            summary,
            is_archived: false,
            keystroke_count: keystroke_count as u32,
        };

        self.aggregate.record(&session);
        self.recent.push_back(session.clone());
        self.rotate();

        tracing::debug!(
            session_id = %session.session_id,
            recent = self.recent.len(),
            "saved session"
        );
        Ok(session)
    }

    fn query(&self, filter: &SessionFilter) -> Vec<StoredSession> {
        let archived = self
            .archived
            .iter()
            .filter(|_| filter.include_archived);

        let mut sessions: Vec<StoredSession> = archived
            .chain(self.recent.iter())
            .filter(|session| filter.matches(session))
            .cloned()
            .collect();

        sessions.sort_by_key(|session| std::cmp::Reverse(sort_key_of(&session_time(session))));

        if filter.limit > 0 {
            sessions.truncate(filter.limit);
        }
        sessions
    }

    fn aggregate(&self) -> UserAggregate {
        self.aggregate.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SessionSummaryBuilder;
    use crate::types::{EnhancedKeystroke, KeystrokeLogEntry, SessionInput, SessionMetrics};
    use pretty_assertions::assert_eq;

    /// 2024-01-15T14:00:00Z
    const BASE_MS: i64 = 1_705_327_200_000;

    fn summary(minute: i64, accuracy_typed: &str) -> SessionSummary {
        let start = BASE_MS + minute * 60_000;
        let mut summary = SessionSummaryBuilder::new().build(SessionInput {
            target: "안녕".to_string(),
            typed: accuracy_typed.to_string(),
            start_time: start,
            end_time: start + 30_000,
            keystroke_log: vec![
                KeystrokeLogEntry::new(start, "ㅇ"),
                KeystrokeLogEntry::new(start + 300, "ㅏ"),
            ],
            keystrokes: vec![EnhancedKeystroke {
                timestamp: start,
                key: "ㅇ".to_string(),
                dwell_time: 80,
                flight_time: 0,
                character_index: 0,
                is_backspace: false,
                is_error: false,
                target_char: "안".to_string(),
            }],
            metrics: Some(SessionMetrics {
                total_keystrokes: 1,
                avg_dwell_time: 80,
                error_count: 1,
                backspace_count: 2,
                ..SessionMetrics::default()
            }),
        });
        summary.typing_speed = 10 * (minute as u64 + 1);
        summary
    }

    fn therapy(profile: &str) -> SessionContext {
        SessionContext::therapy(format!("{profile}_01"), profile)
    }

    #[test]
    fn test_save_assigns_identity() {
        let mut store = InMemorySessionStore::default();
        let stored = store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();

        assert!(Uuid::parse_str(&stored.session_id).is_ok());
        assert_eq!(stored.data_version, DATA_VERSION);
        assert_eq!(stored.keystroke_count, 1);
        assert!(!stored.is_archived);
        assert_eq!(store.recent_count(), 1);
    }

    #[test]
    fn test_rotation_compresses_archive() {
        let mut store = InMemorySessionStore::new(3);
        for minute in 0..5 {
            store.save(summary(minute, "안녕"), SessionContext::insight()).unwrap();
        }

        assert_eq!(store.recent_count(), 3);
        assert_eq!(store.archived_count(), 2);

        let all = store.query(&SessionFilter::all());
        assert_eq!(all.len(), 5);

        let archived: Vec<&StoredSession> = all.iter().filter(|s| s.is_archived).collect();
        assert_eq!(archived.len(), 2);
        for session in archived {
            assert!(session.summary.keystrokes.is_empty());
            assert!(session.summary.keystroke_log.is_empty());
            assert_eq!(session.keystroke_count, 1);
        }
    }

    #[test]
    fn test_query_newest_first_with_limit() {
        let mut store = InMemorySessionStore::default();
        for minute in [2, 0, 1] {
            store.save(summary(minute, "안녕"), SessionContext::insight()).unwrap();
        }

        let speeds: Vec<u64> = store
            .query(&SessionFilter::recent().with_limit(2))
            .iter()
            .map(|s| s.summary.typing_speed)
            .collect();
        assert_eq!(speeds, vec![30, 20]);
    }

    #[test]
    fn test_query_filters() {
        let mut store = InMemorySessionStore::new(2);
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();
        store.save(summary(1, "안녕"), therapy("self_esteem")).unwrap();
        store.save(summary(2, "안녕"), therapy("motivation")).unwrap();
        store.save(summary(3, "안녕"), therapy("self_esteem")).unwrap();

        assert_eq!(store.query(&SessionFilter::recent()).len(), 2);
        assert_eq!(
            store
                .query(&SessionFilter::all().with_mode(SessionMode::Therapy))
                .len(),
            3
        );
        assert_eq!(
            store
                .query(&SessionFilter::all().with_profile("self_esteem"))
                .len(),
            2
        );
        assert_eq!(
            store
                .query(&SessionFilter::recent().with_mode(SessionMode::Insight))
                .len(),
            0
        );
    }

    #[test]
    fn test_running_aggregate() {
        let mut store = InMemorySessionStore::default();
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();
        store.save(summary(1, "안녕"), therapy("self_esteem")).unwrap();
        store.save(summary(2, "아녕"), therapy("self_esteem")).unwrap();

        let aggregate = store.aggregate();
        assert_eq!(aggregate.total_sessions, 3);
        assert_eq!(aggregate.insight_sessions, 1);
        assert_eq!(aggregate.therapy_sessions, 2);
        // 10, 20, 30
        assert_eq!(aggregate.avg_typing_speed, 20.0);
        // 100, 100, 83.3
        assert_eq!(aggregate.avg_accuracy, 94.43);
        assert_eq!(aggregate.avg_dwell_time, 80.0);
        assert_eq!(aggregate.total_error_count, 3);
        assert_eq!(aggregate.total_backspace_count, 6);
        assert_eq!(
            aggregate.first_session_at.as_deref(),
            Some("2024-01-15T14:00:30+00:00")
        );
        assert_eq!(
            aggregate.last_session_at.as_deref(),
            Some("2024-01-15T14:02:30+00:00")
        );
        assert!(aggregate.updated_at.is_some());
        assert_eq!(aggregate.user_id, store.user_id());
    }

    #[test]
    fn test_recalculate_matches_incremental() {
        let mut store = InMemorySessionStore::new(2);
        for minute in 0..4 {
            store.save(summary(minute, "안녕"), therapy("motivation")).unwrap();
        }
        let incremental = store.aggregate();
        let rebuilt = store.recalculate_aggregate();

        assert_eq!(rebuilt.total_sessions, incremental.total_sessions);
        assert_eq!(rebuilt.avg_typing_speed, incremental.avg_typing_speed);
        assert_eq!(rebuilt.avg_accuracy, incremental.avg_accuracy);
        assert_eq!(rebuilt.first_session_at, incremental.first_session_at);
        assert_eq!(rebuilt.last_session_at, incremental.last_session_at);
        assert_eq!(store.aggregate(), rebuilt);
    }

    #[test]
    fn test_running_mean() {
        assert_eq!(running_mean(0.0, 42.0, 0), 42.0);
        assert_eq!(running_mean(10.0, 20.0, 1), 15.0);
        assert_eq!(running_mean(10.0, 11.0, 2), 10.33);
        assert_eq!(running_mean(10.0, f64::NAN, 2), 10.0);
    }

    #[test]
    fn test_json_round_trip() {
        let mut store = InMemorySessionStore::new(1);
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();
        store.save(summary(1, "안녕"), therapy("emotion_control")).unwrap();

        let json = store.to_json().unwrap();
        let loaded = InMemorySessionStore::from_json(&json).unwrap();

        assert_eq!(loaded.user_id(), store.user_id());
        assert_eq!(loaded.recent_count(), 1);
        assert_eq!(loaded.archived_count(), 1);
        assert_eq!(loaded.aggregate(), store.aggregate());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = InMemorySessionStore::from_json("{ not json");
        assert!(matches!(result, Err(TypingError::StorageError(_))));
    }

    #[test]
    fn test_export() {
        let mut store = InMemorySessionStore::new(1);
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();
        store.save(summary(1, "안녕"), SessionContext::insight()).unwrap();

        let export = store.export();
        assert_eq!(export.user_id, store.user_id());
        assert_eq!(export.recent_sessions.len(), 1);
        assert_eq!(export.archived_sessions.len(), 1);
        assert_eq!(export.aggregate.total_sessions, 2);
        assert_eq!(export.data_version, "2.0.0");
    }

    #[test]
    fn test_clear_recent_keeps_archive_and_aggregate() {
        let mut store = InMemorySessionStore::new(1);
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();
        store.save(summary(1, "안녕"), SessionContext::insight()).unwrap();

        store.clear_recent();
        assert_eq!(store.recent_count(), 0);
        assert_eq!(store.archived_count(), 1);
        assert_eq!(store.aggregate().total_sessions, 2);
    }

    #[test]
    fn test_clear_forgets_user() {
        let mut store = InMemorySessionStore::new(5);
        let user_id = store.user_id().to_string();
        store.save(summary(0, "안녕"), SessionContext::insight()).unwrap();

        store.clear();
        assert_eq!(store.session_count(), 0);
        assert_eq!(store.aggregate().total_sessions, 0);
        assert_ne!(store.user_id(), user_id);
        assert_eq!(store.max_recent(), 5);
    }
}
