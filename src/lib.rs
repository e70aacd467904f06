//! TheraType - Hangul-aware keystroke analysis and typing metrics
//!
//! TheraType turns the keystrokes of a therapeutic typing exercise into session metrics
//! through a deterministic pipeline: keystroke collection → accuracy and speed scoring
//! → rhythm, hesitation and anomaly analysis → session summary → session store.
//!
//! ## Modules
//!
//! - **Text**: jamo decomposition, Hangul-aware accuracy and jamo-based speed
//! - **Keystrokes**: dwell/flight collection and cadence analysis
//! - **Sessions**: summary building, storage rotation and aggregation
//! - **Profiles**: insight profile assignment and therapy mastery

pub mod accuracy;
pub mod anomaly;
pub mod collector;
pub mod config;
pub mod error;
pub mod jamo;
pub mod pipeline;
pub mod profile;
pub mod rhythm;
pub mod speed;
pub mod storage;
pub mod summary;
pub mod types;

mod stats;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use collector::{CompositionHooks, KeystrokeCollector};
pub use config::{AnalyzerConfig, MasteryCriteria};
pub use error::TypingError;
pub use pipeline::{live_feedback, session_to_summary_json, LiveFeedback, TypingProcessor};
pub use storage::{InMemorySessionStore, SessionFilter, SessionStore};
pub use summary::SessionSummaryBuilder;

/// TheraType version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name
pub const PRODUCER_NAME: &str = "TheraType";
