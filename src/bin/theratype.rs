//! TheraType CLI - Command-line interface for the TheraType typing engine
//!
//! Commands:
//! - summarize: Build session summaries from finished-session input (batch mode)
//! - feedback: Score typed text against a target sentence
//! - decompose: Split text into jamo
//! - stats: Print the aggregate of a session store file
//! - mastery: Report therapy mastery and the next sentence to practice

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use theratype::config::AnalyzerConfig;
use theratype::jamo::{count_jamo, decompose};
use theratype::pipeline::{live_feedback, parse_session_input};
use theratype::profile::{mastery_progress, recommend_next_sentence, MasteryProgress};
use theratype::storage::{InMemorySessionStore, SessionFilter, SessionStore};
use theratype::summary::SessionSummaryBuilder;
use theratype::types::{SessionContext, SessionInput, SessionMode, SessionSummary};
use theratype::{TypingError, PRODUCER_NAME, VERSION};

/// TheraType - Hangul-aware keystroke analysis and typing metrics
#[derive(Parser)]
#[command(name = "theratype")]
#[command(version = VERSION)]
#[command(about = "Analyze Korean typing sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build session summaries from finished-session input (batch mode)
    Summarize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format (defaults to json-pretty on a terminal, ndjson otherwise)
        #[arg(long)]
        output_format: Option<OutputFormat>,

        /// Analyzer configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session store file to append the summaries to (created if missing)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Mode recorded with stored sessions
        #[arg(long, default_value = "insight")]
        mode: ModeArg,

        /// Sentence id recorded with stored sessions
        #[arg(long)]
        sentence_id: Option<String>,

        /// Therapy profile key recorded with stored sessions
        #[arg(long)]
        profile: Option<String>,
    },

    /// Score typed text against a target sentence
    Feedback {
        /// Target sentence
        target: String,

        /// Text typed so far
        typed: String,

        /// Elapsed typing time in milliseconds
        #[arg(long, default_value = "0")]
        elapsed_ms: u64,

        /// The last character is still being composed
        #[arg(long)]
        composing: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split text into jamo
    Decompose {
        /// Text to decompose
        text: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the aggregate of a session store file
    Stats {
        /// Session store file
        #[arg(long)]
        store: PathBuf,

        /// Rebuild the aggregate from every stored session
        #[arg(long)]
        recalculate: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report therapy mastery and the next sentence to practice
    Mastery {
        /// Session store file
        #[arg(long)]
        store: PathBuf,

        /// Sentence ids of the profile, in practice order
        #[arg(long, required = true, num_args = 1..)]
        sentences: Vec<String>,

        /// Analyzer configuration file (mastery criteria)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one session per line)
    Ndjson,
    /// A JSON session object or array of sessions
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one summary per line)
    Ndjson,
    /// JSON array of summaries
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Insight,
    Therapy,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Insight => SessionMode::Insight,
            ModeArg::Therapy => SessionMode::Therapy,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by RUST_LOG (default: warn)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), TheraTypeCliError> {
    match cli.command {
        Commands::Summarize {
            input,
            output,
            input_format,
            output_format,
            config,
            store,
            mode,
            sentence_id,
            profile,
        } => {
            let context = SessionContext {
                mode: mode.into(),
                sentence_id,
                profile_key: profile,
            };
            cmd_summarize(
                &input,
                &output,
                input_format,
                output_format,
                config.as_deref(),
                store.as_deref(),
                context,
            )
        }

        Commands::Feedback {
            target,
            typed,
            elapsed_ms,
            composing,
            json,
        } => cmd_feedback(&target, &typed, elapsed_ms, composing, json),

        Commands::Decompose { text, json } => cmd_decompose(&text, json),

        Commands::Stats {
            store,
            recalculate,
            json,
        } => cmd_stats(&store, recalculate, json),

        Commands::Mastery {
            store,
            sentences,
            config,
            json,
        } => cmd_mastery(&store, &sentences, config.as_deref(), json),
    }
}

fn cmd_summarize(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: Option<OutputFormat>,
    config: Option<&Path>,
    store_path: Option<&Path>,
    context: SessionContext,
) -> Result<(), TheraTypeCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let sessions = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_json(&input_data)?,
    };

    if sessions.is_empty() {
        return Err(TheraTypeCliError::NoSessions);
    }

    let builder = SessionSummaryBuilder::with_config(config.clone());
    let summaries: Vec<SessionSummary> = sessions
        .into_iter()
        .map(|session| builder.build(session))
        .collect();

    if let Some(store_path) = store_path {
        let mut store = load_store(store_path, &config)?;
        for summary in &summaries {
            store.save(summary.clone(), context.clone())?;
        }
        fs::write(store_path, store.to_json()?)?;
        tracing::info!(
            saved = summaries.len(),
            path = %store_path.display(),
            "appended sessions to store"
        );
    }

    let output_format = output_format.unwrap_or_else(|| {
        if atty::is(atty::Stream::Stdout) && output.to_string_lossy() == "-" {
            OutputFormat::JsonPretty
        } else {
            OutputFormat::Ndjson
        }
    });
    let output_data = format_output(&summaries, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_feedback(
    target: &str,
    typed: &str,
    elapsed_ms: u64,
    composing: bool,
    json: bool,
) -> Result<(), TheraTypeCliError> {
    let feedback = live_feedback(target, typed, elapsed_ms, composing);

    if json {
        println!("{}", serde_json::to_string_pretty(&feedback)?);
    } else {
        println!("Target:   {}", target);
        println!("Typed:    {}", typed);
        println!("Accuracy: {}%", feedback.accuracy);
        println!("Speed:    {} jamo/min", feedback.typing_speed);
        println!("\nCharacters:");
        for (c, state) in target.chars().zip(&feedback.feedback) {
            println!("  {} {:?}", c, state);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct DecomposeReport {
    text: String,
    jamo: Vec<String>,
    jamo_count: usize,
}

fn cmd_decompose(text: &str, json: bool) -> Result<(), TheraTypeCliError> {
    let report = DecomposeReport {
        text: text.to_string(),
        jamo: text
            .chars()
            .map(|c| decompose(c).into_iter().collect())
            .collect(),
        jamo_count: count_jamo(text),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (c, jamo) in text.chars().zip(&report.jamo) {
            println!("  {} -> {}", c, jamo);
        }
        println!("Jamo count: {}", report.jamo_count);
    }

    Ok(())
}

fn cmd_stats(store_path: &Path, recalculate: bool, json: bool) -> Result<(), TheraTypeCliError> {
    let mut store = InMemorySessionStore::from_json(&fs::read_to_string(store_path)?)?;
    let aggregate = if recalculate {
        let aggregate = store.recalculate_aggregate();
        fs::write(store_path, store.to_json()?)?;
        aggregate
    } else {
        store.aggregate()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregate)?);
    } else {
        println!("{} Session Statistics", PRODUCER_NAME);
        println!("===========================");
        println!("User:              {}", aggregate.user_id);
        println!(
            "Sessions:          {} ({} insight, {} therapy)",
            aggregate.total_sessions, aggregate.insight_sessions, aggregate.therapy_sessions
        );
        println!(
            "Stored:            {} recent, {} archived",
            store.recent_count(),
            store.archived_count()
        );
        println!("Avg speed:         {} jamo/min", aggregate.avg_typing_speed);
        println!("Avg accuracy:      {}%", aggregate.avg_accuracy);
        println!("Avg hesitations:   {}", aggregate.avg_hesitation_count);
        println!("Avg rhythm:        {} ms", aggregate.avg_rhythm);
        println!("Avg consistency:   {}", aggregate.avg_consistency);
        println!(
            "Avg dwell/flight:  {} / {} ms",
            aggregate.avg_dwell_time, aggregate.avg_flight_time
        );
        println!(
            "Errors/backspaces: {} / {}",
            aggregate.total_error_count, aggregate.total_backspace_count
        );
        if let (Some(first), Some(last)) = (&aggregate.first_session_at, &aggregate.last_session_at)
        {
            println!("Period:            {} .. {}", first, last);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct MasteryReport {
    #[serde(flatten)]
    progress: MasteryProgress,
    next_sentence: Option<String>,
}

fn cmd_mastery(
    store_path: &Path,
    sentences: &[String],
    config: Option<&Path>,
    json: bool,
) -> Result<(), TheraTypeCliError> {
    let config = load_config(config)?;
    let store = InMemorySessionStore::from_json(&fs::read_to_string(store_path)?)?;
    let history = store.query(&SessionFilter::all().with_mode(SessionMode::Therapy));

    let report = MasteryReport {
        progress: mastery_progress(&history, sentences, &config.mastery),
        next_sentence: recommend_next_sentence(&history, sentences, &config.mastery),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Mastered: {} / {} ({}%)",
            report.progress.mastered_count, report.progress.total_count, report.progress.progress
        );
        for id in sentences {
            let marker = if report.progress.mastered_sentences.contains(id) {
                "[x]"
            } else {
                "[ ]"
            };
            println!("  {} {}", marker, id);
        }
        if let Some(next) = &report.next_sentence {
            println!("Next:     {}", next);
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, TheraTypeCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, TheraTypeCliError> {
    match path {
        Some(path) => Ok(AnalyzerConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(AnalyzerConfig::default()),
    }
}

fn load_store(
    path: &Path,
    config: &AnalyzerConfig,
) -> Result<InMemorySessionStore, TheraTypeCliError> {
    if path.exists() {
        Ok(InMemorySessionStore::from_json(&fs::read_to_string(path)?)?)
    } else {
        tracing::info!(path = %path.display(), "creating new session store");
        Ok(InMemorySessionStore::with_config(config))
    }
}

fn parse_ndjson(data: &str) -> Result<Vec<SessionInput>, TheraTypeCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_session_input(line.trim()).map_err(|e| TheraTypeCliError::Line(index + 1, e))
        })
        .collect()
}

fn parse_json(data: &str) -> Result<Vec<SessionInput>, TheraTypeCliError> {
    if data.trim_start().starts_with('[') {
        Ok(serde_json::from_str(data)?)
    } else {
        Ok(vec![parse_session_input(data)?])
    }
}

fn format_output(
    summaries: &[SessionSummary],
    format: &OutputFormat,
) -> Result<String, TheraTypeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for summary in summaries {
                lines.push(serde_json::to_string(summary)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(summaries)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(summaries)?),
    }
}

// Error handling

#[derive(Debug)]
enum TheraTypeCliError {
    Io(io::Error),
    Typing(TypingError),
    Json(serde_json::Error),
    Line(usize, TypingError),
    NoSessions,
}

impl From<io::Error> for TheraTypeCliError {
    fn from(e: io::Error) -> Self {
        TheraTypeCliError::Io(e)
    }
}

impl From<TypingError> for TheraTypeCliError {
    fn from(e: TypingError) -> Self {
        TheraTypeCliError::Typing(e)
    }
}

impl From<serde_json::Error> for TheraTypeCliError {
    fn from(e: serde_json::Error) -> Self {
        TheraTypeCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TheraTypeCliError> for CliError {
    fn from(e: TheraTypeCliError) -> Self {
        match e {
            TheraTypeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TheraTypeCliError::Typing(e @ TypingError::StorageError(_)) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that the store file was written by theratype".to_string()),
            },
            TheraTypeCliError::Typing(e @ TypingError::InvalidConfig(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Thresholds must be positive".to_string()),
            },
            TheraTypeCliError::Typing(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Ensure input has target, typed, start_time and end_time".to_string(),
                ),
            },
            TheraTypeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TheraTypeCliError::Line(line, e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: format!("line {}: {}", line, e),
                hint: Some("Each line must hold one session object".to_string()),
            },
            TheraTypeCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No sessions found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}
