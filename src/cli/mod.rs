//! Command-line interface for cineforge.
//!
//! Provides commands for running the pipeline over a story, checking run
//! status, listing and resuming runs, and exporting finished prompts.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config;
use crate::core::checkpoint::CheckpointStore;
use crate::core::orchestrator::{Orchestrator, RunControl};
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, Session, SessionState, Story};
use crate::facade::SessionHandle;
use crate::telemetry::Telemetry;

/// cineforge - Story-to-video prompt pipeline
#[derive(Parser, Debug)]
#[command(name = "cineforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline over a story
    Run {
        /// Story file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read the story from stdin
        #[arg(long)]
        stdin: bool,

        /// Settings file (YAML); defaults stop at prompt generation
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Story title
        #[arg(short, long)]
        title: Option<String>,

        /// Enable a stage on top of the settings file (repeatable)
        #[arg(long, value_enum)]
        enable: Vec<StageArg>,

        /// Disable a stage (repeatable)
        #[arg(long, value_enum)]
        disable: Vec<StageArg>,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Resume a failed or cancelled run from its latest checkpoint
    Resume {
        /// Run ID to resume
        run_id: String,
    },

    /// Export a finished run's prompts as JSON
    Export {
        /// Run ID to export
        run_id: String,

        /// Output file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Stage selector for CLI flags (maps to StageKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Segmentation,
    StoryAnalysis,
    Rewording,
    Taxonomy,
    Continuity,
    VideoGeneration,
    VideoAssembly,
    VideoEffects,
}

impl From<StageArg> for StageKind {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Segmentation => StageKind::Segmentation,
            StageArg::StoryAnalysis => StageKind::StoryAnalysis,
            StageArg::Rewording => StageKind::Rewording,
            StageArg::Taxonomy => StageKind::Taxonomy,
            StageArg::Continuity => StageKind::Continuity,
            StageArg::VideoGeneration => StageKind::VideoGeneration,
            StageArg::VideoAssembly => StageKind::VideoAssembly,
            StageArg::VideoEffects => StageKind::VideoEffects,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                input,
                stdin,
                settings,
                title,
                enable,
                disable,
            } => run_pipeline(input, stdin, settings, title, enable, disable).await,
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Resume { run_id } => resume_run(&run_id).await,
            Commands::Export { run_id, output } => export_run(&run_id, output).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build an orchestrator over the configured state directory
fn orchestrator() -> Result<Orchestrator> {
    Ok(Orchestrator::new(
        Arc::new(Telemetry::new()),
        CheckpointStore::open_default()?,
    ))
}

fn parse_run_id(run_id_str: &str) -> Result<Uuid> {
    Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {}", run_id_str))
}

/// Run the pipeline with the given story, printing stage results as they land
async fn run_pipeline(
    input_file: Option<PathBuf>,
    use_stdin: bool,
    settings_file: Option<PathBuf>,
    title: Option<String>,
    enable: Vec<StageArg>,
    disable: Vec<StageArg>,
) -> Result<()> {
    let text = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read story file: {}", path.display()))?
    } else if use_stdin {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No story provided. Use --input <file> or --stdin");
    };

    if text.trim().is_empty() {
        anyhow::bail!("Story is empty");
    }

    let mut settings = match settings_file {
        Some(path) => ModuleSettings::from_file(&path)?,
        None => ModuleSettings::default(),
    };
    for stage in enable {
        settings.set_enabled(stage.into(), true);
    }
    // Disables win over enables when both name a stage
    for stage in disable {
        settings.set_enabled(stage.into(), false);
    }

    let mut story = Story::new(text);
    if let Some(title) = title {
        story = story.with_title(title);
    }

    let handle = SessionHandle::start(Arc::new(orchestrator()?), story, settings);
    let mut rx = handle.watch();

    let progress = async {
        let mut printed = 0;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow().clone();
            for result in &snapshot.live_results[printed..] {
                eprintln!(
                    "  [{:>3.0}%] {}: {}",
                    snapshot.progress() * 100.0,
                    result.stage,
                    result.summary
                );
            }
            printed = snapshot.live_results.len();
        }
    };

    tokio::select! {
        _ = progress => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n[Cancelling at the next stage boundary...]");
            handle.cancel();
        }
    }

    let session = handle.wait().await;
    print_outcome(&session);

    match &session.state {
        SessionState::Completed => Ok(()),
        SessionState::Failed { .. } | SessionState::Cancelled => std::process::exit(1),
        _ => Ok(()),
    }
}

/// Print a finished session's results
fn print_outcome(session: &Session) {
    match &session.state {
        SessionState::Completed => {
            println!("{}", serde_json::to_string_pretty(&session.export_json()).unwrap_or_default());
            eprintln!(
                "\n[Run {} completed: {} prompts, {} continuity issues]",
                session.id,
                session.final_prompts.len(),
                session.continuity_issues.len()
            );
            if session.resume_disabled {
                eprintln!("[Warning: a checkpoint write failed during this run]");
            }
        }
        SessionState::Failed { error } => {
            eprintln!("\n[Run {} failed: {}]", session.id, error);
            if error.is_retryable() {
                eprintln!("[The error is retryable; try `cineforge resume {}`]", session.id);
            }
        }
        SessionState::Cancelled => {
            eprintln!("\n[Run {} cancelled]", session.id);
        }
        other => {
            eprintln!("\n[Run {} in state: {:?}]", session.id, other);
        }
    }
}

/// Show the status of a run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id = parse_run_id(run_id_str)?;
    let session = orchestrator()?.status(run_id).await?;

    println!("Run ID: {}", session.id);
    if let Some(title) = &session.story.title {
        println!("Title: {}", title);
    }
    println!("State: {:?}", session.state);
    println!("Progress: {:.0}%", session.progress() * 100.0);
    println!("Started: {}", session.started_at);
    if let Some(completed) = session.completed_at {
        println!("Finished: {}", completed);
    }
    println!("\nStage results:");
    for result in &session.live_results {
        println!("  {}: {}", result.stage, result.summary);
    }

    Ok(())
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let sessions = orchestrator()?.list_runs(limit).await?;

    if sessions.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:<12} {:>9}  {}", "RUN ID", "STATE", "PROGRESS", "STARTED");
    println!("{}", "-".repeat(90));

    for session in sessions {
        let state_str = match &session.state {
            SessionState::Idle => "idle".to_string(),
            SessionState::Configuring => "configuring".to_string(),
            SessionState::Running { .. } => "running".to_string(),
            SessionState::Completed => "completed".to_string(),
            SessionState::Failed { .. } => "failed".to_string(),
            SessionState::Cancelled => "cancelled".to_string(),
        };
        println!(
            "{:<38} {:<12} {:>8.0}%  {}",
            session.id,
            state_str,
            session.progress() * 100.0,
            session.started_at
        );
    }

    Ok(())
}

/// Resume a run from its latest checkpoint
async fn resume_run(run_id_str: &str) -> Result<()> {
    let run_id = parse_run_id(run_id_str)?;

    let orchestrator = orchestrator()?;
    let existing = orchestrator.status(run_id).await?;
    if existing.resume_disabled {
        anyhow::bail!(
            "Run {} cannot be resumed: a checkpoint write failed during the original run",
            run_id
        );
    }

    let session = orchestrator.resume(run_id, &RunControl::new()).await?;
    print_outcome(&session);

    match &session.state {
        SessionState::Completed => Ok(()),
        _ => std::process::exit(1),
    }
}

/// Export a finished run's prompts as JSON
async fn export_run(run_id_str: &str, output: Option<PathBuf>) -> Result<()> {
    let run_id = parse_run_id(run_id_str)?;
    let session = orchestrator()?.status(run_id).await?;

    if !matches!(session.state, SessionState::Completed) {
        anyhow::bail!("Run {} has not completed; nothing to export", run_id);
    }

    let json = serde_json::to_string_pretty(&session.export_json())
        .context("Failed to serialize export")?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("[Exported run {} to {}]", run_id, path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let home = config::home_dir()?;
    let runs = config::runs_dir()?;
    let defaults = ModuleSettings::default();

    println!("cineforge configuration");
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", home.display());
    println!("  Runs:                {}", runs.display());
    println!();
    println!("Default stages:");
    for kind in StageKind::ORDER {
        let flag = if defaults.enabled(kind) { "on" } else { "off" };
        println!("  {:<22} {}", kind.display_name(), flag);
    }
    println!();
    println!("Target duration: {}s", defaults.target_duration);
    println!(
        "Estimated cost per clip: ${:.2} ({} {}, {}s)",
        defaults.video.estimated_cost_per_clip(),
        defaults.video.resolution.display_name(),
        defaults.video.processing_mode.display_name(),
        defaults.video.duration_seconds
    );

    Ok(())
}
