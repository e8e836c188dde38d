mod config;
mod fixtures;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use discovery_core::StageStatus;
use orchestrator::{
    CheckpointStore, CheckpointToken, DiscoveryOrchestrator, FileCheckpointStore,
    PipelineResult, WorkflowSummary,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DiscoveryConfig, DEFAULT_CONFIG_FILE};
use crate::fixtures::FixtureFile;

#[derive(Parser)]
#[command(name = "discovery")]
#[command(about = "Run and inspect discovery pipeline sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path of the config file
    #[arg(long, global = true, env = "DISCOVERY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the configured retry budget
    #[arg(long, global = true, env = "DISCOVERY_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Override the configured checkpoint directory
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `orchestrator=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Run a new session against fixture collaborators
    Run {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        locale: String,

        #[arg(long)]
        detail: Option<String>,

        #[arg(long)]
        fixtures: PathBuf,

        /// Also write the result JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show a checkpointed session, or list checkpoints without a token
    Status {
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Continue a checkpointed session
    Resume {
        #[arg(long)]
        token: String,

        #[arg(long)]
        fixtures: PathBuf,

        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let loaded = DiscoveryConfig::load(&cli.config).await;
    let level = cli.log_level.clone().unwrap_or_else(|| match &loaded {
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    });
    init_tracing(&level);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!("{:#}, using defaults", e);
            DiscoveryConfig::default()
        }
    };
    if let Some(max_retries) = cli.max_retries {
        config.orchestrator.max_retries = max_retries;
    }
    if let Some(dir) = cli.checkpoint_dir {
        config.checkpoint.dir = dir;
    }

    match cli.command {
        Commands::Init { force } => init_config(&cli.config, force).await,
        Commands::Run {
            subject,
            locale,
            detail,
            fixtures,
            output,
        } => run(&config, &subject, &locale, detail, &fixtures, output.as_deref()).await,
        Commands::Status { token, json } => status(&config, token, json).await,
        Commands::Resume {
            token,
            fixtures,
            output,
        } => resume(&config, &token, &fixtures, output.as_deref()).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    DiscoveryConfig::default().write(path).await?;
    println!("Wrote default config to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

async fn build_orchestrator(
    config: &DiscoveryConfig,
    fixtures: &Path,
) -> Result<DiscoveryOrchestrator> {
    let collaborators = FixtureFile::load(fixtures).await?.into_collaborators();
    let store = FileCheckpointStore::new(&config.checkpoint.dir);
    Ok(
        DiscoveryOrchestrator::new(config.orchestrator.clone(), collaborators)
            .with_checkpoint_store(Arc::new(store)),
    )
}

async fn run(
    config: &DiscoveryConfig,
    subject: &str,
    locale: &str,
    detail: Option<String>,
    fixtures: &Path,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(config, fixtures).await?;
    let mut state = orchestrator.create_session(subject, locale, detail);
    let result = orchestrator.run_async(&mut state).await;
    report(&result, output).await
}

async fn resume(
    config: &DiscoveryConfig,
    token: &str,
    fixtures: &Path,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(config, fixtures).await?;
    let result = orchestrator
        .resume(&CheckpointToken::new(token))
        .await
        .with_context(|| format!("Failed to resume session {}", token))?;
    report(&result, output).await
}

async fn report(result: &PipelineResult, output: Option<&Path>) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{}", json);

    if let Some(path) = output {
        tokio::fs::write(path, &json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Result written to {}", path.display());
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn status(config: &DiscoveryConfig, token: Option<String>, json: bool) -> Result<ExitCode> {
    let store = FileCheckpointStore::new(&config.checkpoint.dir);

    let token = match token {
        Some(token) => CheckpointToken::new(token),
        None => {
            let tokens = store.list().await?;
            if tokens.is_empty() {
                println!("No checkpoints in {}", store.dir().display());
            }
            for token in tokens {
                println!("{}", token);
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    let state = store
        .load(&token)
        .await
        .with_context(|| format!("Failed to load checkpoint {}", token))?;
    let summary = WorkflowSummary::from_state(&state);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &WorkflowSummary) {
    println!();
    println!(
        "Session {}  {} / {}",
        summary.session_id.to_string().bold(),
        summary.subject,
        summary.locale
    );
    println!();
    for stage in &summary.stages {
        let status = match stage.status {
            StageStatus::Completed => stage.status.as_str().green(),
            StageStatus::Failed => stage.status.as_str().red(),
            StageStatus::InProgress => stage.status.as_str().yellow(),
            StageStatus::Pending => stage.status.as_str().dimmed(),
        };
        println!("  {:<14} {}", stage.stage.as_str(), status);
    }
    println!();
    println!(
        "Progress: {}/{} ({:.0}%)  retries {}/{}",
        summary.completed_stages,
        summary.total_stages,
        summary.progress_percentage,
        summary.retry_count,
        summary.max_retries
    );
    if let Some(next) = summary.next_stage {
        println!("Next stage: {}", next);
    }
    for error in &summary.errors {
        println!("  {} {}", "error".red(), error);
    }
    for warning in &summary.warnings {
        println!("  {} {}", "warning".yellow(), warning);
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();
}
