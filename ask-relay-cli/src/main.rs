//! CLI entry point for ask-relay

use anyhow::{Context, Result};
use ask_relay_core::config::{Config, ConfigLoader};
use ask_relay_core::logging::init_logging;
use ask_relay_tools::{AskUserQuestionTool, PendingQuestions, Tool};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

mod ask;
mod replay;

#[derive(Parser)]
#[command(name = "ask-relay")]
#[command(about = "Relay agent questions to a human and answers back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL file of upstream batches into a fresh session store
    Replay {
        /// File with one upstream batch per line
        file: PathBuf,
        /// Report how this session's view changes after every batch
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Answer an AskUserQuestion payload
    Ask {
        /// JSON file holding the tool input (`{"questions": [...]}`)
        file: PathBuf,
        /// Pick options non-interactively, e.g. `0=1` or `1=0,2`
        #[arg(short, long = "select")]
        select: Vec<String>,
        /// Free-text answer for a question, e.g. `1=Something else`
        #[arg(short, long = "other")]
        other: Vec<String>,
        /// Decline the question with this reason
        #[arg(long)]
        deny: Option<String>,
        /// Also print the permission response sent back to the agent
        #[arg(long)]
        json: bool,
    },
    /// Print the AskUserQuestion tool schema
    Schema,
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("failed to load configuration")?;
    config.logging.dir = loader
        .config_dir()
        .join(&config.logging.dir)
        .to_string_lossy()
        .into_owned();
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        Commands::Replay { file, session } => replay::run(&config, &file, session).await,
        Commands::Ask {
            file,
            select,
            other,
            deny,
            json,
        } => {
            let plan = ask::AnswerPlan::parse(&select, &other)?;
            ask::run(&config, &file, plan, deny, json).await
        }
        Commands::Schema => print_schema(&config),
        Commands::Status => print_status(&loader, &config),
    }
}

fn print_schema(config: &Config) -> Result<()> {
    let tool = AskUserQuestionTool::new(PendingQuestions::new(), config.questions.clone());
    println!("{}", serde_json::to_string_pretty(&tool.to_schema())?);
    Ok(())
}

fn print_status(loader: &ConfigLoader, config: &Config) -> Result<()> {
    let config_path = loader.config_path();
    println!("{}", style("ask-relay status").bold());
    println!(
        "  config:  {} ({})",
        config_path.display(),
        if config_path.exists() {
            style("found").green()
        } else {
            style("defaults").yellow()
        }
    );
    println!("  logs:    {}", config.logging.dir);
    println!("  store:   notify capacity {}", config.store.notify_capacity);
    println!(
        "  questions: up to {} per call, {} options each, free text as \"{}\"",
        config.questions.max_questions, config.questions.max_options, config.questions.other_label
    );
    Ok(())
}
