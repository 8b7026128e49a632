use clap::{Parser, Subcommand};
use foreman::abstractions::{ClaudeAgent, RealFileSystem, RealGit};
use foreman::config::Settings;
use foreman::orchestrator::ExecutionOrchestrator;
use foreman::plan;
use foreman::storage::JsonStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

/// Drive an AI agent through a dependency-ordered task plan
#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Run a version's task plan with pause/resume/retry/skip control", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the settings file
    #[arg(short = 'c', long, default_value = "foreman.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an execution for a ready version
    Start {
        /// Version to execute
        version_id: String,
        /// Also run the task loop until it stops
        #[arg(long)]
        run: bool,
    },
    /// Run the task loop for an existing execution
    Run { execution_id: String },
    /// Request a cooperative pause (takes effect after the current task)
    Pause { execution_id: String },
    /// Clear the pause flag
    Resume { execution_id: String },
    /// Re-run the task that paused the execution
    Retry {
        execution_id: String,
        task_id: String,
    },
    /// Mark a task skipped and continue past it
    Skip {
        execution_id: String,
        task_id: String,
    },
    /// Roll back to the pre-execution snapshot and close the execution
    Abort { execution_id: String },
    /// Show the execution record
    Status { execution_id: String },
    /// Read-only queries over a plan document
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show the next runnable task
    Next {
        #[arg(long, default_value = "PLAN.md")]
        file: PathBuf,
    },
    /// Show overall progress
    Progress {
        #[arg(long, default_value = "PLAN.md")]
        file: PathBuf,
    },
    /// List blocked tasks with their unsatisfied dependencies
    Blocked {
        #[arg(long, default_value = "PLAN.md")]
        file: PathBuf,
    },
}

fn build_orchestrator(settings: Settings) -> anyhow::Result<ExecutionOrchestrator> {
    let store = Arc::new(JsonStore::open(settings.state_dir.clone())?);
    Ok(ExecutionOrchestrator::new(
        store.clone(),
        store,
        Arc::new(RealFileSystem),
        Arc::new(RealGit::new()),
        Arc::new(ClaudeAgent::new()),
        settings,
    )?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Plan { command } = &cli.command {
        let file = match command {
            PlanCommands::Next { file }
            | PlanCommands::Progress { file }
            | PlanCommands::Blocked { file } => file,
        };
        let content = std::fs::read_to_string(file)?;
        let parsed = plan::parse(&content);
        return match command {
            PlanCommands::Next { .. } => print_json(&plan::next_task(&parsed)),
            PlanCommands::Progress { .. } => print_json(&plan::progress(&parsed)),
            PlanCommands::Blocked { .. } => print_json(&plan::blocked_tasks(&parsed)),
        };
    }

    let settings = Settings::load(&cli.config)?;
    let orchestrator = build_orchestrator(settings)?;

    match cli.command {
        Commands::Start { version_id, run } => {
            let execution = orchestrator.start(&version_id).await?;
            print_json(&execution)?;
            if run {
                let outcome = orchestrator.run(&execution.id).await?;
                print_json(&outcome)?;
            }
        }
        Commands::Run { execution_id } => {
            let outcome = orchestrator.run(&execution_id).await?;
            print_json(&outcome)?;
        }
        Commands::Pause { execution_id } => {
            print_json(&orchestrator.pause(&execution_id).await?)?;
        }
        Commands::Resume { execution_id } => {
            print_json(&orchestrator.resume(&execution_id).await?)?;
        }
        Commands::Retry {
            execution_id,
            task_id,
        } => {
            print_json(&orchestrator.retry(&execution_id, &task_id).await?)?;
        }
        Commands::Skip {
            execution_id,
            task_id,
        } => {
            print_json(&orchestrator.skip(&execution_id, &task_id).await?)?;
        }
        Commands::Abort { execution_id } => {
            print_json(&orchestrator.abort(&execution_id).await?)?;
        }
        Commands::Status { execution_id } => {
            print_json(&orchestrator.get_status(&execution_id).await?)?;
        }
        Commands::Plan { .. } => unreachable!("handled above"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("Foreman started with verbosity level: {}", cli.verbose);

    if let Err(e) = run_command(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
