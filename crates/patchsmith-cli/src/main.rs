use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use patchsmith_core::services::anthropic::AnthropicClient;
use patchsmith_core::services::apply::ApplyReport;
use patchsmith_core::services::git::GitService;
use patchsmith_core::{ParsedResponse, Session, Settings, TaskState};

#[derive(Parser)]
#[command(
    name = "patchsmith",
    version,
    about = "Turn a codebase into an AI prompt and apply the returned changes"
)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the AI-ready markdown prompt for a task
    Prompt {
        #[arg(short, long)]
        task: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Scan the workspace, ask the model, apply the changes, commit on a branch
    Run {
        #[arg(short, long)]
        task: String,
        /// Preview the changes without touching the file tree
        #[arg(long)]
        dry_run: bool,
        /// Apply the changes but skip the branch/commit step
        #[arg(long)]
        no_commit: bool,
    },
    /// Re-apply a previously saved task state without contacting the model
    Apply {
        /// Path to a saved task.json
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let settings = Settings::load(&workspace)?;
    let session = Session::new(workspace.clone(), settings.clone());

    match cli.command {
        Commands::Prompt { task, out } => {
            let prompt = session.build_prompt(&task)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, prompt)?;
                    tracing::info!("prompt written to {}", path.display());
                }
                None => println!("{}", prompt),
            }
        }
        Commands::Run {
            task,
            dry_run,
            no_commit,
        } => {
            let client = AnthropicClient::new(&settings)?;
            let on_chunk = Box::new(|chunk: String| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            });

            let (parsed, report) = session.run_task(&client, &task, dry_run, on_chunk).await?;
            println!();
            print_outcome(&parsed, &report);

            if dry_run {
                tracing::info!("dry run finished; nothing was written");
            } else {
                let git = GitService::new();
                if git.is_repository(&workspace).await {
                    println!("{}", git.get_working_state(&workspace).await?);
                    if no_commit {
                        tracing::info!("--no-commit: leaving the working tree as is");
                    } else {
                        let branch = session.branch_name(&parsed);
                        git.create_branch(&branch, &workspace).await?;
                        git.commit_all(&parsed.git_commit_message, &workspace).await?;
                        tracing::info!("committed on branch {}", branch);
                    }
                } else {
                    tracing::warn!("{} is not a git repository; skipping commit", workspace.display());
                }
            }
        }
        Commands::Apply { state, dry_run } => {
            let state = TaskState::load(&state).await?;
            tracing::info!("replaying task: {}", state.task_description);
            let report = session.apply(&state.parsed_response, dry_run).await?;
            print_outcome(&state.parsed_response, &report);
        }
    }

    Ok(())
}

fn print_outcome(parsed: &ParsedResponse, report: &ApplyReport) {
    if !parsed.summary.is_empty() {
        println!("\n{}\n", parsed.summary);
    }
    for entry in &report.entries {
        let action = format!("{:?}", entry.action).to_lowercase();
        println!("  {:<9} {}", action, entry.path);
        for note in &entry.notes {
            println!("            - {}", note);
        }
    }
    let (created, modified, deleted, skipped) = report.counts();
    println!(
        "\n{} created, {} modified, {} deleted, {} skipped",
        created, modified, deleted, skipped
    );
    if !parsed.potential_issues.is_empty() && parsed.potential_issues != "None." {
        println!("\npotential issues: {}", parsed.potential_issues);
    }
}
