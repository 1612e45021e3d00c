// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Command-line harness for the sync core: drives ingestion, status, and
//! chat against a running backend directly from a local folder, and
//! offers offline `tree`/`diff` utilities for inspecting the Merkle
//! representation without a network round-trip.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use merkle_sync_core::{ChatGateway, LocalFsFileService, LocalFsWorkspace, SyncOrchestrator};
use merkle_sync_core::diff;
use merkle_sync_core::models::StaticModelService;
use merkle_sync_core::tree::{build_tree, SystemClock};
use merkle_sync_core::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt;

#[derive(Parser)]
#[command(
    name = "merkle-sync",
    version = env!("CARGO_PKG_VERSION"),
    author = "Chetan Conikee <conikee@gmail.com>",
    about = "Client-side Merkle sync core for an AI-assisted code editor"
)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Backend base URL, e.g. https://api.example.com. Required for
    /// commands that talk to the network.
    #[arg(long, env = "MERKLE_SYNC_BACKEND_URL", global = true)]
    backend_url: Option<String>,

    /// Bearer token for the backend.
    #[arg(long, env = "MERKLE_SYNC_AUTH_TOKEN", global = true)]
    auth_token: Option<String>,

    /// The user id embedded in the project identity hash.
    #[arg(long, env = "MERKLE_SYNC_USER_ID", default_value = "local-user", global = true)]
    user_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check, create, or continue ingestion for a local folder.
    Ingest {
        /// The folder to ingest.
        path: PathBuf,
    },

    /// Fetch the server's current status for a project.
    Status {
        /// The server-assigned project id.
        project_id: String,
    },

    /// Ask the server to retry a failed ingestion, then re-check the folder.
    Retry {
        /// The server-assigned project id.
        project_id: String,
        /// The folder to re-check after retrying.
        path: PathBuf,
    },

    /// Build and print the Merkle tree for a local folder, without syncing.
    Tree {
        /// The folder to hash.
        path: PathBuf,
    },

    /// Diff two previously-saved tree JSON files and print the changes.
    Diff {
        /// Path to the old tree's JSON file, or "-" for no prior tree.
        old: String,
        /// Path to the new tree's JSON file.
        new: PathBuf,
    },

    /// Chat operations against an ingested project.
    Chat {
        #[command(subcommand)]
        action: ChatCommands,
    },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Ingest/sync `path`, then send `message` once chat becomes available.
    Send {
        /// The folder whose project should receive the message.
        path: PathBuf,
        /// The message text.
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    fmt().with_max_level(log_level).with_target(false).init();

    match &cli.command {
        Commands::Ingest { path } => run_ingest(&cli.user_id, backend(&cli)?, path.clone()).await,
        Commands::Status { project_id } => run_status(backend(&cli)?, project_id).await,
        Commands::Retry { project_id, path } => {
            run_retry(&cli.user_id, backend(&cli)?, project_id, path.clone()).await
        }
        Commands::Tree { path } => run_tree(path.clone()).await,
        Commands::Diff { old, new } => run_diff(old, new).await,
        Commands::Chat { action } => match action {
            ChatCommands::Send { path, message } => {
                run_chat_send(&cli.user_id, backend(&cli)?, path.clone(), message).await
            }
        },
    }
}

struct Backend {
    url: String,
    token: String,
}

fn backend(cli: &Cli) -> Result<Backend> {
    Ok(Backend {
        url: cli
            .backend_url
            .clone()
            .context("--backend-url (or MERKLE_SYNC_BACKEND_URL) is required for this command")?,
        token: cli
            .auth_token
            .clone()
            .context("--auth-token (or MERKLE_SYNC_AUTH_TOKEN) is required for this command")?,
    })
}

fn orchestrator_for_path(user_id: &str, path: PathBuf) -> Arc<SyncOrchestrator> {
    Arc::new(SyncOrchestrator::new(
        Arc::new(LocalFsWorkspace::new(path)),
        Arc::new(LocalFsFileService),
        user_id.to_string(),
        Arc::new(SystemClock),
    ))
}

fn orchestrator_standalone(user_id: &str) -> Arc<SyncOrchestrator> {
    struct NoRoots;
    impl Workspace for NoRoots {
        fn roots(&self) -> Vec<String> {
            vec![]
        }
        fn subscribe_changed(&self) -> tokio::sync::broadcast::Receiver<()> {
            let (tx, rx) = tokio::sync::broadcast::channel(1);
            std::mem::forget(tx);
            rx
        }
    }
    Arc::new(SyncOrchestrator::new(
        Arc::new(NoRoots),
        Arc::new(LocalFsFileService),
        user_id.to_string(),
        Arc::new(SystemClock),
    ))
}

async fn run_ingest(user_id: &str, backend: Backend, path: PathBuf) -> Result<()> {
    info!(path = %path.display(), "ingesting folder");
    let orchestrator = orchestrator_for_path(user_id, path);
    orchestrator.initialize(backend.url, backend.token).await?;

    match orchestrator.active_project().await {
        Some(project) => {
            println!("project:  {}", project.project_id);
            println!("status:   {}", project.ingestion_status);
            println!("files:    {}/{}", project.processed_files, project.total_files);
            println!("chunks:   {}", project.total_chunks);
        }
        None => println!("no project adopted (workspace has no roots)"),
    }
    Ok(())
}

async fn run_status(backend: Backend, project_id: &str) -> Result<()> {
    let orchestrator = orchestrator_standalone("status-cli");
    orchestrator.connect(backend.url, backend.token).await;
    let project = orchestrator.get_project_status(project_id).await?;
    println!("{}", serde_json::to_string_pretty(&project)?);
    Ok(())
}

async fn run_retry(user_id: &str, backend: Backend, project_id: &str, path: PathBuf) -> Result<()> {
    let orchestrator = orchestrator_for_path(user_id, path);
    orchestrator.connect(backend.url, backend.token).await;
    orchestrator.retry_ingestion(project_id).await?;
    match orchestrator.active_project().await {
        Some(project) => println!("status: {}", project.ingestion_status),
        None => println!("no project adopted"),
    }
    Ok(())
}

async fn run_tree(path: PathBuf) -> Result<()> {
    let workspace = LocalFsWorkspace::new(path);
    let root = workspace
        .roots()
        .into_iter()
        .next()
        .context("no workspace root")?;
    let files = merkle_sync_core::collector::collect_files(&LocalFsFileService, &root).await;
    let tree = build_tree(&files, &SystemClock)?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

async fn run_diff(old: &str, new: &PathBuf) -> Result<()> {
    let old_tree = if old == "-" {
        None
    } else {
        let raw = std::fs::read_to_string(old).with_context(|| format!("reading {old}"))?;
        Some(serde_json::from_str(&raw).with_context(|| format!("parsing {old}"))?)
    };
    let new_raw = std::fs::read_to_string(new).with_context(|| format!("reading {}", new.display()))?;
    let new_tree = serde_json::from_str(&new_raw).with_context(|| format!("parsing {}", new.display()))?;

    let result = diff::compare(old_tree.as_ref(), &new_tree);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_chat_send(user_id: &str, backend: Backend, path: PathBuf, message: &str) -> Result<()> {
    let orchestrator = orchestrator_for_path(user_id, path);
    let gateway = ChatGateway::new(orchestrator.clone(), Arc::new(StaticModelService));
    orchestrator.initialize(backend.url, backend.token).await?;

    let mut waited = 0;
    while !gateway.is_available().await {
        if waited > 200 {
            anyhow::bail!("chat never became available for this project");
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        waited += 1;
    }

    let (session_id, reply) = gateway.send_message(message, None, None).await?;
    println!("session: {session_id}");
    println!("{}", reply.content);
    Ok(())
}

