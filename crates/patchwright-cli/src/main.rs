//! # Patchwright CLI
//!
//! Thin driver over the Patchwright tools for a checked-out project.
//!
//! ```bash
//! patchwright --project ./repo view src/app.py --range 10 -1
//! patchwright --project ./repo tree --depth 1
//! patchwright --project ./repo index
//! patchwright --project ./repo search "timeout when uploading" -k 5
//! echo '{"tool": "view_directory", "params": {}}' | patchwright --project ./repo session
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use patchwright_core::ai::{create_client, LazyGenerationClient};
use patchwright_core::index::{create_provider, HashedEmbedder, RelevanceExplainer};
use patchwright_core::tools::ToolDefinition;
use patchwright_core::{CodebaseIndex, Config, FileEditor, ToolResult, ToolSession, WorkspaceContext};

#[derive(Parser)]
#[command(
    name = "patchwright",
    version,
    about = "Structural file editing and semantic code search for issue-resolving agents"
)]
struct Cli {
    /// Config file (default: <config dir>/patchwright/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project directory the tools operate on
    #[arg(long, short = 'p', global = true, default_value = ".")]
    project: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a file with line numbers, or a directory two levels deep
    View {
        path: String,

        /// First and last line (1-based, -1 for the end of the file)
        #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
        range: Option<Vec<i64>>,
    },

    /// List the project structure, reducing depth for large trees
    Tree {
        dir: Option<String>,

        #[arg(long)]
        depth: Option<usize>,
    },

    /// Build (or reuse) the project's collection
    Index {
        #[arg(long)]
        collection: Option<String>,

        /// Remove the persisted collection instead of building it
        #[arg(long)]
        clear: bool,
    },

    /// Search the project's collection and explain each hit
    Search {
        query: String,

        #[arg(short, default_value_t = 10)]
        k: usize,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Unified diff of the working tree against HEAD
    Diff {
        /// Also write it to `<patch dir>/<project>@<timestamp>.patch`
        #[arg(long)]
        save: bool,
    },

    /// Print the tool definitions as JSON
    Tools,

    /// Run tool calls read as JSON lines from stdin, one envelope per line
    Session,
}

#[derive(Deserialize)]
struct SessionCall {
    tool: String,
    #[serde(default = "empty_params")]
    params: Value,
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let workspace = WorkspaceContext::open(&cli.project)?;
    debug!(
        "Project {} at commit {}",
        workspace.project_name(),
        workspace.current_commit().unwrap_or("<none>")
    );

    match cli.command {
        Commands::View { path, range } => {
            let editor = FileEditor::new(workspace, config.editor.clone());
            let range = range.map(|r| [r[0], r[1]]);
            Ok(emit(editor.view(&path, range).into_envelope()))
        }
        Commands::Tree { dir, depth } => {
            let editor = FileEditor::new(workspace, config.editor.clone());
            let dir = dir.unwrap_or_else(|| "./".to_string());
            Ok(emit(editor.view_directory(&dir, depth).into_envelope()))
        }
        Commands::Index { collection, clear } => {
            let embedder = create_provider(&config.embedding, &config.runtime_dir)?;
            let index = CodebaseIndex::new(&config.runtime_dir, config.index.clone(), embedder);
            let collection = collection.unwrap_or_else(|| index.default_collection().to_string());
            let root = workspace.current_project_root();

            if clear {
                let removed = index.clear(root, &collection)?;
                println!(
                    "{}",
                    if removed {
                        format!("Cleared collection {}", collection)
                    } else {
                        format!("No collection {} to clear", collection)
                    }
                );
                return Ok(ExitCode::SUCCESS);
            }

            let retriever = index.build(root, &collection).await?;
            println!(
                "Collection {} ready at {}",
                retriever.collection(),
                retriever.location().display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search {
            query,
            k,
            collection,
        } => {
            let embedder = create_provider(&config.embedding, &config.runtime_dir)?;
            let generator = create_client(&config.generation)?;
            let index = CodebaseIndex::new(&config.runtime_dir, config.index.clone(), embedder);
            let collection = collection.unwrap_or_else(|| index.default_collection().to_string());

            let retriever = index
                .build(workspace.current_project_root(), &collection)
                .await?;
            let explanations = retriever
                .search_explained(&query, k, &RelevanceExplainer::new(generator))
                .await?;
            println!("{}", serde_json::to_string_pretty(&explanations)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Diff { save } => {
            if save {
                let (path, patch) = workspace.save_working_tree_diff(&config.patch_dir())?;
                print!("{}", patch);
                eprintln!("Saved patch to {}", path.display());
            } else {
                print!("{}", workspace.working_tree_diff()?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => {
            let definitions = tool_definitions(workspace, &config).await;
            println!("{}", serde_json::to_string_pretty(&definitions)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Session => {
            let session = open_session(workspace, &config).await?;
            run_session(&session).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// The generation client is only built once a search needs it, so editing
/// sessions run without generation credentials
async fn open_session(workspace: WorkspaceContext, config: &Config) -> Result<ToolSession> {
    let embedder = create_provider(&config.embedding, &config.runtime_dir)?;
    let generator = Arc::new(LazyGenerationClient::new(config.generation.clone()));
    Ok(ToolSession::new(workspace, config, embedder, generator).await)
}

/// Schemas only: nothing is executed, so no provider credentials are needed
async fn tool_definitions(workspace: WorkspaceContext, config: &Config) -> Vec<ToolDefinition> {
    let embedder = Arc::new(HashedEmbedder::new(config.embedding.dims));
    let generator = Arc::new(LazyGenerationClient::new(config.generation.clone()));
    let session = ToolSession::new(workspace, config, embedder, generator).await;
    session.registry().definitions().await
}

async fn run_session(session: &ToolSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut calls = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<SessionCall>(&line) {
            Ok(call) => session.execute(&call.tool, call.params).await,
            Err(e) => ToolResult::invalid_params(format!("Invalid tool call: {}", e)),
        };
        calls += 1;

        let mut encoded = serde_json::to_string(&result)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Session finished after {} calls", calls);
    Ok(())
}

/// Print the envelope; non-zero exit when it is an error
fn emit(result: ToolResult) -> ExitCode {
    if result.ok {
        print!("{}", result.output);
        if !result.output.ends_with('\n') {
            println!();
        }
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", result.error.unwrap_or_default());
        ExitCode::FAILURE
    }
}

trait IntoEnvelope {
    fn into_envelope(self) -> ToolResult;
}

impl<E: Into<ToolResult>> IntoEnvelope for std::result::Result<String, E> {
    fn into_envelope(self) -> ToolResult {
        match self {
            Ok(output) => ToolResult::ok(output),
            Err(e) => e.into(),
        }
    }
}
