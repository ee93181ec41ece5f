//! promptfs - sandboxed workspaces driven by structured or natural-language
//! file operations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promptfs_adapters::config::{LlmSettings, RetrySettings};
use promptfs_adapters::{logging, Config, WorkspaceStore};
use promptfs_core::{CoreError, ErrorCode, OperationDescriptor, WorkspaceEngine};
use promptfs_engine::Engine;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "promptfs",
    about = "Sandboxed file workspaces with prompt-driven operations",
    version
)]
struct Args {
    /// Config file (defaults to ~/.config/promptfs/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory that holds every workspace
    #[arg(long, global = true)]
    workspaces_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty workspace
    Create { name: String },
    /// List all workspaces
    List,
    /// Show one workspace
    Info { workspace_id: String },
    /// Delete a workspace and everything in it
    Delete { workspace_id: String },
    /// List a directory inside a workspace
    Files {
        workspace_id: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// Run a JSON array of operations from a file, or `-` for stdin
    Batch { workspace_id: String, source: String },
    /// Translate a natural-language request and run it
    Prompt { workspace_id: String, text: String },
    /// Check whether the model service answers
    Health,
    /// Write or inspect the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the effective settings (never the API key) to the config file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings
    Show,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    config_file: String,
    workspaces_dir: &'a Path,
    api_key_configured: bool,
    llm: &'a LlmSettings,
    retry: &'a RetrySettings,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for(&err)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref());
    if let Some(dir) = args.workspaces_dir {
        config.workspaces_dir = dir;
    }
    let engine = Engine::from_config(&config)?;
    let config_file = args.config.as_deref();

    match args.command {
        Command::Create { name } => print_json(&engine.store().create(&name).await?),
        Command::List => print_json(&engine.store().list()),
        Command::Info { workspace_id } => {
            engine.store().refresh_file_count(&workspace_id).await?;
            print_json(&engine.store().require(&workspace_id)?)
        }
        Command::Delete { workspace_id } => print_json(&engine.store().delete(&workspace_id).await?),
        Command::Files { workspace_id, path } => {
            let listed = engine.list_files(&workspace_id, &path).await?;
            print_json(&listed)?;
            if listed.success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{}", listed.message))
            }
        }
        Command::Batch {
            workspace_id,
            source,
        } => {
            let operations = read_operations(&source)?;
            let outcome = engine.execute_batch(&workspace_id, operations).await?;
            print_json(&outcome)
        }
        Command::Prompt { workspace_id, text } => {
            let outcome = engine.execute_prompt(&workspace_id, &text).await?;
            print_json(&outcome)
        }
        Command::Health => print_json(&engine.translator_health().await),
        Command::Config { action } => run_config(action, &config, config_file, engine.store()),
    }
}

fn run_config(
    action: ConfigAction,
    config: &Config,
    config_file: Option<&Path>,
    store: &WorkspaceStore,
) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = config_file
                .map(Path::to_path_buf)
                .or_else(Config::config_path)
                .context("Could not determine a config directory; pass --config")?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to replace it)", path.display());
            }
            config.save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigAction::Show => print_json(&ConfigReport {
            config_file: config_file
                .map(|p| p.display().to_string())
                .unwrap_or_else(Config::config_location),
            workspaces_dir: store.base_dir(),
            api_key_configured: config.llm.has_api_key(),
            llm: &config.llm,
            retry: &config.retry,
        }),
    }
}

fn read_operations(source: &str) -> Result<Vec<OperationDescriptor>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read operations from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read operations from {}", source))?
    };
    serde_json::from_str(&raw).context("Operations must be a JSON array of descriptors")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CoreError>().map(CoreError::code) {
        Some(ErrorCode::NotFound) => ExitCode::from(3),
        Some(ErrorCode::Unavailable) => ExitCode::from(4),
        Some(ErrorCode::Validation) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
