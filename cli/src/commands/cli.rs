use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Validate and dry-run quill task graphs")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to load instead of ~/.quill/config.toml or ./quill.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Task graph JSON file.
    pub graph: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Task graph JSON file.
    pub graph: PathBuf,

    /// Override `executor.max_concurrency`.
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Pin every generation call to this model name.
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    /// Append finished traces as JSONL (`stdout:` writes to stdout).
    #[arg(long)]
    pub traces_out: Option<String>,

    /// Write the full trace export (traces plus stats) as JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Print the run result as JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a task graph for missing dependencies and cycles.
    Validate(ValidateArgs),
    /// Execute a task graph against the offline echo backend.
    Run(RunArgs),
    /// Print the default configuration as TOML.
    InitConfig,
}
