use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "migval",
    about = "Migration validator: compares a legacy repository export with its migrated target",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate every source object against the target
    Validate(ValidateArgs),
    /// Summarize the results of a run
    Summary(SummaryArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Run configuration (TOML)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Continue after the last checkpoint
    #[arg(long)]
    pub resume: bool,
    /// Validate at most this many objects
    #[arg(long)]
    pub limit: Option<u64>,
}

#[derive(Args)]
pub struct SummaryArgs {
    /// Result store directory
    #[arg(short, long)]
    pub results: PathBuf,
}
