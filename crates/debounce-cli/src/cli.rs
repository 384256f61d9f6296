use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "debounce",
    about = "Suppress identify payloads whose traits have not changed",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with debouncer settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Read identity fields from inside this envelope field (e.g. `obj`)
    #[arg(long, global = true)]
    pub envelope: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Debounce JSON payloads, one per line
    Run(RunArgs),
    /// Print the cache key a payload maps to
    Key(KeyArgs),
    /// Print the stored snapshot for an identity
    Show(ShowArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory holding stored snapshots
    #[arg(long, default_value = ".debounce")]
    pub store: PathBuf,
    /// Input file; stdin when omitted or `-`
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeyArgs {
    /// The payload, as JSON text
    pub payload: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Directory holding stored snapshots
    #[arg(long, default_value = ".debounce")]
    pub store: PathBuf,
    /// `userId` or `anonymousId` value, or `no-id`
    pub identity: String,
}
