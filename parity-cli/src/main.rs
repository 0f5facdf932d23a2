use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod input;
mod render;
mod replay;

#[derive(Debug, Parser)]
#[command(name = "parity", version, about = "Replay one HTTP request against several targets and diff the responses")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract a request and replay it against every target.
    Replay(ReplayArgs),
    /// Print the extracted request as JSON.
    Extract(InputArgs),
    /// List the requests of a `###`-delimited request file.
    Blocks { file: PathBuf },
    /// List the entries of a HAR archive.
    Har { file: PathBuf },
    /// Diff two response bodies stored in files.
    Diff(DiffArgs),
    /// List or clear replay history.
    History(HistoryArgs),
}

/// Where the captured request comes from. Reads stdin when neither
/// `--file` nor `--text` is given.
#[derive(Debug, Args)]
struct InputArgs {
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    #[arg(long)]
    text: Option<String>,

    /// Zero-based block of a request file.
    #[arg(long, conflicts_with = "har_entry")]
    block: Option<usize>,

    /// Zero-based entry of a HAR archive.
    #[arg(long)]
    har_entry: Option<usize>,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Target base URL; replaces the configured targets. Repeatable.
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Body path left out of the diff, added to the configured ones. Repeatable.
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip TLS certificate and hostname verification.
    #[arg(long)]
    insecure: bool,

    #[arg(long)]
    no_redirects: bool,

    /// Print protocol messages and the diff as JSON lines.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct DiffArgs {
    left: PathBuf,
    right: PathBuf,

    #[arg(long = "ignore")]
    ignore: Vec<String>,

    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    clear: bool,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Settings file; defaults to ./parity.toml when present.
    #[arg(long = "config")]
    path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Replay(args) => replay::run(args).await,
        Command::Extract(args) => commands::extract(&args),
        Command::Blocks { file } => commands::blocks(&file),
        Command::Har { file } => commands::har(&file),
        Command::Diff(args) => commands::diff(&args),
        Command::History(args) => commands::history(&args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "parity=debug" } else { "parity=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
