mod pipeline;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{RunArgs, ServeArgs};
use xlean::config::{debug_enabled, CliOverrides};

/// xlean: Lean 4 notebook kernel over the Lean REPL.
#[derive(Parser)]
#[command(name = "xlean", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// REPL location and startup flags shared by every subcommand.
#[derive(Args)]
struct ReplFlags {
    /// Path to kernel config TOML file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Lean REPL project directory (overrides discovery and config).
    #[arg(long)]
    project: Option<PathBuf>,
    /// `lake` or a direct path to the REPL binary.
    #[arg(long)]
    repl_path: Option<PathBuf>,
    /// Command run once when the session opens, e.g. "import Mathlib".
    #[arg(long)]
    header: Option<String>,
}

impl ReplFlags {
    fn split(self) -> (Option<PathBuf>, CliOverrides) {
        (
            self.config,
            CliOverrides {
                project_dir: self.project,
                repl_path: self.repl_path,
                header: self.header,
            },
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve JSON-lines kernel requests on stdin, replies on stdout.
    Serve {
        #[command(flatten)]
        repl: ReplFlags,
    },
    /// Execute Lean files in one session and print their output.
    Run {
        #[command(flatten)]
        repl: ReplFlags,
        /// Lean files to execute, in order.
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_level = if debug_enabled() { "debug" } else { "info" };
    // stdout carries protocol replies; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { repl } => {
            let (config, repl) = repl.split();
            pipeline::run_serve(ServeArgs { config, repl }).await
        }
        Command::Run { repl, files } => {
            let (config, repl) = repl.split();
            pipeline::run_files(RunArgs {
                config,
                repl,
                files,
            })
            .await
        }
    }
}
