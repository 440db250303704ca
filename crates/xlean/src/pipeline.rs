//! `serve` and `run` subcommand drivers.

use std::path::PathBuf;
use std::time::Instant;

use tokio::io::BufReader;

use xlean::config::{build_repl_config, load_or_default, CliOverrides};
use xlean::kernel::LeanKernel;
use xlean::replies::ReplyStatus;
use xlean::server::{serve_lines, KernelHandle};

/// Arguments for the `serve` subcommand.
#[derive(Debug)]
pub struct ServeArgs {
    /// Optional path to the kernel config TOML file.
    pub config: Option<PathBuf>,
    /// CLI overrides for the REPL settings.
    pub repl: CliOverrides,
}

/// Arguments for the `run` subcommand.
#[derive(Debug)]
pub struct RunArgs {
    /// Optional path to the kernel config TOML file.
    pub config: Option<PathBuf>,
    /// CLI overrides for the REPL settings.
    pub repl: CliOverrides,
    /// Lean files to execute, in order, in one session.
    pub files: Vec<PathBuf>,
}

/// Answer JSON-lines requests on stdin until shutdown or end of input.
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    // 1. Load config
    let toml = load_or_default(args.config.as_deref())?;
    let repl_config = build_repl_config(&toml.repl, &args.repl)?;

    // 2. Open kernel
    tracing::info!(
        project_dir = %repl_config.project_dir.display(),
        header = ?repl_config.header,
        "Starting Lean kernel"
    );
    let kernel = LeanKernel::open(&repl_config, &toml.kernel.extra_completions).await?;
    let handle = KernelHandle::spawn(kernel, toml.kernel.poll_interval());

    // 3. Serve stdio
    let result = serve_lines(
        &handle,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;

    // 4. Shutdown, even if serving failed
    handle.shutdown().await;
    result?;
    Ok(())
}

/// Execute Lean files in one session and print their output.
pub async fn run_files(args: RunArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let toml = load_or_default(args.config.as_deref())?;
    let repl_config = build_repl_config(&toml.repl, &args.repl)?;
    let mut kernel = LeanKernel::open(&repl_config, &toml.kernel.extra_completions).await?;

    let mut failed = Vec::new();
    for (i, path) in args.files.iter().enumerate() {
        let code = match std::fs::read_to_string(path) {
            Ok(code) => code,
            Err(e) => {
                kernel.shutdown().await;
                return Err(anyhow::anyhow!("failed to read {}: {e}", path.display()));
            }
        };

        let reply = kernel.execute(&code, i as u32 + 1, false).await;
        println!("--- {} ---", path.display());
        match reply.status {
            ReplyStatus::Ok => print!("{}", reply.text().unwrap_or_default()),
            ReplyStatus::Error => {
                let message = reply.error.map(|e| e.evalue).unwrap_or_default();
                println!("error: {message}");
                failed.push(path.display().to_string());
            }
        }
    }

    kernel.shutdown().await;

    println!("\n--- Run Summary ---");
    println!("Files: {}", args.files.len());
    println!("Failed: {}", failed.len());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    if !failed.is_empty() {
        anyhow::bail!("{} file(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
