//! TOML config loading for the xlean CLI.
//!
//! Deserializes `configs/xlean.toml`, which has optional `[repl]` and
//! `[kernel]` sections, then merges it with CLI overrides.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use lean_repl::{discover_repl, ReplConfig};
use serde::Deserialize;

/// Top-level structure matching `configs/xlean.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct KernelToml {
    /// Lean REPL overrides (paths default to auto-discovery).
    #[serde(default)]
    pub repl: ReplOverrides,
    /// Kernel tuning.
    #[serde(default)]
    pub kernel: KernelSettings,
}

/// Optional overrides for `ReplConfig` fields.
#[derive(Debug, Default, Deserialize)]
pub struct ReplOverrides {
    /// `lake` or a direct path to a REPL binary.
    pub repl_path: Option<PathBuf>,
    /// REPL project directory.
    pub project_dir: Option<PathBuf>,
    /// Command run once at session start, e.g. `import Mathlib`.
    pub header: Option<String>,
    /// Timeout in seconds for the header command.
    pub startup_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// How often the kernel worker checks for shutdown while idle.
    pub poll_interval_ms: u64,
    /// Words added to the completion vocabulary.
    pub extra_completions: Vec<String>,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            extra_completions: Vec::new(),
        }
    }
}

impl KernelSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// REPL settings given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub project_dir: Option<PathBuf>,
    pub repl_path: Option<PathBuf>,
    pub header: Option<String>,
}

/// Load and deserialize a `KernelToml` from a TOML file.
pub fn load_kernel_toml(path: &Path) -> anyhow::Result<KernelToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: KernelToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded kernel config");
    Ok(config)
}

/// Load `path` if given, else use defaults.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<KernelToml> {
    match path {
        Some(path) => load_kernel_toml(path),
        None => Ok(KernelToml::default()),
    }
}

/// Build a `ReplConfig` from auto-discovery, TOML overrides, and CLI flags.
///
/// Priority chain: `discover_repl()` < TOML values < CLI flags.
pub fn build_repl_config(
    overrides: &ReplOverrides,
    cli: &CliOverrides,
) -> anyhow::Result<ReplConfig> {
    let project_dir = cli
        .project_dir
        .clone()
        .or_else(|| overrides.project_dir.clone())
        .or_else(discover_repl)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Lean REPL project not found; set LEAN_REPL_PROJECT, [repl].project_dir or --project"
            )
        })?;
    let mut config = ReplConfig::new(project_dir);

    // Apply TOML overrides
    if let Some(path) = &overrides.repl_path {
        config.repl_path = path.clone();
    }
    if let Some(header) = &overrides.header {
        config.header = Some(header.clone());
    }
    if let Some(secs) = overrides.startup_timeout_secs {
        config.startup_timeout_secs = secs;
    }

    // CLI overrides take highest priority
    if let Some(path) = &cli.repl_path {
        config.repl_path = path.clone();
    }
    if let Some(header) = &cli.header {
        config.header = Some(header.clone());
    }

    Ok(config)
}

/// Whether `XLEAN_DEBUG` asks for debug logging. Read once per process.
pub fn debug_enabled() -> bool {
    static DEBUG: OnceLock<bool> = OnceLock::new();
    *DEBUG.get_or_init(|| parse_debug_flag(std::env::var("XLEAN_DEBUG").ok().as_deref()))
}

fn parse_debug_flag(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}
