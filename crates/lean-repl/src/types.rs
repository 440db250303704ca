use std::path::{Path, PathBuf};

/// Errors that can occur while talking to the Lean REPL.
#[derive(Debug, thiserror::Error)]
pub enum LeanError {
    /// Lean REPL process exited unexpectedly.
    #[error("Lean process exited unexpectedly")]
    ProcessDied,

    /// Operation timed out after the specified number of seconds.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// The response was not a well-formed REPL document.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The REPL reported an error payload for the command.
    #[error("Lean error: {0}")]
    Engine(String),

    /// The call into the engine failed before a response was produced.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Operation attempted on a session that has been shut down.
    #[error("Session closed")]
    SessionClosed,

    /// Runtime or engine initialization failed; no session was created.
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// IO error from process communication.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single open goal reported by Lean (e.g. for a `sorry`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    /// Zero-indexed position of the goal within its response.
    pub goal_id: usize,
    /// Hypothesis strings (e.g., "n : Nat").
    pub hypotheses: Vec<String>,
    /// The goal target (the part after `⊢`).
    pub target: String,
    /// The full raw pretty-printed string from Lean.
    pub raw: String,
}

impl Goal {
    /// Parse a goal from Lean's pretty-printed format.
    ///
    /// Format:
    /// ```text
    /// hyp1 : Type1
    /// hyp2 : Type2
    /// ⊢ target_type
    /// ```
    ///
    /// The `⊢` symbol separates hypotheses from the goal target.
    pub fn parse(goal_id: usize, raw: &str) -> Self {
        let raw = raw.to_string();

        if let Some(turnstile_pos) = raw.find('⊢') {
            let before = &raw[..turnstile_pos];
            let after = raw[turnstile_pos + '⊢'.len_utf8()..].trim();

            let hypotheses: Vec<String> = before
                .lines()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(|l| l.to_string())
                .collect();

            Goal {
                goal_id,
                hypotheses,
                target: after.to_string(),
                raw,
            }
        } else {
            // No turnstile: the whole string is the target
            Goal {
                goal_id,
                hypotheses: Vec::new(),
                target: raw.clone(),
                raw,
            }
        }
    }
}

/// Configuration for spawning a Lean REPL session.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReplConfig {
    /// Path to `lake` (runs `lake exe repl`) or directly to a REPL binary.
    pub repl_path: PathBuf,

    /// REPL project directory (where the lakefile lives).
    /// Used as the working directory of the REPL process.
    pub project_dir: PathBuf,

    /// Command executed once when a session opens, e.g. `import Mathlib`.
    /// Its environment becomes the session's starting environment.
    #[serde(default)]
    pub header: Option<String>,

    /// Timeout in seconds for the header command. User commands are never
    /// timed out.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

impl ReplConfig {
    /// Create a `ReplConfig` for an explicit project directory, running
    /// `lake exe repl` from it.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            repl_path: PathBuf::from("lake"),
            project_dir: project_dir.into(),
            header: None,
            startup_timeout_secs: default_startup_timeout(),
        }
    }

    /// Create a `ReplConfig` using the auto-discovered REPL project.
    ///
    /// Returns `None` if no REPL project can be found; see [`discover_repl()`].
    pub fn with_bundled_repl() -> Option<Self> {
        discover_repl().map(Self::new)
    }

    /// Whether the configured command is `lake` (as opposed to a REPL binary).
    pub fn uses_lake(&self) -> bool {
        self.repl_path
            .file_stem()
            .map(|stem| stem == "lake")
            .unwrap_or(false)
    }
}

/// Auto-discover the Lean REPL project directory.
///
/// Discovery chain (first match wins):
/// 1. `LEAN_REPL_PROJECT` environment variable
/// 2. `vendor/repl/` relative to the workspace root (detected via
///    `LEAN_REPL_MANIFEST_DIR` set by build.rs, walking up two levels from
///    the `crates/lean-repl/` directory)
///
/// A directory is valid if it contains a `lakefile.lean` or `lakefile.toml`.
pub fn discover_repl() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LEAN_REPL_PROJECT") {
        let p = PathBuf::from(path);
        if has_lakefile(&p) {
            return Some(p);
        }
        tracing::warn!(
            "LEAN_REPL_PROJECT={} set but no lakefile found there",
            p.display()
        );
    }

    if let Some(manifest_dir) = option_env!("LEAN_REPL_MANIFEST_DIR") {
        let vendor = PathBuf::from(manifest_dir)
            .join("..")
            .join("..")
            .join("vendor")
            .join("repl");
        if let Ok(canonical) = vendor.canonicalize() {
            if has_lakefile(&canonical) {
                return Some(canonical);
            }
        }
    }

    None
}

/// Whether `dir` looks like a Lake project.
pub fn has_lakefile(dir: &Path) -> bool {
    dir.join("lakefile.lean").is_file() || dir.join("lakefile.toml").is_file()
}

fn default_startup_timeout() -> u64 {
    300
}
