//! Process-wide Lean runtime bootstrap.
//!
//! The REPL toolchain is resolved and validated once per process, on the
//! first session that opens. Later sessions reuse the result.

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::OnceCell;

use crate::types::{has_lakefile, LeanError, ReplConfig};

/// A once-guarded asynchronous initializer.
///
/// Concurrent callers serialize on the first initialization: one runs the
/// initializer, the others wait and observe its result. A failed attempt
/// leaves the cell empty so a later caller can retry.
pub struct Bootstrap<T> {
    cell: OnceCell<T>,
}

impl<T> Bootstrap<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<&T, LeanError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LeanError>>,
    {
        self.cell.get_or_try_init(init).await
    }
}

impl<T> Default for Bootstrap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The resolved Lean REPL toolchain shared by every session in the process.
#[derive(Debug, Clone)]
pub struct LeanRuntime {
    pub repl_path: PathBuf,
    pub project_dir: PathBuf,
}

impl LeanRuntime {
    /// Validate `config` and resolve its paths.
    pub fn resolve(config: &ReplConfig) -> Result<Self, LeanError> {
        let project_dir = config.project_dir.canonicalize().map_err(|e| {
            LeanError::Bootstrap(format!(
                "REPL project directory {} is not accessible: {e}",
                config.project_dir.display()
            ))
        })?;

        if !has_lakefile(&project_dir) {
            return Err(LeanError::Bootstrap(format!(
                "no lakefile found in {}",
                project_dir.display()
            )));
        }

        Ok(Self {
            repl_path: config.repl_path.clone(),
            project_dir,
        })
    }

    /// The [`ReplConfig`] a session should spawn with: caller settings, with
    /// the runtime's resolved paths.
    pub fn session_config(&self, config: &ReplConfig) -> ReplConfig {
        ReplConfig {
            repl_path: self.repl_path.clone(),
            project_dir: self.project_dir.clone(),
            ..config.clone()
        }
    }
}

static RUNTIME: Bootstrap<LeanRuntime> = Bootstrap::new();

/// Resolve the process-wide runtime, bootstrapping it on first use.
///
/// The first successful configuration wins; later sessions with different
/// paths still use the runtime resolved first.
pub async fn runtime(config: &ReplConfig) -> Result<&'static LeanRuntime, LeanError> {
    RUNTIME
        .get_or_try_init(|| async {
            let runtime = LeanRuntime::resolve(config)?;
            tracing::info!(
                repl_path = %runtime.repl_path.display(),
                project_dir = %runtime.project_dir.display(),
                "Lean runtime bootstrapped"
            );
            Ok(runtime)
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_init_runs_once() {
        let boot: Arc<Bootstrap<u32>> = Arc::new(Bootstrap::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for i in 0..8u32 {
            let boot = Arc::clone(&boot);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                *boot
                    .get_or_try_init(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(i)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for t in tasks {
            values.push(t.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn failed_init_can_retry() {
        let boot: Bootstrap<&'static str> = Bootstrap::new();

        let err = boot
            .get_or_try_init(|| async { Err(LeanError::Bootstrap("no toolchain".into())) })
            .await;
        assert!(matches!(err, Err(LeanError::Bootstrap(_))));

        let ok = boot.get_or_try_init(|| async { Ok("ready") }).await.unwrap();
        assert_eq!(*ok, "ready");

        // Once set, later initializers never run.
        let again = boot
            .get_or_try_init(|| async { Err(LeanError::Bootstrap("unreachable".into())) })
            .await
            .unwrap();
        assert_eq!(*again, "ready");
    }

    #[test]
    fn resolve_rejects_missing_dir() {
        let config = ReplConfig::new("/nonexistent/lean/repl/project");
        assert!(matches!(
            LeanRuntime::resolve(&config),
            Err(LeanError::Bootstrap(_))
        ));
    }

    #[test]
    fn resolve_rejects_dir_without_lakefile() {
        let config = ReplConfig::new(std::env::temp_dir());
        assert!(matches!(
            LeanRuntime::resolve(&config),
            Err(LeanError::Bootstrap(_))
        ));
    }

    #[test]
    fn session_config_keeps_caller_settings() {
        let runtime = LeanRuntime {
            repl_path: "lake".into(),
            project_dir: "/opt/repl".into(),
        };
        let mut config = ReplConfig::new("/elsewhere");
        config.header = Some("import Mathlib".into());

        let resolved = runtime.session_config(&config);
        assert_eq!(resolved.project_dir, PathBuf::from("/opt/repl"));
        assert_eq!(resolved.header.as_deref(), Some("import Mathlib"));
    }
}
