use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::engine::Engine;
use crate::types::{LeanError, ReplConfig};

/// A Lean engine backed by a REPL child process.
///
/// Commands are written to stdin as one JSON line followed by a blank line.
/// The REPL answers with a (possibly pretty-printed, multi-line) JSON
/// document terminated by a blank line.
pub struct LeanWorker {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    requests_handled: u64,
    started_at: Instant,
    alive: bool,
}

impl LeanWorker {
    /// Spawn a new REPL child process.
    ///
    /// Launches via `lake exe repl` from the project directory when
    /// `repl_path` is `lake` (which sets up `LEAN_PATH`), otherwise runs the
    /// binary directly from the same directory.
    pub async fn spawn(config: &ReplConfig) -> Result<Self, LeanError> {
        let mut cmd = Command::new(&config.repl_path);
        if config.uses_lake() {
            cmd.arg("exe").arg("repl");
        }
        cmd.current_dir(&config.project_dir);

        let mut child = cmd
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = BufWriter::new(
            child
                .stdin
                .take()
                .ok_or_else(|| LeanError::Transport("Failed to capture stdin".into()))?,
        );
        let stdout = BufReader::new(
            child
                .stdout
                .take()
                .ok_or_else(|| LeanError::Transport("Failed to capture stdout".into()))?,
        );

        tracing::debug!(
            repl_path = %config.repl_path.display(),
            project_dir = %config.project_dir.display(),
            pid = ?child.id(),
            "Spawned Lean REPL"
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            requests_handled: 0,
            started_at: Instant::now(),
            alive: true,
        })
    }

    /// Number of commands this worker has answered.
    pub fn requests_handled(&self) -> u64 {
        self.requests_handled
    }

    async fn exchange(&mut self, request: &str) -> Result<String, LeanError> {
        // A blank line terminates the command; the REPL waits for it.
        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.write_all(b"\n\n").await?;
        self.stdin.flush().await?;

        let document = self.read_document().await?;
        self.requests_handled += 1;
        Ok(document)
    }

    /// Read one response document: lines up to the first blank line that
    /// follows non-blank content.
    async fn read_document(&mut self) -> Result<String, LeanError> {
        let mut document = String::new();
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).await?;
            if n == 0 {
                self.alive = false;
                return Err(LeanError::ProcessDied);
            }
            if line.trim().is_empty() {
                if document.is_empty() {
                    continue;
                }
                return Ok(document);
            }
            document.push_str(&line);
        }
    }
}

#[async_trait]
impl Engine for LeanWorker {
    async fn send(&mut self, request: &str) -> Result<String, LeanError> {
        if !self.alive {
            return Err(LeanError::ProcessDied);
        }

        let result = self.exchange(request).await;
        if result.is_err() {
            // The rest of the reply may still be in the pipe.
            self.alive = false;
        }
        result
    }

    async fn shutdown(&mut self) {
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
        self.alive = false;
        tracing::debug!(
            requests = self.requests_handled,
            uptime_secs = self.started_at.elapsed().as_secs(),
            "Lean REPL shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ReplCommand;

    #[tokio::test]
    async fn spawn_missing_binary_is_io_error() {
        let mut config = ReplConfig::new(std::env::temp_dir());
        config.repl_path = "/nonexistent/lean-repl-binary".into();

        let result = LeanWorker::spawn(&config).await;
        assert!(matches!(result, Err(LeanError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_blank_line_terminated_documents() {
        // `cat` echoes each command back, so the "response" is the request.
        let mut config = ReplConfig::new(std::env::temp_dir());
        config.repl_path = "cat".into();
        let mut worker = LeanWorker::spawn(&config).await.unwrap();

        let request = ReplCommand::new("#eval 1", Some(0)).to_json().unwrap();
        let reply = worker.send(&request).await.unwrap();
        assert_eq!(reply.trim(), request);

        let request = ReplCommand::new("#eval 2", Some(1)).to_json().unwrap();
        let reply = worker.send(&request).await.unwrap();
        assert_eq!(reply.trim(), request);
        assert_eq!(worker.requests_handled(), 2);

        worker.shutdown().await;
        assert!(matches!(
            worker.send(&request).await,
            Err(LeanError::ProcessDied)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbled_reply_retires_the_worker() {
        use std::os::unix::fs::PermissionsExt;

        // Emits a non-UTF-8 line, then echoes like `cat`.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("garbled-repl");
        std::fs::write(&script, "#!/bin/sh\nprintf '\\377\\n'\nexec cat\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = ReplConfig::new(dir.path().to_path_buf());
        config.repl_path = script.clone();
        let mut worker = LeanWorker::spawn(&config).await.unwrap();

        let request = ReplCommand::new("#eval 1", None).to_json().unwrap();
        assert!(matches!(worker.send(&request).await, Err(LeanError::Io(_))));

        // The echoed first request is still buffered; it must not be read
        // as the reply to a later command.
        let request = ReplCommand::new("#eval 2", Some(0)).to_json().unwrap();
        assert!(matches!(
            worker.send(&request).await,
            Err(LeanError::ProcessDied)
        ));
        assert_eq!(worker.requests_handled(), 0);

        worker.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_exit_is_reported() {
        let mut config = ReplConfig::new(std::env::temp_dir());
        config.repl_path = "true".into();
        let mut worker = LeanWorker::spawn(&config).await.unwrap();

        // Writing may fail with a broken pipe or succeed before EOF is read.
        let result = worker.send("{\"cmd\":\"x\"}").await;
        assert!(matches!(
            result,
            Err(LeanError::ProcessDied) | Err(LeanError::Io(_))
        ));
    }
}
