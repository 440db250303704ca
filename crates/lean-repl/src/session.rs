use std::time::Duration;

use crate::engine::Engine;
use crate::lexer::{self, CandidateSource, CompletionResult, Completeness, StaticVocabulary};
use crate::lifecycle::{HandleState, ManagedHandle};
use crate::protocol::{ReplCommand, ReplResponse};
use crate::runtime;
use crate::types::{LeanError, ReplConfig};
use crate::worker::LeanWorker;

/// An interactive Lean session that tracks the environment across commands.
///
/// Each successful command that produces an environment id becomes the
/// context of the next command, so definitions accumulate the way they do in
/// a notebook. Failed commands leave the environment untouched.
///
/// A session exclusively owns its engine; it is not meant to be shared
/// between concurrent front ends.
pub struct Session<E: Engine> {
    handle: ManagedHandle<E>,
    current_env: Option<u64>,
    vocabulary: Box<dyn CandidateSource>,
}

impl Session<LeanWorker> {
    /// Open a session backed by a Lean REPL process.
    ///
    /// Bootstraps the process-wide runtime on first use, spawns the REPL and
    /// runs `config.header` if set. Any failure here is a
    /// [`LeanError::Bootstrap`] and no session is returned.
    pub async fn open(config: &ReplConfig) -> Result<Self, LeanError> {
        let runtime = runtime::runtime(config).await?;
        let config = runtime.session_config(config);

        let session = Self::uninitialized();
        session
            .handle
            .init(|| async {
                LeanWorker::spawn(&config).await.map_err(|e| {
                    LeanError::Bootstrap(format!("failed to start Lean REPL: {e}"))
                })
            })
            .await?;

        session
            .prepare(config.header.as_deref(), config.startup_timeout_secs)
            .await
    }
}

impl<E: Engine> Session<E> {
    fn uninitialized() -> Self {
        Self {
            handle: ManagedHandle::new(),
            current_env: None,
            vocabulary: Box::new(StaticVocabulary::default()),
        }
    }

    /// Wrap an already running engine.
    pub fn with_engine(engine: E) -> Self {
        Self {
            handle: ManagedHandle::ready(engine),
            current_env: None,
            vocabulary: Box::new(StaticVocabulary::default()),
        }
    }

    /// Start a session on `engine`, running `header` first when given.
    ///
    /// A failing or timed-out header shuts the engine down and returns
    /// [`LeanError::Bootstrap`].
    pub async fn start(
        engine: E,
        header: Option<&str>,
        header_timeout_secs: u64,
    ) -> Result<Self, LeanError> {
        let session = Self::uninitialized();
        session.handle.init(|| async { Ok(engine) }).await?;
        session.prepare(header, header_timeout_secs).await
    }

    async fn prepare(mut self, header: Option<&str>, timeout_secs: u64) -> Result<Self, LeanError> {
        let Some(header) = header else {
            return Ok(self);
        };

        let timeout = Duration::from_secs(timeout_secs);
        let failure = match tokio::time::timeout(timeout, self.execute(header)).await {
            Ok(Ok(response)) if response.is_success() && !response.has_errors() => {
                tracing::info!(env = ?response.env(), "Session header loaded");
                return Ok(self);
            }
            Ok(Ok(ReplResponse::Success { output, .. })) => {
                LeanError::Engine(output.trim_end().to_string()).to_string()
            }
            Ok(Ok(ReplResponse::Error { message, .. })) => LeanError::Engine(message).to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => LeanError::Timeout(timeout_secs).to_string(),
        };

        self.shutdown().await;
        Err(LeanError::Bootstrap(format!(
            "session header failed: {failure}"
        )))
    }

    /// Replace the completion candidate source.
    pub fn set_vocabulary(&mut self, source: Box<dyn CandidateSource>) {
        self.vocabulary = source;
    }

    /// Environment id produced by the last successful command, if any.
    pub fn current_env(&self) -> Option<u64> {
        self.current_env
    }

    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.state() == HandleState::Closed
    }

    /// Execute `code` in the current environment.
    pub async fn execute(&mut self, code: &str) -> Result<ReplResponse, LeanError> {
        self.execute_in(code, None).await
    }

    /// Execute `code` in `env_override` if given, else the current environment.
    ///
    /// Engine and decode failures are folded into [`ReplResponse::Error`];
    /// the only `Err` is [`LeanError::SessionClosed`].
    pub async fn execute_in(
        &mut self,
        code: &str,
        env_override: Option<u64>,
    ) -> Result<ReplResponse, LeanError> {
        let command = ReplCommand::new(code, env_override.or(self.current_env));

        match self.send(&command).await {
            Ok(response) => {
                if let Some(env) = response.env() {
                    tracing::debug!(previous = ?self.current_env, env, "Environment advanced");
                    self.current_env = Some(env);
                }
                Ok(response)
            }
            Err(LeanError::SessionClosed) => Err(LeanError::SessionClosed),
            Err(e) => {
                tracing::warn!(error = %e, "Lean command failed");
                Ok(ReplResponse::bridge_error(format!(
                    "Error communicating with Lean REPL: {e}"
                )))
            }
        }
    }

    /// Type information for the identifier under `cursor`, via `#check`.
    ///
    /// Returns an empty string when there is no identifier or when the
    /// lookup fails for any reason; inspection never surfaces errors. The
    /// session environment is not changed.
    pub async fn inspect(&mut self, code: &str, cursor: usize) -> Result<String, LeanError> {
        if self.is_closed() {
            return Err(LeanError::SessionClosed);
        }

        let ident = lexer::extract_identifier(code, cursor);
        if ident.is_empty() {
            return Ok(String::new());
        }

        let command = ReplCommand::new(format!("#check {}", ident.text), self.current_env);
        match self.send(&command).await {
            Ok(response @ ReplResponse::Success { .. }) => Ok(response
                .messages()
                .into_iter()
                .next()
                .and_then(|m| m.data)
                .unwrap_or_else(|| format!("No information available for: {}", ident.text))),
            Ok(ReplResponse::Error { message, .. }) => {
                tracing::debug!(ident = %ident.text, error = %message, "Inspection failed");
                Ok(String::new())
            }
            Err(LeanError::SessionClosed) => Err(LeanError::SessionClosed),
            Err(e) => {
                tracing::debug!(ident = %ident.text, error = %e, "Inspection failed");
                Ok(String::new())
            }
        }
    }

    /// Completion candidates for the identifier under `cursor`. No engine call.
    pub fn complete(&self, code: &str, cursor: usize) -> CompletionResult {
        lexer::complete(code, cursor, self.vocabulary.as_ref())
    }

    /// Whether `code` looks like a complete statement. No engine call.
    pub fn is_complete(&self, code: &str) -> Completeness {
        lexer::is_complete(code)
    }

    /// Release the engine. Safe to call repeatedly; only the first call
    /// releases anything. Returns whether this call released the engine.
    pub async fn shutdown(&mut self) -> bool {
        let released = self.handle.close().await;
        if released {
            tracing::info!(env = ?self.current_env, "Session shut down");
        }
        released
    }

    async fn send(&self, command: &ReplCommand) -> Result<ReplResponse, LeanError> {
        let request = command.to_json()?;
        let reply = {
            let mut engine = self.handle.acquire().await?;
            engine.send(&request).await?
        };
        ReplResponse::decode(reply.trim())
    }
}
