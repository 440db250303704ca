//! Notebook-facing Lean kernel.

use lean_repl::{Engine, LeanError, LeanWorker, ReplConfig, ReplResponse, Session, StaticVocabulary};

use crate::replies::{
    plain_text, CompleteReply, ErrorContent, ExecuteReply, HelpLink, InspectReply,
    IsCompleteReply, KernelInfoReply, KernelReply, KernelRequest, LanguageInfo, ReplyStatus,
    ShutdownReply,
};

/// Error name attached to every failed execution.
pub const ERROR_NAME: &str = "LeanError";

const BANNER: &str = r#"
 __  __     ______     ______     __   __
/\_\_\_\   /\  ___\   /\  __ \   /\ "-.\ \
\/_/\_\/_  \ \  __\   \ \  __ \  \ \ \-.  \
  /\_\/\_\  \ \_____\  \ \_\ \_\  \ \_\\"\_\
  \/_/\/_/   \/_____/   \/_/\/_/   \/_/ \/_/

xlean: a notebook kernel for Lean 4
"#;

/// Translates [`Session`] results into notebook replies.
pub struct LeanKernel<E: Engine> {
    session: Session<E>,
    execution_count: u32,
}

impl LeanKernel<LeanWorker> {
    /// Open a kernel on a fresh REPL session. `extra_completions` are added
    /// to the default completion vocabulary.
    pub async fn open(config: &ReplConfig, extra_completions: &[String]) -> Result<Self, LeanError> {
        let mut session = Session::open(config).await?;
        if !extra_completions.is_empty() {
            session.set_vocabulary(Box::new(StaticVocabulary::with_extra(extra_completions)));
        }
        Ok(Self::new(session))
    }
}

impl<E: Engine> LeanKernel<E> {
    pub fn new(session: Session<E>) -> Self {
        Self {
            session,
            execution_count: 0,
        }
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Number of non-silent executions handled through [`handle`](Self::handle).
    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }

    /// Execute `code` and build the reply.
    ///
    /// Successful output is published unless `silent` or empty. Open goals
    /// left by `sorry` are appended under a `Proof goals:` heading.
    pub async fn execute(&mut self, code: &str, execution_count: u32, silent: bool) -> ExecuteReply {
        let response = match self.session.execute(code).await {
            Ok(response) => response,
            Err(e) => ReplResponse::bridge_error(e.to_string()),
        };

        match response {
            ReplResponse::Success { ref output, .. } => {
                if response.has_errors() {
                    tracing::warn!(execution_count, "Lean reported errors");
                }
                if silent || output.is_empty() {
                    return ExecuteReply::ok(execution_count, None);
                }
                let text = with_goals(output, &response);
                ExecuteReply::ok(execution_count, Some(plain_text(text)))
            }
            ReplResponse::Error { message, .. } => {
                tracing::warn!(execution_count, error = %message, "Execution failed");
                ExecuteReply::error(execution_count, ErrorContent::new(ERROR_NAME, message))
            }
        }
    }

    pub fn complete(&self, code: &str, cursor_pos: usize) -> CompleteReply {
        let result = self.session.complete(code, cursor_pos);
        CompleteReply {
            status: ReplyStatus::Ok,
            matches: result.matches,
            cursor_start: result.cursor_start,
            cursor_end: result.cursor_end,
        }
    }

    /// `detail_level` is accepted for protocol compatibility and ignored.
    pub async fn inspect(&mut self, code: &str, cursor_pos: usize, _detail_level: u8) -> InspectReply {
        match self.session.inspect(code, cursor_pos).await {
            Ok(text) if !text.is_empty() => InspectReply::found(text),
            Ok(_) => InspectReply::not_found(),
            Err(e) => {
                tracing::debug!(error = %e, "Inspection unavailable");
                InspectReply::not_found()
            }
        }
    }

    pub fn is_complete(&self, code: &str) -> IsCompleteReply {
        IsCompleteReply {
            status: self.session.is_complete(code).as_str().to_string(),
            indent: "  ".to_string(),
        }
    }

    pub fn kernel_info(&self) -> KernelInfoReply {
        KernelInfoReply {
            status: ReplyStatus::Ok,
            protocol_version: "5.3".to_string(),
            implementation: "xlean".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            language_info: LanguageInfo {
                name: "lean".to_string(),
                version: "4.0".to_string(),
                mimetype: "text/x-lean".to_string(),
                file_extension: ".lean".to_string(),
                pygments_lexer: "lean".to_string(),
                codemirror_mode: "lean4".to_string(),
                nbconvert_exporter: String::new(),
            },
            banner: BANNER.to_string(),
            debugger: false,
            help_links: vec![
                HelpLink {
                    text: "Lean Documentation".to_string(),
                    url: "https://lean-lang.org/documentation/".to_string(),
                },
                HelpLink {
                    text: "Lean Zulip Chat".to_string(),
                    url: "https://leanprover.zulipchat.com/".to_string(),
                },
            ],
        }
    }

    /// Release the session. Idempotent.
    pub async fn shutdown(&mut self) -> bool {
        self.session.shutdown().await
    }

    /// Dispatch one front-end request.
    pub async fn handle(&mut self, request: KernelRequest) -> KernelReply {
        match request {
            KernelRequest::Execute { code, silent } => {
                if !silent {
                    self.execution_count += 1;
                }
                let count = self.execution_count;
                KernelReply::Execute(self.execute(&code, count, silent).await)
            }
            KernelRequest::Complete { code, cursor_pos } => {
                KernelReply::Complete(self.complete(&code, cursor_pos))
            }
            KernelRequest::Inspect {
                code,
                cursor_pos,
                detail_level,
            } => KernelReply::Inspect(self.inspect(&code, cursor_pos, detail_level).await),
            KernelRequest::IsComplete { code } => KernelReply::IsComplete(self.is_complete(&code)),
            KernelRequest::KernelInfo {} => KernelReply::KernelInfo(self.kernel_info()),
            KernelRequest::Shutdown { restart } => {
                self.shutdown().await;
                KernelReply::Shutdown(ShutdownReply {
                    status: ReplyStatus::Ok,
                    restart,
                })
            }
        }
    }
}

fn with_goals(output: &str, response: &ReplResponse) -> String {
    let goals: Vec<String> = response
        .sorries()
        .into_iter()
        .filter_map(|s| s.goal)
        .collect();
    if goals.is_empty() {
        return output.to_string();
    }

    let mut text = format!("{output}\nProof goals:\n");
    for goal in goals {
        text.push_str(&goal);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use lean_repl::MockEngine;

    use super::*;

    fn kernel_with(engine: MockEngine) -> LeanKernel<MockEngine> {
        LeanKernel::new(Session::with_engine(engine))
    }

    #[tokio::test]
    async fn execute_publishes_output() {
        let mut engine = MockEngine::new();
        engine.add_response(
            "#eval 1 + 1",
            r#"{"env":1,"messages":[{"severity":"info","data":"2"}]}"#,
        );
        let mut kernel = kernel_with(engine);

        let reply = kernel.execute("#eval 1 + 1", 1, false).await;
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(reply.execution_count, 1);
        assert_eq!(reply.text(), Some("2\n"));
        assert_eq!(kernel.session().current_env(), Some(1));
    }

    #[tokio::test]
    async fn silent_and_empty_output_publish_nothing() {
        let mut engine = MockEngine::new();
        engine.add_response(
            "#eval 1 + 1",
            r#"{"env":1,"messages":[{"severity":"info","data":"2"}]}"#,
        );
        let mut kernel = kernel_with(engine);

        let silent = kernel.execute("#eval 1 + 1", 1, true).await;
        assert_eq!(silent.status, ReplyStatus::Ok);
        assert!(silent.data.is_none());

        let empty = kernel.execute("def x := 1", 2, false).await;
        assert_eq!(empty.status, ReplyStatus::Ok);
        assert!(empty.data.is_none());
    }

    #[tokio::test]
    async fn sorries_append_proof_goals() {
        let mut engine = MockEngine::new();
        engine.add_response(
            "theorem t (n : Nat) : n + 0 = n := sorry",
            r#"{"env":2,
                "messages":[{"severity":"warning","data":"declaration uses 'sorry'"}],
                "sorries":[{"goal":"n : Nat\n⊢ n + 0 = n"}]}"#,
        );
        let mut kernel = kernel_with(engine);

        let reply = kernel
            .execute("theorem t (n : Nat) : n + 0 = n := sorry", 1, false)
            .await;
        assert_eq!(
            reply.text(),
            Some(
                "declaration uses 'sorry'\nGoal: n : Nat\n⊢ n + 0 = n\n\nProof goals:\nn : Nat\n⊢ n + 0 = n\n"
            )
        );
    }

    #[tokio::test]
    async fn engine_error_becomes_lean_error_reply() {
        let mut engine = MockEngine::new();
        engine.add_response("#eval x", r#"{"error":"unknown identifier 'x'"}"#);
        let mut kernel = kernel_with(engine);

        let reply = kernel.execute("#eval x", 4, false).await;
        assert_eq!(reply.status, ReplyStatus::Error);
        let error = reply.error.unwrap();
        assert_eq!(error.ename, "LeanError");
        assert_eq!(error.evalue, "unknown identifier 'x'");
        assert_eq!(error.traceback, vec!["unknown identifier 'x'".to_string()]);
    }

    #[tokio::test]
    async fn error_messages_are_still_successful() {
        let mut engine = MockEngine::new();
        engine.add_response(
            "def f : Nat := \"s\"",
            r#"{"env":3,"messages":[{"severity":"error","data":"type mismatch"}]}"#,
        );
        let mut kernel = kernel_with(engine);

        let reply = kernel.execute("def f : Nat := \"s\"", 1, false).await;
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(reply.text(), Some("type mismatch\n"));
    }

    #[tokio::test]
    async fn execute_after_shutdown_is_error_reply() {
        let mut kernel = kernel_with(MockEngine::new());
        assert!(kernel.shutdown().await);
        assert!(!kernel.shutdown().await);

        let reply = kernel.execute("#eval 1", 1, false).await;
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.error.unwrap().evalue, "Session closed");
    }

    #[tokio::test]
    async fn inspect_found_and_not_found() {
        let mut engine = MockEngine::new();
        engine.add_response(
            "#check Nat.succ",
            r#"{"messages":[{"severity":"info","data":"Nat.succ (n : Nat) : Nat"}]}"#,
        );
        engine.add_failure("#check broken", "pipe closed");
        let mut kernel = kernel_with(engine);

        let found = kernel.inspect("Nat.succ", 3, 0).await;
        assert!(found.found);
        assert_eq!(found.data["text/plain"], "Nat.succ (n : Nat) : Nat");

        assert!(!kernel.inspect("broken", 2, 0).await.found);
        assert!(!kernel.inspect("  ", 1, 0).await.found);
    }

    #[tokio::test]
    async fn lexical_replies() {
        let kernel = kernel_with(MockEngine::new());

        let completion = kernel.complete("#check Nat.a", 12);
        assert_eq!(completion.matches, vec!["Nat.add"]);
        assert_eq!((completion.cursor_start, completion.cursor_end), (7, 12));

        let incomplete = kernel.is_complete("theorem t : True := by");
        assert_eq!(incomplete.status, "incomplete");
        assert_eq!(incomplete.indent, "  ");
        assert_eq!(kernel.is_complete("#eval (1 + 2)").status, "complete");
    }

    #[test]
    fn kernel_info_describes_lean() {
        let kernel = kernel_with(MockEngine::new());
        let info = kernel.kernel_info();
        assert_eq!(info.protocol_version, "5.3");
        assert_eq!(info.implementation, "xlean");
        assert_eq!(info.language_info.name, "lean");
        assert_eq!(info.language_info.mimetype, "text/x-lean");
        assert_eq!(info.language_info.file_extension, ".lean");
        assert_eq!(info.language_info.codemirror_mode, "lean4");
        assert_eq!(info.help_links.len(), 2);
        assert!(info.banner.contains("Lean 4"));
    }

    #[tokio::test]
    async fn handle_counts_non_silent_executions() {
        let mut kernel = kernel_with(MockEngine::new());

        kernel
            .handle(KernelRequest::Execute {
                code: "def a := 1".into(),
                silent: false,
            })
            .await;
        kernel
            .handle(KernelRequest::Execute {
                code: "def b := 2".into(),
                silent: true,
            })
            .await;
        let reply = kernel
            .handle(KernelRequest::Execute {
                code: "def c := 3".into(),
                silent: false,
            })
            .await;

        match reply {
            KernelReply::Execute(reply) => assert_eq!(reply.execution_count, 2),
            other => panic!("Expected execute reply, got {other:?}"),
        }
        assert_eq!(kernel.execution_count(), 2);
    }

    #[tokio::test]
    async fn handle_shutdown_closes_session() {
        let engine = MockEngine::new();
        let releases = engine.release_counter();
        let mut kernel = kernel_with(engine);

        let reply = kernel.handle(KernelRequest::Shutdown { restart: false }).await;
        assert!(matches!(reply, KernelReply::Shutdown(ShutdownReply { restart: false, .. })));
        assert!(kernel.session().is_closed());
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
