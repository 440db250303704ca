//! Integration tests for the xlean kernel.
//!
//! Mock tests run without Lean. The `#[ignore]` test requires a built Lean
//! REPL project (see `lean_repl::discover_repl`).

use std::sync::atomic::Ordering;
use std::time::Duration;

use lean_repl::{MockEngine, ReplConfig, Session};
use serde_json::Value;
use tokio::io::BufReader;
use xlean::replies::ReplyStatus;
use xlean::{serve_lines, KernelHandle, KernelReply, KernelRequest, LeanKernel};

async fn serve_all(handle: &KernelHandle<MockEngine>, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    serve_lines(handle, BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// A notebook session: definitions, evaluation, a sorry, an error, then
/// inspection and shutdown, all through the JSON-lines protocol.
#[tokio::test]
async fn test_mock_notebook_over_json_lines() {
    let mut engine = MockEngine::new();
    engine.add_response("def x := 5", r#"{"env":0}"#);
    engine.add_response(
        "#eval x",
        r#"{"env":1,"messages":[{"severity":"info","data":"5"}]}"#,
    );
    engine.add_response(
        "example : x = 5 := sorry",
        r#"{"env":2,"messages":[{"severity":"warning","data":"declaration uses 'sorry'"}],"sorries":[{"goal":"⊢ x = 5"}]}"#,
    );
    engine.add_response("#eval (", r#"{"error":"unexpected end of input"}"#);
    engine.add_response(
        "#check x",
        r#"{"messages":[{"severity":"info","data":"x : Nat"}]}"#,
    );
    let log = engine.request_log();
    let releases = engine.release_counter();

    let kernel = LeanKernel::new(Session::with_engine(engine));
    let handle = KernelHandle::spawn(kernel, Duration::from_millis(10));

    let requests = [
        serde_json::json!({"msg_type": "execute_request", "content": {"code": "def x := 5"}}),
        serde_json::json!({"msg_type": "execute_request", "content": {"code": "#eval x"}}),
        serde_json::json!({"msg_type": "execute_request", "content": {"code": "example : x = 5 := sorry"}}),
        serde_json::json!({"msg_type": "execute_request", "content": {"code": "#eval ("}}),
        serde_json::json!({"msg_type": "inspect_request", "content": {"code": "#eval x", "cursor_pos": 6}}),
        serde_json::json!({"msg_type": "shutdown_request", "content": {}}),
    ];
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();

    let replies = serve_all(&handle, &input).await;
    assert_eq!(replies.len(), 6);

    assert_eq!(replies[0]["content"]["status"], "ok");
    assert!(replies[0]["content"].get("data").is_none());

    assert_eq!(replies[1]["content"]["data"]["text/plain"], "5\n");
    assert_eq!(replies[1]["content"]["execution_count"], 2);

    let sorry_text = replies[2]["content"]["data"]["text/plain"].as_str().unwrap();
    assert!(sorry_text.ends_with("\nProof goals:\n⊢ x = 5\n"), "{sorry_text}");

    assert_eq!(replies[3]["content"]["status"], "error");
    assert_eq!(replies[3]["content"]["ename"], "LeanError");
    assert_eq!(replies[3]["content"]["evalue"], "unexpected end of input");

    assert_eq!(replies[4]["msg_type"], "inspect_reply");
    assert_eq!(replies[4]["content"]["found"], true);
    assert_eq!(replies[4]["content"]["data"]["text/plain"], "x : Nat");

    assert_eq!(replies[5]["msg_type"], "shutdown_reply");

    // The failed command and the inspection ran in the latest good env.
    let envs: Vec<Option<u64>> = log
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.get("env").and_then(|e| e.as_u64()))
        .collect();
    assert_eq!(envs, vec![None, Some(0), Some(1), Some(2), Some(2)]);

    assert!(!handle.shutdown().await);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_requests_after_kernel_shutdown() {
    let handle = KernelHandle::spawn(
        LeanKernel::new(Session::with_engine(MockEngine::new())),
        Duration::from_millis(10),
    );

    handle
        .request(KernelRequest::Shutdown { restart: false })
        .await
        .unwrap();

    // The worker is still running, but the session is gone.
    match handle
        .request(KernelRequest::Execute {
            code: "#eval 1".into(),
            silent: false,
        })
        .await
        .unwrap()
    {
        KernelReply::Execute(reply) => assert_eq!(reply.status, ReplyStatus::Error),
        other => panic!("Expected execute reply, got {other:?}"),
    }

    // Lexical requests never need the engine.
    match handle
        .request(KernelRequest::IsComplete {
            code: "def f := (".into(),
        })
        .await
        .unwrap()
    {
        KernelReply::IsComplete(reply) => assert_eq!(reply.status, "incomplete"),
        other => panic!("Expected is_complete reply, got {other:?}"),
    }

    handle.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_real_kernel_execute() {
    let config = ReplConfig::with_bundled_repl()
        .expect("Lean REPL not found. Set LEAN_REPL_PROJECT=/path/to/repl");
    let mut kernel = LeanKernel::open(&config, &[]).await.expect("Failed to open kernel");

    let reply = kernel.execute("#eval 2 + 3", 1, false).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.text(), Some("5\n"));

    let reply = kernel.execute("#eval (", 2, false).await;
    assert!(reply.status == ReplyStatus::Error || reply.text().is_some());

    assert!(kernel.shutdown().await);
}
