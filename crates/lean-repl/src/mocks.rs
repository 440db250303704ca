//! Mock engine for testing the session bridge without a Lean toolchain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::Engine;
use crate::types::LeanError;

#[derive(Debug, Clone)]
enum MockReply {
    Document(String),
    Fail(String),
}

/// Mock engine returning canned documents keyed by command text.
///
/// Commands without a canned reply behave like a fresh REPL: each one
/// succeeds with a new environment id (`{"env": 0}`, `{"env": 1}`, ...).
/// Every request document is recorded, and shutdowns are counted so tests
/// can check the engine is released exactly once.
pub struct MockEngine {
    responses: HashMap<String, MockReply>,
    next_env: u64,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
    releases: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            next_env: 0,
            requests: Arc::new(Mutex::new(Vec::new())),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply to command `code` with the raw document `json`.
    pub fn add_response(&mut self, code: &str, json: &str) {
        self.responses
            .insert(code.to_string(), MockReply::Document(json.to_string()));
    }

    /// Make command `code` fail in transport with `message`.
    pub fn add_failure(&mut self, code: &str, message: &str) {
        self.responses
            .insert(code.to_string(), MockReply::Fail(message.to_string()));
    }

    /// Shared log of every request document received, in order.
    pub fn request_log(&self) -> Arc<Mutex<Vec<serde_json::Value>>> {
        Arc::clone(&self.requests)
    }

    /// Shared count of `shutdown` calls.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn send(&mut self, request: &str) -> Result<String, LeanError> {
        let value: serde_json::Value = serde_json::from_str(request)
            .map_err(|e| LeanError::Transport(format!("mock received invalid request: {e}")))?;
        let code = value
            .get("cmd")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        self.requests.lock().unwrap().push(value);

        match self.responses.get(&code) {
            Some(MockReply::Document(json)) => Ok(json.clone()),
            Some(MockReply::Fail(message)) => Err(LeanError::Transport(message.clone())),
            None => {
                let env = self.next_env;
                self.next_env += 1;
                Ok(format!("{{\"env\": {env}}}"))
            }
        }
    }

    async fn shutdown(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
