use serde::{Deserialize, Serialize};

use crate::types::{Goal, LeanError};

/// A command to send to the Lean REPL.
///
/// The REPL expects `{"cmd": "<code>", "env": <id>}`; `env` is omitted when
/// the command should run without prior context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplCommand {
    /// Lean source to elaborate.
    pub cmd: String,
    /// Environment to run in. `None` means the REPL's default environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<u64>,
}

impl ReplCommand {
    pub fn new(code: impl Into<String>, env: Option<u64>) -> Self {
        Self {
            cmd: code.into(),
            env,
        }
    }

    /// Serialize this command to a single-line JSON string.
    pub fn to_json(&self) -> Result<String, LeanError> {
        serde_json::to_string(self)
            .map_err(|e| LeanError::Transport(format!("Serialization error: {e}")))
    }
}

// --- Response types ---

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    #[serde(other)]
    Other,
}

/// A source position as reported by the REPL (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

/// A diagnostic message produced while elaborating a command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplMessage {
    #[serde(default)]
    pub severity: Severity,
    /// Message text. Messages without text contribute nothing to output.
    pub data: Option<String>,
    pub pos: Option<Position>,
    pub end_pos: Option<Position>,
}

/// An open goal left behind by a `sorry`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sorry {
    pub goal: Option<String>,
    pub pos: Option<Position>,
    pub end_pos: Option<Position>,
}

/// Wire shape of a successful response.
#[derive(Debug, Deserialize)]
struct SuccessWire {
    env: Option<u64>,
    #[serde(default)]
    messages: Vec<ReplMessage>,
    #[serde(default)]
    sorries: Vec<Sorry>,
}

/// A decoded response from the Lean REPL.
///
/// `raw` always keeps the full document so callers can format details (such
/// as sorry goals) beyond the summary `output`.
#[derive(Debug, Clone)]
pub enum ReplResponse {
    /// The command was elaborated. `env` is present when the REPL produced a
    /// new environment.
    Success {
        output: String,
        raw: serde_json::Value,
        env: Option<u64>,
    },
    /// The REPL (or the bridge) reported an error for this command.
    Error {
        message: String,
        raw: serde_json::Value,
    },
}

impl ReplResponse {
    /// Decode a REPL response document.
    ///
    /// Returns `LeanError::Decode` when the text is not a JSON object of the
    /// expected shape. A well-formed document carrying an `error` field is
    /// not a decode failure; it becomes [`ReplResponse::Error`].
    pub fn decode(json: &str) -> Result<Self, LeanError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| LeanError::Decode(format!("Invalid JSON: {e}. Raw: {json}")))?;

        if !value.is_object() {
            return Err(LeanError::Decode(format!(
                "Expected a JSON object. Raw: {json}"
            )));
        }

        if let Some(error) = value.get("error") {
            let message = match error {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(ReplResponse::Error {
                message,
                raw: value,
            });
        }

        let wire: SuccessWire = serde_json::from_value(value.clone()).map_err(|e| {
            LeanError::Decode(format!("Failed to parse REPL response: {e}. Raw: {json}"))
        })?;

        Ok(ReplResponse::Success {
            output: format_output(&wire.messages, &wire.sorries),
            raw: value,
            env: wire.env,
        })
    }

    /// Error response produced by the bridge itself (no engine document).
    pub fn bridge_error(message: impl Into<String>) -> Self {
        ReplResponse::Error {
            message: message.into(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReplResponse::Success { .. })
    }

    /// The environment id produced by a successful command.
    pub fn env(&self) -> Option<u64> {
        match self {
            ReplResponse::Success { env, .. } => *env,
            ReplResponse::Error { .. } => None,
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        match self {
            ReplResponse::Success { raw, .. } | ReplResponse::Error { raw, .. } => raw,
        }
    }

    /// Diagnostic messages in the raw document (empty if absent or malformed).
    pub fn messages(&self) -> Vec<ReplMessage> {
        list_field(self.raw(), "messages")
    }

    /// Sorries in the raw document (empty if absent or malformed).
    pub fn sorries(&self) -> Vec<Sorry> {
        list_field(self.raw(), "sorries")
    }

    /// Sorry goals parsed into hypotheses and target.
    pub fn goals(&self) -> Vec<Goal> {
        self.sorries()
            .iter()
            .filter_map(|s| s.goal.as_deref())
            .enumerate()
            .map(|(i, g)| Goal::parse(i, g))
            .collect()
    }

    /// Whether any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.messages()
            .iter()
            .any(|m| m.severity == Severity::Error)
    }
}

/// Message texts, one per line, followed by `Goal: ` lines for each sorry.
fn format_output(messages: &[ReplMessage], sorries: &[Sorry]) -> String {
    let mut output = String::new();
    for data in messages.iter().filter_map(|m| m.data.as_deref()) {
        output.push_str(data);
        output.push('\n');
    }
    for goal in sorries.iter().filter_map(|s| s.goal.as_deref()) {
        output.push_str("Goal: ");
        output.push_str(goal);
        output.push('\n');
    }
    output
}

fn list_field<T: serde::de::DeserializeOwned>(raw: &serde_json::Value, key: &str) -> Vec<T> {
    raw.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
