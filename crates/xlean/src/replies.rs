//! Front-end protocol messages and kernel replies.
//!
//! Requests and replies travel as `{"msg_type": ..., "content": {...}}`
//! envelopes. Reply contents follow the notebook messaging protocol field
//! names so a transport can forward them unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// MIME type to rendered text, e.g. `{"text/plain": "2\n"}`.
pub type MimeBundle = BTreeMap<String, String>;

/// Build a bundle holding only `text/plain`.
pub fn plain_text(text: impl Into<String>) -> MimeBundle {
    let mut bundle = MimeBundle::new();
    bundle.insert("text/plain".to_string(), text.into());
    bundle
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// A request from the front end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "msg_type", content = "content")]
pub enum KernelRequest {
    #[serde(rename = "execute_request")]
    Execute {
        code: String,
        #[serde(default)]
        silent: bool,
    },
    #[serde(rename = "complete_request")]
    Complete { code: String, cursor_pos: usize },
    #[serde(rename = "inspect_request")]
    Inspect {
        code: String,
        cursor_pos: usize,
        #[serde(default)]
        detail_level: u8,
    },
    #[serde(rename = "is_complete_request")]
    IsComplete { code: String },
    #[serde(rename = "kernel_info_request")]
    KernelInfo {},
    #[serde(rename = "shutdown_request")]
    Shutdown {
        #[serde(default)]
        restart: bool,
    },
}

impl KernelRequest {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, KernelRequest::Shutdown { .. })
    }
}

/// A reply to the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msg_type", content = "content")]
pub enum KernelReply {
    #[serde(rename = "execute_reply")]
    Execute(ExecuteReply),
    #[serde(rename = "complete_reply")]
    Complete(CompleteReply),
    #[serde(rename = "inspect_reply")]
    Inspect(InspectReply),
    #[serde(rename = "is_complete_reply")]
    IsComplete(IsCompleteReply),
    #[serde(rename = "kernel_info_reply")]
    KernelInfo(KernelInfoReply),
    #[serde(rename = "shutdown_reply")]
    Shutdown(ShutdownReply),
    /// Answer to a line that could not be handled at all.
    #[serde(rename = "error")]
    Error(ErrorContent),
}

impl KernelReply {
    /// An error reply for input that is not a valid request.
    pub fn protocol_error(evalue: impl Into<String>) -> Self {
        KernelReply::Error(ErrorContent::new("ProtocolError", evalue))
    }
}

/// Error name, value and traceback, shared by error replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl ErrorContent {
    /// Error whose traceback is just the message itself.
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        let evalue = evalue.into();
        Self {
            ename: ename.into(),
            traceback: vec![evalue.clone()],
            evalue,
        }
    }
}

/// Outcome of an execution.
///
/// `data` carries the published `execute_result` bundle; it is absent for
/// silent executions, errors, and commands with no output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteReply {
    pub status: ReplyStatus,
    pub execution_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MimeBundle>,
    #[serde(flatten)]
    pub error: Option<ErrorContent>,
}

impl ExecuteReply {
    pub fn ok(execution_count: u32, data: Option<MimeBundle>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            execution_count,
            data,
            error: None,
        }
    }

    pub fn error(execution_count: u32, error: ErrorContent) -> Self {
        Self {
            status: ReplyStatus::Error,
            execution_count,
            data: None,
            error: Some(error),
        }
    }

    /// Published `text/plain`, if any.
    pub fn text(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("text/plain"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteReply {
    pub status: ReplyStatus,
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReply {
    pub status: ReplyStatus,
    pub found: bool,
    pub data: MimeBundle,
}

impl InspectReply {
    pub fn not_found() -> Self {
        Self {
            status: ReplyStatus::Ok,
            found: false,
            data: MimeBundle::new(),
        }
    }

    pub fn found(text: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            found: true,
            data: plain_text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsCompleteReply {
    /// `"complete"` or `"incomplete"`.
    pub status: String,
    pub indent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
    pub mimetype: String,
    pub file_extension: String,
    pub pygments_lexer: String,
    pub codemirror_mode: String,
    pub nbconvert_exporter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelInfoReply {
    pub status: ReplyStatus,
    pub protocol_version: String,
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
    pub debugger: bool,
    pub help_links: Vec<HelpLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReply {
    pub status: ReplyStatus,
    pub restart: bool,
}
