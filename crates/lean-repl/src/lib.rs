//! Async session bridge to the Lean 4 REPL.
//!
//! A [`Session`] owns one Lean engine (by default a `lake exe repl` child
//! process), threads the environment id from each successful command into
//! the next one, and answers inspection, completion and completeness queries
//! for notebook front ends. A [`Mailbox`] lets those front ends hand requests
//! to a single worker task one at a time.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lean_repl::{ReplConfig, ReplResponse, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReplConfig::with_bundled_repl()
//!     .ok_or("Lean REPL not found; set LEAN_REPL_PROJECT")?;
//!
//! let mut session = Session::open(&config).await?;
//! if let ReplResponse::Success { output, .. } = session.execute("#eval 1 + 1").await? {
//!     print!("{output}");
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! Tests and embedders can drive a session with any [`Engine`], e.g.
//! [`MockEngine`]:
//!
//! ```rust
//! use lean_repl::{MockEngine, Session};
//!
//! # async fn example() -> Result<(), lean_repl::LeanError> {
//! let mut engine = MockEngine::new();
//! engine.add_response("#eval 1 + 1", r#"{"env":1,"messages":[{"severity":"info","data":"2"}]}"#);
//!
//! let mut session = Session::with_engine(engine);
//! session.execute("#eval 1 + 1").await?;
//! assert_eq!(session.current_env(), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod lexer;
pub mod lifecycle;
pub mod mailbox;
pub mod mocks;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod types;
pub mod worker;

pub use engine::Engine;
pub use lexer::{CandidateSource, CompletionResult, Completeness, IdentifierSpan, StaticVocabulary};
pub use lifecycle::{HandleState, ManagedHandle};
pub use mailbox::Mailbox;
pub use mocks::MockEngine;
pub use protocol::{ReplCommand, ReplMessage, ReplResponse, Severity, Sorry};
pub use session::Session;
pub use types::{discover_repl, Goal, LeanError, ReplConfig};
pub use worker::LeanWorker;
