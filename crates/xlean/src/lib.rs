//! Lean 4 notebook kernel.
//!
//! [`LeanKernel`](kernel::LeanKernel) turns a `lean_repl::Session` into
//! notebook replies; [`KernelHandle`](server::KernelHandle) runs it on a
//! worker task fed through a mailbox, and
//! [`serve_lines`](server::serve_lines) drives it from JSON lines.

pub mod config;
pub mod kernel;
pub mod replies;
pub mod server;

pub use kernel::LeanKernel;
pub use replies::{KernelReply, KernelRequest};
pub use server::{serve_lines, KernelHandle};
