use async_trait::async_trait;

use crate::types::LeanError;

/// A running Lean engine that evaluates one command document at a time.
///
/// Implementations own whatever native resource backs the engine (a REPL
/// child process, an in-memory mock). The session bridge never looks inside
/// the documents beyond the command codec.
#[async_trait]
pub trait Engine: Send {
    /// Send one serialized [`ReplCommand`](crate::ReplCommand) and return the
    /// raw response document.
    async fn send(&mut self, request: &str) -> Result<String, LeanError>;

    /// Release the underlying resource. Called at most once by
    /// [`ManagedHandle`](crate::ManagedHandle).
    async fn shutdown(&mut self);
}

#[async_trait]
impl<E: Engine + ?Sized> Engine for Box<E> {
    async fn send(&mut self, request: &str) -> Result<String, LeanError> {
        (**self).send(request).await
    }

    async fn shutdown(&mut self) {
        (**self).shutdown().await
    }
}
