//! Worker task and JSON-lines driver for a [`LeanKernel`].

use std::sync::Arc;
use std::time::Duration;

use lean_repl::{Engine, LeanError, Mailbox};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::kernel::LeanKernel;
use crate::replies::{ErrorContent, KernelReply, KernelRequest};

type KernelMailbox = Mailbox<KernelRequest, KernelReply>;

/// A kernel running on its own tokio task.
///
/// Requests are queued in a [`Mailbox`] and handled one at a time, in order.
/// The task polls every `poll_interval` so it notices shutdown promptly.
pub struct KernelHandle<E: Engine + 'static> {
    mailbox: Arc<KernelMailbox>,
    task: Option<JoinHandle<LeanKernel<E>>>,
}

impl<E: Engine + 'static> KernelHandle<E> {
    pub fn spawn(kernel: LeanKernel<E>, poll_interval: Duration) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        let task = tokio::spawn(run_worker(kernel, Arc::clone(&mailbox), poll_interval));
        tracing::debug!(poll_ms = poll_interval.as_millis() as u64, "Kernel worker started");
        Self {
            mailbox,
            task: Some(task),
        }
    }

    /// Send `request` and wait for its reply.
    ///
    /// Fails with `SessionClosed` if the handle is shutting down or the
    /// request was dropped unanswered.
    pub async fn request(&self, request: KernelRequest) -> Result<KernelReply, LeanError> {
        let reply = self.mailbox.send(request)?;
        reply.await.map_err(|_| LeanError::SessionClosed)
    }

    /// Stop the worker, wait for it to exit, then shut the kernel down.
    ///
    /// Returns whether the kernel's session was released by this call; it
    /// may already have been released by a `shutdown_request`.
    pub async fn shutdown(mut self) -> bool {
        self.mailbox.shutdown();
        let Some(task) = self.task.take() else {
            return false;
        };

        match task.await {
            Ok(mut kernel) => kernel.shutdown().await,
            Err(e) => {
                tracing::error!(error = %e, "Kernel worker task failed");
                false
            }
        }
    }
}

impl<E: Engine + 'static> Drop for KernelHandle<E> {
    fn drop(&mut self) {
        // The worker exits on its next poll; the engine is released when the
        // kernel it returns is dropped.
        self.mailbox.shutdown();
    }
}

async fn run_worker<E: Engine>(
    mut kernel: LeanKernel<E>,
    mailbox: Arc<KernelMailbox>,
    poll_interval: Duration,
) -> LeanKernel<E> {
    while !mailbox.should_stop() {
        let Some(request) = mailbox.poll(poll_interval).await else {
            continue;
        };
        tracing::trace!(queued = mailbox.queued(), "Handling request");
        let reply = kernel.handle(request).await;
        if !mailbox.reply(reply) {
            tracing::debug!("Reply discarded after shutdown");
        }
    }
    tracing::debug!("Kernel worker stopped");
    kernel
}

/// Serve JSON-lines requests from `reader`, writing one reply line each.
///
/// Returns after a `shutdown_request` has been answered or at end of input.
/// Lines that are not valid requests get a `ProtocolError` reply and the
/// loop continues.
pub async fn serve_lines<E, R, W>(
    handle: &KernelHandle<E>,
    reader: R,
    mut writer: W,
) -> Result<(), LeanError>
where
    E: Engine + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = reader;
    let mut buf = Vec::new();
    let mut handled = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let (reply, stop) = match serde_json::from_slice::<KernelRequest>(line) {
            Ok(request) => {
                let stop = request.is_shutdown();
                match handle.request(request).await {
                    Ok(reply) => (reply, stop),
                    Err(e) => (
                        KernelReply::Error(ErrorContent::new("KernelError", e.to_string())),
                        true,
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request line");
                (KernelReply::protocol_error(format!("Invalid request: {e}")), false)
            }
        };

        let encoded = serde_json::to_string(&reply)
            .map_err(|e| LeanError::Transport(format!("failed to encode reply: {e}")))?;
        writer.write_all(encoded.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;

        if stop {
            break;
        }
    }

    tracing::info!(handled, "Request stream finished");
    Ok(())
}
