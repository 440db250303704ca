//! Request/reply mailbox between a front end and a single worker.
//!
//! Front ends [`send`](Mailbox::send) requests from any task and get a
//! oneshot receiver for the reply. The worker polls one request at a time
//! and must [`reply`](Mailbox::reply) before it can poll the next, so
//! requests are handled strictly in FIFO order with no pipelining.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use crate::types::LeanError;

struct MailboxInner<Req, Rep> {
    queue: VecDeque<(Req, oneshot::Sender<Rep>)>,
    pending: Option<oneshot::Sender<Rep>>,
}

pub struct Mailbox<Req, Rep> {
    inner: Mutex<MailboxInner<Req, Rep>>,
    stopped: AtomicBool,
    notify: Notify,
}

impl<Req, Rep> Default for Mailbox<Req, Rep> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Rep> Mailbox<Req, Rep> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MailboxInner {
                queue: VecDeque::new(),
                pending: None,
            }),
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MailboxInner<Req, Rep>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `request`. The receiver resolves with the worker's reply, or
    /// errors if the mailbox shuts down before the request is handled.
    pub fn send(&self, request: Req) -> Result<oneshot::Receiver<Rep>, LeanError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if self.should_stop() {
                return Err(LeanError::SessionClosed);
            }
            inner.queue.push_back((request, tx));
        }
        self.notify.notify_one();
        Ok(rx)
    }

    /// Take the next request without waiting.
    ///
    /// Returns `None` when the queue is empty, a reply is still outstanding,
    /// or the mailbox has stopped.
    pub fn try_poll(&self) -> Option<Req> {
        let mut inner = self.lock();
        if self.should_stop() || inner.pending.is_some() {
            return None;
        }
        let (request, tx) = inner.queue.pop_front()?;
        inner.pending = Some(tx);
        Some(request)
    }

    /// Wait up to `timeout` for the next request.
    pub async fn poll(&self, timeout: Duration) -> Option<Req> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(request) = self.try_poll() {
                return Some(request);
            }
            if self.should_stop() {
                return None;
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    /// Deliver the reply for the outstanding request.
    ///
    /// Returns `false` if no request was outstanding. A reply whose
    /// requester has gone away is dropped.
    pub fn reply(&self, reply: Rep) -> bool {
        let pending = self.lock().pending.take();
        self.notify.notify_one();
        match pending {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    tracing::debug!("Requester dropped before reply was delivered");
                }
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Number of requests waiting to be polled.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn should_stop(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop the mailbox. Later sends fail and polls return `None`
    /// immediately. Queued and outstanding requests are dropped, closing
    /// their receivers.
    pub fn shutdown(&self) {
        let (queued, pending) = {
            let mut inner = self.lock();
            self.stopped.store(true, Ordering::Release);
            (std::mem::take(&mut inner.queue), inner.pending.take())
        };
        if !queued.is_empty() || pending.is_some() {
            tracing::debug!(
                queued = queued.len(),
                pending = pending.is_some(),
                "Dropped unanswered requests on shutdown"
            );
        }
        drop(queued);
        drop(pending);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }
}
