//! Ownership of a session's engine handle.
//!
//! A [`ManagedHandle`] moves through
//! `Uninitialized → Initializing → Ready → Closed`. Initialization happens at
//! most once and concurrent attempts serialize; closing releases the engine
//! exactly once, and every later access fails with
//! [`LeanError::SessionClosed`] instead of touching a released engine.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::engine::Engine;
use crate::types::LeanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandleState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Closed = 3,
}

impl HandleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => HandleState::Uninitialized,
            1 => HandleState::Initializing,
            2 => HandleState::Ready,
            _ => HandleState::Closed,
        }
    }
}

/// Single owner of an engine handle.
pub struct ManagedHandle<E> {
    state: AtomicU8,
    engine: Mutex<Option<E>>,
}

impl<E: Engine> ManagedHandle<E> {
    /// An uninitialized handle; call [`init`](Self::init) before use.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HandleState::Uninitialized as u8),
            engine: Mutex::new(None),
        }
    }

    /// A handle that is already `Ready` with `engine`.
    pub fn ready(engine: E) -> Self {
        Self {
            state: AtomicU8::new(HandleState::Ready as u8),
            engine: Mutex::new(Some(engine)),
        }
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: HandleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Initialize the engine with `factory` unless already initialized.
    ///
    /// Returns `true` if this call created the engine. A caller that finds
    /// the handle `Ready` returns `false` without running its factory. If the
    /// factory fails the handle goes back to `Uninitialized`.
    pub async fn init<F, Fut>(&self, factory: F) -> Result<bool, LeanError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<E, LeanError>>,
    {
        let mut slot = self.engine.lock().await;
        match self.state() {
            HandleState::Ready => return Ok(false),
            HandleState::Closed => return Err(LeanError::SessionClosed),
            HandleState::Uninitialized | HandleState::Initializing => {}
        }

        self.set_state(HandleState::Initializing);
        match factory().await {
            Ok(engine) => {
                *slot = Some(engine);
                self.set_state(HandleState::Ready);
                Ok(true)
            }
            Err(e) => {
                self.set_state(HandleState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Exclusive access to the engine.
    ///
    /// Waits for an in-flight initialization or command to finish. Fails with
    /// `SessionClosed` once the handle is closed (or was never initialized).
    pub async fn acquire(&self) -> Result<MappedMutexGuard<'_, E>, LeanError> {
        let slot = self.engine.lock().await;
        MutexGuard::try_map(slot, |engine| engine.as_mut()).map_err(|_| LeanError::SessionClosed)
    }

    /// Release the engine. Returns `true` only for the call that actually
    /// shut it down; every other call is a no-op.
    pub async fn close(&self) -> bool {
        let mut slot = self.engine.lock().await;
        self.set_state(HandleState::Closed);
        match slot.take() {
            Some(mut engine) => {
                engine.shutdown().await;
                true
            }
            None => false,
        }
    }
}

impl<E: Engine> Default for ManagedHandle<E> {
    fn default() -> Self {
        Self::new()
    }
}
