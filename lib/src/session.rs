// Copyright (c) 2024-2025 The Tapmint Project

//! Reader session lifecycle
//!
//! At most one session is active per process; the guard is released on
//! close, drop, cancel, timeout or error, so a dangling session cannot
//! outlive its operation. A 60-second watchdog bounds tag detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::transport::Connect;
use crate::Error;

/// Hard session watchdog, from the platform's tag-reader limit
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Process-wide single-session guard
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Cancellation flag shared between a session and its owner
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Session completion event, consumed by the orchestrator
pub enum SessionEvent<T> {
    /// Tag detected and connected
    TagReady(T),
    /// Cancelled by the user before a tag arrived
    UserCancelled,
    /// Watchdog elapsed
    Timeout,
    /// Reader-layer failure
    Error(Error),
}

/// An exclusive reader session.
///
/// The session layer is I/O only; the multi-APDU dance belongs to the
/// command handler.
pub struct ReaderSession {
    cancel: CancelToken,
    released: bool,
}

impl ReaderSession {
    /// Begin a session, enforcing the single-session invariant
    pub fn begin() -> Result<Self, Error> {
        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Validation("a reader session is already active".into()));
        }

        debug!("reader session started");

        Ok(Self {
            cancel: CancelToken::default(),
            released: false,
        })
    }

    /// Cancellation handle for the UI / signal handler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Poll for a tag and connect to it, bounded by the watchdog
    pub async fn wait_for_tag<C: Connect>(&mut self, connector: &C) -> SessionEvent<C::Transport> {
        let connect = connector.connect(self.cancel.clone());

        match tokio::time::timeout(SESSION_TIMEOUT, connect).await {
            Err(_) => {
                debug!("reader session watchdog elapsed");
                SessionEvent::Timeout
            }
            Ok(Err(Error::UserCancelled)) => SessionEvent::UserCancelled,
            Ok(Err(e)) => SessionEvent::Error(e),
            Ok(Ok(t)) => {
                debug!("tag connected");
                SessionEvent::TagReady(t)
            }
        }
    }

    /// Terminate the session and release the guard
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.cancel.cancel();
            SESSION_ACTIVE.store(false, Ordering::SeqCst);
            debug!("reader session closed");
        }
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.release();
    }
}
