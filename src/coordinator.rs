use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::debug;

use crate::engine::{self, SessionConfig};
use crate::error::RummageError;
use crate::results::Outcome;
use crate::traits::Listener;
use crate::value::Value;

/// Lifecycle state of a [`Coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, never run.
    Idle,
    Running,
    /// Last session found something.
    Succeeded,
    /// Last session found nothing.
    Failed,
    /// Single-use coordinator after its session; it can't run again.
    Released,
}

struct Inner {
    state: SessionState,
    config: Option<Arc<SessionConfig>>,
}

/// Runs search sessions with one immutable configuration.
///
/// Created by [`SearchBuilder::build`](crate::SearchBuilder::build). A
/// coordinator runs one session at a time; a second start while running is
/// rejected with [`RummageError::AlreadyRunning`]. Unless built single-use,
/// it can be reused for new targets.
pub struct Coordinator {
    inner: Mutex<Inner>,
}

impl Coordinator {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                config: Some(Arc::new(config)),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Run one session over `target`, or over the configured default target
    /// when `target` is `None`.
    ///
    /// Blocks until every branch has settled. Listeners receive the same
    /// outcome that is returned.
    ///
    /// # Errors
    ///
    /// Only start-time violations are returned as errors:
    /// [`RummageError::NullTarget`], [`RummageError::AlreadyRunning`] and
    /// [`RummageError::Released`]. "Nothing found" is a failed [`Outcome`].
    pub fn search(&self, target: impl Into<Option<Value>>) -> Result<Outcome, RummageError> {
        let (config, target) = self.begin(target.into())?;
        let guard = RunGuard { owner: self };

        let outcome = engine::run(&config, &target);

        guard.finish(&config, &outcome);
        Ok(outcome)
    }

    /// Move to `Running`, resolving the configuration and the target.
    fn begin(&self, target: Option<Value>) -> Result<(Arc<SessionConfig>, Value), RummageError> {
        let mut inner = self.lock();
        let target = target
            .or_else(|| inner.config.as_ref().and_then(|c| c.target.clone()))
            .filter(|t| !t.is_nullish())
            .ok_or(RummageError::NullTarget)?;
        if inner.state == SessionState::Running {
            return Err(RummageError::AlreadyRunning);
        }
        let config = inner.config.clone().ok_or(RummageError::Released)?;
        inner.state = SessionState::Running;
        Ok((config, target))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leaves `Running` even if a listener panics mid-session.
struct RunGuard<'a> {
    owner: &'a Coordinator,
}

impl RunGuard<'_> {
    fn finish(self, config: &SessionConfig, outcome: &Outcome) {
        let mut inner = self.owner.lock();
        inner.state = if outcome.successfully() {
            SessionState::Succeeded
        } else {
            SessionState::Failed
        };
        if config.single_use {
            debug!("single-use coordinator released");
            inner.config = None;
            inner.state = SessionState::Released;
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.owner.lock();
        if inner.state == SessionState::Running {
            inner.state = SessionState::Failed;
        }
    }
}

// ---------------------------------------------------------------------------
// SearchHandle
// ---------------------------------------------------------------------------

type Settled = Result<Vec<Value>, RummageError>;

/// Listener that settles a [`SearchHandle`] from the terminal events.
#[derive(Clone)]
pub(crate) struct Completion(Sender<Settled>);

impl Completion {
    pub fn channel() -> (Self, Receiver<Settled>) {
        let (tx, rx) = mpsc::channel();
        (Self(tx), rx)
    }

    /// Settle with an error raised before the session started.
    pub fn reject(&self, error: RummageError) {
        let _ = self.0.send(Err(error));
    }
}

impl Listener for Completion {
    fn on_success(&self, values: &[Value]) {
        let _ = self.0.send(Ok(values.to_vec()));
    }

    fn on_failure(&self, error: &RummageError) {
        self.reject(error.clone());
    }
}

/// A search running on a background thread.
///
/// Resolves with the matched values, or rejects with the terminal error
/// ([`RummageError::Unresolved`], or a start-time error). Per-node faults
/// never reject the handle; they go to the error listener.
pub struct SearchHandle {
    rx: Receiver<Settled>,
    thread: Option<JoinHandle<()>>,
}

impl SearchHandle {
    pub(crate) fn new(rx: Receiver<Settled>, thread: JoinHandle<()>) -> Self {
        Self {
            rx,
            thread: Some(thread),
        }
    }

    /// Block until the search settles.
    ///
    /// # Errors
    ///
    /// The terminal error of the session, a start-time error, or
    /// [`RummageError::SessionAborted`] if the session thread died without
    /// producing an outcome (a panicking listener, for instance).
    pub fn wait(mut self) -> Settled {
        let result = self.rx.recv().unwrap_or_else(|_| Err(aborted()));
        self.join();
        result
    }

    /// The outcome if the search has already settled, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait).
    pub fn try_wait(&mut self) -> Option<Settled> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(aborted()))
            }
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn aborted() -> RummageError {
    RummageError::SessionAborted("search thread ended without an outcome".into())
}
