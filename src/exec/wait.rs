//! exec::wait
//!
//! Bounded, cancellable waiting on a child process.
//!
//! # Design
//!
//! [`RunningProcess`] owns a spawned child. Waiting races three things:
//! the child exiting, a deadline passing and a [`CancellationToken`]
//! being raised. The first to happen decides the [`WaitOutcome`].
//!
//! Cleanup runs when the `RunningProcess` is dropped, on every exit path:
//! 1. Before-interrupt listeners are notified (output readers stop keeping
//!    data)
//! 2. The child is killed if still running, then reaped
//!
//! The two steps are independent and always run in that order, so no
//! zombie or stray process outlives the call that spawned it.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::cancel::CancellationToken;

/// Default interval between exit checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child exited on its own.
    Exited(ExitStatus),
    /// The deadline passed first.
    TimedOut,
    /// The caller cancelled first.
    Cancelled,
}

type Listener = Box<dyn FnOnce() + Send>;

/// A spawned child with guaranteed cleanup.
pub struct RunningProcess {
    child: Child,
    status: Option<ExitStatus>,
    listeners: Vec<Listener>,
    poll_interval: Duration,
}

impl std::fmt::Debug for RunningProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningProcess")
            .field("pid", &self.child.id())
            .field("status", &self.status)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl RunningProcess {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            status: None,
            listeners: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Register a listener run just before the process is closed.
    pub fn on_before_interrupt(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Access the child, e.g. to take its pipes.
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status, once the child has been reaped.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Wait until the child exits, `deadline` passes, or `cancel` is raised.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS wait call fails.
    pub fn wait_until(
        &mut self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> io::Result<WaitOutcome> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.status = Some(status);
                return Ok(WaitOutcome::Exited(status));
            }
            if cancel.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Wait for at most `timeout`.
    pub fn wait_timeout(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> io::Result<WaitOutcome> {
        self.wait_until(Instant::now() + timeout, cancel)
    }

    fn close(&mut self) {
        for listener in self.listeners.drain(..) {
            listener();
        }

        if self.status.is_some() {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
            }
            Ok(None) | Err(_) => {
                debug!(pid = self.child.id(), "killing client process");
                let _ = self.child.kill();
                self.status = self.child.wait().ok();
            }
        }
    }
}

impl Drop for RunningProcess {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn sleeper(secs: &str) -> RunningProcess {
        RunningProcess::new(Command::new("sleep").arg(secs).spawn().unwrap())
    }

    #[test]
    fn exits_before_deadline() {
        let mut process = RunningProcess::new(Command::new("true").spawn().unwrap());
        let outcome = process
            .wait_timeout(Duration::from_secs(5), &CancellationToken::new())
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Exited(s) if s.success()));
    }

    #[test]
    fn deadline_wins_and_drop_kills() {
        let mut process = sleeper("30");
        let started = Instant::now();
        let outcome = process
            .wait_timeout(Duration::from_millis(100), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));

        drop(process);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_wins() {
        let mut process = sleeper("30");
        let token = CancellationToken::new();
        token.cancel();
        let outcome = process
            .wait_timeout(Duration::from_secs(30), &token)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[test]
    fn listeners_run_on_close() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let mut process = sleeper("30");
        process.on_before_interrupt(move || flag.store(true, Ordering::SeqCst));
        drop(process);
        assert!(fired.load(Ordering::SeqCst));
    }
}
