//! exec
//!
//! Running the `p4` client as a black-box subprocess.
//!
//! # Modules
//!
//! - [`channel`] - command line, environment, stdin/stdout plumbing and
//!   outcome classification
//! - [`wait`] - bounded, cancellable waiting with guaranteed kill and reap
//! - [`cancel`] - cooperative cancellation token
//! - [`charset`] - `P4CHARSET` encoding of stdin and decoding of output

pub mod cancel;
pub mod channel;
pub mod charset;
pub mod wait;

pub use cancel::{CancellationToken, Cancelled};
pub use channel::{
    CommandRecorder, CommandSpec, ExecError, ExecOutcome, ExecResult, ProcessExecutionChannel,
    RefusalDetector, SubstringRefusal, SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
