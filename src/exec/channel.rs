//! exec::channel
//!
//! Spawning the `p4` client and classifying what happened.
//!
//! # Contract
//!
//! [`ProcessExecutionChannel::run`] turns one [`CommandSpec`] into exactly
//! one terminal outcome:
//!
//! - `Ok(result)` with [`ExecOutcome::Completed`] - the client exited
//! - `Ok(result)` with [`ExecOutcome::Refused`] - the client exited but
//!   reported that it could not reach the server
//! - `Ok(result)` with [`ExecOutcome::TimedOut`] - the deadline passed; the
//!   process was killed, its output discarded, and the exit code is
//!   [`TIMEOUT_EXIT_CODE`]
//! - `Ok(result)` with [`ExecOutcome::SpawnFailed`] - the executable could
//!   not be started
//! - `Ok(result)` with [`ExecOutcome::Failed`] - the OS wait failed
//! - `Err(Cancelled)` - the caller cancelled, before or during the run
//!
//! Nothing is retried here.
//!
//! # Process Setup
//!
//! The command line is `<executable> [-zprog=<tag>_<cmd>] <connection
//! flags> <args>`. The working directory is the connection root and `PWD`
//! is set to it: on POSIX the client uses `PWD`, not the real cwd, when it
//! searches upward for P4CONFIG files. Injected environment overrides are
//! applied last.
//!
//! stdin, when given, is encoded with the connection charset and written
//! then closed from a helper thread; the client waits for EOF before it
//! answers. stdout and stderr are drained by reader threads so the pipes
//! never fill.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cancel::{CancellationToken, Cancelled};
use super::charset::Charset;
use super::wait::{RunningProcess, WaitOutcome, DEFAULT_POLL_INTERVAL};
use crate::core::env::Environment;
use crate::core::params::P4Field;

/// Exit code reported when a command did not finish before its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = -2;

/// Exit code reported when the executable could not be started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// stderr text that replaces client output after a timeout.
pub const DISCONNECTED_MESSAGE: &str =
    "Perforce is not responding; the command was terminated and the connection is considered offline";

/// stderr marker the client prints when it cannot reach the server.
pub const CONNECT_REFUSED: &str = "Connect to server failed";

/// Errors carried inside an [`ExecResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecError {
    #[error("failed to start '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("command did not finish within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("server connection refused: {stderr}")]
    Refused { stderr: String },

    #[error("failed waiting for the client process: {message}")]
    Io { message: String },
}

/// Terminal classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecOutcome {
    Completed,
    Refused,
    TimedOut,
    SpawnFailed,
    Failed,
}

/// Output of one client invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ExecError>,
}

impl ExecResult {
    pub fn outcome(&self) -> ExecOutcome {
        match &self.error {
            None => ExecOutcome::Completed,
            Some(ExecError::Refused { .. }) => ExecOutcome::Refused,
            Some(ExecError::Timeout { .. }) => ExecOutcome::TimedOut,
            Some(ExecError::Spawn { .. }) => ExecOutcome::SpawnFailed,
            Some(ExecError::Io { .. }) => ExecOutcome::Failed,
        }
    }

    /// The client ran and exited with status 0.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    fn timeout(timeout: Duration) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: DISCONNECTED_MESSAGE.to_string(),
            error: Some(ExecError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn spawn_failure(program: &str, err: &io::Error) -> Self {
        let message = if err.kind() == io::ErrorKind::NotFound {
            format!("invalid Perforce executable name or path ({})", err)
        } else {
            err.to_string()
        };
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: message.clone(),
            error: Some(ExecError::Spawn {
                program: program.to_string(),
                message,
            }),
        }
    }

    fn io_failure(err: &io::Error) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: err.to_string(),
            error: Some(ExecError::Io {
                message: err.to_string(),
            }),
        }
    }
}

/// Decides whether client stderr means "could not reach the server".
///
/// The exact client wording varies across versions and localizations, so
/// the check is pluggable.
pub trait RefusalDetector: Send + Sync {
    fn is_refusal(&self, stderr: &str) -> bool;
}

/// Substring match on stderr.
#[derive(Debug, Clone)]
pub struct SubstringRefusal {
    marker: String,
}

impl SubstringRefusal {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for SubstringRefusal {
    fn default() -> Self {
        Self::new(CONNECT_REFUSED)
    }
}

impl RefusalDetector for SubstringRefusal {
    fn is_refusal(&self, stderr: &str) -> bool {
        stderr.contains(&self.marker)
    }
}

/// Collects the caller arguments of every command run through a channel.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    commands: Arc<Mutex<Vec<String>>>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, args: &[String]) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(args.join(" "));
        }
    }

    /// Commands recorded so far, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

/// Everything needed for one invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub working_dir: PathBuf,
    /// Fixed connection flags (`-p`, `-c`, ...), placed before `args`.
    pub connection_args: Vec<String>,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    /// `P4CHARSET` name used for stdin and output.
    pub charset: Option<String>,
    /// Extra environment for this command only.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(working_dir: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.into(),
            connection_args: Vec::new(),
            args,
            stdin: None,
            charset: None,
            env: Vec::new(),
            timeout,
        }
    }

    /// Command line as shown in logs, with the password hidden.
    pub fn presentation(&self, program: &str) -> String {
        let mut out = String::from(program);
        let mut hide_next = false;
        for arg in self.connection_args.iter().chain(&self.args) {
            out.push(' ');
            if hide_next {
                out.push_str("*****");
                hide_next = false;
                continue;
            }
            out.push_str(arg);
            if Some(arg.trim()) == P4Field::Password.flag() {
                hide_next = true;
            }
        }
        out
    }
}

/// Launches the client executable.
pub struct ProcessExecutionChannel {
    executable: String,
    program_tag: Option<String>,
    environment: Environment,
    refusal: Arc<dyn RefusalDetector>,
    recorder: Option<CommandRecorder>,
    poll_interval: Duration,
}

impl fmt::Debug for ProcessExecutionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessExecutionChannel")
            .field("executable", &self.executable)
            .field("program_tag", &self.program_tag)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ProcessExecutionChannel {
    pub fn new(executable: impl Into<String>, environment: Environment) -> Self {
        Self {
            executable: executable.into(),
            program_tag: None,
            environment,
            refusal: Arc::new(SubstringRefusal::default()),
            recorder: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Send `-zprog=<tag>_<command>` with every command.
    pub fn with_program_tag(mut self, tag: Option<String>) -> Self {
        self.program_tag = tag;
        self
    }

    pub fn with_refusal_detector(mut self, detector: Arc<dyn RefusalDetector>) -> Self {
        self.refusal = detector;
        self
    }

    pub fn with_recorder(mut self, recorder: CommandRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    fn build_command(&self, spec: &CommandSpec, has_stdin: bool) -> Command {
        let mut cmd = Command::new(&self.executable);
        if let Some(tag) = &self.program_tag {
            match spec.args.first() {
                Some(name) => cmd.arg(format!("-zprog={}_{}", tag, name)),
                None => cmd.arg(format!("-zprog={}", tag)),
            };
        }
        cmd.args(&spec.connection_args)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .env("PWD", &spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .envs(self.environment.overrides())
            .stdin(if has_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run one command to a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled)` if `cancel` was raised before the spawn or
    /// while waiting. Every other outcome is an `Ok(ExecResult)`.
    pub fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<ExecResult, Cancelled> {
        cancel.check()?;

        let charset = match Charset::from_p4_name(spec.charset.as_deref()) {
            Ok(charset) => charset,
            Err(e) => {
                warn!(error = %e, "falling back to utf8");
                Charset::Utf8
            }
        };

        let input = spec.stdin.as_deref().map(|text| {
            charset.encode(text).unwrap_or_else(|e| {
                warn!(error = %e, "stdin not encodable, sending utf8");
                text.as_bytes().to_vec()
            })
        });

        let mut cmd = self.build_command(spec, input.is_some());
        debug!(
            command = %spec.presentation(&self.executable),
            cwd = %spec.working_dir.display(),
            timeout_ms = spec.timeout.as_millis() as u64,
            "running p4"
        );
        if let Some(recorder) = &self.recorder {
            recorder.record(&spec.args);
        }

        let deadline = Instant::now() + spec.timeout;
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(error = %e, "spawn failed");
                return Ok(ExecResult::spawn_failure(&self.executable, &e));
            }
        };

        let mut process = RunningProcess::new(child).with_poll_interval(self.poll_interval);
        let output = OutputCollector::start(
            process.child_mut().stdout.take(),
            process.child_mut().stderr.take(),
        );
        let discard = output.discard_flag();
        process.on_before_interrupt(move || discard.store(true, Ordering::SeqCst));

        if let (Some(bytes), Some(stdin)) = (input, process.child_mut().stdin.take()) {
            feed_stdin(stdin, bytes);
        }

        let status = match process.wait_until(deadline, cancel) {
            Ok(WaitOutcome::Exited(status)) => status,
            Ok(WaitOutcome::TimedOut) => {
                info!(timeout_ms = spec.timeout.as_millis() as u64, "p4 timed out");
                return Ok(ExecResult::timeout(spec.timeout));
            }
            Ok(WaitOutcome::Cancelled) => return Err(Cancelled),
            Err(e) => return Ok(ExecResult::io_failure(&e)),
        };

        let (stdout, stderr) = match output.finish(deadline, cancel, self.poll_interval) {
            Drained::Done { stdout, stderr } => (stdout, stderr),
            Drained::TimedOut => {
                info!("p4 output still open at deadline");
                return Ok(ExecResult::timeout(spec.timeout));
            }
            Drained::Cancelled => return Err(Cancelled),
        };

        let stdout = charset.decode(&stdout);
        let stderr = charset.decode(&stderr);
        let exit_code = exit_code_of(status);

        let error = if self.refusal.is_refusal(&stderr) {
            Some(ExecError::Refused {
                stderr: stderr.clone(),
            })
        } else {
            None
        };

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
            error,
        })
    }
}

fn feed_stdin(mut stdin: std::process::ChildStdin, bytes: Vec<u8>) {
    thread::spawn(move || {
        if let Err(e) = stdin.write_all(&bytes) {
            if e.kind() != io::ErrorKind::BrokenPipe {
                debug!(error = %e, "writing client stdin failed");
            }
        }
        // stdin is dropped (closed) here; the client waits for EOF
    });
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(SPAWN_FAILURE_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SPAWN_FAILURE_EXIT_CODE)
}

enum Drained {
    Done { stdout: Vec<u8>, stderr: Vec<u8> },
    TimedOut,
    Cancelled,
}

/// Reader threads for stdout and stderr.
struct OutputCollector {
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    discard: Arc<AtomicBool>,
}

impl OutputCollector {
    fn start(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        let discard = Arc::new(AtomicBool::new(false));
        Self {
            stdout: stdout.map(|pipe| spawn_reader(pipe, Arc::clone(&discard))),
            stderr: stderr.map(|pipe| spawn_reader(pipe, Arc::clone(&discard))),
            discard,
        }
    }

    fn discard_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.discard)
    }

    /// Wait for both readers to reach EOF, bounded by the same deadline as
    /// the process. Readers still running at the deadline are abandoned.
    fn finish(
        mut self,
        deadline: Instant,
        cancel: &CancellationToken,
        poll: Duration,
    ) -> Drained {
        let finished = |h: &Option<JoinHandle<Vec<u8>>>| h.as_ref().map_or(true, |h| h.is_finished());
        loop {
            if finished(&self.stdout) && finished(&self.stderr) {
                return Drained::Done {
                    stdout: join_reader(self.stdout.take()),
                    stderr: join_reader(self.stderr.take()),
                };
            }
            if cancel.is_cancelled() {
                return Drained::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return Drained::TimedOut;
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
    discard: Arc<AtomicBool>,
) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if discard.load(Ordering::SeqCst) {
                        collected.clear();
                        break;
                    }
                    collected.extend_from_slice(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        collected
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(args: &[&str]) -> CommandSpec {
        CommandSpec::new(
            std::env::temp_dir(),
            args.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn presentation_masks_password() {
        let mut s = spec(&["info"]);
        s.connection_args = vec!["-p".into(), "host:1666".into(), "-P".into(), "hunter2".into()];
        let shown = s.presentation("p4");
        assert_eq!(shown, "p4 -p host:1666 -P ***** info");
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn substring_refusal() {
        let detector = SubstringRefusal::default();
        assert!(detector.is_refusal("Perforce client error:\n\tConnect to server failed; check $P4PORT."));
        assert!(!detector.is_refusal("File(s) not on client."));
    }

    #[test]
    fn spawn_failure_is_structured() {
        let channel = ProcessExecutionChannel::new(
            "/definitely/not/a/p4/binary",
            Environment::isolated(),
        );
        let result = channel.run(&spec(&["info"]), &CancellationToken::new()).unwrap();
        assert_eq!(result.outcome(), ExecOutcome::SpawnFailed);
        assert_eq!(result.exit_code, SPAWN_FAILURE_EXIT_CODE);
    }

    #[test]
    fn cancelled_before_spawn() {
        let recorder = CommandRecorder::new();
        let channel = ProcessExecutionChannel::new("p4", Environment::isolated())
            .with_recorder(recorder.clone());
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(channel.run(&spec(&["info"]), &token), Err(Cancelled));
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn outcome_classification() {
        let ok = ExecResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        };
        assert!(ok.is_success());
        assert_eq!(ok.outcome(), ExecOutcome::Completed);

        let timed_out = ExecResult::timeout(Duration::from_millis(5));
        assert!(timed_out.timed_out());
        assert_eq!(timed_out.outcome(), ExecOutcome::TimedOut);
        assert_eq!(timed_out.stderr, DISCONNECTED_MESSAGE);
    }
}
