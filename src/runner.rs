//! External command execution.
//!
//! Every build tool (cargo, tauri-cli, pnpm, makepkg, the WiX tools) is run
//! through [`run`] with a [`CommandSpec`]. Three observation modes exist:
//!
//! - **Streamed** - stdout and stderr are drained line-by-line while the
//!   child runs, forwarded to the terminal and (ANSI-stripped) to the log.
//!   Mandatory whenever verbose or logging is requested, because this loop
//!   is the only path that reaches the log file.
//! - **Quiet** - stdout discarded, stderr captured into the outcome for
//!   diagnostics. Used for probe commands.
//! - **Passthrough** - parent streams inherited. The default when neither
//!   of the above applies.
//!
//! Failures are classified: a binary that cannot be located is reported
//! distinctly from a located-but-failing command, and a signal-terminated
//! child is reported as interrupted. Whether any of these aborts the
//! pipeline is the calling step's decision, not the runner's.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use thiserror::Error;

use crate::context::BuildContext;
use crate::output::OutputSink;

/// Why a command execution failed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("command not found: {program}")]
    NotFound { program: String },

    #[error("command '{program}' failed with exit code {code}")]
    NonZeroExit { program: String, code: i32 },

    #[error("command '{program}' was interrupted")]
    Interrupted { program: String },

    #[error("i/o error running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a completed (located, exited) command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub succeeded: bool,
    /// Only populated in quiet mode.
    pub captured_stderr: Option<String>,
}

/// One external command invocation.
///
/// Built with discrete steps so optional flags (`-q`, thread counts) are
/// appended explicitly rather than spliced in by positional index.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    use_shell: bool,
    fail_fast: bool,
    suppress_stdout: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
            use_shell: false,
            fail_fast: true,
            suppress_stdout: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `arg` only when `cond` holds. Order-independent with respect
    /// to the other builder calls.
    pub fn arg_if(self, cond: bool, arg: impl Into<String>) -> Self {
        if cond {
            self.arg(arg)
        } else {
            self
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run the command line through the platform shell.
    pub fn shell(mut self) -> Self {
        self.use_shell = true;
        self
    }

    /// A non-zero exit becomes a failed outcome instead of an error.
    pub fn tolerate_failure(mut self) -> Self {
        self.fail_fast = false;
        self
    }

    /// Discard stdout and capture stderr (probe commands).
    pub fn quiet(mut self) -> Self {
        self.suppress_stdout = true;
        self
    }

    /// Human-readable command line for messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn build_command(&self) -> Command {
        let mut cmd = if self.use_shell {
            let line = self.display();
            #[cfg(windows)]
            {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(line);
                c
            }
            #[cfg(not(windows))]
            {
                let mut c = Command::new("sh");
                c.arg("-c").arg(line);
                c
            }
        } else {
            let mut c = Command::new(&self.program);
            c.args(&self.args);
            c
        };
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Check whether a command is available on PATH.
pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl-C handler for the run.
///
/// A terminal SIGINT reaches the whole foreground process group: the child
/// dies of the signal and is classified by [`run`], while this handler keeps
/// the orchestrator itself alive so the control thread can report the
/// interrupt, print the summary and flush the log before exiting with 130.
pub fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(request_interrupt)
}

/// Whether an interrupt arrived since the handler was installed.
pub fn interrupt_requested() -> bool {
    INTERRUPT_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn request_interrupt() {
    INTERRUPT_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(test)]
pub(crate) fn clear_interrupt_request() {
    INTERRUPT_REQUESTED.store(false, Ordering::SeqCst);
}

/// Run one command under the observation mode implied by the context and
/// spec, returning a structured outcome or a classified failure.
pub fn run(
    spec: &CommandSpec,
    ctx: &BuildContext,
    sink: &mut OutputSink,
) -> Result<CommandOutcome, ExecutionError> {
    if ctx.stream_output() {
        run_streamed(spec, sink)
    } else if spec.suppress_stdout {
        run_quiet(spec)
    } else {
        run_passthrough(spec)
    }
}

fn run_streamed(spec: &CommandSpec, sink: &mut OutputSink) -> Result<CommandOutcome, ExecutionError> {
    let mut cmd = spec.build_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| classify_spawn(spec, err))?;

    // Drain both pipes while the child runs. A child that fills an unread
    // pipe buffer would otherwise stall; reader threads feed one channel so
    // the control thread does every terminal/log write in arrival order.
    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        readers.push(std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        readers.push(std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    for line in rx {
        sink.raw_line(&line);
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait().map_err(|err| ExecutionError::Io {
        program: spec.program.clone(),
        source: err,
    })?;
    classify_status(spec, status.code(), None)
}

fn run_quiet(spec: &CommandSpec) -> Result<CommandOutcome, ExecutionError> {
    let mut cmd = spec.build_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = cmd.output().map_err(|err| classify_spawn(spec, err))?;
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    classify_status(spec, output.status.code(), Some(stderr))
}

fn run_passthrough(spec: &CommandSpec) -> Result<CommandOutcome, ExecutionError> {
    let mut cmd = spec.build_command();
    let status = cmd.status().map_err(|err| classify_spawn(spec, err))?;
    classify_status(spec, status.code(), None)
}

fn classify_spawn(spec: &CommandSpec, err: std::io::Error) -> ExecutionError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExecutionError::NotFound {
            program: spec.program.clone(),
        }
    } else {
        ExecutionError::Io {
            program: spec.program.clone(),
            source: err,
        }
    }
}

fn classify_status(
    spec: &CommandSpec,
    code: Option<i32>,
    captured_stderr: Option<String>,
) -> Result<CommandOutcome, ExecutionError> {
    // No exit code means the child was terminated by a signal.
    let Some(code) = code else {
        return Err(ExecutionError::Interrupted {
            program: spec.program.clone(),
        });
    };

    if code != 0 && spec.fail_fast {
        return Err(ExecutionError::NonZeroExit {
            program: spec.program.clone(),
            code,
        });
    }

    Ok(CommandOutcome {
        exit_code: code,
        succeeded: code == 0,
        captured_stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_ctx() -> BuildContext {
        BuildContext::default()
    }

    fn logging_ctx() -> BuildContext {
        BuildContext {
            logging_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_not_found_is_classified() {
        let spec = CommandSpec::new("definitely_not_a_real_command_12345").quiet();
        let err = run(&spec, &quiet_ctx(), &mut OutputSink::terminal_only()).unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound { .. }));
    }

    #[test]
    fn test_non_zero_exit_carries_the_code() {
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 7").quiet();
        let err = run(&spec, &quiet_ctx(), &mut OutputSink::terminal_only()).unwrap_err();
        match err {
            ExecutionError::NonZeroExit { code, .. } => assert_eq!(code, 7),
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[test]
    fn test_tolerated_failure_becomes_outcome() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo oops >&2; exit 3")
            .quiet()
            .tolerate_failure();
        let outcome = run(&spec, &quiet_ctx(), &mut OutputSink::terminal_only()).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.captured_stderr.unwrap().contains("oops"));
    }

    #[test]
    fn test_streamed_lines_reach_log_in_order_and_stripped() {
        let temp = TempDir::new().unwrap();
        let mut sink = OutputSink::open(temp.path(), "test-script").unwrap();
        let log_path = sink.log_path().unwrap().to_path_buf();

        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("printf '\\033[32mfirst\\033[0m\\nsecond\\nthird\\n'");
        let outcome = run(&spec, &logging_ctx(), &mut sink).unwrap();
        assert!(outcome.succeeded);
        drop(sink);

        let content = fs::read_to_string(log_path).unwrap();
        let first = content.find("first").unwrap();
        let second = content.find("second").unwrap();
        let third = content.find("third").unwrap();
        assert!(first < second && second < third);
        assert!(!content.contains('\x1b'));
    }

    #[test]
    fn test_streamed_mode_wins_over_quiet() {
        // Logging demands the streaming loop even for quiet specs; the
        // command must still succeed and report an exit code.
        let temp = TempDir::new().unwrap();
        let mut sink = OutputSink::open(temp.path(), "test-script").unwrap();
        let spec = CommandSpec::new("sh").arg("-c").arg("echo probed").quiet();
        let outcome = run(&spec, &logging_ctx(), &mut sink).unwrap();
        assert!(outcome.succeeded);
        // Streamed mode never captures stderr separately.
        assert!(outcome.captured_stderr.is_none());
    }

    #[test]
    fn test_arg_if_appends_only_when_set() {
        let with = CommandSpec::new("cargo").arg("build").arg_if(true, "-q");
        let without = CommandSpec::new("cargo").arg("build").arg_if(false, "-q");
        assert_eq!(with.display(), "cargo build -q");
        assert_eq!(without.display(), "cargo build");
    }

    #[test]
    fn test_shell_mode_runs_compound_commands() {
        let spec = CommandSpec::new("true && true").shell().quiet();
        let outcome = run(&spec, &quiet_ctx(), &mut OutputSink::terminal_only()).unwrap();
        assert!(outcome.succeeded);
    }

    #[test]
    fn test_env_and_current_dir_apply() {
        let temp = TempDir::new().unwrap();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("test \"$MARKER\" = yes && test -f probe.txt")
            .current_dir(temp.path())
            .env("MARKER", "yes")
            .quiet()
            .tolerate_failure();
        fs::write(temp.path().join("probe.txt"), "x").unwrap();
        let outcome = run(&spec, &quiet_ctx(), &mut OutputSink::terminal_only()).unwrap();
        assert!(outcome.succeeded);
    }
}
