//! Parsing a line into pipe-connected stages and running them to completion.

use crate::error::{Op, Result, ShellError};
use crate::launcher::{ExitCode, Launched, cloexec_pipe, exit_code, launch, retry_eintr};
use crate::tokenizer::{PIPE, WHITESPACE, tokenize};
use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use std::borrow::Cow;
use std::ffi::CString;
use std::os::fd::OwnedFd;

/// Consecutive failed waits after which reaping gives up.
const MAX_WAIT_ANOMALIES: usize = 8;

/// One executable plus its arguments, ready for `execv`.
///
/// `argv[0]` is the program path exactly as typed; no search path is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub(crate) program: CString,
    pub(crate) argv: Vec<CString>,
}

impl Stage {
    /// Build a stage from whitespace-separated words, the first being the program.
    pub fn from_tokens(tokens: &[&str]) -> Result<Self> {
        let program = *tokens.first().ok_or(ShellError::PipeSyntax)?;
        let argv = tokens
            .iter()
            .map(|t| CString::new(*t))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ShellError::ExecFailure {
                program: program.replace('\0', "\\0"),
                errno: Errno::EINVAL,
            })?;
        Ok(Self {
            program: argv[0].clone(),
            argv,
        })
    }

    pub fn program_name(&self) -> Cow<'_, str> {
        self.program.to_string_lossy()
    }

    /// Arguments including the program itself, lossily decoded.
    pub fn args(&self) -> Vec<Cow<'_, str>> {
        self.argv.iter().map(|a| a.to_string_lossy()).collect()
    }
}

/// An ordered, non-empty list of stages connected by anonymous pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// What happened while running a pipeline.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Stages that were forked successfully.
    pub launched: usize,
    /// Children collected, whether by a standalone wait or the reap loop.
    pub reaped: usize,
    /// Exit code of the last stage, when it ran and could be collected.
    pub exit_code: Option<ExitCode>,
    /// Failures the user needs to hear about; none of them aborted the run.
    pub errors: Vec<ShellError>,
}

impl Pipeline {
    /// Split `line` on `|` and every stage on whitespace.
    ///
    /// Rejects empty stages (leading, trailing or doubled pipe symbols, or a
    /// blank line) with [`ShellError::PipeSyntax`] before anything is spawned.
    pub fn parse(line: &str, max_tokens: usize) -> Result<Self> {
        let pipes = line.matches(PIPE).count();
        let segments = tokenize(line, PIPE, max_tokens)?;
        if segments.is_empty() || segments.len() != pipes + 1 {
            return Err(ShellError::PipeSyntax);
        }

        let stages = segments
            .into_iter()
            .map(|segment| {
                let words = tokenize(segment, WHITESPACE, max_tokens)?;
                if words.is_empty() {
                    return Err(ShellError::PipeSyntax);
                }
                Stage::from_tokens(&words)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage with the shell's own stdin and stdout at the ends.
    pub fn execute(&self) -> Outcome {
        self.execute_with_redefined_output(None)
    }

    /// Run every stage, sending the last one's stdout to `final_stdout` when
    /// given.
    ///
    /// Returns only once every child forked here has been reaped. A stage that
    /// fails to launch is recorded in the outcome and the remaining stages
    /// still run; its neighbours simply see a closed pipe.
    pub fn execute_with_redefined_output(&self, final_stdout: Option<OwnedFd>) -> Outcome {
        let mut outcome = Outcome::default();
        let mut final_stdout = final_stdout;
        let mut upstream: Option<OwnedFd> = None;
        let mut last_pid = None;
        let last = self.stages.len() - 1;

        for (i, stage) in self.stages.iter().enumerate() {
            let (next_upstream, downstream) = if i < last {
                match cloexec_pipe() {
                    Ok((read, write)) => (Some(read), Some(write)),
                    Err(e) => {
                        outcome.errors.push(e);
                        break;
                    }
                }
            } else {
                (None, final_stdout.take())
            };

            // launch takes both ends and closes them in the parent
            match launch(stage, upstream.take(), downstream) {
                Ok(Launched::Running(pid)) => {
                    outcome.launched += 1;
                    if i == last {
                        last_pid = Some(pid);
                    }
                }
                Ok(Launched::Exited { code, .. }) => {
                    outcome.launched += 1;
                    outcome.reaped += 1;
                    outcome.exit_code = code;
                }
                Err(e) => outcome.errors.push(e),
            }
            upstream = next_upstream;
        }

        drop(upstream);
        drop(final_stdout);
        reap_all(&mut outcome, last_pid);
        outcome
    }
}

/// Wait for children until the kernel reports none are left.
fn reap_all(outcome: &mut Outcome, last_pid: Option<Pid>) {
    let mut anomalies = 0;
    loop {
        match retry_eintr(|| waitpid(Pid::from_raw(-1), None)) {
            Ok(status) => {
                anomalies = 0;
                outcome.reaped += 1;
                tracing::debug!(?status, "child reaped");
                if last_pid.is_some() && status.pid() == last_pid {
                    outcome.exit_code = exit_code(status);
                }
            }
            Err(Errno::ECHILD) => break,
            Err(errno) => {
                tracing::warn!(%errno, "wait failed while reaping pipeline");
                outcome.errors.push(ShellError::os(Op::Wait, errno));
                anomalies += 1;
                if anomalies == MAX_WAIT_ANOMALIES {
                    break;
                }
            }
        }
    }
}
