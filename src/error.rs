//! Error taxonomy shared by every component of the shell.
//!
//! Errors carry the failing operation and the raw OS code; turning them into
//! text is left to [`std::fmt::Display`] at the point where they are reported.

use nix::errno::Errno;
use std::fmt;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ShellError>;

/// The system call a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Pipe,
    Dup,
    Fork,
    Exec,
    Wait,
    Chdir,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Pipe => "pipe",
            Op::Dup => "dup2",
            Op::Fork => "fork",
            Op::Exec => "exec",
            Op::Wait => "wait",
            Op::Chdir => "chdir",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong during one read-eval iteration.
///
/// None of these end the session on their own; the read loop reports them and
/// prompts again.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unable to allocate memory")]
    AllocationFailure,

    #[error("too many tokens (limit is {limit})")]
    TooManyTokens { limit: usize },

    #[error("syntax error near `|'")]
    PipeSyntax,

    #[error("fork: {0}")]
    ForkFailure(Errno),

    /// The stage could not be turned into an `execv` call, e.g. an embedded NUL.
    #[error("{program}: {errno}")]
    ExecFailure { program: String, errno: Errno },

    #[error("wait: {0}")]
    WaitAnomaly(Errno),

    #[error("{op}: {errno}")]
    Os { op: Op, errno: Errno },

    #[error("history: {index}: invalid history index")]
    InvalidIndex { index: String },

    #[error("history: {index}: a recalled command cannot recall another entry")]
    NestedRecall { index: String },

    #[error("cd: {path}: {errno}")]
    DirectoryChange { path: String, errno: Errno },

    #[error("write: {0}")]
    Output(#[from] std::io::Error),
}

impl ShellError {
    pub(crate) fn os(op: Op, errno: Errno) -> Self {
        match op {
            Op::Fork => ShellError::ForkFailure(errno),
            Op::Wait => ShellError::WaitAnomaly(errno),
            _ => ShellError::Os { op, errno },
        }
    }
}
