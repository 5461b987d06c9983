//! A small interactive command interpreter.
//!
//! Each input line is split on `|` into stages, every stage is forked and
//! exec'd with its stdin/stdout wired through anonymous pipes, and the shell
//! waits until every child has been reaped before it prompts again. Program
//! paths are used exactly as typed. Accepted lines go into a fixed-size
//! [`History`] ring that `history <n>` can replay.
//!
//! The main entry point is [`Shell`]; [`pipeline`], [`launcher`], [`history`] and
//! [`tokenizer`] expose the individual pieces.

mod builtin;
pub mod config;
pub mod error;
pub mod history;
mod interpreter;
pub mod launcher;
pub mod pipeline;
pub mod tokenizer;

pub use builtin::HISTORY_USAGE;
pub use config::Config;
pub use error::{Op, ShellError};
pub use history::History;
pub use interpreter::{Flow, Origin, Shell};
pub use pipeline::{Outcome, Pipeline};

/// Serializes tests that fork children or change the working directory.
///
/// Reaping waits for any child of the process and the cwd is process-wide, so
/// such tests must not overlap.
#[cfg(test)]
pub(crate) fn lock_process_state() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) fn no_children_remain() -> bool {
    use nix::errno::Errno;
    use nix::sys::wait::{WaitPidFlag, waitpid};
    use nix::unistd::Pid;
    matches!(
        waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    )
}
