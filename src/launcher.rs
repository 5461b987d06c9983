//! Forking and exec'ing a single pipeline stage.

use crate::error::{Op, Result, ShellError};
use crate::pipeline::Stage;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::libc;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execv, fork, pipe};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Status a child reports when its program could not be executed.
pub const EXEC_FAILURE_STATUS: ExitCode = 127;

/// Status a child reports when its stdin/stdout could not be rewired.
pub const DUP_FAILURE_STATUS: ExitCode = 126;

/// What became of a launched stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launched {
    /// Part of a pipeline; the caller is responsible for reaping it.
    Running(Pid),
    /// Launched on its own and already waited for.
    Exited { pid: Pid, code: Option<ExitCode> },
}

/// Fork once and exec `stage` in the child.
///
/// `read` and `write`, when present, become the child's stdin and stdout. The
/// parent closes both right after the fork, whatever the outcome. When neither
/// is given the stage is standalone and the parent waits for it before
/// returning.
pub fn launch(stage: &Stage, read: Option<OwnedFd>, write: Option<OwnedFd>) -> Result<Launched> {
    let standalone = read.is_none() && write.is_none();

    // SAFETY: the shell is single-threaded while launching, and the child only
    // performs dup2/fcntl/execv/write/_exit before replacing its image.
    match retry_eintr(|| unsafe { fork() }) {
        Err(errno) => Err(ShellError::os(Op::Fork, errno)),
        Ok(ForkResult::Child) => exec_child(stage, read, write),
        Ok(ForkResult::Parent { child }) => {
            drop(read);
            drop(write);
            tracing::debug!(pid = %child, program = %stage.program_name(), "stage launched");

            if standalone {
                let code = wait_for(child)?;
                Ok(Launched::Exited { pid: child, code })
            } else {
                Ok(Launched::Running(child))
            }
        }
    }
}

/// Block until `child` terminates and return its exit code.
///
/// `ECHILD` means somebody else already collected it; that is reported as an
/// unknown code rather than an error.
pub fn wait_for(child: Pid) -> Result<Option<ExitCode>> {
    match retry_eintr(|| waitpid(child, None)) {
        Ok(status) => Ok(exit_code(status)),
        Err(Errno::ECHILD) => Ok(None),
        Err(errno) => Err(ShellError::os(Op::Wait, errno)),
    }
}

/// Map a wait status to shell conventions: the exit code, or 128 + signal.
pub fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

/// Create an anonymous pipe whose ends are both close-on-exec.
///
/// Only the copies duplicated onto stdin/stdout survive into the exec'd
/// program.
pub(crate) fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let (read, write) = pipe().map_err(|errno| ShellError::os(Op::Pipe, errno))?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|errno| ShellError::os(Op::Pipe, errno))?;
    }
    Ok((read, write))
}

fn exec_child(stage: &Stage, read: Option<OwnedFd>, write: Option<OwnedFd>) -> ! {
    // with fd 0 or 1 closed in the shell a pipe end can land on the other's target
    let read = match read.map(|fd| lift(fd, libc::STDOUT_FILENO)).transpose() {
        Ok(fd) => fd,
        Err(errno) => child_exit(b"fcntl", errno, DUP_FAILURE_STATUS),
    };
    let write = match write.map(|fd| lift(fd, libc::STDIN_FILENO)).transpose() {
        Ok(fd) => fd,
        Err(errno) => child_exit(b"fcntl", errno, DUP_FAILURE_STATUS),
    };

    if let Some(fd) = read {
        if let Err(errno) = redirect(fd, libc::STDIN_FILENO) {
            child_exit(b"dup2", errno, DUP_FAILURE_STATUS);
        }
    }
    if let Some(fd) = write {
        if let Err(errno) = redirect(fd, libc::STDOUT_FILENO) {
            child_exit(b"dup2", errno, DUP_FAILURE_STATUS);
        }
    }

    // execv only returns on failure
    let errno = match execv(&stage.program, &stage.argv) {
        Err(errno) => errno,
        Ok(never) => match never {},
    };
    child_exit(stage.program.as_bytes(), errno, EXEC_FAILURE_STATUS)
}

/// Make `fd` the descriptor `target`, consuming it.
fn redirect(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
    if fd.as_raw_fd() == target {
        // already in place; it only has to survive the exec
        fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    retry_eintr(|| dup2(fd.as_raw_fd(), target))?;
    Ok(())
}

/// Move `fd` above the standard descriptors if it currently is `taken`.
fn lift(fd: OwnedFd, taken: RawFd) -> nix::Result<OwnedFd> {
    if fd.as_raw_fd() != taken {
        return Ok(fd);
    }
    let raw = fcntl(
        fd.as_raw_fd(),
        FcntlArg::F_DUPFD_CLOEXEC(libc::STDERR_FILENO + 1),
    )?;
    // SAFETY: fcntl just allocated `raw`; nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// Report `what: <error>` on stderr and terminate the child without unwinding
/// back into shell code.
fn child_exit(what: &[u8], errno: Errno, status: ExitCode) -> ! {
    let stderr = std::io::stderr();
    let fd = stderr.as_fd();
    let parts: [&[u8]; 5] = [b"error: ", what, b": ", errno.desc().as_bytes(), b"\n"];
    for part in parts {
        let _ = nix::unistd::write(fd, part);
    }
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, which belong
    // to the shell and must not run twice.
    unsafe { libc::_exit(status) }
}

/// System call wrapper that retries on `EINTR`.
pub(crate) fn retry_eintr<F, T>(mut f: F) -> nix::Result<T>
where
    F: FnMut() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}
