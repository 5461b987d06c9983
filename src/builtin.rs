use crate::error::{Result, ShellError};
use crate::interpreter::{Flow, Origin, Shell};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Usage text printed for any `history` form that is not understood.
pub const HISTORY_USAGE: &str = "\
Usage:
\thistory    : display previous entries with their index
\thistory -c : clear history
\thistory n  : execute the command at index n
";

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in the shell process without forking.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "history".
    fn name() -> &'static str;

    /// Text printed instead of argh's own message when parsing fails.
    fn usage() -> Option<&'static str> {
        None
    }

    /// Executes the command against the shell's own state.
    fn execute(self, stdout: &mut dyn Write, shell: &mut Shell, origin: Origin) -> Result<Flow>;
}

/// Run the builtin called `name`, if there is one.
///
/// Returns `None` when `name` is not a builtin so the caller can hand the line
/// to the pipeline builder.
pub(crate) fn try_execute(
    name: &str,
    args: &[&str],
    stdout: &mut dyn Write,
    shell: &mut Shell,
    origin: Origin,
) -> Option<Result<Flow>> {
    let result = if name == Cd::name() {
        run::<Cd>(args, stdout, shell, origin)
    } else if name == History::name() {
        run::<History>(args, stdout, shell, origin)
    } else if name == Exit::name() {
        run::<Exit>(args, stdout, shell, origin)
    } else {
        return None;
    };
    Some(result)
}

fn run<T: BuiltinCommand>(
    args: &[&str],
    stdout: &mut dyn Write,
    shell: &mut Shell,
    origin: Origin,
) -> Result<Flow> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => cmd.execute(stdout, shell, origin),
        Err(EarlyExit { output, status }) => {
            match T::usage() {
                Some(usage) => stdout.write_all(usage.as_bytes())?,
                None => writeln!(stdout, "{}", output.trim_end())?,
            }
            if status.is_err() {
                tracing::debug!(builtin = T::name(), "rejected arguments");
            }
            Ok(Flow::Continue)
        }
    }
}

#[derive(FromArgs)]
/// Change the shell's working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _shell: &mut Shell, _origin: Origin) -> Result<Flow> {
        nix::unistd::chdir(self.target.as_str()).map_err(|errno| ShellError::DirectoryChange {
            path: self.target.clone(),
            errno,
        })?;
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Display the command history, clear it, or run an earlier entry again.
pub struct History {
    #[argh(switch, short = 'c')]
    /// clear the history.
    pub clear: bool,

    #[argh(positional)]
    /// index of the entry to execute again.
    pub index: Option<String>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn usage() -> Option<&'static str> {
        Some(HISTORY_USAGE)
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut Shell, origin: Origin) -> Result<Flow> {
        match (self.clear, self.index) {
            (false, None) => {
                for (index, line) in shell.history().list() {
                    writeln!(stdout, "{index} {line}")?;
                }
                Ok(Flow::Continue)
            }
            (true, None) => {
                shell.history_mut().clear();
                Ok(Flow::Continue)
            }
            (false, Some(index)) if is_all_digits(&index) => {
                if origin == Origin::Recall {
                    return Err(ShellError::NestedRecall { index });
                }
                let position = index
                    .parse::<usize>()
                    .map_err(|_| ShellError::InvalidIndex { index: index.clone() })?;
                let line = shell.history().recall(position)?;
                writeln!(stdout, "{line}")?;
                shell.dispatch(&line, stdout, Origin::Recall)
            }
            _ => {
                stdout.write_all(HISTORY_USAGE.as_bytes())?;
                Ok(Flow::Continue)
            }
        }
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, _shell: &mut Shell, _origin: Origin) -> Result<Flow> {
        Ok(Flow::Exit)
    }
}

/// Whether `name args` is `history <n>`, the form that re-runs an entry.
pub(crate) fn is_recall(name: &str, args: &[&str]) -> bool {
    name == History::name() && matches!(args, [index] if is_all_digits(index))
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
