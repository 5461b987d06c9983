use crate::builtin;
use crate::config::Config;
use crate::error::{Result, ShellError};
use crate::history::History;
use crate::pipeline::{Outcome, Pipeline};
use crate::tokenizer::{WHITESPACE, tokenize};
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;

/// Whether the read loop should keep going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Where a line handed to [`Shell::dispatch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Typed at the prompt.
    Prompt,
    /// Re-submitted by `history <n>`.
    Recall,
}

/// An interactive shell: built-ins, pipelines and a bounded history.
///
/// All state lives here and is handed to the components that need it; there
/// are no globals.
///
/// Example
/// ```
/// use ringsh::{Config, Flow, Shell};
/// let mut sh = Shell::new(Config::default());
/// let mut out = Vec::new();
/// sh.process_line("history", &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "0 history\n");
/// assert_eq!(sh.process_line("exit", &mut Vec::new()).unwrap(), Flow::Exit);
/// ```
pub struct Shell {
    config: Config,
    history: History,
    last_outcome: Option<Outcome>,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self {
            history: History::new(config.history_capacity),
            config,
            last_outcome: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Result of the most recent pipeline run by the last dispatched line, if
    /// that line ran one.
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// Handle one line read at the prompt.
    ///
    /// Blank lines do nothing. `exit` is not recorded; every other line is
    /// recorded before it runs, so `history` lists itself.
    ///
    /// `history <n>` is the exception: it is recorded after it ran, so `n`
    /// names the entry shown by the listing the user just saw even when
    /// recording would evict the oldest one.
    pub fn process_line(&mut self, line: &str, stdout: &mut dyn Write) -> Result<Flow> {
        let mut words = line.split(WHITESPACE).filter(|w| !w.is_empty());
        let Some(first) = words.next() else {
            return Ok(Flow::Continue);
        };
        if line.contains('|') {
            self.history.record(line)?;
            return self.dispatch(line, stdout, Origin::Prompt);
        }
        if first == "exit" {
            return self.dispatch(line, stdout, Origin::Prompt);
        }

        let rest: Vec<&str> = words.collect();
        if builtin::is_recall(first, &rest) {
            let result = self.dispatch(line, stdout, Origin::Prompt);
            self.history.record(line)?;
            return result;
        }
        self.history.record(line)?;
        self.dispatch(line, stdout, Origin::Prompt)
    }

    /// Run `line` as a built-in or hand it to the pipeline builder.
    ///
    /// Built-ins are only recognised on lines without a pipe symbol. Failures of
    /// individual pipeline stages are reported on stderr and kept in
    /// [`Shell::last_outcome`]; they do not make this return an error.
    pub fn dispatch(&mut self, line: &str, stdout: &mut dyn Write, origin: Origin) -> Result<Flow> {
        self.last_outcome = None;

        if !line.contains('|') {
            let words = tokenize(line, WHITESPACE, self.config.max_tokens)?;
            let Some((name, args)) = words.split_first() else {
                return Ok(Flow::Continue);
            };
            if let Some(result) = builtin::try_execute(name, args, stdout, self, origin) {
                return result;
            }
        }

        let pipeline = Pipeline::parse(line, self.config.max_tokens)?;
        // keep our own output ahead of whatever the children print
        stdout.flush()?;
        let outcome = pipeline.execute();
        for err in &outcome.errors {
            report(err);
        }
        self.last_outcome = Some(outcome);
        Ok(Flow::Continue)
    }

    /// Read-Eval-Print Loop on the controlling terminal.
    ///
    /// Returns once the user types `exit` or closes the input; fails only when
    /// the next line cannot be read.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new().context("failed to create line editor")?;

        loop {
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = rl.add_history_entry(line.as_str()) {
                            tracing::warn!("failed to add editor history entry: {}", e);
                        }
                    }
                    match self.process_line(&line, &mut std::io::stdout()) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break,
                        Err(e) => report(&e),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err).context("unable to read from stdin"),
            }
        }

        Ok(())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn report(err: &ShellError) {
    eprintln!("error: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lock_process_state, no_children_remain};
    use std::env as stdenv;
    use std::fs;
    use std::num::NonZeroUsize;

    fn run(shell: &mut Shell, line: &str) -> (Result<Flow>, String) {
        let mut out = Vec::new();
        let res = shell.process_line(line, &mut out);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_blank_line_is_not_recorded() {
        let mut shell = Shell::default();
        let (res, out) = run(&mut shell, "   \t");
        assert!(matches!(res, Ok(Flow::Continue)));
        assert!(out.is_empty());
        assert!(shell.history().is_empty());
    }

    #[test]
    fn test_exit_ends_session_without_recording() {
        let mut shell = Shell::default();
        let (res, _) = run(&mut shell, "exit");
        assert!(matches!(res, Ok(Flow::Exit)));
        assert!(shell.history().is_empty());
    }

    #[test]
    fn test_history_clear_then_list_prints_nothing() {
        let mut shell = Shell::default();
        run(&mut shell, "cd .").0.unwrap();
        run(&mut shell, "history").0.unwrap();

        let (res, out) = run(&mut shell, "history -c");
        assert!(matches!(res, Ok(Flow::Continue)));
        assert!(out.is_empty());

        // the listing call itself is recorded before it runs
        let (res, out) = run(&mut shell, "history");
        assert!(matches!(res, Ok(Flow::Continue)));
        assert_eq!(out, "0 history\n");

        shell.history_mut().clear();
        let mut out = Vec::new();
        let res = shell.dispatch("history", &mut out, Origin::Prompt);
        assert!(matches!(res, Ok(Flow::Continue)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_recall_beyond_recorded_spawns_nothing() {
        let _lock = lock_process_state();
        let mut shell = Shell::default();
        run(&mut shell, "/bin/true").0.unwrap();

        let (res, _) = run(&mut shell, "history 5");
        assert!(matches!(res, Err(ShellError::InvalidIndex { .. })));
        assert!(shell.last_outcome().is_none());
        assert!(no_children_remain());
    }

    #[test]
    fn test_recall_reexecutes_without_recording_again() {
        let _lock = lock_process_state();
        let mut shell = Shell::default();
        run(&mut shell, "/bin/echo recalled | /bin/cat").0.unwrap();
        assert_eq!(shell.last_outcome().unwrap().reaped, 2);

        let (res, out) = run(&mut shell, "history 0");
        assert!(matches!(res, Ok(Flow::Continue)));
        assert_eq!(out, "/bin/echo recalled | /bin/cat\n");

        let outcome = shell.last_outcome().unwrap();
        assert_eq!(outcome.launched, 2);
        assert_eq!(outcome.reaped, 2);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(no_children_remain());

        let entries: Vec<_> = shell.history().list().map(|(_, l)| l.to_string()).collect();
        assert_eq!(entries, vec!["/bin/echo recalled | /bin/cat", "history 0"]);
    }

    #[test]
    fn test_recall_goes_through_builtins() {
        let _lock = lock_process_state();
        let orig = stdenv::current_dir().unwrap();
        let target = fs::canonicalize(stdenv::temp_dir()).unwrap();

        let mut shell = Shell::default();
        shell
            .history_mut()
            .record(&format!("cd {}", target.display()))
            .unwrap();
        let (res, _) = run(&mut shell, "history 0");
        let now = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert!(matches!(res, Ok(Flow::Continue)));
        assert_eq!(now, target);
        assert!(shell.last_outcome().is_none());
    }

    #[test]
    fn test_pipe_syntax_error_spawns_nothing() {
        let _lock = lock_process_state();
        let mut shell = Shell::default();

        for line in ["/bin/echo a | | /bin/cat", "| /bin/cat", "/bin/echo a |"] {
            let (res, _) = run(&mut shell, line);
            assert!(matches!(res, Err(ShellError::PipeSyntax)), "{line:?}");
            assert!(shell.last_outcome().is_none());
            assert!(no_children_remain());
        }
        // rejected lines were still accepted input
        assert_eq!(shell.history().len(), 3);
    }

    #[test]
    fn test_builtin_names_inside_pipelines_are_programs() {
        let _lock = lock_process_state();
        let mut shell = Shell::default();

        let (res, _) = run(&mut shell, "cd /tmp | /bin/cat");
        assert!(matches!(res, Ok(Flow::Continue)));
        let outcome = shell.last_outcome().unwrap();
        assert_eq!(outcome.launched, 2);
        assert_eq!(outcome.reaped, 2);
    }

    #[test]
    fn test_recall_on_full_ring_runs_listed_entry() {
        let _lock = lock_process_state();
        let orig = stdenv::current_dir().unwrap();
        let config = Config {
            history_capacity: NonZeroUsize::new(3).unwrap(),
            ..Config::default()
        };
        let mut shell = Shell::new(config);

        run(&mut shell, "cd .").0.unwrap();
        run(&mut shell, "history").0.unwrap();
        let (_, listed) = run(&mut shell, "history");
        assert_eq!(listed, "0 cd .\n1 history\n2 history\n");

        let (res, out) = run(&mut shell, "history 0");
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");
        assert!(matches!(res, Ok(Flow::Continue)));
        assert_eq!(out, "cd .\n");

        // the recall line evicts the oldest entry only after it ran
        let entries: Vec<_> = shell.history().list().map(|(_, l)| l.to_string()).collect();
        assert_eq!(entries, vec!["history", "history", "history 0"]);
    }

    #[test]
    fn test_failed_recall_is_still_recorded() {
        let mut shell = Shell::default();
        let (res, _) = run(&mut shell, "history 3");
        assert!(matches!(res, Err(ShellError::InvalidIndex { .. })));
        assert_eq!(shell.history().recall(0).unwrap(), "history 3");
    }

    #[test]
    fn test_history_respects_configured_capacity() {
        let config = Config {
            history_capacity: NonZeroUsize::new(2).unwrap(),
            ..Config::default()
        };
        let mut shell = Shell::new(config);
        shell.history_mut().record("first").unwrap();
        shell.history_mut().record("second").unwrap();

        let (_, out) = run(&mut shell, "history");
        assert_eq!(out, "0 second\n1 history\n");
    }
}
