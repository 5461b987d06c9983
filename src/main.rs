//! ringsh entry point.
//!
//! Usage:
//!   ringsh [--history-size <n>] [--max-tokens <n>] [--prompt <text>]

use std::process::ExitCode;

use anyhow::Result;
use argh::FromArgs;
use ringsh::{Config, Shell};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(FromArgs)]
/// An interactive shell with pipelines and a bounded, recallable history.
struct Args {
    #[argh(option, default = "ringsh::history::DEFAULT_CAPACITY")]
    /// number of lines kept in history
    history_size: usize,

    #[argh(option, default = "ringsh::tokenizer::MAX_TOKENS")]
    /// maximum number of words per stage and stages per line
    max_tokens: usize,

    #[argh(option, default = "ringsh::config::DEFAULT_PROMPT.to_string()")]
    /// prompt printed before each line
    prompt: String,
}

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(argh::from_env()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::new(args.history_size, args.max_tokens, args.prompt)?;
    let mut shell = Shell::new(config);
    shell.repl()
}
