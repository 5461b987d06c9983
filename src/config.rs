use crate::history::DEFAULT_CAPACITY;
use crate::tokenizer::MAX_TOKENS;
use anyhow::{Context, Result, ensure};
use std::num::NonZeroUsize;

/// Prompt shown when none is configured.
pub const DEFAULT_PROMPT: &str = "$ ";

/// Tunables of a [`crate::Shell`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of lines the history ring keeps.
    pub history_capacity: NonZeroUsize,
    /// Upper bound on words per stage and on stages per line.
    pub max_tokens: usize,
    pub prompt: String,
}

impl Config {
    /// Build a configuration, rejecting sizes that would make the shell unusable.
    pub fn new(history_size: usize, max_tokens: usize, prompt: impl Into<String>) -> Result<Self> {
        let history_capacity =
            NonZeroUsize::new(history_size).context("history size must be at least 1")?;
        ensure!(max_tokens > 0, "max tokens must be at least 1");
        Ok(Self {
            history_capacity,
            max_tokens,
            prompt: prompt.into(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            max_tokens: MAX_TOKENS,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.history_capacity.get(), 100);
        assert_eq!(config.max_tokens, MAX_TOKENS);
        assert_eq!(config.prompt, "$ ");
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(Config::new(0, 10, "> ").is_err());
        assert!(Config::new(10, 0, "> ").is_err());

        let config = Config::new(5, 7, "> ").unwrap();
        assert_eq!(config.history_capacity.get(), 5);
        assert_eq!(config.max_tokens, 7);
    }
}
