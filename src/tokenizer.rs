//! A module implementing the delimiter-based tokenization used by the shell.
//!
//! The same routine serves two callers: the pipeline builder splits a whole line
//! on [`PIPE`], and every stage is then split on [`WHITESPACE`] into its argument
//! vector.

use crate::error::{Result, ShellError};

/// Delimiters separating the words of a single stage.
pub const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

/// Delimiter separating the stages of a pipeline.
pub const PIPE: &[char] = &['|'];

/// Default upper bound on the number of tokens a single call may produce.
pub const MAX_TOKENS: usize = 128;

/// Splits `text` into ordered, non-empty tokens on any of `delimiters`.
///
/// Runs of adjacent delimiters produce no empty tokens. Tokens borrow from
/// `text`, so the caller's line is never modified and the stored history entry
/// stays intact.
///
/// # Arguments
/// * `text` - The string to split.
/// * `delimiters` - Characters that separate tokens.
/// * `limit` - Maximum number of tokens accepted.
///
/// # Returns
/// The tokens in input order, or [`ShellError::TooManyTokens`] if more than
/// `limit` tokens are present.
pub fn tokenize<'a>(text: &'a str, delimiters: &[char], limit: usize) -> Result<Vec<&'a str>> {
    let mut tokens = Vec::new();
    for token in text.split(delimiters).filter(|t| !t.is_empty()) {
        if tokens.len() == limit {
            return Err(ShellError::TooManyTokens { limit });
        }
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokens_keep_order() {
        let tokens = tokenize("  /bin/ls   -l\t/tmp \n", WHITESPACE, MAX_TOKENS).unwrap();
        assert_eq!(tokens, vec!["/bin/ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_blank_input_yields_no_tokens() {
        assert!(tokenize("", WHITESPACE, MAX_TOKENS).unwrap().is_empty());
        assert!(tokenize(" \t ", WHITESPACE, MAX_TOKENS).unwrap().is_empty());
    }

    #[test]
    fn test_pipe_mode_leaves_whitespace_alone() {
        let tokens = tokenize("echo hi | cat -n|wc", PIPE, MAX_TOKENS).unwrap();
        assert_eq!(tokens, vec!["echo hi ", " cat -n", "wc"]);
    }

    #[test]
    fn test_pipe_mode_drops_empty_segments() {
        let tokens = tokenize("|a||b|", PIPE, MAX_TOKENS).unwrap();
        assert_eq!(tokens, vec!["a", "b"]);
    }

    #[test]
    fn test_too_many_tokens() {
        let err = tokenize("a b c d", WHITESPACE, 3).unwrap_err();
        assert!(matches!(err, ShellError::TooManyTokens { limit: 3 }));

        // exactly at the limit is fine
        assert_eq!(tokenize("a b c", WHITESPACE, 3).unwrap().len(), 3);
    }
}
