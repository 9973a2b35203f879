//! Yes/no confirmation before destructive commands

use std::io::{self, BufRead, Write};

pub trait Confirm {
    /// Ask `question`; only an explicit yes counts.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Reads the answer from stdin.
pub struct StdinPrompt;

impl Confirm for StdinPrompt {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        print!("{} [y/N] ", question);
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().lock().read_line(&mut response)?;
        Ok(is_yes(&response))
    }
}

/// A fixed answer, for `--yes`.
pub struct Assume(pub bool);

impl Confirm for Assume {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

pub fn is_yes(response: &str) -> bool {
    matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
}
