//! Operator confirmation

use std::io::{self, BufRead, Write};

use crate::errors::SnovaError;

/// Asks the operator a yes/no question
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> Result<bool, SnovaError>;
}

/// Reads the answer from stdin. Anything but `y`/`yes` declines.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, message: &str) -> Result<bool, SnovaError> {
        let mut stdout = io::stdout();
        write!(stdout, "{message} [y/N]: ")?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

/// Confirms everything, for non-interactive runs
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, _message: &str) -> Result<bool, SnovaError> {
        Ok(true)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
