// Interactive console input
use crate::error::{CredsError, Result};
use std::io::{self, BufRead, Write};

/// Console interaction the credential flows need
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Show `message` and wait for a line. Empty input or "y"/"yes" proceeds.
    fn confirm(&self, message: &str) -> Result<bool>;

    /// Read a line without echoing it
    fn read_secret(&self, message: &str) -> Result<String>;
}

/// Prompts on stderr so stdout stays clean for exported values
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> Result<bool> {
        eprintln!();
        eprintln!("{}", message);
        eprint!("> ");
        io::stderr().flush()?;

        read_confirmation(&mut io::stdin().lock())
    }

    fn read_secret(&self, message: &str) -> Result<String> {
        eprint!("{}", message);
        io::stderr().flush()?;

        let secret = rpassword::read_password()
            .map_err(|e| CredsError::Prompt(format!("Failed to read input: {}", e)))?;

        Ok(secret.trim().to_string())
    }
}

/// End of input (stdin closed or redirected from /dev/null) declines
fn read_confirmation(reader: &mut impl BufRead) -> Result<bool> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| CredsError::Prompt(format!("Failed to read input: {}", e)))?;

    if read == 0 {
        tracing::debug!("No input available, treating confirmation as declined");
        return Ok(false);
    }

    Ok(is_affirmative(&line))
}

pub(crate) fn is_affirmative(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "" | "y" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("\n"));
        assert!(is_affirmative(""));
        assert!(is_affirmative("Y\n"));
        assert!(is_affirmative(" yes "));
        assert!(!is_affirmative("n\n"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("later"));
    }

    #[test]
    fn test_read_confirmation() {
        assert!(read_confirmation(&mut Cursor::new("\n")).unwrap());
        assert!(read_confirmation(&mut Cursor::new("yes\n")).unwrap());
        assert!(!read_confirmation(&mut Cursor::new("n\n")).unwrap());
    }

    #[test]
    fn test_end_of_input_declines() {
        assert!(!read_confirmation(&mut Cursor::new("")).unwrap());
    }
}
