//! Synchronous operator approval prompts (spec §4.2, §4.5): "commands
//! beginning with any approval-required prefix trigger a synchronous
//! operator yes/no", and `RAW` always asks regardless of the allow-list.

use std::io::{self, BufRead, Write};

/// Blocks on stdin for a yes/no answer, matching the reference agent's
/// `input(prompt).lower()` confirmation pattern. Accepts `y`/`yes`
/// (case-insensitive, surrounding whitespace ignored) as an approval;
/// anything else, including an empty line, is a refusal.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    confirm_with(prompt, &mut io::stdin().lock(), &mut io::stdout())
}

/// Testable core of [`confirm`]: reads one line from `reader`, writes
/// the prompt to `writer` first.
pub fn confirm_with<R: BufRead, W: Write>(prompt: &str, reader: &mut R, writer: &mut W) -> io::Result<bool> {
    write!(writer, "{prompt} (yes/no): ")?;
    writer.flush()?;
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_confirm_accepts_yes() {
        let mut input = Cursor::new(b"yes\n".to_vec());
        let mut output = Vec::new();
        assert!(confirm_with("run it?", &mut input, &mut output).unwrap());
    }

    #[test]
    fn test_confirm_accepts_y_case_insensitive() {
        let mut input = Cursor::new(b"Y\n".to_vec());
        let mut output = Vec::new();
        assert!(confirm_with("run it?", &mut input, &mut output).unwrap());
    }

    #[test]
    fn test_confirm_rejects_no() {
        let mut input = Cursor::new(b"no\n".to_vec());
        let mut output = Vec::new();
        assert!(!confirm_with("run it?", &mut input, &mut output).unwrap());
    }

    #[test]
    fn test_confirm_rejects_empty_line() {
        let mut input = Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        assert!(!confirm_with("run it?", &mut input, &mut output).unwrap());
    }

    #[test]
    fn test_confirm_writes_prompt() {
        let mut input = Cursor::new(b"yes\n".to_vec());
        let mut output = Vec::new();
        confirm_with("delete everything?", &mut input, &mut output).unwrap();
        let written = String::from_utf8(output).unwrap();
        assert!(written.contains("delete everything?"));
    }
}
