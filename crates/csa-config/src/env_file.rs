//! `devlm.env` loader (spec §6, §10): a small hand-rolled key=value
//! parser, not a `dotenv`-crate dependency — precedence is built-in
//! defaults, then this file, then CLI flags (highest).

use std::collections::HashMap;
use std::path::Path;

/// Parses `devlm.env`-style content: one `KEY=VALUE` pair per line,
/// blank lines and `#`-prefixed comments ignored, surrounding
/// single/double quotes on the value stripped.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()));
    }
    vars
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Loads `devlm.env` from `dir`, returning an empty map if it doesn't exist.
pub fn load_env_file(dir: &Path) -> anyhow::Result<HashMap<String, String>> {
    let path = dir.join("devlm.env");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(parse_env_file(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_pairs() {
        let vars = parse_env_file("API_KEY=abc123\nMODEL=claude-3\n");
        assert_eq!(vars.get("API_KEY"), Some(&"abc123".to_string()));
        assert_eq!(vars.get("MODEL"), Some(&"claude-3".to_string()));
    }

    #[test]
    fn test_skips_blank_lines_and_comments() {
        let vars = parse_env_file("# a comment\n\nAPI_KEY=abc\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_strips_surrounding_quotes() {
        let vars = parse_env_file(r#"API_KEY="abc 123""#);
        assert_eq!(vars.get("API_KEY"), Some(&"abc 123".to_string()));
    }

    #[test]
    fn test_trims_whitespace_around_key_and_value() {
        let vars = parse_env_file("  API_KEY =  abc123  \n");
        assert_eq!(vars.get("API_KEY"), Some(&"abc123".to_string()));
    }

    #[test]
    fn test_ignores_malformed_line_without_equals() {
        let vars = parse_env_file("not a valid line\nAPI_KEY=abc\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_load_env_file_missing_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = load_env_file(dir.path()).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_load_env_file_reads_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devlm.env"), "MODEL=gpt-4\n").unwrap();
        let vars = load_env_file(dir.path()).unwrap();
        assert_eq!(vars.get("MODEL"), Some(&"gpt-4".to_string()));
    }
}
