//! Applies a homogeneous batch of [`EditCommand`]s to file content and
//! produces the human-readable summary the control loop feeds back into
//! the next prompt (spec §4.3).

use crate::grammar::EditCommand;

/// Outcome of applying a batch: the new file content plus a summary of
/// what happened, one paragraph per command (or warning).
pub struct ApplyResult {
    pub content: String,
    pub summary: String,
    pub changed: bool,
}

/// Applies `commands` to `original`, walking them in ascending
/// original-line order while maintaining a running line-offset
/// accumulator so that later commands land at the position their author
/// intended, not the position the earlier edits shifted them to.
///
/// Commands whose range no longer fits inside the buffer (after offset
/// adjustment) are skipped with a warning line in the summary; they never
/// panic and never touch `original`.
pub fn apply_edit_commands(original: &str, commands: &[EditCommand]) -> ApplyResult {
    let mut ordered: Vec<&EditCommand> = commands.iter().collect();
    ordered.sort_by_key(|c| c.anchor_line());

    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let mut offset: i64 = 0;
    let mut summary_parts = Vec::new();

    for command in ordered {
        match command {
            EditCommand::Add { after_line, content } => {
                let insert_at = (*after_line as i64) + offset;
                if insert_at < 0 || insert_at as usize > lines.len() {
                    summary_parts.push(format!("Warning: Could not add after line {after_line}"));
                    continue;
                }
                let new_lines: Vec<String> = content.split('\n').map(str::to_string).collect();
                let idx = insert_at as usize;
                for (i, l) in new_lines.iter().enumerate() {
                    lines.insert(idx + i, l.clone());
                }
                offset += new_lines.len() as i64;

                let mut block = format!("Added after line {after_line}:\n");
                for l in &new_lines {
                    block.push_str("+ ");
                    block.push_str(l);
                    block.push('\n');
                }
                summary_parts.push(block.trim_end().to_string());
            }
            EditCommand::Remove { start, end } => {
                let lo = (*start as i64) + offset - 1;
                let hi = (*end as i64) + offset - 1;
                if lo < 0 || hi as usize >= lines.len() || lo > hi {
                    summary_parts.push(format!("Warning: Could not remove lines {start}-{end}"));
                    continue;
                }
                let (lo, hi) = (lo as usize, hi as usize);
                let removed: Vec<String> = lines.drain(lo..=hi).collect();
                offset -= (hi - lo + 1) as i64;

                let mut block = format!("Removed lines {start}-{end}:\n");
                for l in &removed {
                    block.push_str("- ");
                    block.push_str(l);
                    block.push('\n');
                }
                summary_parts.push(block.trim_end().to_string());
            }
            EditCommand::Modify { start, end, content } => {
                let lo = (*start as i64) + offset - 1;
                let hi = (*end as i64) + offset - 1;
                if lo < 0 || hi as usize >= lines.len() || lo > hi {
                    summary_parts.push(format!("Warning: Could not modify lines {start}-{end}"));
                    continue;
                }
                let (lo, hi) = (lo as usize, hi as usize);
                let new_lines: Vec<String> = content.split('\n').map(str::to_string).collect();
                let removed: Vec<String> = lines.splice(lo..=hi, new_lines.clone()).collect();
                offset += new_lines.len() as i64 - (hi - lo + 1) as i64;

                let mut block = format!("Modified lines {start}-{end}:\n");
                for l in &removed {
                    block.push_str("- ");
                    block.push_str(l);
                    block.push('\n');
                }
                for l in &new_lines {
                    block.push_str("+ ");
                    block.push_str(l);
                    block.push('\n');
                }
                summary_parts.push(block.trim_end().to_string());
            }
        }
    }

    let content = lines.join("\n");
    let changed = content != original;
    let summary = summary_parts.join("\n\n");

    ApplyResult { content, summary, changed }
}

/// Direct-mode write: the model supplies the full new file content, no
/// line addressing. Summary is a single line noting size delta; callers
/// compare `changed` against the on-disk byte image to decide whether
/// the unchanged-file lockout should trigger.
pub fn apply_direct_write(original: &str, new_content: &str) -> ApplyResult {
    let changed = new_content != original;
    let summary = if changed {
        format!(
            "Rewrote file ({} -> {} bytes).",
            original.len(),
            new_content.len()
        )
    } else {
        "No change: new content is byte-identical to the file on disk.".to_string()
    };
    ApplyResult {
        content: new_content.to_string(),
        summary,
        changed,
    }
}
