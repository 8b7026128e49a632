//! Targeted plan-document rewrites
//!
//! The task document stays hand-editable: a status update rewrites only
//! the checkbox marker on the matching task's own line and leaves every
//! other byte of the document alone. Task ids are resolved the same way
//! the parser assigns them, so a colon-less task addressed by its
//! positional id lands on the right line.

use super::parser::{explicit_id, marker_for_status, split_checkbox, status_for_marker};
use super::types::TaskStatus;

/// Rewrite the checkbox marker for `task_id` in `content`, returning the
/// new document, or `None` when no task line with that id exists.
pub fn set_task_status(content: &str, task_id: &str, status: TaskStatus) -> Option<String> {
    let mut found = false;
    let mut ordinal = 0;
    let mut lines: Vec<String> = Vec::with_capacity(content.lines().count());

    for line in content.lines() {
        if !found && !is_indented(line) {
            if let Some((marker, body)) = split_checkbox(line) {
                // Every top-level checkbox line consumes an ordinal, even
                // ones with explicit ids or unusable markers, mirroring
                // the parser's positional-id assignment.
                ordinal += 1;
                let is_task = status_for_marker(marker).is_some();
                let id_matches = match explicit_id(body) {
                    Some(id) => id == task_id,
                    None => format!("{ordinal:03}") == task_id,
                };
                if is_task && id_matches {
                    lines.push(rewrite_marker(line, marker_for_status(status)));
                    found = true;
                    continue;
                }
            }
        }
        lines.push(line.to_string());
    }

    if !found {
        return None;
    }

    let mut result = lines.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    Some(result)
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Replace the single character between the brackets, preserving the rest
/// of the line byte for byte.
fn rewrite_marker(line: &str, marker: char) -> String {
    match line.find('[') {
        Some(open) => {
            let mut out = String::with_capacity(line.len());
            out.push_str(&line[..open + 1]);
            out.push(marker);
            // skip the old marker char
            let after = line[open + 1..].chars().next().map_or(0, char::len_utf8);
            out.push_str(&line[open + 1 + after..]);
            out
        }
        None => line.to_string(),
    }
}
