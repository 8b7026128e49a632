//! Line-oriented plan document parser
//!
//! The document is human-edited markdown, so parsing is tolerant: lines
//! that don't match a known marker are ignored rather than rejected, and a
//! partially written document still yields a usable plan.
//!
//! Recognized markers:
//!
//! ```text
//! ## Milestone m1: Setup          <- starts a milestone
//! Free text under the heading.    <- milestone description
//! - [ ] 001: Initialize repo      <- pending task
//! - [x] 002: Add CI               <- completed task
//! - [-] 003: Optional cleanup     <- skipped task
//!   - Verify: `cargo test` passes <- verification criteria
//!   - Depends: 001, 002           <- dependency ids ("none" = empty)
//! ```

use super::types::{ExecutionPlan, Milestone, Task, TaskStatus};

/// Checkbox marker to task status. `>` and `!` are accepted on read so a
/// document written mid-run still parses, though the runner only ever
/// persists space/x/-.
pub(crate) fn status_for_marker(marker: char) -> Option<TaskStatus> {
    match marker {
        ' ' => Some(TaskStatus::Pending),
        'x' | 'X' => Some(TaskStatus::Completed),
        '-' => Some(TaskStatus::Skipped),
        '>' => Some(TaskStatus::Running),
        '!' => Some(TaskStatus::Failed),
        _ => None,
    }
}

/// Inverse of [`status_for_marker`], used by the document rewriter.
pub(crate) fn marker_for_status(status: TaskStatus) -> char {
    match status {
        TaskStatus::Pending => ' ',
        TaskStatus::Completed => 'x',
        TaskStatus::Skipped => '-',
        TaskStatus::Running => '>',
        TaskStatus::Failed => '!',
    }
}

/// `- [m] rest` for any checkbox marker `m`, or None.
pub(crate) fn split_checkbox(line: &str) -> Option<(char, &str)> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let marker = chars.next()?;
    let rest = chars.as_str().strip_prefix("] ")?;
    Some((marker, rest))
}

fn parse_milestone_heading(heading: &str, ordinal: usize) -> (String, String) {
    // "Milestone <id>: <name>" or plain heading text
    if let Some(rest) = heading.strip_prefix("Milestone ") {
        if let Some((id, name)) = rest.split_once(':') {
            let id = id.trim();
            if !id.is_empty() {
                return (id.to_string(), name.trim().to_string());
            }
        }
    }
    (format!("m{ordinal}"), heading.trim().to_string())
}

/// The `<id>` from `<id>: <description>` task content, when present. A
/// colon-less line (or one whose "id" contains spaces) has no explicit id
/// and gets a positional one instead.
pub(crate) fn explicit_id(content: &str) -> Option<&str> {
    match content.split_once(':') {
        Some((id, _)) if !id.trim().is_empty() && !id.trim().contains(' ') => Some(id.trim()),
        _ => None,
    }
}

fn parse_task(marker: char, content: &str, ordinal: usize) -> Option<Task> {
    let status = status_for_marker(marker)?;
    let (id, description) = match explicit_id(content) {
        Some(id) => {
            let description = content.split_once(':').map_or("", |(_, desc)| desc);
            (id.to_string(), description.trim().to_string())
        }
        None => (format!("{ordinal:03}"), content.trim().to_string()),
    };
    Some(Task {
        id,
        description,
        verification: None,
        depends: Vec::new(),
        status,
    })
}

fn parse_depends(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    value
        .split(',')
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Parse a task document into an [`ExecutionPlan`]. Never fails; malformed
/// lines are skipped.
pub fn parse(document: &str) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();
    let mut milestone_ordinal = 0;
    let mut task_ordinal = 0;

    for line in document.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            milestone_ordinal += 1;
            let (id, name) = parse_milestone_heading(heading, milestone_ordinal);
            plan.milestones.push(Milestone {
                id,
                name,
                description: String::new(),
                tasks: Vec::new(),
                completed_tasks: 0,
            });
            continue;
        }

        if let Some((marker, content)) = split_checkbox(line) {
            let indented = line.starts_with(' ') || line.starts_with('\t');
            if !indented {
                task_ordinal += 1;
                if let Some(task) = parse_task(marker, content, task_ordinal) {
                    if plan.milestones.is_empty() {
                        plan.milestones.push(Milestone {
                            id: "m0".to_string(),
                            name: String::new(),
                            description: String::new(),
                            tasks: Vec::new(),
                            completed_tasks: 0,
                        });
                    }
                    if let Some(milestone) = plan.milestones.last_mut() {
                        milestone.tasks.push(task);
                    }
                }
                continue;
            }
        }

        // Indented sub-bullets attach metadata to the current task.
        let trimmed = line.trim_start();
        let is_sub_bullet = (line.starts_with(' ') || line.starts_with('\t'))
            && (trimmed.starts_with("- ") || trimmed.starts_with("* "));
        if is_sub_bullet {
            let content = trimmed[2..].trim();
            if let Some(task) = plan
                .milestones
                .last_mut()
                .and_then(|m| m.tasks.last_mut())
            {
                if let Some(value) = content.strip_prefix("Verify:") {
                    task.verification = Some(value.trim().to_string());
                } else if let Some(value) = content.strip_prefix("Depends:") {
                    task.depends = parse_depends(value);
                }
            }
            continue;
        }

        // Plain text below a heading, before any task: milestone description.
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            if let Some(milestone) = plan.milestones.last_mut() {
                if milestone.tasks.is_empty() {
                    if !milestone.description.is_empty() {
                        milestone.description.push('\n');
                    }
                    milestone.description.push_str(trimmed);
                }
            }
        }
    }

    plan.recount();
    plan
}
