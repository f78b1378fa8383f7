//! Uncommenting of `TODO` cells for the student document.

use crate::diagnostics::Diagnostics;
use crate::language::{Language, MagicCommand};

/// Remove the comment markers from a `TODO` cell.
///
/// The `TODO` line itself stays; every other non-blank line must be
/// commented out and is published uncommented. Magic cells keep their
/// `MAGIC` prefix.
pub fn clean_todo_cell(
    language: Language,
    command: &str,
    index: usize,
    diagnostics: &mut Diagnostics,
) -> String {
    let cmd = index + 1;
    let lines: Vec<&str> = command.split('\n').collect();

    let source_marker = language.comment_marker();
    let magic = language.magic_prefix();

    let first_line = lines.first().copied().unwrap_or_default();
    let cell_magic = MagicCommand::detect(language, first_line);
    let is_magic = lines.len() > 1
        && matches!(
            cell_magic,
            MagicCommand::Markdown
                | MagicCommand::Sql
                | MagicCommand::Python
                | MagicCommand::Scala
                | MagicCommand::R
        );

    let (first, prefix) = if is_magic {
        (1, format!("{} {}", magic, cell_magic.comment_marker(language)))
    } else {
        (0, source_marker.to_string())
    };

    let todo_line = format!("{} TODO", prefix);
    let prefix_space = format!("{} ", prefix);

    let uncomment = |rest: &str| -> String {
        if !is_magic {
            rest.to_string()
        } else if rest.is_empty() {
            magic.clone()
        } else {
            format!("{} {}", magic, rest)
        }
    };

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let blank = trimmed.is_empty() || trimmed == magic;

        if i == 0 && first == 1 {
            cleaned.push(line.to_string());
        } else if i == first && trimmed != todo_line {
            diagnostics.error(format!(
                "Cmd #{cmd} | Expected line #{} to be the \"TODO\" directive: \"{line}\"",
                i + 1
            ));
        } else if !line.starts_with(&prefix) && !blank {
            diagnostics.error(format!(
                "Cmd #{cmd} | Expected line #{} to be commented out: \"{line}\" with prefix \"{prefix}\"",
                i + 1
            ));
        } else if trimmed.starts_with(&todo_line) || blank {
            cleaned.push(line.to_string());
        } else if let Some(rest) = line.strip_prefix(&prefix_space) {
            cleaned.push(uncomment(rest));
        } else {
            cleaned.push(uncomment(&line[prefix.len()..]));
        }
    }

    cleaned.join("\n")
}
