//! Cell segmentation and leading-comment extraction.
//!
//! A serialized notebook is a single string: a header line followed by
//! commands separated by `<marker> COMMAND ----------` lines.
//!
//! ```text
//! # Databricks notebook source
//! print("cell 0")
//!
//! # COMMAND ----------
//!
//! # MAGIC %md
//! # MAGIC # cell 1
//! ```

use crate::language::{Language, MagicCommand};

/// One command of a notebook, with everything derived from its first lines.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Zero-based position in the notebook.
    pub index: usize,

    /// Raw text of the command.
    pub source: String,

    /// Magic command detected on the first line.
    pub magic: MagicCommand,

    /// Comment marker in effect inside this cell.
    pub comment_marker: &'static str,

    /// Comment lines preceding the first line of code, marker removed.
    pub leading_comments: Vec<String>,
}

impl Cell {
    pub fn new(index: usize, language: Language, source: impl Into<String>) -> Self {
        let source = source.into();
        let first_line = source.lines().next().unwrap_or_default();
        let magic = MagicCommand::detect(language, first_line);
        let leading_comments = leading_comments(language, source.trim());

        Self {
            index,
            comment_marker: magic.comment_marker(language),
            magic,
            leading_comments,
            source,
        }
    }

    /// One-based command number, as shown in diagnostics (`Cmd #n`).
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Split a raw notebook into its commands.
///
/// A leading `<marker> Databricks notebook source` line is not part of any
/// command and is dropped.
pub fn split_cells(language: Language, raw: &str) -> Vec<String> {
    let header = language.header_line();
    let body = match raw.strip_prefix(header.as_str()) {
        Some(rest) => rest.strip_prefix('\n').unwrap_or(rest),
        None => raw,
    };

    body.split(language.command_delimiter().as_str())
        .map(str::to_string)
        .collect()
}

/// Join commands back into a notebook document.
///
/// The last command gets two trailing newlines unless it is a magic cell.
pub fn join_cells(language: Language, commands: &[String]) -> String {
    let mut source = format!("{}\n", language.header_line());

    if let Some((last, rest)) = commands.split_last() {
        let delimiter = language.command_delimiter();
        for command in rest {
            source.push_str(command);
            source.push_str(&delimiter);
        }
        source.push_str(last);
        if !last.starts_with(&language.magic_prefix()) {
            source.push_str("\n\n");
        }
    }

    source
}

/// Extract the comment lines at the top of a cell.
///
/// The source-language `MAGIC` prefix and any `%magic` token are removed
/// first, so a `%sql` cell in a Python notebook yields its `--` comments.
/// Blank lines and bare markers are skipped; the first line that is not a
/// comment ends the block.
pub fn leading_comments(language: Language, command: &str) -> Vec<String> {
    let source_marker = language.comment_marker();
    let first_line = command.lines().next().unwrap_or_default();
    let cell_marker = MagicCommand::detect(language, first_line).comment_marker(language);

    let magic_prefix = format!("{} MAGIC", source_marker);
    let command_prefix = format!("{} COMMAND", source_marker);

    let mut comments = Vec::new();

    for raw_line in command.split('\n') {
        let mut line = raw_line;

        if let Some(rest) = line.strip_prefix(magic_prefix.as_str()) {
            line = rest.trim();
        } else if let Some(rest) = line.strip_prefix(command_prefix.as_str()) {
            line = rest.trim();
        }

        if line.trim().starts_with('%') {
            line = match line.find(' ') {
                Some(pos) => line[pos..].trim(),
                None => "",
            };
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == cell_marker {
            continue;
        }

        match trimmed.strip_prefix(cell_marker) {
            Some(comment) => comments.push(comment.trim().to_string()),
            None => return comments,
        }
    }

    comments
}
