//! Notebook languages, comment markers and magic commands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Header line every exported notebook starts with (after the comment marker).
pub const NOTEBOOK_HEADER: &str = "Databricks notebook source";

/// Native language of a notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Sql,
    Scala,
    R,
}

impl Language {
    /// Parse a language tag as reported by the workspace (case-insensitive).
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "sql" => Ok(Self::Sql),
            "scala" => Ok(Self::Scala),
            "r" => Ok(Self::R),
            _ => Err(Error::UnsupportedLanguage(tag.to_string())),
        }
    }

    /// Lower-case name, as used in `lang-<name>` ignore categories.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Sql => "sql",
            Self::Scala => "scala",
            Self::R => "r",
        }
    }

    /// Upper-case name, as expected by the workspace import call.
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::Python => "PYTHON",
            Self::Sql => "SQL",
            Self::Scala => "SCALA",
            Self::R => "R",
        }
    }

    /// Line-comment marker of the language.
    pub fn comment_marker(&self) -> &'static str {
        match self {
            Self::Python | Self::R => "#",
            Self::Sql => "--",
            Self::Scala => "//",
        }
    }

    /// Delimiter placed between two commands of a notebook document.
    pub fn command_delimiter(&self) -> String {
        format!("\n{} COMMAND ----------\n", self.comment_marker())
    }

    /// Prefix of a line that belongs to a magic-command cell.
    pub fn magic_prefix(&self) -> String {
        format!("{} MAGIC", self.comment_marker())
    }

    /// The first line of a serialized notebook.
    pub fn header_line(&self) -> String {
        format!("{} {}", self.comment_marker(), NOTEBOOK_HEADER)
    }

    /// File extension used by [`crate::workspace::LocalWorkspace`].
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Sql => "sql",
            Self::Scala => "scala",
            Self::R => "r",
        }
    }

    /// Inverse of [`Language::file_extension`].
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Self::Python),
            "sql" => Some(Self::Sql),
            "scala" => Some(Self::Scala),
            "r" => Some(Self::R),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Magic command a cell starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicCommand {
    /// `%md` or `%md-sandbox`
    Markdown,
    Sql,
    Python,
    Scala,
    R,
    Run,
    Pip,
    /// No magic command: code in the notebook's native language.
    Plain,
}

impl MagicCommand {
    /// Detect the magic command from the first line of a cell.
    ///
    /// `%run` is tested before `%r` so run cells are not taken for R cells.
    pub fn detect(language: Language, first_line: &str) -> Self {
        let first = first_line.to_lowercase();
        let prefix = format!("{} magic ", language.comment_marker());
        let Some(rest) = first.strip_prefix(&prefix) else {
            return Self::Plain;
        };

        if rest.starts_with("%md") {
            Self::Markdown
        } else if rest.starts_with("%sql") {
            Self::Sql
        } else if rest.starts_with("%python") {
            Self::Python
        } else if rest.starts_with("%scala") {
            Self::Scala
        } else if rest.starts_with("%run") {
            Self::Run
        } else if rest.starts_with("%pip") {
            Self::Pip
        } else if rest.starts_with("%r") {
            Self::R
        } else {
            Self::Plain
        }
    }

    /// Comment marker in effect inside a cell of this kind.
    ///
    /// Markdown cells use `--`. Run, pip and plain cells keep the native marker.
    pub fn comment_marker(&self, native: Language) -> &'static str {
        match self {
            Self::Markdown | Self::Sql => "--",
            Self::Python | Self::R => "#",
            Self::Scala => "//",
            Self::Run | Self::Pip | Self::Plain => native.comment_marker(),
        }
    }

    pub fn is_markdown(&self) -> bool {
        matches!(self, Self::Markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language() {
        assert_eq!(Language::parse("PYTHON").unwrap(), Language::Python);
        assert_eq!(Language::parse("sql").unwrap(), Language::Sql);
        assert_eq!(Language::parse(" Scala ").unwrap(), Language::Scala);
        assert_eq!(Language::parse("R").unwrap(), Language::R);

        let err = Language::parse("java").unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(tag) if tag == "java"));
    }

    #[test]
    fn test_command_delimiter() {
        assert_eq!(
            Language::Python.command_delimiter(),
            "\n# COMMAND ----------\n"
        );
        assert_eq!(Language::Sql.command_delimiter(), "\n-- COMMAND ----------\n");
        assert_eq!(
            Language::Scala.command_delimiter(),
            "\n// COMMAND ----------\n"
        );
    }

    #[test]
    fn test_detect_magic() {
        let py = Language::Python;
        assert_eq!(MagicCommand::detect(py, "# MAGIC %md"), MagicCommand::Markdown);
        assert_eq!(
            MagicCommand::detect(py, "# MAGIC %md-sandbox"),
            MagicCommand::Markdown
        );
        assert_eq!(
            MagicCommand::detect(py, "# MAGIC %run ./Includes/Setup"),
            MagicCommand::Run
        );
        assert_eq!(MagicCommand::detect(py, "# MAGIC %r"), MagicCommand::R);
        assert_eq!(
            MagicCommand::detect(py, "# MAGIC %pip install x"),
            MagicCommand::Pip
        );
        assert_eq!(MagicCommand::detect(py, "print(1)"), MagicCommand::Plain);
        assert_eq!(
            MagicCommand::detect(Language::Sql, "-- MAGIC %python"),
            MagicCommand::Python
        );
    }

    #[test]
    fn test_run_cells_keep_native_marker() {
        assert_eq!(MagicCommand::Run.comment_marker(Language::Sql), "--");
        assert_eq!(MagicCommand::R.comment_marker(Language::Sql), "#");
        assert_eq!(MagicCommand::Markdown.comment_marker(Language::Scala), "--");
    }
}
