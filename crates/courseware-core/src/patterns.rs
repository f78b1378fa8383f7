//! Cached regex patterns for notebook processing.

use regex::Regex;
use std::sync::LazyLock;

/// Characters that must not appear in a directive, replaced by `_` to detect
/// incidental punctuation.
pub static NON_DIRECTIVE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-a-zA-Z_]").unwrap());

/// Markdown link `[label](target)`; image links are filtered by the caller.
pub static MD_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!?\[.*?\]\(.*?\)").unwrap());

/// Notebook-relative target inside a markdown link: `($./path)`.
pub static MD_NOTEBOOK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\$.*\)").unwrap());

/// HTML anchor span.
pub static HTML_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<a .*?</a>").unwrap());

/// Placeholder left unresolved after all replacements.
pub static MUSTACHE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[a-zA-Z\-\\_#/]*\}\}").unwrap());

/// Segment separator of a translation resource.
pub static I18N_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^<hr>--i18n-|^<hr sandbox>--i18n-").unwrap());

/// Copyright notice with a four digit year.
pub static COPYRIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}) Databricks, Inc").unwrap());

/// Line prefix of magic-command cells, used when flattening `%pip` commands.
pub static MAGIC_LINE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#|--|//) MAGIC ").unwrap());
