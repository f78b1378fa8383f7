//! Directives embedded in the leading comments of a cell.

use std::fmt;
use std::str::FromStr;

use crate::diagnostics::Diagnostics;
use crate::patterns::NON_DIRECTIVE_CHARS;

/// Upper-case SQL keywords that look like directives when a SQL statement is
/// commented out.
const SQL_KEYWORDS: [&str; 4] = ["SELECT", "FROM", "AS", "AND"];

/// A structural marker controlling how a cell is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Exercise cell: published to students with its comments removed.
    Todo,
    /// Solution cell: published to the solution notebook only.
    Answer,
    /// Never published.
    SourceOnly,
    /// Test directive: the solution copy has its text rewritten.
    Dummy,
    IncludeHeaderTrue,
    IncludeHeaderFalse,
    IncludeFooterTrue,
    IncludeFooterFalse,
}

impl Directive {
    pub const ALL: [Directive; 8] = [
        Directive::SourceOnly,
        Directive::Answer,
        Directive::Todo,
        Directive::Dummy,
        Directive::IncludeHeaderTrue,
        Directive::IncludeHeaderFalse,
        Directive::IncludeFooterTrue,
        Directive::IncludeFooterFalse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Answer => "ANSWER",
            Self::SourceOnly => "SOURCE_ONLY",
            Self::Dummy => "DUMMY",
            Self::IncludeHeaderTrue => "INCLUDE_HEADER_TRUE",
            Self::IncludeHeaderFalse => "INCLUDE_HEADER_FALSE",
            Self::IncludeFooterTrue => "INCLUDE_FOOTER_TRUE",
            Self::IncludeFooterFalse => "INCLUDE_FOOTER_FALSE",
        }
    }

    /// Header and footer directives do not count towards the one-per-cell limit.
    pub fn is_header_or_footer(&self) -> bool {
        matches!(
            self,
            Self::IncludeHeaderTrue
                | Self::IncludeHeaderFalse
                | Self::IncludeFooterTrue
                | Self::IncludeFooterFalse
        )
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directive {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or(())
    }
}

/// Extract the directives from the leading comments of cell `index`.
///
/// Rules are applied in a fixed order; later rules assume earlier ones have
/// already filtered SQL keywords and `FILL-IN` placeholders.
pub fn parse_directives(
    index: usize,
    comments: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<Directive> {
    let cmd = index + 1;
    let mut directives = Vec::new();

    for line in comments {
        if *line != line.to_uppercase() {
            continue;
        }

        let candidate = line.trim();

        if SQL_KEYWORDS.contains(&candidate) {
            continue;
        }

        if candidate.contains("FILL-IN") || candidate.contains("FILL_IN") {
            continue;
        }

        match candidate.parse::<Directive>() {
            Ok(Directive::Dummy) | Err(()) => {}
            Ok(directive) => {
                directives.push(directive);
                continue;
            }
        }

        let normalized = NON_DIRECTIVE_CHARS.replace_all(candidate, "_");
        if normalized != candidate {
            if normalized == "__TODO" || normalized == "___TODO" {
                diagnostics.error(format!("Cmd #{cmd} | Found double-comment of TODO directive"));
            }
            continue;
        }

        let no_space = diagnostics.warn(
            !candidate.contains(' '),
            format!("Cmd #{cmd} | Whitespace found in directive \"{candidate}\": {line}"),
        );
        let no_hyphen = diagnostics.warn(
            !candidate.contains('-'),
            format!("Cmd #{cmd} | Hyphen found in directive \"{candidate}\": {line}"),
        );
        let supported = candidate.parse::<Directive>();
        let is_supported = diagnostics.warn(
            supported.is_ok(),
            format!("Cmd #{cmd} | Unsupported directive \"{candidate}\""),
        );

        if no_space && no_hyphen && is_supported {
            if let Ok(directive) = supported {
                directives.push(directive);
            }
        }
    }

    directives
}

/// Number of directives that are neither header nor footer directives.
pub fn content_directive_count(directives: &[Directive]) -> usize {
    directives.iter().filter(|d| !d.is_header_or_footer()).count()
}
