//! Cross-reference validation between notebooks of one course.
//!
//! `%run` commands and markdown links of the form `[label]($./path)` refer to
//! other notebooks by a path relative to the referring notebook. Every such
//! reference must resolve to a notebook, or a directory containing notebooks.

use rustc_hash::FxHashSet;

use crate::diagnostics::Diagnostics;
use crate::language::Language;
use crate::patterns::{HTML_LINK, MD_LINK, MD_NOTEBOOK_TARGET};

/// Every notebook path of a course plus all of their ancestor directories.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    paths: FxHashSet<String>,
}

impl ReferenceIndex {
    pub fn new<I, S>(notebook_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths = FxHashSet::default();

        for path in notebook_paths {
            let path = path.as_ref();
            paths.insert(path.to_string());

            let mut directory = parent_of(path);
            loop {
                paths.insert(directory.to_string());
                if !directory.contains('/') {
                    break;
                }
                directory = parent_of(directory);
            }
        }

        Self { paths }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Everything before the last `/`, or `""` for a top-level path.
fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[..pos]).unwrap_or("")
}

/// Outcome of resolving a relative reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The target neither starts with `./` nor `../`.
    Ambiguous,
    /// The normalized path the target points to.
    Resolved(String),
}

/// Resolve `target` against the directory of the notebook at `referrer`.
///
/// Each leading `../` moves one directory further up; a single leading `./`
/// is dropped.
pub fn resolve(referrer: &str, target: &str) -> Resolution {
    if !target.starts_with("../") && !target.starts_with("./") {
        return Resolution::Ambiguous;
    }

    let mut offset = 1usize;
    let mut target = target;

    if target.starts_with("../") {
        while let Some(rest) = target.strip_prefix("../") {
            offset += 1;
            target = rest;
        }
    } else if let Some(rest) = target.strip_prefix("./") {
        target = rest;
    }

    let mut resolved = target.to_string();

    if referrer.contains('/') {
        let segments: Vec<&str> = referrer.split('/').collect();
        let keep = segments.len().saturating_sub(offset);
        let parent = segments[..keep].join("/");
        resolved = format!("{}/{}", parent, target);
    }

    if let Some(stripped) = resolved.strip_prefix('/') {
        resolved = stripped.to_string();
    }

    Resolution::Resolved(resolved)
}

/// Check that a notebook reference found in command `index` exists.
pub fn check_reference(
    index: usize,
    what: &str,
    original_target: &str,
    target: &str,
    referrer: &str,
    references: &ReferenceIndex,
    diagnostics: &mut Diagnostics,
) {
    let cmd = index + 1;
    match resolve(referrer, target) {
        Resolution::Ambiguous => diagnostics.warning(format!(
            "Cmd #{cmd} | Found unexpected, relative, {what} target: \"{original_target}\" resolved as \"{target}\""
        )),
        Resolution::Resolved(resolved) => {
            diagnostics.test(
                references.contains(&resolved),
                format!(
                    "Cmd #{cmd} | Cannot find notebook for the {what} target: \"{original_target}\" resolved as \"{resolved}\""
                ),
            );
        }
    }
}

/// Validate the target of a `%run` command.
pub fn check_run_cell(
    language: Language,
    command: &str,
    index: usize,
    referrer: &str,
    references: &ReferenceIndex,
    diagnostics: &mut Diagnostics,
) {
    let prefix = format!("{} %run", language.magic_prefix());
    if !command.starts_with(&prefix) {
        return;
    }

    let line_zero = command.split('\n').next().unwrap_or_default();
    let mut link = line_zero[prefix.len()..].trim();

    if let Some(quoted) = link.strip_prefix('"') {
        match quoted.find('"') {
            Some(end) => link = &quoted[..end],
            None => {
                diagnostics.warning(format!(
                    "Cmd #{} | Missing closing quote in %run target",
                    index + 1
                ));
                return;
            }
        }
    } else if let Some(pos) = link.find(' ') {
        link = &link[..pos];
    }

    check_reference(index, "%run", link, link, referrer, references, diagnostics);
}

/// Validate notebook links (`[label]($./path)`) of a markdown command.
pub fn check_markdown_links(
    command: &str,
    index: usize,
    referrer: &str,
    references: &ReferenceIndex,
    diagnostics: &mut Diagnostics,
) {
    for link in MD_LINK.find_iter(command) {
        let link = link.as_str();
        if link.starts_with('!') {
            continue;
        }

        if let Some(found) = MD_NOTEBOOK_TARGET.find(link) {
            let found = found.as_str();
            let original_target = &found[1..found.len() - 1];
            let target = &original_target[1..];
            check_reference(
                index,
                "MD link",
                original_target,
                target,
                referrer,
                references,
                diagnostics,
            );
        }
    }
}

/// HTML anchors must open in a new tab.
pub fn check_html_links(command: &str, index: usize, diagnostics: &mut Diagnostics) {
    for link in HTML_LINK.find_iter(command) {
        let link = link.as_str();
        diagnostics.warn(
            link.contains("target=\"_blank\""),
            format!(
                "Cmd #{} | Found HTML link without the required target=\"_blank\": {}",
                index + 1,
                link
            ),
        );
    }
}
