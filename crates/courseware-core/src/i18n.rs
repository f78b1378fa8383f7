//! Translation resources and GUID substitution in markdown cells.
//!
//! A translation resource is a markdown file holding every markdown cell of
//! one notebook:
//!
//! ```text
//! # /Module 1/Lesson A
//! <hr>--i18n-6f1b...
//! # Welcome
//! <hr sandbox>--i18n-a0c2...
//! <img src="..."/>
//! ```
//!
//! In the source notebook each markdown cell starts with
//! `%md --i18n-<GUID>`; publishing swaps the cell body for the translated
//! text of the same GUID.

use rustc_hash::FxHashMap;

use crate::diagnostics::Diagnostics;
use crate::language::Language;
use crate::patterns::I18N_SEPARATOR;

/// Marker every i18n GUID starts with.
pub const GUID_PREFIX: &str = "--i18n-";

const XML_TAG_OPEN: &str = "<i18n value=\"";

/// Translated markdown keyed by GUID (including the `--i18n-` prefix).
pub type GuidMap = FxHashMap<String, String>;

/// Undo the separator rewrite done by markdown editors.
pub fn normalize_resource(source: &str) -> String {
    source
        .replace("<hr />\n--i18n-", "<hr>--i18n-")
        .replace("<hr sandbox />\n--i18n-", "<hr sandbox>--i18n-")
}

/// A parsed translation resource.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    /// Notebook path declared on the first line, without the `# /` prefix.
    pub declared_path: String,
    pub guids: GuidMap,
}

impl Resource {
    /// Parse a (normalized) resource document.
    pub fn parse(source: &str) -> Self {
        let mut parts = I18N_SEPARATOR.split(source);

        let head = parts.next().unwrap_or_default().trim();
        let declared_path = head.strip_prefix("# /").unwrap_or(head).to_string();

        let guids = parts.map(parse_guid_and_value).collect();

        Self {
            declared_path,
            guids,
        }
    }

    /// The declared path must name the notebook the resource is loaded for.
    pub fn check_declared_path(&self, path: &str, diagnostics: &mut Diagnostics) -> bool {
        diagnostics.test(
            self.declared_path == path,
            format!(
                "Expected the notebook \"{}\" but found \"{}\"",
                path, self.declared_path
            ),
        )
    }

    pub fn get(&self, guid: &str) -> Option<&str> {
        self.guids.get(guid).map(String::as_str)
    }
}

/// Split one resource segment into its GUID and translated text.
///
/// The first line is the GUID without its `--i18n-` prefix.
pub fn parse_guid_and_value(part: &str) -> (String, String) {
    let (guid, value) = match part.find('\n') {
        Some(pos) => (&part[..pos], &part[pos + 1..]),
        None => (part, ""),
    };
    (format!("{}{}", GUID_PREFIX, guid).trim().to_string(), value.to_string())
}

/// Prefix each line of `text` with the magic marker of `language`.
pub fn to_magic_lines(language: Language, text: &str) -> Vec<String> {
    let prefix = language.magic_prefix();
    text.trim_end_matches('\n')
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                prefix.clone()
            } else {
                format!("{} {}", prefix, line)
            }
        })
        .collect()
}

/// Extract the GUID of a published cell's `<i18n value="..."/>` tag.
///
/// Only the first line is inspected. The returned GUID carries the
/// `--i18n-` prefix.
pub fn extract_xml_guid(command: &str) -> Option<String> {
    let line_zero = command.trim().split('\n').next().unwrap_or_default();
    let start = line_zero.find(XML_TAG_OPEN)? + XML_TAG_OPEN.len();
    let end = line_zero[start..].find('"')? + start;
    Some(format!("{}{}", GUID_PREFIX, &line_zero[start..end]))
}

/// Settings for rewriting the markdown cells of one notebook.
#[derive(Debug, Clone, Copy)]
pub struct GuidReplacer<'a> {
    pub language: Language,
    /// Target language of a translated build, `None` for the source language.
    pub target_language: Option<&'a str>,
    pub resource: Option<&'a Resource>,
    pub xml_tag_disabled: bool,
}

impl GuidReplacer<'_> {
    /// Validate the i18n directive of a markdown cell and rewrite the cell.
    ///
    /// GUIDs are recorded in `seen` so duplicates across one publish pass are
    /// reported. The command is returned unchanged when any check fails.
    pub fn replace(
        &self,
        command: &str,
        index: usize,
        seen: &mut Vec<String>,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let cmd = index + 1;
        let magic = format!("{} ", self.language.magic_prefix());

        let mut lines: Vec<String> = command.trim().split('\n').map(str::to_string).collect();
        let line_zero = lines[0].strip_prefix(magic.as_str()).unwrap_or(&lines[0]).to_string();
        let parts: Vec<&str> = line_zero.split_whitespace().collect();

        let md_tag = parts.first().copied().unwrap_or_default();
        let guid = parts.get(1).copied().unwrap_or_default();

        let mut passed = diagnostics.test(
            lines.len() > 1,
            format!(
                "Cmd #{cmd} | Expected MD to have more than 1 line of code with i18n enabled: {line_zero}"
            ),
        );

        if parts.len() < 2 {
            diagnostics.error(format!("Cmd #{cmd} | Missing the i18n directive: {line_zero}"));
            passed = false;
        } else {
            passed &= diagnostics.test(
                parts.len() == 2,
                format!(
                    "Cmd #{cmd} | Expected the first line of MD to have only two words, found {}: {line_zero}",
                    parts.len()
                ),
            );
            passed &= diagnostics.test(
                md_tag == "%md" || md_tag == "%md-sandbox",
                format!(
                    "Cmd #{cmd} | Expected word[0] of the first line of MD to be \"%md\" or \"%md-sandbox\", found {md_tag}: {line_zero}"
                ),
            );
            passed &= diagnostics.test(
                guid.starts_with(GUID_PREFIX),
                format!(
                    "Cmd #{cmd} | Expected word[1] of the first line of MD to start with \"{GUID_PREFIX}\", found {guid}: {line_zero}"
                ),
            );
        }

        if passed {
            passed = diagnostics.test(
                !seen.iter().any(|g| g == guid),
                format!("Cmd #{cmd} | Duplicate i18n GUID found: {guid}"),
            );
        }

        if !passed {
            return command.to_string();
        }

        seen.push(guid.to_string());

        match self.target_language {
            None => {
                lines.remove(0);
            }
            Some(target) => {
                let translated = self.resource.and_then(|r| r.get(guid));
                diagnostics.warn(
                    translated.is_some(),
                    format!("The GUID \"{guid}\" was not found for the translation of {target}"),
                );
                match translated {
                    Some(text) => lines = to_magic_lines(self.language, text),
                    None => {
                        lines.remove(0);
                    }
                }
            }
        }

        let header = if self.xml_tag_disabled {
            format!("{}{}", magic, md_tag)
        } else {
            format!(
                "{}{} <i18n value=\"{}\"/>",
                magic,
                md_tag,
                &guid[GUID_PREFIX.len()..]
            )
        };
        lines.insert(0, header);

        lines.join("\n")
    }
}

/// Render the markdown cells of a notebook as a translation resource.
///
/// Placeholder replacements are left to the caller.
pub fn bundle_markdown(language: Language, path: &str, md_commands: &[String]) -> String {
    let magic = language.magic_prefix();
    let magic_space = format!("{} ", magic);

    let mut source = format!("# /{}\n", path);

    for command in md_commands {
        let stripped: Vec<&str> = command
            .split('\n')
            .map(|line| {
                if line == magic {
                    ""
                } else {
                    line.strip_prefix(magic_space.as_str()).unwrap_or(line)
                }
            })
            .collect();

        let text = stripped
            .join("\n")
            .replace("%md-sandbox --i18n-", "<hr sandbox>--i18n-")
            .replace("%md --i18n-", "<hr>--i18n-");

        source.push_str(&text);
        source.push('\n');
    }

    source
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOURCE: &str = "# /Module 1/Lesson A\n<hr>--i18n-aaa\n# Bonjour\nLe monde\n<hr sandbox>--i18n-bbb\n<img src=\"x\"/>\n";

    #[test]
    fn test_normalize_resource() {
        let source = "# /A\n<hr />\n--i18n-aaa\nText\n<hr sandbox />\n--i18n-bbb\nMore";
        assert_eq!(
            normalize_resource(source),
            "# /A\n<hr>--i18n-aaa\nText\n<hr sandbox>--i18n-bbb\nMore"
        );
    }

    #[test]
    fn test_parse_resource() {
        let resource = Resource::parse(RESOURCE);
        assert_eq!(resource.declared_path, "Module 1/Lesson A");
        assert_eq!(resource.guids.len(), 2);
        assert_eq!(resource.get("--i18n-aaa"), Some("# Bonjour\nLe monde\n"));
        assert_eq!(resource.get("--i18n-bbb"), Some("<img src=\"x\"/>\n"));

        let mut diagnostics = Diagnostics::new();
        assert!(resource.check_declared_path("Module 1/Lesson A", &mut diagnostics));
        assert!(!resource.check_declared_path("Module 1/Lesson B", &mut diagnostics));
        assert_eq!(diagnostics.errors().len(), 1);
    }

    #[test]
    fn test_extract_xml_guid() {
        let command = "# MAGIC %md <i18n value=\"abc-123\"/>\n# MAGIC # Hello";
        assert_eq!(extract_xml_guid(command).as_deref(), Some("--i18n-abc-123"));
        assert_eq!(extract_xml_guid("# MAGIC %md\n# MAGIC # Hello"), None);
    }

    fn replacer<'a>(target: Option<&'a str>, resource: Option<&'a Resource>) -> GuidReplacer<'a> {
        GuidReplacer {
            language: Language::Python,
            target_language: target,
            resource,
            xml_tag_disabled: false,
        }
    }

    #[test]
    fn test_source_language_drops_directive_line() {
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let command = "# MAGIC %md --i18n-aaa\n# MAGIC # Hello";

        let result = replacer(None, None).replace(command, 0, &mut seen, &mut diagnostics);

        assert_eq!(result, "# MAGIC %md <i18n value=\"aaa\"/>\n# MAGIC # Hello");
        assert_eq!(seen, vec!["--i18n-aaa"]);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_xml_tag_disabled() {
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let mut replacer = replacer(None, None);
        replacer.xml_tag_disabled = true;

        let result = replacer.replace(
            "# MAGIC %md-sandbox --i18n-aaa\n# MAGIC # Hello",
            0,
            &mut seen,
            &mut diagnostics,
        );
        assert_eq!(result, "# MAGIC %md-sandbox\n# MAGIC # Hello");
    }

    #[test]
    fn test_translated_text_is_substituted() {
        let resource = Resource::parse(RESOURCE);
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();

        let result = replacer(Some("french-v1.0.0"), Some(&resource)).replace(
            "# MAGIC %md --i18n-aaa\n# MAGIC # Hello\n# MAGIC\n# MAGIC World",
            0,
            &mut seen,
            &mut diagnostics,
        );

        assert_eq!(
            result,
            "# MAGIC %md <i18n value=\"aaa\"/>\n# MAGIC # Bonjour\n# MAGIC Le monde"
        );
        assert!(diagnostics.warnings().is_empty());
    }

    #[test]
    fn test_missing_translation_keeps_content() {
        let resource = Resource::parse(RESOURCE);
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();

        let result = replacer(Some("french-v1.0.0"), Some(&resource)).replace(
            "# MAGIC %md --i18n-zzz\n# MAGIC # Hello",
            3,
            &mut seen,
            &mut diagnostics,
        );

        assert_eq!(result, "# MAGIC %md <i18n value=\"zzz\"/>\n# MAGIC # Hello");
        assert_eq!(diagnostics.warnings().len(), 1);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_duplicate_guid_is_an_error() {
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let replacer = replacer(None, None);
        let command = "# MAGIC %md --i18n-aaa\n# MAGIC # Hello";

        replacer.replace(command, 0, &mut seen, &mut diagnostics);
        let second = replacer.replace(command, 1, &mut seen, &mut diagnostics);

        assert_eq!(second, command);
        assert_eq!(diagnostics.errors().len(), 1);
        assert!(diagnostics.errors()[0].message.starts_with("Cmd #2 | Duplicate"));
    }

    #[test]
    fn test_malformed_directive_checks_all_run() {
        let mut seen = Vec::new();
        let mut diagnostics = Diagnostics::new();

        // Single line, three words, wrong tag and wrong GUID prefix.
        replacer(None, None).replace("# MAGIC %mdx aaa extra", 0, &mut seen, &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 4);

        diagnostics.clear();
        replacer(None, None).replace("# MAGIC %md\n# MAGIC Hi", 0, &mut seen, &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 1);
        assert!(diagnostics.errors()[0].message.contains("Missing the i18n directive"));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_bundle_markdown() {
        let commands = vec![
            "# MAGIC %md --i18n-aaa\n# MAGIC # Hello\n# MAGIC\n# MAGIC World".to_string(),
            "# MAGIC %md-sandbox --i18n-bbb\n# MAGIC <img/>".to_string(),
        ];
        let bundle = bundle_markdown(Language::Python, "Lesson", &commands);
        assert_eq!(
            bundle,
            "# /Lesson\n<hr>--i18n-aaa\n# Hello\n\nWorld\n<hr sandbox>--i18n-bbb\n<img/>\n"
        );

        let resource = Resource::parse(&bundle);
        assert_eq!(resource.declared_path, "Lesson");
        assert_eq!(resource.get("--i18n-aaa"), Some("# Hello\n\nWorld\n"));
    }
}
