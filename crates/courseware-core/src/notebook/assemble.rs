//! Injected cells and placeholder replacement of assembled documents.

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};

use crate::diagnostics::Diagnostics;
use crate::language::Language;
use crate::patterns::MUSTACHE;

/// Replacement text of `DUMMY` in the solution document.
pub const DUMMY_REPLACEMENT: &str =
    "DUMMY: Ya, that wasn't too smart. Then again, this is just a dummy-directive";

const DEPRECATED_ICONS: [&str; 5] = [":HINT:", ":CAUTION:", ":BESTPRACTICE:", ":SIDENOTE:", ":NOTE:"];

/// Branding banner placed first when `INCLUDE_HEADER_TRUE` is present.
pub fn header_cell(language: Language) -> String {
    let m = language.magic_prefix();
    [
        format!("{m} %md-sandbox"),
        m.clone(),
        format!("{m} <div style=\"text-align: center; line-height: 0; padding-top: 9px;\">"),
        format!(
            "{m}   <img src=\"https://databricks.com/wp-content/uploads/2018/03/db-academy-rgb-1200px.png\" alt=\"Databricks Learning\" style=\"width: 600px\">"
        ),
        format!("{m} </div>"),
    ]
    .join("\n")
}

/// Copyright and trademark notice appended when `INCLUDE_FOOTER_TRUE` is
/// present.
pub fn footer_cell(language: Language) -> String {
    footer_cell_for_year(language, Utc::now().year())
}

fn footer_cell_for_year(language: Language, year: i32) -> String {
    let m = language.magic_prefix();
    [
        format!("{m} %md-sandbox"),
        format!("{m} &copy; {year} Databricks, Inc. All rights reserved.<br/>"),
        format!(
            "{m} Apache, Apache Spark, Spark and the Spark logo are trademarks of the <a href=\"https://www.apache.org/\">Apache Software Foundation</a>.<br/>"
        ),
        format!("{m} <br/>"),
        format!(
            "{m} <a href=\"https://databricks.com/privacy-policy\">Privacy Policy</a> | <a href=\"https://databricks.com/terms-of-use\">Terms of Use</a> | <a href=\"https://help.databricks.com/\">Support</a>"
        ),
    ]
    .join("\n")
}

/// Substitute `{{key}}` placeholders and flag anything left over.
pub fn replace_contents(
    contents: &str,
    replacements: &BTreeMap<String, String>,
    diagnostics: &mut Diagnostics,
) -> String {
    let mut contents = contents.to_string();

    for (key, value) in replacements {
        contents = contents.replace(&format!("{{{{{}}}}}", key), value);
    }

    if let Some(found) = MUSTACHE.find(&contents) {
        diagnostics.error(format!(
            "A mustache pattern was detected after all replacements were processed: {}",
            found.as_str()
        ));
    }

    for icon in DEPRECATED_ICONS {
        diagnostics.test(
            !contents.contains(icon),
            format!("The deprecated {icon} pattern was found after all replacements were processed."),
        );
    }

    contents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_cell_is_a_magic_cell() {
        let header = header_cell(Language::Sql);
        assert!(header.starts_with("-- MAGIC %md-sandbox\n"));
        assert!(header.lines().all(|l| l.starts_with("-- MAGIC")));
    }

    #[test]
    fn test_footer_cell_year() {
        let footer = footer_cell_for_year(Language::Python, 2031);
        assert!(footer.contains("&copy; 2031 Databricks, Inc."));
        assert!(footer.lines().all(|l| l.starts_with("# MAGIC")));
    }

    #[test]
    fn test_replace_contents() {
        let mut diagnostics = Diagnostics::new();
        let mut replacements = BTreeMap::new();
        replacements.insert("version_number".to_string(), "1.2.3".to_string());

        let result = replace_contents("v{{version_number}}", &replacements, &mut diagnostics);
        assert_eq!(result, "v1.2.3");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_leftover_placeholders_and_icons() {
        let mut diagnostics = Diagnostics::new();
        replace_contents("{{built_on}} :HINT: :NOTE:", &BTreeMap::new(), &mut diagnostics);

        let messages: Vec<_> = diagnostics.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("{{built_on}}"));
        assert!(messages[1].contains(":HINT:"));
        assert!(messages[2].contains(":NOTE:"));
    }
}
