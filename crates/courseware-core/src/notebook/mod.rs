//! The notebook document model.
//!
//! [`NotebookDef`] carries the publishing settings of one source notebook and
//! turns it into a student document and a solution document. All checks are
//! recorded as diagnostics; a notebook with errors is never written.

mod assemble;
mod todo;

pub use assemble::{DUMMY_REPLACEMENT, footer_cell, header_cell, replace_contents};
pub use todo::clean_todo_cell;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cell::{Cell, join_cells, split_cells};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::directive::{Directive, content_directive_count, parse_directives};
use crate::error::{Error, Result};
use crate::i18n::{GuidReplacer, Resource, bundle_markdown};
use crate::language::Language;
use crate::patterns::COPYRIGHT;
use crate::pip::{CommitResolver, PipChecker};
use crate::resources::ResourceStore;
use crate::workspace::{WorkspaceClient, join, parent};
use crate::xref::{ReferenceIndex, check_html_links, check_markdown_links, check_run_cell};

/// Tokens of the previous build system; none may survive in a cell.
const BUILD_SYSTEM_TOKENS: [&str; 18] = [
    "IPYTHON_ONLY",
    "DATABRICKS_ONLY",
    "AMAZON_ONLY",
    "AZURE_ONLY",
    "TEST",
    "PRIVATE_TEST",
    "INSTRUCTOR_NOTE",
    "INSTRUCTOR_ONLY",
    "SCALA_ONLY",
    "PYTHON_ONLY",
    "SQL_ONLY",
    "R_ONLY",
    "VIDEO",
    "ILT_ONLY",
    "SELF_PACED_ONLY",
    "INLINE",
    "NEW_PART",
    "{dbr}",
];

const PROHIBITED_DATASETS: [&str; 2] = ["/mnt/training", "/databricks-datasets"];

const INVALID_PATH_CHARS: [char; 8] = ['"', '*', '<', '>', '?', '\\', '|', ':'];

/// Ignore category that silences the prohibited dataset warnings.
pub const IGNORE_PROHIBITED_DATASET: &str = "prohibited-dataset";

/// One notebook of a course and its publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDef {
    /// Path relative to the source directory, without extension.
    pub path: String,
    /// `{{key}}` placeholder values.
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
    pub include_solution: bool,
    /// 0 = published but untested, 1 = setup/reset round, 2+ = normal.
    pub test_round: u32,
    #[serde(default)]
    pub ignored: bool,
    pub order: usize,
    #[serde(default)]
    pub i18n: bool,
    #[serde(default)]
    pub i18n_language: Option<String>,
    #[serde(default)]
    pub i18n_xml_tag_disabled: bool,
    /// Check categories to skip (`prohibited-dataset`, `lang-python`, ...).
    #[serde(default)]
    pub ignoring: Vec<String>,
    /// Course version, consulted by the `%pip` pinning rules.
    #[serde(default)]
    pub version: String,

    #[serde(skip)]
    diagnostics: Diagnostics,
    #[serde(skip)]
    i18n_guids: Vec<String>,
}

/// Collaborators and locations of one publish pass.
#[derive(Clone, Copy)]
pub struct PublishContext<'a> {
    pub client: &'a dyn WorkspaceClient,
    pub source_dir: &'a str,
    pub target_dir: &'a str,
    /// Workspace directory holding this build's translation resources.
    pub i18n_resources_dir: &'a str,
    pub resources: Option<&'a ResourceStore>,
    pub references: &'a ReferenceIndex,
    pub commit_resolver: Option<&'a dyn CommitResolver>,
    pub debugging: bool,
}

/// The documents produced from one source notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub student: String,
    /// `None` when the notebook ships without a solution.
    pub solution: Option<String>,
}

/// Where a notebook was written, and what was worth mentioning.
#[derive(Debug, Clone)]
pub struct PublishedNotebook {
    pub path: String,
    pub student_path: String,
    pub solution_path: Option<String>,
    pub warnings: Vec<Diagnostic>,
}

impl NotebookDef {
    /// A notebook with the defaults of a regular lesson: test round 2, with
    /// a solution, no replacements.
    pub fn new(path: impl Into<String>, order: usize) -> Self {
        Self {
            path: path.into(),
            replacements: BTreeMap::new(),
            include_solution: true,
            test_round: 2,
            ignored: false,
            order,
            i18n: false,
            i18n_language: None,
            i18n_xml_tag_disabled: false,
            ignoring: Vec::new(),
            version: String::new(),
            diagnostics: Diagnostics::new(),
            i18n_guids: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        self.diagnostics.errors()
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        self.diagnostics.warnings()
    }

    /// i18n GUIDs seen during the last publish pass.
    pub fn i18n_guids(&self) -> &[String] {
        &self.i18n_guids
    }

    fn ignores(&self, category: &str) -> bool {
        self.ignoring.iter().any(|c| c == category)
    }

    /// Publish the student and solution documents of this notebook.
    ///
    /// Diagnostics are reset first. Both documents are assembled and checked
    /// before anything is written, so an aborted notebook leaves the target
    /// untouched.
    pub fn publish(&mut self, ctx: &PublishContext<'_>) -> Result<PublishedNotebook> {
        self.diagnostics.clear();
        self.i18n_guids.clear();

        info!(".../{}", self.path);

        let source_path = join(ctx.source_dir, &self.path);
        let status = ctx
            .client
            .get_status(&source_path)?
            .ok_or_else(|| Error::NotFound(source_path.clone()))?;
        let language = status
            .language
            .ok_or_else(|| Error::UnsupportedLanguage(format!("{:?}", status.object_type)))?;

        let raw_source = ctx.client.export_notebook(&source_path)?;
        let resource = self.load_resource(ctx)?;

        let documents = self.render(
            language,
            &raw_source,
            resource.as_ref(),
            ctx.references,
            ctx.commit_resolver,
            ctx.debugging,
        );

        self.diagnostics.log_warnings(&self.path);

        if self.diagnostics.has_errors() {
            self.diagnostics.log_errors(&self.path);
            return Err(Error::PublishAborted {
                path: self.path.clone(),
                errors: self.diagnostics.errors().len(),
            });
        }

        let student_path = join(ctx.target_dir, &self.path);
        write_notebook(ctx.client, language, &student_path, &documents.student)?;

        let solution_path = match &documents.solution {
            Some(solution) => {
                let solution_path = join(ctx.target_dir, &format!("Solutions/{}", self.path));
                write_notebook(ctx.client, language, &solution_path, solution)?;
                Some(solution_path)
            }
            None => None,
        };

        Ok(PublishedNotebook {
            path: self.path.clone(),
            student_path,
            solution_path,
            warnings: self.diagnostics.warnings().to_vec(),
        })
    }

    fn load_resource(&mut self, ctx: &PublishContext<'_>) -> Result<Option<Resource>> {
        let Some(store) = ctx.resources else {
            return Ok(None);
        };
        if self.i18n_language.is_none() {
            return Ok(None);
        }

        match store.load(ctx.i18n_resources_dir, &self.path)? {
            Some(source) => {
                let resource = Resource::parse(&source);
                resource.check_declared_path(&self.path, &mut self.diagnostics);
                Ok(Some(resource))
            }
            None => {
                self.diagnostics.warn(
                    matches!(self.test_round, 0 | 1),
                    format!(
                        "Resource not found ({}): {}",
                        self.test_round,
                        store.file_for(ctx.i18n_resources_dir, &self.path).display()
                    ),
                );
                Ok(None)
            }
        }
    }

    /// Run every cell check and assemble both documents.
    ///
    /// Diagnostics accumulate on the notebook; callers decide what to do
    /// with errors.
    pub fn render(
        &mut self,
        language: Language,
        raw_source: &str,
        resource: Option<&Resource>,
        references: &ReferenceIndex,
        commit_resolver: Option<&dyn CommitResolver>,
        debugging: bool,
    ) -> Documents {
        let magic_md = format!("{} %md", language.magic_prefix());
        let lang_category = format!("lang-{}", language.as_str());

        let mut student_commands = Vec::new();
        let mut solution_commands = Vec::new();

        let mut todo_count = 0usize;
        let mut answer_count = 0usize;
        let mut include_header = false;
        let mut found_header_directive = false;
        let mut include_footer = false;
        let mut found_footer_directive = false;

        let pip = PipChecker {
            language,
            version: &self.version,
            resolver: commit_resolver,
        };

        for (i, raw) in split_cells(language, raw_source).iter().enumerate() {
            let cmd = i + 1;
            let mut command = raw.trim_start().to_string();

            if debugging {
                debug!("Debug Command {}", cmd);
            }

            self.diagnostics.test(
                !command.contains("DBTITLE"),
                format!("Cmd #{cmd} | Unsupported Cell-Title found"),
            );

            if !self.ignores(IGNORE_PROHIBITED_DATASET) {
                for dataset in PROHIBITED_DATASETS {
                    if let Some(line) = line_containing(&command, dataset) {
                        let prefix = format!("Cmd #{cmd} ");
                        let padding = " ".repeat(prefix.len());
                        self.diagnostics.warning(format!(
                            "{prefix}| Course includes prohibited use of {dataset}:\n{padding}| {line}"
                        ));
                    }
                }
            }

            if command.starts_with(&magic_md) {
                check_markdown_links(&command, i, &self.path, references, &mut self.diagnostics);
                check_html_links(&command, i, &mut self.diagnostics);

                if self.i18n {
                    let replacer = GuidReplacer {
                        language,
                        target_language: self.i18n_language.as_deref(),
                        resource,
                        xml_tag_disabled: self.i18n_xml_tag_disabled,
                    };
                    command = replacer.replace(&command, i, &mut self.i18n_guids, &mut self.diagnostics);
                }
            }

            check_run_cell(language, &command, i, &self.path, references, &mut self.diagnostics);

            command = pip.check(&command, i, &mut self.diagnostics);

            let cell = Cell::new(i, language, command.as_str());
            let directives = parse_directives(i, &cell.leading_comments, &mut self.diagnostics);

            if debugging {
                debug!("   |-LEADING COMMENTS: {:?}", cell.leading_comments);
                debug!("   |-DIRECTIVES: {:?}", directives);
            }

            let has = |d: Directive| directives.contains(&d);

            include_header |= has(Directive::IncludeHeaderTrue);
            found_header_directive |= has(Directive::IncludeHeaderTrue) || has(Directive::IncludeHeaderFalse);
            include_footer |= has(Directive::IncludeFooterTrue);
            found_footer_directive |= has(Directive::IncludeFooterTrue) || has(Directive::IncludeFooterFalse);

            let directive_count = content_directive_count(&directives);
            self.diagnostics.test(
                directive_count <= 1,
                format!(
                    "Cmd #{cmd} | Found multiple directives ({directive_count}): [{}]",
                    directives.iter().map(Directive::as_str).collect::<Vec<_>>().join(", ")
                ),
            );

            if cell.is_blank() {
                debug!("Cmd #{} | Skipping: Empty Cell", cmd);
            } else if has(Directive::SourceOnly) || directives.iter().any(Directive::is_header_or_footer) {
                // never published
            } else if has(Directive::Todo) {
                todo_count += 1;
                command = clean_todo_cell(language, &command, i, &mut self.diagnostics);
                student_commands.push(command.clone());
            } else if has(Directive::Answer) {
                answer_count += 1;
                solution_commands.push(command.clone());
            } else if has(Directive::Dummy) {
                student_commands.push(command.clone());
                solution_commands.push(command.replace("DUMMY", DUMMY_REPLACEMENT));
            } else {
                student_commands.push(command.clone());
                solution_commands.push(command.clone());
            }

            for token in BUILD_SYSTEM_TOKENS {
                self.diagnostics.test(
                    !command.contains(token),
                    format!("Cmd #{cmd} | Found the token \"{token}\""),
                );
            }

            if !cell.magic.is_markdown() && !self.ignores(&lang_category) {
                match language {
                    Language::Python => {
                        self.diagnostics.warn(
                            !command.contains("%python"),
                            format!("Cmd #{cmd} | Found \"%python\" in a Python notebook"),
                        );
                    }
                    Language::Sql => {
                        self.diagnostics.warn(
                            !command.contains("%sql"),
                            format!("Cmd #{cmd} | Found \"%sql\" in a SQL notebook"),
                        );
                    }
                    Language::Scala => {
                        self.diagnostics.warn(
                            !command.contains("%scala"),
                            format!("Cmd #{cmd} | Found \"%scala\" in a Scala notebook"),
                        );
                    }
                    Language::R => {
                        // "%r" alone would also match "%run"
                        self.diagnostics.warn(
                            !command.contains("%r "),
                            format!("Cmd #{cmd} | Found \"%r\" in an R notebook"),
                        );
                        self.diagnostics.warn(
                            !command.contains("%r\n"),
                            format!("Cmd #{cmd} | Found \"%r\" in an R notebook"),
                        );
                    }
                }
            }

            for found in COPYRIGHT.captures_iter(&command) {
                let year: u32 = found[1].parse().unwrap_or_default();
                if (2017..=2998).contains(&year) {
                    self.diagnostics.error(format!(
                        "Cmd #{cmd} | Found copyright ({year} Databricks, Inc)"
                    ));
                }
            }
        }

        self.diagnostics.test(
            found_header_directive,
            "One of the two header directives (INCLUDE_HEADER_TRUE or INCLUDE_HEADER_FALSE) were not found.",
        );
        self.diagnostics.test(
            found_footer_directive,
            "One of the two footer directives (INCLUDE_FOOTER_TRUE or INCLUDE_FOOTER_FALSE) were not found.",
        );
        self.diagnostics.test(
            answer_count >= todo_count,
            format!("Found more TODO commands ({todo_count}) than ANSWER commands ({answer_count})"),
        );

        if include_header {
            student_commands.insert(0, header_cell(language));
            solution_commands.insert(0, header_cell(language));
        }
        if include_footer {
            student_commands.push(footer_cell(language));
            solution_commands.push(footer_cell(language));
        }

        for key in INVALID_PATH_CHARS {
            self.diagnostics.warn(
                !self.path.contains(key),
                format!("Found invalid character {} in notebook name: {}", key, self.path),
            );
        }

        let student = replace_contents(
            &join_cells(language, &student_commands),
            &self.replacements,
            &mut self.diagnostics,
        );

        let solution = if self.include_solution {
            Some(replace_contents(
                &join_cells(language, &solution_commands),
                &self.replacements,
                &mut self.diagnostics,
            ))
        } else {
            None
        };

        Documents { student, solution }
    }

    /// Write the markdown cells of this notebook as a translation resource.
    ///
    /// Returns the written file, or `None` for a notebook without markdown.
    pub fn create_resource_bundle(
        &self,
        client: &dyn WorkspaceClient,
        source_dir: &str,
        store: &ResourceStore,
        resources_dir: &str,
    ) -> Result<Option<PathBuf>> {
        info!(".../{}", self.path);

        let source_path = join(source_dir, &self.path);
        let language = client
            .get_status(&source_path)?
            .and_then(|status| status.language)
            .ok_or_else(|| Error::NotFound(source_path.clone()))?;

        let raw_source = client.export_notebook(&source_path)?;
        let magic_md = format!("{} %md", language.magic_prefix());

        let md_commands: Vec<String> = split_cells(language, &raw_source)
            .iter()
            .map(|command| command.trim_start())
            .filter(|command| command.starts_with(&magic_md))
            .map(str::to_string)
            .collect();

        if md_commands.is_empty() {
            info!("Skipping resource - 0 MD cells: {}", self.path);
            return Ok(None);
        }

        let mut diagnostics = Diagnostics::new();
        let bundle = replace_contents(
            &bundle_markdown(language, &self.path, &md_commands),
            &self.replacements,
            &mut diagnostics,
        );
        diagnostics.log_warnings(&self.path);

        store.write(resources_dir, &self.path, &bundle).map(Some)
    }
}

/// The trimmed line of `command` containing `needle`.
fn line_containing<'c>(command: &'c str, needle: &str) -> Option<&'c str> {
    command.split('\n').find(|line| line.contains(needle)).map(str::trim)
}

fn write_notebook(
    client: &dyn WorkspaceClient,
    language: Language,
    path: &str,
    content: &str,
) -> Result<()> {
    debug!("...publishing {}", path);
    client.mkdirs(parent(path))?;
    client.import_notebook(language, path, content)
}
