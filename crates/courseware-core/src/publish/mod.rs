//! Publication of a whole course.
//!
//! The [`Publisher`] owns the notebook set of one [`BuildConfig`] and writes
//! the student and solution documents of every notebook into the target
//! directory. Publication is gated: [`Publisher::validate`] must have been
//! called, and when a target repository is configured its reset must have
//! succeeded.

mod docs;

pub use docs::{DOCS_TIMEOUT, DocsRun, NotebookRunner, generate_docs};

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::BuildConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::notebook::{NotebookDef, PublishContext, PublishedNotebook};
use crate::pip::CommitResolver;
use crate::resources::ResourceStore;
use crate::workspace::{RepoClient, WorkspaceClient, join};
use crate::xref::ReferenceIndex;

/// The notebook every course must ship; it is published last.
pub const VERSION_INFO_NOTEBOOK: &str = "Version Info";

/// Entries of the target directory that survive cleaning.
pub const KEEPERS: [&str; 4] = [".gitignore", "README.md", "LICENSE", "docs"];

/// Format of the `built_on` replacement.
pub const BUILT_ON_FORMAT: &str = "%b %-d, %Y at %H:%M:%S UTC";

/// Options of one publish pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Keep the previously published Version Info instead of republishing it.
    pub testing: bool,
    /// Log every cell while rendering.
    pub debugging: bool,
}

/// What a publish pass wrote.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub target_dir: String,
    /// Published notebooks in publication order.
    pub published: Vec<PublishedNotebook>,
    /// Whether Version Info was restored from the previous publication.
    pub restored_version_info: bool,
}

impl PublishReport {
    /// Warnings per notebook, skipping notebooks without any.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.published
            .iter()
            .filter(|n| !n.warnings.is_empty())
            .map(|n| (n.path.as_str(), n.warnings.as_slice()))
    }
}

/// Publishes the notebooks of one build.
pub struct Publisher<'a> {
    client: &'a dyn WorkspaceClient,
    resources: Option<&'a ResourceStore>,
    commit_resolver: Option<&'a dyn CommitResolver>,

    config: BuildConfig,
    target_dir: String,
    target_repo_url: Option<String>,
    i18n_resources_dir: String,
    common_language: String,

    validated: bool,
    /// `false` from the moment a repo reset is attempted until it succeeds.
    validated_repo_reset: bool,
}

impl<'a> Publisher<'a> {
    /// Take over the notebooks of `config`.
    ///
    /// Every notebook receives the `version_number` and `built_on`
    /// replacements, and the white and black lists are checked against the
    /// notebook set.
    pub fn new(config: BuildConfig, client: &'a dyn WorkspaceClient) -> Result<Self> {
        let mut config = config;

        let built_on = Utc::now().format(BUILT_ON_FORMAT).to_string();
        for notebook in config.notebooks.values_mut() {
            notebook
                .replacements
                .insert("version_number".to_string(), config.version.clone());
            notebook
                .replacements
                .insert("built_on".to_string(), built_on.clone());
        }

        validate_white_black_list(&config)?;

        let target_dir = format!(
            "{}/Published/{} - v{}",
            config.source_repo, config.name, config.version
        );
        let i18n_resources_dir = format!(
            "{}/Resources/{}",
            config.source_repo,
            config.i18n_language.as_deref().unwrap_or("None")
        );
        let common_language = config.common_language().to_string();

        Ok(Self {
            client,
            resources: None,
            commit_resolver: None,
            config,
            target_dir,
            target_repo_url: None,
            i18n_resources_dir,
            common_language,
            validated: false,
            validated_repo_reset: true,
        })
    }

    /// Read translation resources from `store`.
    pub fn with_resources(mut self, store: &'a ResourceStore) -> Self {
        self.resources = Some(store);
        self
    }

    /// Pin unpinned academy libraries through `resolver`.
    pub fn with_commit_resolver(mut self, resolver: &'a dyn CommitResolver) -> Self {
        self.commit_resolver = Some(resolver);
        self
    }

    /// Publish into `target_dir` instead of the default directory.
    pub fn with_target_dir(mut self, target_dir: impl Into<String>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    pub fn target_repo_url(&self) -> Option<&str> {
        self.target_repo_url.as_deref()
    }

    pub fn i18n_resources_dir(&self) -> &str {
        &self.i18n_resources_dir
    }

    pub fn common_language(&self) -> &str {
        &self.common_language
    }

    pub fn notebook(&self, path: &str) -> Option<&NotebookDef> {
        self.config.notebooks.get(path)
    }

    /// Log the source, the target and the change log, and unlock
    /// publication.
    pub fn validate(&mut self) {
        info!("Source: {}", self.config.source_dir);
        info!("Target: {}", self.target_dir);
        info!("Change Log:");
        for entry in &self.config.change_log {
            info!("  {}", entry);
        }
        self.validated = true;
    }

    /// Both the explicit validation and any attempted repo reset passed.
    pub fn validated(&self) -> bool {
        self.validated && self.validated_repo_reset
    }

    /// Reset the git checkout that receives the published notebooks and
    /// make it the target directory.
    pub fn configure_target_repo(
        &mut self,
        repos: &dyn RepoClient,
        target_dir: Option<&str>,
        target_repo_url: Option<&str>,
        branch: Option<&str>,
    ) -> Result<()> {
        self.validated_repo_reset = false;

        let target_dir = target_dir.map(str::to_string).unwrap_or_else(|| {
            format!(
                "/Repos/Temp/{}-{}-{}",
                self.config.username, self.config.build_name, self.common_language
            )
        });
        let target_repo_url = target_repo_url.map(str::to_string).unwrap_or_else(|| {
            format!(
                "{}/{}-{}.git",
                self.config.repo_base_url, self.config.build_name, self.common_language
            )
        });
        let branch = branch.unwrap_or("published");

        info!("Resetting git repo:");
        info!(" - Branch: \"{}\"", branch);
        info!(" - Target: {}", target_dir);
        info!(" - Source: {}", target_repo_url);

        repos.reset(&target_dir, &target_repo_url, branch)?;

        self.target_dir = target_dir;
        self.target_repo_url = Some(target_repo_url);
        self.validated_repo_reset = true;
        Ok(())
    }

    /// Publish every non-blacklisted notebook into the target directory.
    ///
    /// A notebook aborted by its own diagnostics does not stop the others,
    /// but it keeps Version Info from being published and fails the pass.
    pub fn publish_notebooks(&mut self, options: PublishOptions) -> Result<PublishReport> {
        if !self.validated() {
            return Err(Error::NotValidated("Publisher"));
        }

        let black_list = self.config.black_list.clone().unwrap_or_default();
        let mut main_notebooks: Vec<(usize, String)> = Vec::new();
        let mut found_version_info = false;

        for notebook in self.config.notebooks.values() {
            if black_list.contains(&notebook.path) {
                continue;
            }
            if notebook.path == VERSION_INFO_NOTEBOOK {
                found_version_info = true;
            } else {
                main_notebooks.push((notebook.order, notebook.path.clone()));
            }
        }
        main_notebooks.sort();

        if !found_version_info {
            return Err(Error::RequiredNotebookMissing(VERSION_INFO_NOTEBOOK.to_string()));
        }

        info!("Source: {}", self.config.source_dir);
        info!("Target: {}", self.target_dir);
        info!("  testing =   {}", options.testing);
        info!("  debugging = {}", options.debugging);
        log_list("exclude", self.config.black_list.as_deref());
        log_list("include", self.config.white_list.as_deref());

        let version_info_path = join(&self.target_dir, VERSION_INFO_NOTEBOOK);
        let backup = if options.testing {
            self.backup_notebook(&version_info_path)?
        } else {
            None
        };

        if self.client.get_status(&self.target_dir)?.is_some() {
            Self::clean_target_dir(self.client, &self.target_dir)?;
        }

        let references = ReferenceIndex::new(self.config.notebooks.keys());
        let ctx = PublishContext {
            client: self.client,
            source_dir: &self.config.source_dir,
            target_dir: &self.target_dir,
            i18n_resources_dir: &self.i18n_resources_dir,
            resources: self.resources,
            references: &references,
            commit_resolver: self.commit_resolver,
            debugging: options.debugging,
        };

        let mut published = Vec::with_capacity(main_notebooks.len() + 1);
        let mut failed = Vec::new();

        for (_, path) in &main_notebooks {
            let Some(notebook) = self.config.notebooks.get_mut(path) else {
                continue;
            };
            match notebook.publish(&ctx) {
                Ok(result) => published.push(result),
                Err(Error::PublishAborted { path, errors }) => {
                    error!("Aborted publication of \"{}\" ({} errors)", path, errors);
                    failed.push(path);
                }
                Err(e) => return Err(e),
            }
        }

        if !failed.is_empty() {
            warn!(
                "Skipping \"{}\" because {} notebook(s) failed",
                VERSION_INFO_NOTEBOOK,
                failed.len()
            );
            return Err(Error::PublishFailed { failed });
        }

        let restored_version_info = match backup {
            Some((language, content)) => {
                info!("Restoring \"{}\"", VERSION_INFO_NOTEBOOK);
                self.client.mkdirs(&self.target_dir)?;
                self.client
                    .import_notebook(language, &version_info_path, &content)?;
                true
            }
            None => {
                if let Some(notebook) = self.config.notebooks.get_mut(VERSION_INFO_NOTEBOOK) {
                    match notebook.publish(&ctx) {
                        Ok(result) => published.push(result),
                        Err(Error::PublishAborted { path, .. }) => {
                            return Err(Error::PublishFailed { failed: vec![path] });
                        }
                        Err(e) => return Err(e),
                    }
                }
                false
            }
        };

        info!("All done!");

        Ok(PublishReport {
            target_dir: self.target_dir.clone(),
            published,
            restored_version_info,
        })
    }

    fn backup_notebook(&self, path: &str) -> Result<Option<(Language, String)>> {
        let Some(status) = self.client.get_status(path)? else {
            return Ok(None);
        };
        let Some(language) = status.language else {
            return Ok(None);
        };
        info!("Backing up \"{}\"", path);
        Ok(Some((language, self.client.export_notebook(path)?)))
    }

    /// Delete everything in `target_dir` except the [`KEEPERS`].
    pub fn clean_target_dir(client: &dyn WorkspaceClient, target_dir: &str) -> Result<()> {
        info!("Cleaning {}...", target_dir);

        let keepers: Vec<String> = KEEPERS.iter().map(|k| join(target_dir, k)).collect();
        let entries = client.ls(target_dir, false)?.unwrap_or_default();

        for entry in entries {
            if keepers.contains(&entry.path) {
                continue;
            }
            info!("...{}", entry.path);
            client.delete_path(&entry.path)?;
        }
        Ok(())
    }

    /// Write the markdown of every notebook as an English resource bundle.
    ///
    /// Returns the written files, none for a translated build.
    pub fn create_resource_bundle(
        &self,
        store: &ResourceStore,
        folder_name: Option<&str>,
        target_dir: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        if let Some(language) = &self.config.i18n_language {
            info!(
                "Skipping generation of resource bundle for non-english release, {}",
                language
            );
            return Ok(Vec::new());
        }

        let folder_name = folder_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("english-v{}", self.config.version));
        let target_dir = target_dir
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/Resources", self.config.source_repo));
        let resources_dir = join(&target_dir, &folder_name);

        let mut written = Vec::new();
        for notebook in self.config.notebooks_in_order() {
            if let Some(file) = notebook.create_resource_bundle(
                self.client,
                &self.config.source_dir,
                store,
                &resources_dir,
            )? {
                written.push(file);
            }
        }

        info!("Resource Bundle: {}", resources_dir);
        Ok(written)
    }

    /// Render the documentation of every tested notebook through `runner`.
    pub fn generate_docs(&self, runner: &dyn NotebookRunner) -> Result<Vec<DocsRun>> {
        let notebooks: Vec<NotebookDef> = self.config.notebooks.values().cloned().collect();
        generate_docs(&notebooks, "../Source", &self.config.version, runner)
    }

    /// Announcement text of this release.
    pub fn published_message(&self) -> String {
        let repo_name = self
            .config
            .source_repo
            .rsplit('/')
            .next()
            .unwrap_or(&self.config.source_repo);

        let mut core = String::from("Change Log:\n");
        for entry in &self.config.change_log {
            let _ = writeln!(core, "{}", entry);
        }
        let _ = write!(
            core,
            "\nRelease notes, course-specific requirements, issue-tracking, and test results for this course can be found in the course's GitHub repository at {}/{}\n\n\
             Please feel free to reach out to me (via Slack) or anyone on the curriculum team should you have any questions.",
            self.config.repo_base_url, repo_name
        );

        format!(
            "@channel Published {}, v{}\n\n{}",
            self.config.name,
            self.config.version,
            core.trim()
        )
    }
}

fn log_list(label: &str, paths: Option<&[String]>) {
    match paths {
        None => info!("  {}:    none", label),
        Some(paths) => {
            let mut paths = paths.to_vec();
            paths.sort();
            for (i, path) in paths.iter().enumerate() {
                if i == 0 {
                    info!("  {}:    {}", label, path);
                } else {
                    info!("              {}", path);
                }
            }
        }
    }
}

fn validate_white_black_list(config: &BuildConfig) -> Result<()> {
    let (white_list, black_list) = match (&config.white_list, &config.black_list) {
        (None, None) => return Ok(()),
        (None, Some(_)) => {
            return Err(Error::Config(
                "The white_list must be specified when specifying a black_list".into(),
            ));
        }
        (Some(_), None) => {
            return Err(Error::Config(
                "The black_list must be specified when specifying a white_list".into(),
            ));
        }
        (Some(white), Some(black)) => (white, black),
    };

    for path in white_list {
        if black_list.contains(path) {
            return Err(Error::Config(format!(
                "The white-list path \"{}\" was also found in the black-list.",
                path
            )));
        }
        if !config.notebooks.contains_key(path) {
            return Err(Error::Config(format!(
                "The white-list path \"{}\" does not exist in the complete set of notebooks.",
                path
            )));
        }
    }

    for path in black_list {
        if !config.notebooks.contains_key(path) {
            return Err(Error::Config(format!(
                "The black-list path \"{}\" does not exist in the complete set of notebooks.",
                path
            )));
        }
    }

    for path in config.notebooks.keys() {
        if !white_list.contains(path) && !black_list.contains(path) {
            return Err(Error::Config(format!(
                "The notebook \"{}\" was not found in either the white-list or black-list.",
                path
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemoryWorkspace;
    use std::sync::Mutex;

    const SOURCE: &str = "/Repos/Working/example-course/Source";

    const CONFIG: &str = r#"{
        "name": "Example Course",
        "version": "1.2.3",
        "username": "someone@example.com",
        "source_repo": "/Repos/Working/example-course",
        "change_log": ["Fixed typos", "Added lab 2"]
    }"#;

    fn lesson(body: &str) -> String {
        format!(
            "# Databricks notebook source\n# INCLUDE_HEADER_TRUE\n# INCLUDE_FOOTER_TRUE\n\n# COMMAND ----------\n\n{}",
            body
        )
    }

    fn course(ws: &MemoryWorkspace, extra: Option<(&str, &str)>) -> BuildConfig {
        ws.insert_notebook(
            &format!("{}/Version Info", SOURCE),
            Language::Python,
            &lesson("# MAGIC %md Version {{version_number}}"),
        )
        .unwrap();
        ws.insert_notebook(
            &format!("{}/EC 01 - Intro", SOURCE),
            Language::Python,
            &lesson("# ANSWER\nprint(1)"),
        )
        .unwrap();
        if let Some((path, body)) = extra {
            ws.insert_notebook(&format!("{}/{}", SOURCE, path), Language::Python, &lesson(body))
                .unwrap();
        }

        let mut config = BuildConfig::from_json(CONFIG).unwrap();
        config.index_notebooks(ws, true).unwrap();
        config
    }

    #[test]
    fn test_universal_replacements_and_defaults() {
        let ws = MemoryWorkspace::new();
        let publisher = Publisher::new(course(&ws, None), &ws).unwrap();

        let intro = publisher.notebook("EC 01 - Intro").unwrap();
        assert_eq!(intro.replacements["version_number"], "1.2.3");
        assert!(intro.replacements["built_on"].ends_with(" UTC"));
        assert_eq!(
            publisher.target_dir(),
            "/Repos/Working/example-course/Published/Example Course - v1.2.3"
        );
        assert_eq!(publisher.common_language(), "english");
    }

    #[test]
    fn test_publish_requires_validation() {
        let ws = MemoryWorkspace::new();
        let mut publisher = Publisher::new(course(&ws, None), &ws).unwrap();

        let err = publisher.publish_notebooks(PublishOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotValidated(_)));
    }

    #[test]
    fn test_publish_writes_student_and_solution() {
        let ws = MemoryWorkspace::new();
        let mut publisher = Publisher::new(course(&ws, None), &ws).unwrap();
        publisher.validate();

        let report = publisher.publish_notebooks(PublishOptions::default()).unwrap();

        let paths: Vec<_> = report.published.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["EC 01 - Intro", "Version Info"]);
        assert!(!report.restored_version_info);

        let target = publisher.target_dir().to_string();
        let student = ws.export_notebook(&format!("{}/EC 01 - Intro", target)).unwrap();
        let solution = ws
            .export_notebook(&format!("{}/Solutions/EC 01 - Intro", target))
            .unwrap();
        assert!(!student.contains("print(1)"));
        assert!(solution.contains("print(1)"));

        let info = ws.export_notebook(&format!("{}/Version Info", target)).unwrap();
        assert!(info.contains("Version 1.2.3"));
    }

    #[test]
    fn test_failed_notebook_skips_version_info() {
        let ws = MemoryWorkspace::new();
        let config = course(&ws, Some(("EC 02 - Broken", "# ANSWER\n# TODO\nx = 1")));
        let mut publisher = Publisher::new(config, &ws).unwrap();
        publisher.validate();

        let err = publisher.publish_notebooks(PublishOptions::default()).unwrap_err();
        match err {
            Error::PublishFailed { failed } => assert_eq!(failed, vec!["EC 02 - Broken"]),
            other => panic!("unexpected error: {other}"),
        }

        let target = publisher.target_dir().to_string();
        assert!(ws.get_status(&format!("{}/EC 01 - Intro", target)).unwrap().is_some());
        assert!(ws.get_status(&format!("{}/Version Info", target)).unwrap().is_none());
    }

    #[test]
    fn test_testing_mode_restores_version_info() {
        let ws = MemoryWorkspace::new();
        let mut publisher = Publisher::new(course(&ws, None), &ws).unwrap();
        publisher.validate();

        let target = publisher.target_dir().to_string();
        ws.insert_notebook(&format!("{}/Version Info", target), Language::Python, "previous")
            .unwrap();
        ws.insert_file(&format!("{}/README.md", target)).unwrap();
        ws.insert_notebook(&format!("{}/Stale", target), Language::Python, "old").unwrap();

        let report = publisher
            .publish_notebooks(PublishOptions {
                testing: true,
                debugging: false,
            })
            .unwrap();

        assert!(report.restored_version_info);
        assert_eq!(ws.export_notebook(&format!("{}/Version Info", target)).unwrap(), "previous");
        assert!(ws.get_status(&format!("{}/README.md", target)).unwrap().is_some());
        assert!(ws.get_status(&format!("{}/Stale", target)).unwrap().is_none());
    }

    #[test]
    fn test_missing_version_info() {
        let ws = MemoryWorkspace::new();
        let mut config = course(&ws, None);
        config.white_list = Some(vec!["EC 01 - Intro".into()]);
        config.black_list = Some(vec!["Version Info".into()]);

        let mut publisher = Publisher::new(config, &ws).unwrap();
        publisher.validate();

        let err = publisher.publish_notebooks(PublishOptions::default()).unwrap_err();
        assert!(matches!(err, Error::RequiredNotebookMissing(name) if name == VERSION_INFO_NOTEBOOK));
    }

    #[test]
    fn test_white_black_list_coverage() {
        let ws = MemoryWorkspace::new();

        let mut config = course(&ws, None);
        config.white_list = Some(vec!["Version Info".into()]);
        config.black_list = Some(Vec::new());
        let err = Publisher::new(config, &ws).err().unwrap();
        assert!(err.to_string().contains("\"EC 01 - Intro\" was not found in either"));

        let mut config = course(&ws, None);
        config.black_list = Some(vec!["Version Info".into()]);
        let err = Publisher::new(config, &ws).err().unwrap();
        assert!(err.to_string().contains("white_list must be specified"));

        let mut config = course(&ws, None);
        config.white_list = Some(vec!["Version Info".into(), "EC 01 - Intro".into()]);
        config.black_list = Some(vec!["Version Info".into()]);
        let err = Publisher::new(config, &ws).err().unwrap();
        assert!(err.to_string().contains("also found in the black-list"));
    }

    struct FakeRepos {
        calls: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl RepoClient for FakeRepos {
        fn reset(&self, directory: &str, repo_url: &str, branch: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((directory.into(), repo_url.into(), branch.into()));
            if self.fail {
                Err(Error::External("clone failed".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_configure_target_repo_defaults() {
        let ws = MemoryWorkspace::new();
        let mut publisher = Publisher::new(course(&ws, None), &ws).unwrap();
        let repos = FakeRepos {
            calls: Mutex::new(Vec::new()),
            fail: false,
        };

        publisher.configure_target_repo(&repos, None, None, None).unwrap();
        publisher.validate();

        let calls = repos.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "/Repos/Temp/someone@example.com-example-course-english".to_string(),
                "https://github.com/databricks-academy/example-course-english.git".to_string(),
                "published".to_string()
            )
        );
        assert_eq!(publisher.target_dir(), calls[0].0);
        assert!(publisher.validated());
    }

    #[test]
    fn test_failed_repo_reset_blocks_publication() {
        let ws = MemoryWorkspace::new();
        let mut publisher = Publisher::new(course(&ws, None), &ws).unwrap();
        let repos = FakeRepos {
            calls: Mutex::new(Vec::new()),
            fail: true,
        };

        publisher.validate();
        assert!(publisher.configure_target_repo(&repos, None, None, None).is_err());
        assert!(!publisher.validated());
    }

    #[test]
    fn test_published_message() {
        let ws = MemoryWorkspace::new();
        let publisher = Publisher::new(course(&ws, None), &ws).unwrap();

        let message = publisher.published_message();
        assert!(message.starts_with("@channel Published Example Course, v1.2.3\n\nChange Log:\nFixed typos\nAdded lab 2\n"));
        assert!(message.contains("https://github.com/databricks-academy/example-course\n"));
        assert!(message.ends_with("should you have any questions."));
    }
}
