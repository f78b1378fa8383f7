//! Publication of a translated course.
//!
//! The [`Translator`] starts from an already published English distribution
//! and rebuilds every markdown cell carrying an `<i18n value="..."/>` tag
//! from the translation resource of the selected language. Everything else
//! is copied as is.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::cell::split_cells;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::i18n::{Resource, extract_xml_guid, to_magic_lines};
use crate::publish::{BUILT_ON_FORMAT, Publisher};
use crate::resources::ResourceStore;
use crate::workspace::{RepoClient, WorkspaceClient, join, parent};

/// Language-dependent settings derived from the selected resource folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedLanguage {
    /// Resource folder name, e.g. `japanese-v1.2.3`.
    pub i18n_language: String,
    /// First two letters, upper-cased.
    pub lang_code: String,
    pub common_language: String,
    /// Version of the English distribution being translated.
    pub core_version: String,
    /// `<core_version>-<lang_code>`.
    pub version: String,
}

impl SelectedLanguage {
    fn parse(i18n_language: &str) -> Result<Self> {
        let (common_language, core_version) = i18n_language.split_once('-').ok_or_else(|| {
            Error::Translation(format!(
                "Expected a language of the form <language>-v<version>, found \"{}\"",
                i18n_language
            ))
        })?;
        let core_version = core_version.strip_prefix('v').unwrap_or(core_version);
        let lang_code: String = i18n_language.chars().take(2).collect::<String>().to_uppercase();

        Ok(Self {
            i18n_language: i18n_language.to_string(),
            version: format!("{}-{}", core_version, lang_code),
            lang_code,
            common_language: common_language.to_string(),
            core_version: core_version.to_string(),
        })
    }
}

/// Publishes a translated distribution.
pub struct Translator<'a> {
    client: &'a dyn WorkspaceClient,
    store: &'a ResourceStore,
    config: BuildConfig,

    resources_folder: String,
    language_options: Vec<String>,
    selected: Option<SelectedLanguage>,

    source_dir: Option<String>,
    target_dir: Option<String>,
    validated: bool,
}

impl<'a> Translator<'a> {
    /// Discover the available languages below `<source_repo>/Resources`.
    pub fn new(config: BuildConfig, client: &'a dyn WorkspaceClient, store: &'a ResourceStore) -> Result<Self> {
        let resources_folder = format!("{}/Resources", config.source_repo);

        let language_options: Vec<String> = store
            .list(&resources_folder)?
            .into_iter()
            .filter(|name| !name.starts_with("english-") && !name.starts_with('_'))
            .collect();

        Ok(Self {
            client,
            store,
            config,
            resources_folder,
            language_options,
            selected: None,
            source_dir: None,
            target_dir: None,
            validated: false,
        })
    }

    pub fn language_options(&self) -> &[String] {
        &self.language_options
    }

    pub fn selected(&self) -> Option<&SelectedLanguage> {
        self.selected.as_ref()
    }

    pub fn source_dir(&self) -> Option<&str> {
        self.source_dir.as_deref()
    }

    pub fn target_dir(&self) -> Option<&str> {
        self.target_dir.as_deref()
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    /// Select one of [`Self::language_options`].
    pub fn select_language(&mut self, i18n_language: &str) -> Result<&SelectedLanguage> {
        if !self.language_options.iter().any(|o| o == i18n_language) {
            return Err(Error::Translation(format!(
                "The selected version must be one of {:?}, found \"{}\".",
                self.language_options, i18n_language
            )));
        }

        for notebook in self.config.notebooks.values_mut() {
            notebook.i18n_language = Some(i18n_language.to_string());
        }

        self.validated = false;
        Ok(self.selected.insert(SelectedLanguage::parse(i18n_language)?))
    }

    fn require_language(&self) -> Result<&SelectedLanguage> {
        self.selected
            .as_ref()
            .ok_or_else(|| Error::Translation("The i18n language must be specified.".into()))
    }

    /// Reset the English source checkout and the translated target checkout.
    pub fn validate(&mut self, repos: &dyn RepoClient) -> Result<()> {
        let selected = self.require_language()?.clone();
        let build_name = &self.config.build_name;
        let base_url = &self.config.repo_base_url;

        let source_branch = format!("published-v{}", selected.core_version);
        let source_dir = format!(
            "/Repos/Temp/{}-{}-english_{}",
            self.config.username, build_name, source_branch
        );
        let source_repo_url = format!("{}/{}-english.git", base_url, build_name);
        reset_repo(repos, "source", &source_dir, &source_repo_url, &source_branch)?;

        let target_dir = format!("/Repos/Temp/{}", build_name);
        let target_repo_url = format!("{}/{}-{}.git", base_url, build_name, selected.common_language);
        reset_repo(repos, "target", &target_dir, &target_repo_url, "published")?;

        self.source_dir = Some(source_dir);
        self.target_dir = Some(target_dir);
        self.log_selection(&selected);
        self.validated = true;
        Ok(())
    }

    /// Translate from and into existing directories instead of fresh
    /// checkouts.
    pub fn use_directories(&mut self, source_dir: &str, target_dir: &str) -> Result<()> {
        let selected = self.require_language()?.clone();

        if self.client.get_status(source_dir)?.is_none() {
            return Err(Error::NotFound(source_dir.to_string()));
        }

        self.source_dir = Some(source_dir.to_string());
        self.target_dir = Some(target_dir.to_string());
        self.log_selection(&selected);
        self.validated = true;
        Ok(())
    }

    fn log_selection(&self, selected: &SelectedLanguage) {
        info!("version:          {}", selected.version);
        info!("core_version:     {}", selected.core_version);
        info!("common_language:  {}", selected.common_language);
        info!("resources_folder: {}", self.resources_folder);
    }

    /// Write the translated distribution into the target directory.
    ///
    /// Returns the written notebook paths.
    pub fn publish_notebooks(&self) -> Result<Vec<String>> {
        let (Some(source_dir), Some(target_dir), Some(selected)) =
            (&self.source_dir, &self.target_dir, &self.selected)
        else {
            return Err(Error::NotValidated("Translator"));
        };
        if !self.validated {
            return Err(Error::NotValidated("Translator"));
        }

        info!(
            "Publishing translated version of {}, {}",
            self.config.build_name, selected.version
        );

        if self.client.get_status(target_dir)?.is_some() {
            Publisher::clean_target_dir(self.client, target_dir)?;
        }

        let prefix_len = source_dir.trim_end_matches('/').len() + 1;
        let source_files: Vec<String> = self
            .client
            .ls(source_dir, true)?
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| entry.is_notebook())
            .filter_map(|entry| entry.path.get(prefix_len..).map(str::to_string))
            .collect();

        info!("...Processing {} files", source_files.len());

        // Each directory is created once up front.
        let directories: BTreeSet<String> = source_files
            .iter()
            .map(|file| parent(&join(target_dir, file)).to_string())
            .collect();
        for directory in &directories {
            self.client.mkdirs(directory)?;
        }

        let resources_dir = join(&self.resources_folder, &selected.i18n_language);
        let built_on = Utc::now().format(BUILT_ON_FORMAT).to_string();
        let mut written = Vec::with_capacity(source_files.len());

        for file in &source_files {
            info!("   /{}", file);

            let source_path = join(source_dir, file);
            let target_path = join(target_dir, file);

            let language = self
                .client
                .get_status(&source_path)?
                .and_then(|status| status.language)
                .ok_or_else(|| Error::NotFound(source_path.clone()))?;
            let raw_source = self.client.export_notebook(&source_path)?;

            if file.starts_with("Includes/") {
                self.client.import_notebook(language, &target_path, &raw_source)?;
                written.push(target_path);
                continue;
            }

            let resource_path = file.strip_prefix("Solutions/").unwrap_or(file);
            let resource = self.load_resource(&resources_dir, resource_path)?;

            let mut commands = Vec::new();
            for command in split_cells(language, &raw_source) {
                let command = command.trim();
                let Some(guid) = extract_xml_guid(command) else {
                    commands.push(command.to_string());
                    continue;
                };

                let value = resource.get(&guid).ok_or_else(|| {
                    Error::Translation(format!("The GUID \"{}\" was not found in \"{}\".", guid, file))
                })?;

                let line_zero = command.split('\n').next().unwrap_or_default();
                let mut lines = vec![line_zero.to_string()];
                lines.extend(to_magic_lines(language, value.trim()));
                commands.push(lines.join("\n"));
            }

            let separator = format!("\n{}\n", language.command_delimiter());
            let new_source = format!("{}\n{}", language.header_line(), commands.join(&separator))
                .replace("{{built_on}}", &built_on)
                .replace("{{version_number}}", &selected.version);

            debug!("...writing {}", target_path);
            self.client.import_notebook(language, &target_path, &new_source)?;
            written.push(target_path);
        }

        info!("All done!");
        Ok(written)
    }

    /// Include notebooks carry no resource of their own.
    fn load_resource(&self, resources_dir: &str, path: &str) -> Result<Resource> {
        if path.starts_with("Includes/") {
            return Ok(Resource::default());
        }

        let source = self.store.load(resources_dir, path)?.ok_or_else(|| {
            Error::Translation(format!(
                "Cannot find {}",
                self.store.file_for(resources_dir, path).display()
            ))
        })?;

        let resource = Resource::parse(&source);
        if resource.declared_path != path {
            return Err(Error::Translation(format!(
                "Expected the notebook \"{}\", found \"{}\"",
                path, resource.declared_path
            )));
        }
        Ok(resource)
    }
}

fn reset_repo(repos: &dyn RepoClient, which: &str, directory: &str, repo_url: &str, branch: &str) -> Result<()> {
    info!("Resetting {} repo:", which);
    info!(" - Branch:    \"{}\"", branch);
    info!(" - Directory: {}", directory);
    info!(" - Repo URL:  {}", repo_url);
    repos.reset(directory, repo_url, branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::workspace::MemoryWorkspace;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const CONFIG: &str = r#"{
        "name": "Example Course",
        "version": "1.2.3",
        "username": "someone",
        "source_repo": "/Repos/Working/example-course"
    }"#;

    const RESOURCES: &str = "/Repos/Working/example-course/Resources";
    const SOURCE: &str = "/Repos/Temp/english";
    const TARGET: &str = "/Repos/Temp/japanese";

    struct Fixture {
        _temp: TempDir,
        store: ResourceStore,
        ws: MemoryWorkspace,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = ResourceStore::new(temp.path());
        store
            .write(
                &format!("{}/japanese-v1.2.3", RESOURCES),
                "Lesson",
                "# /Lesson\n<hr>--i18n-abc\n# Konnichiwa\n\nSekai\n",
            )
            .unwrap();
        store
            .write(&format!("{}/english-v1.2.3", RESOURCES), "Lesson", "# /Lesson\n")
            .unwrap();
        store.write(&format!("{}/_notes", RESOURCES), "x", "").unwrap();

        let ws = MemoryWorkspace::new();
        ws.insert_notebook(
            &format!("{}/Lesson", SOURCE),
            Language::Python,
            "# Databricks notebook source\n# MAGIC %md <i18n value=\"abc\"/>\n# MAGIC # Hello\n\n# COMMAND ----------\n\nprint(\"{{version_number}}\")\n",
        )
        .unwrap();
        ws.insert_notebook(
            &format!("{}/Solutions/Lesson", SOURCE),
            Language::Python,
            "# Databricks notebook source\n# MAGIC %md <i18n value=\"abc\"/>\n# MAGIC # Hello\n",
        )
        .unwrap();
        ws.insert_notebook(
            &format!("{}/Includes/Setup", SOURCE),
            Language::Python,
            "# Databricks notebook source\n# MAGIC %md <i18n value=\"zzz\"/>\n",
        )
        .unwrap();

        Fixture {
            _temp: temp,
            store,
            ws,
        }
    }

    #[test]
    fn test_language_options_and_selection() {
        let f = fixture();
        let config = BuildConfig::from_json(CONFIG).unwrap();
        let mut translator = Translator::new(config, &f.ws, &f.store).unwrap();

        assert_eq!(translator.language_options(), ["japanese-v1.2.3"]);
        assert!(translator.select_language("english-v1.2.3").is_err());

        let selected = translator.select_language("japanese-v1.2.3").unwrap();
        assert_eq!(selected.lang_code, "JA");
        assert_eq!(selected.common_language, "japanese");
        assert_eq!(selected.core_version, "1.2.3");
        assert_eq!(selected.version, "1.2.3-JA");
    }

    #[test]
    fn test_validate_resets_both_repos() {
        struct Recorder(Mutex<Vec<(String, String, String)>>);
        impl RepoClient for Recorder {
            fn reset(&self, directory: &str, repo_url: &str, branch: &str) -> Result<()> {
                self.0
                    .lock()
                    .unwrap()
                    .push((directory.into(), repo_url.into(), branch.into()));
                Ok(())
            }
        }

        let f = fixture();
        let config = BuildConfig::from_json(CONFIG).unwrap();
        let mut translator = Translator::new(config, &f.ws, &f.store).unwrap();

        let repos = Recorder(Mutex::new(Vec::new()));
        assert!(translator.validate(&repos).is_err());

        translator.select_language("japanese-v1.2.3").unwrap();
        translator.validate(&repos).unwrap();

        let calls = repos.0.lock().unwrap();
        assert_eq!(calls[0].0, "/Repos/Temp/someone-example-course-english_published-v1.2.3");
        assert_eq!(calls[0].1, "https://github.com/databricks-academy/example-course-english.git");
        assert_eq!(calls[0].2, "published-v1.2.3");
        assert_eq!(calls[1].0, "/Repos/Temp/example-course");
        assert_eq!(calls[1].1, "https://github.com/databricks-academy/example-course-japanese.git");
        assert_eq!(calls[1].2, "published");
        assert!(translator.validated());
    }

    #[test]
    fn test_publish_translates_tagged_cells() {
        let f = fixture();
        let config = BuildConfig::from_json(CONFIG).unwrap();
        let mut translator = Translator::new(config, &f.ws, &f.store).unwrap();

        assert!(matches!(translator.publish_notebooks(), Err(Error::NotValidated(_))));

        translator.select_language("japanese-v1.2.3").unwrap();
        translator.use_directories(SOURCE, TARGET).unwrap();

        let written = translator.publish_notebooks().unwrap();
        assert_eq!(written.len(), 3);

        let lesson = f.ws.export_notebook(&format!("{}/Lesson", TARGET)).unwrap();
        assert_eq!(
            lesson,
            "# Databricks notebook source\n# MAGIC %md <i18n value=\"abc\"/>\n# MAGIC # Konnichiwa\n# MAGIC\n# MAGIC Sekai\n\n# COMMAND ----------\n\nprint(\"1.2.3-JA\")"
        );

        let solution = f.ws.export_notebook(&format!("{}/Solutions/Lesson", TARGET)).unwrap();
        assert!(solution.contains("# MAGIC # Konnichiwa"));

        let include = f.ws.export_notebook(&format!("{}/Includes/Setup", TARGET)).unwrap();
        assert!(include.contains("<i18n value=\"zzz\"/>"));
    }

    #[test]
    fn test_missing_guid_is_an_error() {
        let f = fixture();
        f.ws.insert_notebook(
            &format!("{}/Lesson", SOURCE),
            Language::Python,
            "# Databricks notebook source\n# MAGIC %md <i18n value=\"nope\"/>\n# MAGIC # Hello\n",
        )
        .unwrap();

        let config = BuildConfig::from_json(CONFIG).unwrap();
        let mut translator = Translator::new(config, &f.ws, &f.store).unwrap();
        translator.select_language("japanese-v1.2.3").unwrap();
        translator.use_directories(SOURCE, TARGET).unwrap();

        let err = translator.publish_notebooks().unwrap_err();
        assert!(err.to_string().contains("The GUID \"--i18n-nope\" was not found in \"Lesson\"."));
    }
}
