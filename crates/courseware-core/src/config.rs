//! Build configuration.
//!
//! A course is described by a `build-config.json` at the root of its source
//! repository:
//!
//! ```json
//! {
//!     "name": "Apache Spark Programming",
//!     "version": "2.1.0",
//!     "source_repo": "/Repos/Working/apache-spark-programming",
//!     "overrides": {
//!         "Includes/Classroom-Setup": { "include_solution": false }
//!     }
//! }
//! ```
//!
//! Loading a configuration indexes the notebooks of the source directory and
//! then applies the per-notebook overrides.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::notebook::NotebookDef;
use crate::workspace::WorkspaceClient;

/// Course versions that denote a work-in-progress build rather than a release.
pub const BUILD_VERSIONS: [&str; 3] = ["BUILD", "TEST", "TRANSLATION"];

/// Default name of the configuration file.
pub const CONFIG_FILE: &str = "build-config.json";

const DEFAULT_CLOUD: &str = "AWS";
const DEFAULT_REPO_BASE_URL: &str = "https://github.com/databricks-academy";

/// Per-notebook settings that replace the indexed defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotebookOverride {
    pub include_solution: Option<bool>,
    pub test_round: Option<u32>,
    pub ignored: Option<bool>,
    pub order: Option<usize>,
    pub replacements: Option<BTreeMap<String, String>>,
    pub ignored_errors: Option<Vec<String>>,
}

/// The file format; derived defaults are resolved in [`BuildConfig::from_json`].
#[derive(Debug, Deserialize)]
struct RawBuildConfig {
    name: String,
    version: String,
    build_name: Option<String>,
    #[serde(default)]
    username: String,
    cloud: Option<String>,
    spark_version: Option<String>,
    instance_pool: Option<String>,
    #[serde(default)]
    workers: u32,
    #[serde(default)]
    libraries: Vec<serde_json::Value>,
    #[serde(default)]
    spark_conf: BTreeMap<String, String>,
    #[serde(default)]
    job_arguments: BTreeMap<String, String>,
    source_repo: String,
    source_dir: Option<String>,
    #[serde(default = "default_true")]
    include_solutions: bool,
    #[serde(default)]
    i18n: bool,
    i18n_language: Option<String>,
    #[serde(default)]
    i18n_xml_tag_disabled: bool,
    #[serde(default)]
    ignoring: Vec<String>,
    white_list: Option<Vec<String>>,
    black_list: Option<Vec<String>>,
    #[serde(default)]
    change_log: Vec<String>,
    repo_base_url: Option<String>,
    #[serde(default)]
    overrides: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

/// Configuration of one course build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub name: String,
    pub version: String,
    /// `name` lower-cased with spaces replaced by `-`, unless given.
    pub build_name: String,
    pub username: String,
    pub cloud: String,
    pub spark_version: Option<String>,
    pub instance_pool: Option<String>,
    pub workers: u32,
    /// Cluster libraries, passed through to job specs untouched.
    pub libraries: Vec<serde_json::Value>,
    pub spark_conf: BTreeMap<String, String>,
    pub job_arguments: BTreeMap<String, String>,
    pub source_repo: String,
    pub source_dir: String,
    /// Whether `source_dir` was given explicitly; a missing explicit
    /// directory is an error.
    pub source_dir_explicit: bool,
    pub include_solutions: bool,
    pub i18n: bool,
    pub i18n_language: Option<String>,
    pub i18n_xml_tag_disabled: bool,
    pub ignoring: Vec<String>,
    pub white_list: Option<Vec<String>>,
    pub black_list: Option<Vec<String>>,
    pub change_log: Vec<String>,
    pub repo_base_url: String,
    pub overrides: BTreeMap<String, NotebookOverride>,

    /// Identifies one test run: `<unix seconds>-<uuid>`.
    pub suite_id: String,
    /// Indexed notebooks keyed by their path relative to `source_dir`.
    pub notebooks: BTreeMap<String, NotebookDef>,
}

impl BuildConfig {
    /// Parse a configuration without touching the workspace.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawBuildConfig = serde_json::from_str(json)?;

        let mut overrides = BTreeMap::new();
        for (path, value) in raw.overrides {
            // Free-form notes are allowed next to the overrides.
            if path == "comment" {
                continue;
            }
            let parsed: NotebookOverride = serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("invalid override for \"{}\": {}", path, e)))?;
            overrides.insert(path, parsed);
        }

        let mut spark_conf = raw.spark_conf;
        if raw.workers == 0 {
            spark_conf.insert("spark.master".to_string(), "local[*]".to_string());
        }

        let build_name = raw
            .build_name
            .unwrap_or_else(|| raw.name.to_lowercase().replace(' ', "-"));

        let source_dir_explicit = raw.source_dir.is_some();
        let source_dir = raw
            .source_dir
            .unwrap_or_else(|| format!("{}/Source", raw.source_repo));

        Ok(Self {
            build_name,
            name: raw.name,
            version: raw.version,
            username: raw.username,
            cloud: raw.cloud.unwrap_or_else(|| DEFAULT_CLOUD.to_string()),
            spark_version: raw.spark_version,
            instance_pool: raw.instance_pool,
            workers: raw.workers,
            libraries: raw.libraries,
            spark_conf,
            job_arguments: raw.job_arguments,
            source_repo: raw.source_repo,
            source_dir,
            source_dir_explicit,
            include_solutions: raw.include_solutions,
            i18n: raw.i18n,
            i18n_language: raw.i18n_language,
            i18n_xml_tag_disabled: raw.i18n_xml_tag_disabled,
            ignoring: raw.ignoring,
            white_list: raw.white_list,
            black_list: raw.black_list,
            change_log: raw.change_log,
            repo_base_url: raw
                .repo_base_url
                .unwrap_or_else(|| DEFAULT_REPO_BASE_URL.to_string()),
            overrides,
            suite_id: new_suite_id(),
            notebooks: BTreeMap::new(),
        })
    }

    /// Load a configuration file, index its notebooks and apply overrides.
    pub fn load(path: impl AsRef<Path>, client: &dyn WorkspaceClient) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let mut config = Self::from_json(&json)?;

        let fail_fast = config.source_dir_explicit;
        config.index_notebooks(client, fail_fast)?;
        config.apply_overrides()?;

        Ok(config)
    }

    /// Whether this is a work-in-progress build (`BUILD`, `TEST`, ...).
    pub fn is_build_version(&self) -> bool {
        BUILD_VERSIONS.contains(&self.version.as_str())
    }

    /// Language of the published distribution, `english` unless translating.
    pub fn common_language(&self) -> &str {
        match &self.i18n_language {
            Some(language) => language.split('-').next().unwrap_or(language),
            None => "english",
        }
    }

    /// Build the notebook set from the source directory.
    ///
    /// Entries are sorted by path and take their position as `order`.
    pub fn index_notebooks(&mut self, client: &dyn WorkspaceClient, fail_fast: bool) -> Result<()> {
        self.notebooks.clear();

        let Some(mut entities) = client.ls(&self.source_dir, true)? else {
            if fail_fast {
                return Err(Error::Config(format!(
                    "The specified directory ({}) does not exist (fail_fast={}).",
                    self.source_dir, fail_fast
                )));
            }
            return Ok(());
        };

        entities.retain(|e| e.is_notebook());
        entities.sort_by(|a, b| a.path.cmp(&b.path));

        let prefix_len = self.source_dir.trim_end_matches('/').len() + 1;

        for (i, entity) in entities.iter().enumerate() {
            let Some(path) = entity.path.get(prefix_len..) else {
                continue;
            };
            let lower = path.to_lowercase();

            if lower.contains("wip") {
                warn!(
                    "The notebook \"{}\" is excluded from the build as a work in progress (WIP)",
                    path
                );
                continue;
            }

            let mut notebook = NotebookDef::new(path, i);
            notebook.include_solution = self.include_solutions;
            notebook.i18n = self.i18n;
            notebook.i18n_language = self.i18n_language.clone();
            notebook.i18n_xml_tag_disabled = self.i18n_xml_tag_disabled;
            notebook.ignoring = self.ignoring.clone();
            notebook.version = self.version.clone();

            if lower.contains("includes/") {
                notebook.test_round = 0;
            }

            if lower == "includes/reset" {
                notebook.order = 0;
                notebook.test_round = 1;
                notebook.include_solution = false;
            }

            if lower == "includes/workspace-setup" {
                notebook.order = 1;
                notebook.test_round = 1;
                notebook.include_solution = false;
            }

            self.notebooks.insert(path.to_string(), notebook);
        }

        Ok(())
    }

    /// Apply the configured overrides to the indexed notebooks.
    pub fn apply_overrides(&mut self) -> Result<()> {
        for (path, overrides) in &self.overrides {
            let notebook = self
                .notebooks
                .get_mut(path)
                .ok_or_else(|| Error::Config(format!("The notebook \"{}\" doesn't exist.", path)))?;

            info!("Updating {}", path);

            if let Some(value) = overrides.include_solution {
                notebook.include_solution = value;
            }
            if let Some(value) = overrides.test_round {
                notebook.test_round = value;
            }
            if let Some(value) = overrides.ignored {
                notebook.ignored = value;
            }
            if let Some(value) = overrides.order {
                notebook.order = value;
            }
            if let Some(value) = &overrides.replacements {
                notebook.replacements = value.clone();
            }
            if let Some(value) = &overrides.ignored_errors {
                notebook.ignoring = value.clone();
            }
        }
        Ok(())
    }

    /// Notebooks sorted by `order`, ties broken by path.
    pub fn notebooks_in_order(&self) -> Vec<&NotebookDef> {
        let mut notebooks: Vec<_> = self.notebooks.values().collect();
        notebooks.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.path.cmp(&b.path)));
        notebooks
    }

    /// Human readable summary of the configuration and its notebooks.
    pub fn describe(&self) -> String {
        let opt = |value: &Option<String>| value.clone().unwrap_or_else(|| "None".to_string());

        let mut out = String::new();
        let _ = writeln!(out, "{}", "-".repeat(100));
        let _ = writeln!(out, "Build Configuration");
        let _ = writeln!(out, "suite_id:          {}", self.suite_id);
        let _ = writeln!(out, "name:              {}", self.name);
        let _ = writeln!(out, "version:           {}", self.version);
        let _ = writeln!(out, "build_name:        {}", self.build_name);
        let _ = writeln!(out, "spark_version:     {}", opt(&self.spark_version));
        let _ = writeln!(out, "workers:           {}", self.workers);
        let _ = writeln!(out, "instance_pool:     {}", opt(&self.instance_pool));
        let _ = writeln!(out, "spark_conf:        {:?}", self.spark_conf);
        let _ = writeln!(out, "cloud:             {}", self.cloud);
        let _ = writeln!(out, "libraries:         {}", serde_json::Value::from(self.libraries.clone()));
        let _ = writeln!(out, "source_repo:       {}", self.source_repo);
        let _ = writeln!(out, "source_dir:        {}", self.source_dir);
        let _ = writeln!(out, "i18n:              {}", self.i18n);
        let _ = writeln!(out, "i18n_language:     {}", opt(&self.i18n_language));

        if self.notebooks.is_empty() {
            let _ = writeln!(out, "notebooks:         none");
        } else {
            let _ = writeln!(out, "notebooks:         {}", self.notebooks.len());

            let width = self.notebooks.keys().map(String::len).max().unwrap_or(0);
            let mut rounds: Vec<u32> = self.notebooks.values().map(|n| n.test_round).collect();
            rounds.sort_unstable();
            rounds.dedup();

            for round in rounds {
                if round == 0 {
                    let _ = writeln!(out, "\nRound #0: (published but not tested)");
                } else {
                    let _ = writeln!(out, "\nRound #{}", round);
                }

                for notebook in self.notebooks_in_order().into_iter().filter(|n| n.test_round == round) {
                    let _ = write!(
                        out,
                        "  {:>2}: {:<width$}   ignored={:<5}   include_solution={:<5}   replacements=",
                        notebook.order,
                        notebook.path,
                        notebook.ignored,
                        notebook.include_solution,
                        width = width
                    );

                    if notebook.replacements.is_empty() {
                        let _ = writeln!(out, "{{}}");
                    } else {
                        let _ = writeln!(out, "{{");
                        let key_width = notebook.replacements.keys().map(String::len).max().unwrap_or(0);
                        for (key, value) in &notebook.replacements {
                            let _ = writeln!(out, "        {:<key_width$}: {}", key, value, key_width = key_width);
                        }
                        let _ = writeln!(out, "      }}");
                    }
                }
            }
        }

        let _ = writeln!(out, "{}", "-".repeat(100));
        out
    }
}

fn new_suite_id() -> String {
    format!("{}-{}", Utc::now().timestamp(), Uuid::new_v4())
}
