//! Integration tests for publishing and translating a course on disk.
//!
//! Tests the full pipeline: build config → published distribution →
//! resource bundle → translated distribution.

use std::fs;
use std::path::{Path, PathBuf};

use courseware_core::{
    BuildConfig, CONFIG_FILE, Error, LocalWorkspace, PublishOptions, Publisher, ResourceStore,
    Translator, WorkspaceClient,
};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const SOURCE_REPO: &str = "Repos/Working/example-course";
const PUBLISHED: &str = "/Repos/Working/example-course/Published/Example Course - v1.2.3";

const BUILD_CONFIG: &str = r#"{
    "name": "Example Course",
    "version": "1.2.3",
    "username": "someone",
    "source_repo": "/Repos/Working/example-course",
    "i18n": true,
    "change_log": ["First release"],
    "overrides": {
        "Includes/Setup": { "include_solution": false }
    }
}"#;

const LESSON: &str = "# Databricks notebook source
# INCLUDE_HEADER_TRUE
# INCLUDE_FOOTER_TRUE

# COMMAND ----------

# MAGIC %md --i18n-abc
# MAGIC # Hello

# COMMAND ----------

# MAGIC %run ./Includes/Setup

# COMMAND ----------

# TODO
# x = FILL_IN

# COMMAND ----------

# ANSWER
x = 1
";

const SETUP: &str = "# Databricks notebook source
# INCLUDE_HEADER_FALSE
# INCLUDE_FOOTER_FALSE

# COMMAND ----------

# MAGIC %md --i18n-setup
# MAGIC Setting up
";

const VERSION_INFO: &str = "# Databricks notebook source
# INCLUDE_HEADER_TRUE
# INCLUDE_FOOTER_TRUE

# COMMAND ----------

# MAGIC %md --i18n-ver
# MAGIC Version {{version_number}}
";

struct Course {
    temp: TempDir,
    workspace: LocalWorkspace,
    resources: ResourceStore,
}

impl Course {
    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn config_file(&self) -> PathBuf {
        self.root().join(SOURCE_REPO).join(CONFIG_FILE)
    }

    fn load(&self) -> BuildConfig {
        BuildConfig::load(self.config_file(), &self.workspace).expect("Failed to load build config")
    }
}

/// Create a course with one lesson, Version Info and one include.
fn create_course(lesson: &str) -> Course {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let repo = temp.path().join(SOURCE_REPO);
    let source = repo.join("Source");

    fs::create_dir_all(source.join("Includes")).unwrap();
    fs::write(repo.join(CONFIG_FILE), BUILD_CONFIG).unwrap();
    fs::write(source.join("Lesson.py"), lesson).unwrap();
    fs::write(source.join("Version Info.py"), VERSION_INFO).unwrap();
    fs::write(source.join("Includes/Setup.py"), SETUP).unwrap();

    Course {
        workspace: LocalWorkspace::new(temp.path()),
        resources: ResourceStore::new(temp.path()),
        temp,
    }
}

fn publish(course: &Course) -> Result<(), Error> {
    let mut publisher = Publisher::new(course.load(), &course.workspace)?;
    publisher.validate();
    publisher.publish_notebooks(PublishOptions::default()).map(|_| ())
}

// =============================================================================
// Publishing
// =============================================================================

#[test]
fn test_publish_course() {
    let course = create_course(LESSON);
    publish(&course).unwrap();

    let student = course
        .workspace
        .export_notebook(&format!("{}/Lesson", PUBLISHED))
        .unwrap();
    assert!(student.starts_with("# Databricks notebook source\n# MAGIC %md-sandbox"));
    assert!(student.contains("# MAGIC %md <i18n value=\"abc\"/>\n# MAGIC # Hello"));
    assert!(student.contains("x = FILL_IN"));
    assert!(!student.contains("x = 1"));
    assert!(!student.contains("INCLUDE_HEADER_TRUE"));

    let solution = course
        .workspace
        .export_notebook(&format!("{}/Solutions/Lesson", PUBLISHED))
        .unwrap();
    assert!(solution.contains("x = 1"));
    assert!(!solution.contains("FILL_IN"));

    let version_info = course
        .workspace
        .export_notebook(&format!("{}/Version Info", PUBLISHED))
        .unwrap();
    assert!(version_info.contains("# MAGIC Version 1.2.3"));

    assert!(
        course
            .workspace
            .get_status(&format!("{}/Includes/Setup", PUBLISHED))
            .unwrap()
            .is_some()
    );
    assert!(
        course
            .workspace
            .get_status(&format!("{}/Solutions/Includes/Setup", PUBLISHED))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_broken_link_aborts_the_course() {
    let broken = LESSON.replace("%run ./Includes/Setup", "%run ./Includes/Missing");
    let course = create_course(&broken);

    let err = publish(&course).unwrap_err();
    assert!(matches!(err, Error::PublishFailed { ref failed } if failed == &["Lesson"]));

    assert!(
        course
            .workspace
            .get_status(&format!("{}/Version Info", PUBLISHED))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_republish_keeps_keepers() {
    let course = create_course(LESSON);
    publish(&course).unwrap();

    let published = course.root().join(PUBLISHED.trim_start_matches('/'));
    fs::write(published.join("README.md"), "keep me").unwrap();
    fs::write(published.join("Stale.py"), "# Databricks notebook source\n").unwrap();

    publish(&course).unwrap();

    assert_eq!(fs::read_to_string(published.join("README.md")).unwrap(), "keep me");
    assert!(!published.join("Stale.py").exists());
    assert!(published.join("Lesson.py").exists());
}

// =============================================================================
// Translation
// =============================================================================

#[test]
fn test_resource_bundle_then_translation() {
    let course = create_course(LESSON);
    publish(&course).unwrap();

    let publisher = Publisher::new(course.load(), &course.workspace).unwrap();
    let written = publisher
        .create_resource_bundle(&course.resources, None, None)
        .unwrap();
    assert_eq!(written.len(), 3);

    let bundle = fs::read_to_string(
        course
            .root()
            .join(SOURCE_REPO)
            .join("Resources/english-v1.2.3/Lesson.md"),
    )
    .unwrap();
    assert!(bundle.starts_with("# /Lesson\n<hr>--i18n-abc\n# Hello"));

    let resources = "/Repos/Working/example-course/Resources/japanese-v1.2.3";
    course
        .resources
        .write(resources, "Lesson", "# /Lesson\n<hr>--i18n-abc\n# Konnichiwa\n")
        .unwrap();
    course
        .resources
        .write(
            resources,
            "Version Info",
            "# /Version Info\n<hr>--i18n-ver\nBajon {{version_number}}\n",
        )
        .unwrap();

    let mut translator = Translator::new(course.load(), &course.workspace, &course.resources).unwrap();
    assert_eq!(translator.language_options(), ["japanese-v1.2.3"]);
    translator.select_language("japanese-v1.2.3").unwrap();
    translator
        .use_directories(PUBLISHED, "/Repos/Temp/example-course")
        .unwrap();
    translator.publish_notebooks().unwrap();

    let lesson = course
        .workspace
        .export_notebook("/Repos/Temp/example-course/Lesson")
        .unwrap();
    assert!(lesson.contains("# MAGIC %md <i18n value=\"abc\"/>\n# MAGIC # Konnichiwa"));
    assert!(!lesson.contains("# MAGIC # Hello"));

    let version_info = course
        .workspace
        .export_notebook("/Repos/Temp/example-course/Version Info")
        .unwrap();
    assert!(version_info.contains("# MAGIC Bajon 1.2.3-JA"));

    let setup = course
        .workspace
        .export_notebook("/Repos/Temp/example-course/Includes/Setup")
        .unwrap();
    assert!(setup.contains("# MAGIC Setting up"));
}

#[test]
fn test_publish_requires_validation() {
    let course = create_course(LESSON);
    let mut publisher = Publisher::new(course.load(), &course.workspace).unwrap();

    let err = publisher.publish_notebooks(PublishOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NotValidated(_)));
}
