//! Core engine of the courseware build pipeline.
//!
//! This crate provides:
//! - Cell segmentation and directive parsing of notebook sources
//! - Cross-reference and library pin checks
//! - i18n GUID substitution and translation resources
//! - Student/solution document assembly with recoverable diagnostics
//! - Course publication and translation through workspace collaborators

pub mod cell;
pub mod config;
pub mod diagnostics;
pub mod directive;
pub mod error;
pub mod i18n;
pub mod language;
pub mod notebook;
pub mod patterns;
pub mod pip;
pub mod publish;
pub mod resources;
pub mod translate;
pub mod workspace;
pub mod xref;

pub use cell::{Cell, join_cells, split_cells};
pub use config::{BUILD_VERSIONS, BuildConfig, CONFIG_FILE, NotebookOverride};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use directive::{Directive, parse_directives};
pub use error::{Error, Result};
pub use i18n::{GuidMap, Resource};
pub use language::{Language, MagicCommand};
pub use notebook::{Documents, NotebookDef, PublishContext, PublishedNotebook};
pub use pip::CommitResolver;
pub use publish::{
    DocsRun, KEEPERS, NotebookRunner, PublishOptions, PublishReport, Publisher,
    VERSION_INFO_NOTEBOOK,
};
pub use resources::ResourceStore;
pub use translate::{SelectedLanguage, Translator};
pub use workspace::{
    LocalWorkspace, MemoryWorkspace, ObjectInfo, ObjectType, RepoClient, WorkspaceClient,
};
pub use xref::{ReferenceIndex, Resolution};
