//! Documentation generation.
//!
//! Every regularly tested notebook is executed once with `generating_docs`
//! set, which makes it render its documentation. Notebooks run concurrently
//! on a dedicated rayon pool with one thread per notebook.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::notebook::NotebookDef;

/// Time allowed for a single notebook run.
pub const DOCS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Executes a notebook remotely.
pub trait NotebookRunner: Send + Sync {
    fn run(&self, path: &str, timeout: Duration, arguments: &BTreeMap<String, String>) -> Result<()>;
}

/// Outcome of one documentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsRun {
    pub path: String,
    pub elapsed: Duration,
    pub succeeded: bool,
}

/// Run every notebook of round 2 or later through `runner`.
///
/// Failures are logged and reported per notebook; they never abort the
/// other runs.
pub fn generate_docs(
    notebooks: &[NotebookDef],
    source_prefix: &str,
    version: &str,
    runner: &dyn NotebookRunner,
) -> Result<Vec<DocsRun>> {
    let selected: Vec<&NotebookDef> = notebooks.iter().filter(|n| n.test_round >= 2).collect();
    if selected.is_empty() {
        return Ok(Vec::new());
    }

    let mut arguments = BTreeMap::new();
    arguments.insert("version".to_string(), version.to_string());
    arguments.insert("generating_docs".to_string(), "true".to_string());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(selected.len())
        .build()
        .map_err(|e| Error::External(format!("Failed to build the docs thread pool: {}", e)))?;

    let runs = pool.install(|| {
        selected
            .par_iter()
            .map(|notebook| {
                let start = Instant::now();
                let path = format!("{}/{}", source_prefix.trim_end_matches('/'), notebook.path);
                let result = runner.run(&path, DOCS_TIMEOUT, &arguments);
                let elapsed = start.elapsed();

                match &result {
                    Ok(()) => info!(
                        "Generated docs for \"{}\"...({} seconds)",
                        notebook.path,
                        elapsed.as_secs()
                    ),
                    Err(e) => error!("Failed to generate docs for \"{}\": {}", notebook.path, e),
                }

                DocsRun {
                    path: notebook.path.clone(),
                    elapsed,
                    succeeded: result.is_ok(),
                }
            })
            .collect()
    });

    Ok(runs)
}
