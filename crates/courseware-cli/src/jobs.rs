//! Jobs command implementation.
//!
//! Prints the job every testable notebook would be run as, grouped by test
//! round, without contacting the jobs service.

use std::path::Path;

use courseware_smoke::job::SMOKE_TEST_CONF;
use courseware_smoke::{TestInstance, build_job_spec};
use serde_json::{Map, Value};

use crate::course::Course;

/// Execute the jobs command.
pub fn execute(workspace_root: &Path, config_path: &Path, test_dir: &str, test_type: &str) -> anyhow::Result<()> {
    let course = Course::open(workspace_root, config_path)?;
    let mut config = course.config;
    config
        .spark_conf
        .insert(SMOKE_TEST_CONF.to_string(), "true".to_string());

    let mut rounds = Map::new();
    for notebook in config.notebooks_in_order() {
        if notebook.test_round == 0 {
            continue;
        }

        let test = TestInstance::new(&config.name, notebook, test_dir, test_type);
        let spec = build_job_spec(&config, test_type, &test.job_name, &test.notebook_path);

        let round = rounds
            .entry(notebook.test_round.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(jobs) = round {
            jobs.push(serde_json::to_value(&spec)?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(rounds))?);
    Ok(())
}
