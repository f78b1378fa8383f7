//! Job specifications and the jobs service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use courseware_core::BuildConfig;

use crate::error::{SmokeError, SmokeResult};

/// Spark conf key marking clusters started by a smoke test.
pub const SMOKE_TEST_CONF: &str = "dbacademy.smoke-test";

const TASK_KEY: &str = "Smoke-Test";
const TIMEOUT_SECONDS: u64 = 7200;

/// A multi-task job running one notebook on a fresh cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub email_notifications: BTreeMap<String, Value>,
    pub timeout_seconds: u64,
    pub max_concurrent_runs: u32,
    pub format: String,
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_key: String,
    pub description: String,
    pub libraries: Vec<Value>,
    pub notebook_task: NotebookTask,
    pub new_cluster: NewCluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookTask {
    pub notebook_path: String,
    pub base_parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCluster {
    pub num_workers: u32,
    pub spark_version: String,
    pub spark_conf: BTreeMap<String, String>,
    pub instance_pool_id: String,
    pub spark_env_vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

/// Lifecycle and outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub life_cycle_state: String,
    #[serde(default)]
    pub result_state: Option<String>,
    #[serde(default)]
    pub state_message: String,
}

/// A finished run as reported by the jobs service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub job_id: u64,
    #[serde(default)]
    pub run_id: u64,
    #[serde(default)]
    pub state: Option<RunState>,
    /// Milliseconds.
    #[serde(default)]
    pub execution_duration: u64,
    #[serde(default)]
    pub notebook_path: Option<String>,
}

impl RunResponse {
    /// `UNKNOWN` when the run never reported a result.
    pub fn result_state(&self) -> &str {
        self.state
            .as_ref()
            .and_then(|s| s.result_state.as_deref())
            .unwrap_or("UNKNOWN")
    }

    pub fn life_cycle_state(&self) -> &str {
        self.state
            .as_ref()
            .map(|s| s.life_cycle_state.as_str())
            .unwrap_or("UNKNOWN")
    }
}

/// The remote jobs service.
pub trait JobsClient: Send + Sync {
    /// Create a job and return its id.
    fn create(&self, spec: &JobSpec) -> SmokeResult<u64>;

    /// Start a job and return the run id.
    fn run_now(&self, job_id: u64) -> SmokeResult<u64>;

    /// Block until the run terminates.
    fn wait_for(&self, run_id: u64) -> SmokeResult<RunResponse>;

    /// Delete every job with one of `job_names`, only successful ones when
    /// `success_only` is set.
    fn delete_by_name(&self, job_names: &[String], success_only: bool) -> SmokeResult<()>;

    /// Name of the cluster policy `policy_id`, `None` when it does not
    /// resolve.
    fn find_policy(&self, policy_id: &str) -> SmokeResult<Option<String>>;

    /// Names of the accessible cluster policies.
    fn policy_names(&self) -> SmokeResult<Vec<String>>;

    /// Hand the job over to a service principal.
    fn change_owner(&self, job_id: u64, service_principal: &str) -> SmokeResult<()>;
}

/// Lower-case `value`, replace anything but ASCII letters and digits by `-`
/// and collapse repeated dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

/// Build the job that runs `notebook_path` for `config`.
pub fn build_job_spec(config: &BuildConfig, test_type: &str, job_name: &str, notebook_path: &str) -> JobSpec {
    let mut tags = BTreeMap::new();
    tags.insert("dbacademy.course".to_string(), slugify(&config.name));
    tags.insert("dbacademy.source".to_string(), "dbacadmey-smoke-test".to_string());
    tags.insert("dbacademy.test-type".to_string(), slugify(test_type));

    let mut spark_env_vars = BTreeMap::new();
    spark_env_vars.insert("WSFS_ENABLE_WRITE_SUPPORT".to_string(), "true".to_string());

    JobSpec {
        name: job_name.to_string(),
        tags,
        email_notifications: BTreeMap::new(),
        timeout_seconds: TIMEOUT_SECONDS,
        max_concurrent_runs: 1,
        format: "MULTI_TASK".to_string(),
        tasks: vec![TaskSpec {
            task_key: TASK_KEY.to_string(),
            description: "Executes a single notebook, hoping that the magic smoke doesn't escape".to_string(),
            libraries: config.libraries.clone(),
            notebook_task: NotebookTask {
                notebook_path: notebook_path.to_string(),
                base_parameters: config.job_arguments.clone(),
            },
            new_cluster: NewCluster {
                num_workers: config.workers,
                spark_version: config.spark_version.clone().unwrap_or_else(|| "None".to_string()),
                spark_conf: config.spark_conf.clone(),
                instance_pool_id: config.instance_pool.clone().unwrap_or_else(|| "None".to_string()),
                spark_env_vars,
                policy_id: None,
            },
        }],
    }
}

/// Create the smoke-test job for one notebook and return its id.
///
/// Marks the configuration's spark conf as a smoke test first.
pub fn create_test_job(
    jobs: &dyn JobsClient,
    config: &mut BuildConfig,
    test_type: &str,
    job_name: &str,
    notebook_path: &str,
    policy_id: Option<&str>,
) -> SmokeResult<u64> {
    config
        .spark_conf
        .insert(SMOKE_TEST_CONF.to_string(), "true".to_string());

    let mut spec = build_job_spec(config, test_type, job_name, notebook_path);

    if let Some(policy_id) = policy_id {
        if jobs.find_policy(policy_id)?.is_none() {
            return Err(SmokeError::PolicyNotFound {
                policy_id: policy_id.to_string(),
                available: jobs.policy_names()?,
            });
        }
        for task in &mut spec.tasks {
            task.new_cluster.policy_id = Some(policy_id.to_string());
        }
    }

    jobs.create(&spec)
}

/// Where job runs can be viewed.
#[derive(Debug, Clone, Default)]
pub struct JobUrls {
    /// Host of the browser session, preferred when known.
    pub browser_host: Option<String>,
    pub workspace_id: Option<String>,
}

impl JobUrls {
    /// Link to a run in the workspace UI.
    pub fn to_job_url(&self, cloud: &str, job_id: u64, run_id: u64) -> SmokeResult<String> {
        if let Some(host) = &self.browser_host {
            return Ok(format!(
                "https://{}/?o={}#job/{}/run/{}",
                host,
                self.workspace_id.as_deref().unwrap_or_default(),
                job_id,
                run_id
            ));
        }

        let workspace = match cloud {
            "AWS" => "https://curriculum-dev.cloud.databricks.com/?o=3551974319838082",
            "GCP" => "https://8422030046858219.9.gcp.databricks.com/?o=8422030046858219",
            "MSA" => "https://westus2.azuredatabricks.net/?o=2472203627577334",
            other => return Err(SmokeError::UnsupportedCloud(other.to_string())),
        };
        Ok(format!("{}#job/{}/run/{}", workspace, job_id, run_id))
    }
}
