//! Test suites: published notebooks grouped into rounds and run as jobs.

use std::collections::BTreeMap;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use courseware_core::{BuildConfig, NotebookDef, WorkspaceClient};

use crate::error::{SmokeError, SmokeResult};
use crate::job::{JobUrls, JobsClient, RunResponse, create_test_job};
use crate::notify::{MessageType, Notifier, StatusThread};
use crate::results::{ResultSink, TestResult};

/// One notebook scheduled for testing.
#[derive(Debug, Clone)]
pub struct TestInstance {
    pub notebook: NotebookDef,
    /// Published notebook that is run, the solution when there is one.
    pub notebook_path: String,
    pub job_name: String,
    pub job_id: u64,
    pub run_id: u64,
}

impl TestInstance {
    pub fn new(course_name: &str, notebook: &NotebookDef, test_dir: &str, test_type: &str) -> Self {
        let notebook_path = if notebook.include_solution {
            format!("{}/Solutions/{}", test_dir, notebook.path)
        } else {
            format!("{}/{}", test_dir, notebook.path)
        };

        let hash_code = format!("{:x}", Sha256::digest(notebook_path.as_bytes()));
        let test_name = course_name.to_lowercase().replace(' ', "-");

        Self {
            notebook: notebook.clone(),
            job_name: format!("[TEST] {} | {} | {}", test_name, test_type, hash_code),
            notebook_path,
            job_id: 0,
            run_id: 0,
        }
    }
}

/// External services a suite talks to.
#[derive(Clone, Copy)]
pub struct SmokeServices<'a> {
    pub jobs: &'a dyn JobsClient,
    pub notifier: &'a dyn Notifier,
    pub results: &'a dyn ResultSink,
}

/// Options shared by both ways of running a round.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'o> {
    /// Run the jobs as this service principal.
    pub service_principal: Option<&'o str>,
    pub policy_id: Option<&'o str>,
}

/// Smoke tests of one published course.
pub struct TestSuite<'a> {
    config: BuildConfig,
    services: SmokeServices<'a>,
    urls: JobUrls,
    test_dir: String,
    test_type: String,
    keep_success: bool,
    rounds: BTreeMap<u32, Vec<TestInstance>>,
    results: Vec<TestResult>,
    thread: StatusThread,
}

impl<'a> TestSuite<'a> {
    /// Group the notebooks of `config` by test round.
    ///
    /// Round 0 notebooks are published but never tested; every other
    /// notebook must exist below `test_dir`.
    pub fn new(
        config: BuildConfig,
        workspace: &dyn WorkspaceClient,
        services: SmokeServices<'a>,
        test_dir: impl Into<String>,
        test_type: impl Into<String>,
        keep_success: bool,
    ) -> SmokeResult<Self> {
        let test_dir = test_dir.into();
        let test_type = test_type.into();

        if test_type.trim().is_empty() {
            return Err(SmokeError::InvalidSuite("The test type must be specified.".into()));
        }

        let mut rounds: BTreeMap<u32, Vec<TestInstance>> = BTreeMap::new();
        for notebook in config.notebooks.values() {
            let round = rounds.entry(notebook.test_round).or_default();
            if notebook.test_round == 0 {
                continue;
            }

            let test = TestInstance::new(&config.name, notebook, &test_dir, &test_type);
            if workspace.get_status(&test.notebook_path)?.is_none() {
                return Err(SmokeError::NotebookNotFound(test.notebook_path));
            }
            round.push(test);
        }

        Ok(Self {
            config,
            services,
            urls: JobUrls::default(),
            test_dir,
            test_type,
            keep_success,
            rounds,
            results: Vec::new(),
            thread: StatusThread::default(),
        })
    }

    /// Link runs to this browser session instead of the per-cloud defaults.
    pub fn with_job_urls(mut self, urls: JobUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn test_dir(&self) -> &str {
        &self.test_dir
    }

    pub fn rounds(&self) -> &BTreeMap<u32, Vec<TestInstance>> {
        &self.rounds
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn thread(&self) -> &StatusThread {
        &self.thread
    }

    /// Job names of every test in every round.
    pub fn job_names(&self) -> Vec<String> {
        self.rounds
            .values()
            .flatten()
            .map(|test| test.job_name.clone())
            .collect()
    }

    /// Delete every job of this suite, successful or not.
    pub fn reset(&self) -> SmokeResult<()> {
        self.services.jobs.delete_by_name(&self.job_names(), false)
    }

    /// Delete the successful jobs, keeping failures around for inspection.
    pub fn cleanup(&self) -> SmokeResult<()> {
        if self.keep_success {
            info!(
                "Skipping deletion of all jobs: TestSuite.keep_success == {}",
                self.keep_success
            );
            return Ok(());
        }
        self.services.jobs.delete_by_name(&self.job_names(), true)
    }

    /// Run the tests of `round` one after the other, in notebook order.
    ///
    /// With `fail_fast`, tests after the first failure are logged as skipped
    /// instead of run.
    pub fn test_all_synchronously(&mut self, round: u32, fail_fast: bool, options: RunOptions<'_>) -> SmokeResult<bool> {
        let Some(tests) = self.rounds.get(&round) else {
            warn!("There are no notebooks in round #{}", round);
            return Ok(true);
        };
        let mut tests = tests.clone();
        tests.sort_by_key(|t| t.notebook.order);

        self.send_first_message()?;
        self.send_status(
            MessageType::Info,
            format!("Round #{}: Testing {} {} synchronously", round, tests.len(), plural(tests.len())),
        )?;

        info!("Round #{} test order:", round);
        for (i, test) in tests.iter().enumerate() {
            info!("{:>4}: {}", i + 1, test.notebook.path);
        }

        let mut passed = true;

        for test in &mut tests {
            if fail_fast && !passed {
                self.log_run(test, &RunResponse::default())?;
                info!("Skipping job, previous failure for {}", test.job_name);
                continue;
            }

            self.start(test, options)?;
            let response = self.services.jobs.wait_for(test.run_id)?;
            passed &= self.conclude_test(test, &response)?;
        }

        Ok(passed)
    }

    /// Launch every test of `round`, then wait for all of them.
    pub fn test_all_asynchronously(&mut self, round: u32, options: RunOptions<'_>) -> SmokeResult<bool> {
        let Some(tests) = self.rounds.get(&round) else {
            warn!("There are no notebooks in round #{}", round);
            return Ok(true);
        };
        let mut tests = tests.clone();

        self.send_first_message()?;
        self.send_status(
            MessageType::Info,
            format!("Round #{}: Testing {} {} asynchronously", round, tests.len(), plural(tests.len())),
        )?;

        for test in &mut tests {
            self.start(test, options)?;
        }

        info!("Waiting for all test to complete:");

        let mut passed = true;
        for test in &tests {
            self.send_status(MessageType::Info, format!("Waiting for */{}*", test.notebook.path))?;
            let response = self.services.jobs.wait_for(test.run_id)?;
            passed &= self.conclude_test(test, &response)?;
        }

        if let Some(round_tests) = self.rounds.get_mut(&round) {
            *round_tests = tests;
        }

        Ok(passed)
    }

    fn start(&mut self, test: &mut TestInstance, options: RunOptions<'_>) -> SmokeResult<()> {
        self.send_status(MessageType::Info, format!("Starting */{}*", test.notebook.path))?;

        test.job_id = create_test_job(
            self.services.jobs,
            &mut self.config,
            &self.test_type,
            &test.job_name,
            &test.notebook_path,
            options.policy_id,
        )?;
        if let Some(service_principal) = options.service_principal {
            self.services.jobs.change_owner(test.job_id, service_principal)?;
        }
        test.run_id = self.services.jobs.run_now(test.job_id)?;

        info!(
            "/{}\n - {}",
            test.notebook.path,
            self.urls.to_job_url(&self.config.cloud, test.job_id, test.run_id)?
        );
        Ok(())
    }

    /// Record the run of `test` and decide whether it passed.
    ///
    /// A run the service could not execute at all is an error.
    pub fn conclude_test(&mut self, test: &TestInstance, response: &RunResponse) -> SmokeResult<bool> {
        self.log_run(test, response)?;

        if response.life_cycle_state() == "INTERNAL_ERROR" {
            let message = response
                .state
                .as_ref()
                .map(|s| s.state_message.clone())
                .unwrap_or_default();
            return Err(SmokeError::InternalError {
                run_id: response.run_id,
                message,
            });
        }

        info!(
            "Job #{}-{} is {} - {}",
            response.job_id,
            response.run_id,
            response.life_cycle_state(),
            response.result_state()
        );

        Ok(response.result_state() != "FAILED")
    }

    /// Store the result of `test` and post it to the status thread.
    ///
    /// Failures of ignored notebooks are recorded as `IGNORED`.
    pub fn log_run(&mut self, test: &TestInstance, response: &RunResponse) -> SmokeResult<()> {
        let mut result_state = response.result_state().to_string();
        if result_state == "FAILED" && test.notebook.ignored {
            result_state = "IGNORED".to_string();
        }

        let result = TestResult {
            suite_id: self.config.suite_id.clone(),
            test_id: format!("{}-{}", Utc::now().timestamp(), Uuid::new_v4()),
            name: self.config.name.clone(),
            result_state,
            execution_duration: response.execution_duration,
            cloud: self.config.cloud.clone(),
            job_name: test.job_name.clone(),
            job_id: response.job_id,
            run_id: response.run_id,
            notebook_path: response
                .notebook_path
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            spark_version: self.config.spark_version.clone(),
            test_type: self.test_type.clone(),
        };

        self.services.results.record(&result)?;

        let message_type = match result.result_state.as_str() {
            "FAILED" => MessageType::Error,
            "IGNORED" => MessageType::Warn,
            _ => MessageType::Info,
        };
        let url = self
            .urls
            .to_job_url(&self.config.cloud, result.job_id, result.run_id)?;
        let message = format!("*`{}` /{}*\n\n{}", result.result_state, test.notebook.path, url);

        self.results.push(result);
        self.send_status(message_type, message)
    }

    fn send_first_message(&mut self) -> SmokeResult<()> {
        if self.thread.is_started() {
            return Ok(());
        }
        let message = format!(
            "*{}*\nCloud: *{}* | Mode: *{}*",
            self.config.name, self.config.cloud, self.test_type
        );
        self.send_status(MessageType::Info, message)
    }

    fn send_status(&mut self, message_type: MessageType, message: String) -> SmokeResult<()> {
        self.thread.send(self.services.notifier, message_type, message)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "notebook" } else { "notebooks" }
}
