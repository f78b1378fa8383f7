//! Test result records.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{SmokeError, SmokeResult};

/// Outcome of one notebook run within a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub suite_id: String,
    pub test_id: String,
    pub name: String,
    /// `SUCCESS`, `FAILED`, `IGNORED`, `UNKNOWN`, ...
    pub result_state: String,
    /// Milliseconds.
    pub execution_duration: u64,
    pub cloud: String,
    pub job_name: String,
    pub job_id: u64,
    pub run_id: u64,
    pub notebook_path: String,
    pub spark_version: Option<String>,
    pub test_type: String,
}

impl TestResult {
    pub fn failed(&self) -> bool {
        self.result_state == "FAILED"
    }
}

/// Stores test results.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &TestResult) -> SmokeResult<()>;
}

/// A [`ResultSink`] keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<TestResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> SmokeResult<Vec<TestResult>> {
        self.results
            .lock()
            .map(|results| results.clone())
            .map_err(|e| SmokeError::Service(format!("Result lock poisoned: {}", e)))
    }
}

impl ResultSink for MemorySink {
    fn record(&self, result: &TestResult) -> SmokeResult<()> {
        self.results
            .lock()
            .map_err(|e| SmokeError::Service(format!("Result lock poisoned: {}", e)))?
            .push(result.clone());
        Ok(())
    }
}
