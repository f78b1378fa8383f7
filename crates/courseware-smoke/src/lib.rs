//! Smoke tests of published courseware.
//!
//! Every testable notebook of a published course runs as a job on a fresh
//! cluster. Progress is posted to a status thread and each run is stored as
//! a [`TestResult`].

pub mod error;
pub mod job;
pub mod notify;
pub mod results;
pub mod suite;

pub use error::{SmokeError, SmokeResult};
pub use job::{JobSpec, JobUrls, JobsClient, RunResponse, RunState, build_job_spec, create_test_job, slugify};
pub use notify::{LogNotifier, MessageType, Notifier, StatusThread, StatusUpdate};
pub use results::{MemorySink, ResultSink, TestResult};
pub use suite::{RunOptions, SmokeServices, TestInstance, TestSuite};
