//! Status notifications.
//!
//! Every update of a suite is posted to the same chat thread: the first
//! message opens it, later ones reply to it using the thread timestamp the
//! service returned.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::SmokeResult;

/// Channel the status updates are posted to.
pub const DEFAULT_CHANNEL: &str = "curr-smoke-tests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Info,
    Warn,
    Error,
}

/// Payload of one status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub channel: String,
    pub message: String,
    pub message_type: MessageType,
    pub first_message: String,
    pub thread_ts: Option<String>,
}

/// Delivers status updates.
pub trait Notifier: Send + Sync {
    /// Post `update` and return the timestamp of the thread it landed in.
    fn post(&self, update: &StatusUpdate) -> SmokeResult<Option<String>>;
}

/// A [`Notifier`] that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn post(&self, update: &StatusUpdate) -> SmokeResult<Option<String>> {
        match update.message_type {
            MessageType::Info => info!("{}", update.message),
            MessageType::Warn => warn!("{}", update.message),
            MessageType::Error => error!("{}", update.message),
        }
        Ok(update.thread_ts.clone())
    }
}

/// The conversation of one test suite.
#[derive(Debug, Clone)]
pub struct StatusThread {
    channel: String,
    first_message: Option<String>,
    thread_ts: Option<String>,
}

impl StatusThread {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            first_message: None,
            thread_ts: None,
        }
    }

    pub fn thread_ts(&self) -> Option<&str> {
        self.thread_ts.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.first_message.is_some()
    }

    /// Post `message`, opening the thread with it if nothing was sent yet.
    pub fn send(&mut self, notifier: &dyn Notifier, message_type: MessageType, message: impl Into<String>) -> SmokeResult<()> {
        let message = message.into();
        let first_message = self.first_message.get_or_insert_with(|| message.clone()).clone();

        let update = StatusUpdate {
            channel: self.channel.clone(),
            message,
            message_type,
            first_message,
            thread_ts: self.thread_ts.clone(),
        };

        self.thread_ts = notifier.post(&update)?;
        Ok(())
    }
}

impl Default for StatusThread {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ThreadingNotifier {
        posted: Mutex<Vec<StatusUpdate>>,
    }

    impl Notifier for ThreadingNotifier {
        fn post(&self, update: &StatusUpdate) -> SmokeResult<Option<String>> {
            self.posted.lock().unwrap().push(update.clone());
            Ok(Some("1700000000.000100".to_string()))
        }
    }

    #[test]
    fn test_updates_reply_to_the_first_message() {
        let notifier = ThreadingNotifier::default();
        let mut thread = StatusThread::default();
        assert!(!thread.is_started());

        thread.send(&notifier, MessageType::Info, "*Example Course*").unwrap();
        thread.send(&notifier, MessageType::Error, "FAILED").unwrap();

        let posted = notifier.posted.lock().unwrap();
        assert_eq!(posted[0].thread_ts, None);
        assert_eq!(posted[0].channel, DEFAULT_CHANNEL);
        assert_eq!(posted[1].thread_ts.as_deref(), Some("1700000000.000100"));
        assert_eq!(posted[1].first_message, "*Example Course*");
        assert_eq!(thread.thread_ts(), Some("1700000000.000100"));
    }

    #[test]
    fn test_message_type_wire_format() {
        assert_eq!(serde_json::to_string(&MessageType::Warn).unwrap(), "\"warn\"");
    }
}
