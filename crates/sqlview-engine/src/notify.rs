//! Notification channel for human-facing status messages
//!
//! The facade reports outcomes of its boundary operations (engine init, load,
//! export, table listing) to a [`NotificationSink`]. Delivery is
//! fire-and-forget: sinks must not block and the facade never looks at what
//! happens to a notification afterwards.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// Coarse outcome of a reported operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Error,
}

impl Severity {
    /// HTTP-style status code (200 / 400)
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Error => 400,
        }
    }
}

/// One status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl From<&EngineError> for Notification {
    fn from(err: &EngineError) -> Self {
        Self {
            severity: err.severity(),
            message: err.to_string(),
        }
    }
}

/// Destination for notifications
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Must return promptly.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the `tracing` log. This is the facade default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Ok => info!(code = notification.severity.code(), "{}", notification.message),
            Severity::Error => {
                warn!(code = notification.severity.code(), "{}", notification.message)
            }
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

/// Forwards notifications over an unbounded tokio channel, e.g. to a UI task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(notification);
    }
}

/// Turn a failed result into a notification plus a safe default
pub trait ResultExt<T> {
    /// On error, report it to `sink` and return `T::default()`
    fn or_notify(self, sink: &dyn NotificationSink) -> T
    where
        T: Default;
}

impl<T> ResultExt<T> for Result<T, EngineError> {
    fn or_notify(self, sink: &dyn NotificationSink) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                sink.notify(Notification::from(&err));
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatementError;
    use tracing_test::traced_test;

    #[test]
    fn test_severity_codes() {
        assert_eq!(Severity::Ok.code(), 200);
        assert_eq!(Severity::Error.code(), 400);
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(Notification::ok("Database loaded"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.severity, Severity::Ok);
        assert_eq!(received.message, "Database loaded");
    }

    #[test]
    fn test_channel_sink_from_existing_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::from_sender(tx.clone());
        sink.notify(Notification::ok("from sink"));
        tx.send(Notification::ok("direct")).unwrap();

        assert_eq!(rx.try_recv().unwrap().message, "from sink");
        assert_eq!(rx.try_recv().unwrap().message, "direct");
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.notify(Notification::error("nobody home"));
    }

    #[test]
    fn test_or_notify_returns_default_and_reports() {
        let (sink, mut rx) = ChannelSink::new();
        let result: Result<Vec<String>, EngineError> =
            Err(EngineError::Catalog("No database is open".to_string()));

        let tables = result.or_notify(&sink);
        assert!(tables.is_empty());

        let received = rx.try_recv().unwrap();
        assert_eq!(received.severity, Severity::Error);
        assert!(received.message.contains("No database is open"));
    }

    #[test]
    fn test_or_notify_passes_success_through() {
        let (sink, mut rx) = ChannelSink::new();
        let result: Result<usize, EngineError> = Ok(3);
        assert_eq!(result.or_notify(&sink), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notification_from_statement_error() {
        let err = EngineError::from(StatementError::NoHandle);
        let notification = Notification::from(&err);
        assert_eq!(notification.severity, Severity::Error);
        assert_eq!(notification.message, "No database is open");
    }

    #[test]
    fn test_notification_json() {
        let json = serde_json::to_string(&Notification::ok("done")).unwrap();
        assert_eq!(json, r#"{"severity":"ok","message":"done"}"#);
    }

    #[traced_test]
    #[test]
    fn test_tracing_sink_logs() {
        TracingSink.notify(Notification::error("Failed to load database"));
        assert!(logs_contain("Failed to load database"));
    }
}
