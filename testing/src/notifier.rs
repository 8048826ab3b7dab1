//! Notification sinks for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test panicked

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tourbook_core::environment::{BookingNotification, Notifier, NotifyError};

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<BookingNotification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    #[must_use]
    pub fn received(&self) -> Vec<BookingNotification> {
        self.received.lock().unwrap().clone()
    }

    /// Waits until at least `count` notifications arrived (delivery runs on
    /// spawned tasks). Returns what was received, possibly fewer after ~1s.
    pub async fn wait_for(&self, count: usize) -> Vec<BookingNotification> {
        for _ in 0..100 {
            if self.received.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        notification: BookingNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        self.received.lock().unwrap().push(notification);
        Box::pin(async { Ok(()) })
    }
}

/// Fails every delivery, counting attempts.
#[derive(Debug, Default)]
pub struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    /// Create a failing notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries attempted so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Notifier for FailingNotifier {
    fn notify(
        &self,
        _notification: BookingNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        *self.attempts.lock().unwrap() += 1;
        Box::pin(async { Err(NotifyError::Transport("connection refused".to_string())) })
    }
}
