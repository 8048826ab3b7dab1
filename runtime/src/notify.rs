//! Post-commit booking notifications.
//!
//! Notifications are dispatched on a spawned task after the booking change
//! has committed. Delivery failures are logged and counted; they never undo
//! the change.

use crate::metrics::BookingMetrics;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tourbook_core::environment::{BookingNotification, Notifier, NotifyError};

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        notification: BookingNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            tracing::info!(
                booking_id = %notification.booking_id,
                reference = %notification.reference,
                status = %notification.status,
                event = ?notification.event,
                total = %notification.total_amount,
                "Booking notification"
            );
            Ok(())
        })
    }
}

/// Posts notifications as JSON to a webhook.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a notifier posting to `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(
        &self,
        notification: BookingNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&notification)
                .send()
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(NotifyError::Rejected(status.as_u16()))
            }
        })
    }
}

/// Delivers `notification` on a background task.
///
/// Returns the task handle so tests can await delivery.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: BookingNotification) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let booking_id = notification.booking_id;
        if let Err(error) = notifier.notify(notification).await {
            BookingMetrics::record_notification_failure();
            tracing::warn!(%booking_id, %error, "Booking notification failed");
        }
    })
}
