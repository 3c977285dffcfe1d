//! Notification delivery for allocation workflow events
//!
//! Delivery is best-effort and asynchronous: transitions commit first,
//! then delivery is attempted, and failures are logged, never propagated
//! back to the caller.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::Staff;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound notification sink consumed by the allocation manager
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell the assignee a lecturer-approved offer is waiting for them.
    async fn send_offer_to_assignee(
        &self,
        recipient: &Staff,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError>;

    /// Tell every lecturer of the unit the assignee accepted their offer.
    async fn notify_lecturers(
        &self,
        recipients: &[Staff],
        assignee_name: &str,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError>;
}

/// Sink that only writes tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_offer_to_assignee(
        &self,
        recipient: &Staff,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %recipient.email,
            unit = unit_label,
            activity = activity_code,
            "offer sent to assignee"
        );
        Ok(())
    }

    async fn notify_lecturers(
        &self,
        recipients: &[Staff],
        assignee_name: &str,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError> {
        for recipient in recipients {
            tracing::info!(
                recipient = %recipient.email,
                assignee = assignee_name,
                unit = unit_label,
                activity = activity_code,
                "assignee accepted offer"
            );
        }
        Ok(())
    }
}

/// A delivered notification, observable on a broadcast channel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Notification {
    OfferSent {
        recipient_email: String,
        unit_label: String,
        activity_code: String,
    },
    AssigneeAccepted {
        recipient_emails: Vec<String>,
        assignee_name: String,
        unit_label: String,
        activity_code: String,
    },
}

/// Sink that fans notifications out on a broadcast channel; used by tests
/// and by transports that forward notifications to connected clients
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_offer_to_assignee(
        &self,
        recipient: &Staff,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError> {
        self.tx
            .send(Notification::OfferSent {
                recipient_email: recipient.email.clone(),
                unit_label: unit_label.to_string(),
                activity_code: activity_code.to_string(),
            })
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }

    async fn notify_lecturers(
        &self,
        recipients: &[Staff],
        assignee_name: &str,
        unit_label: &str,
        activity_code: &str,
    ) -> Result<(), NotifyError> {
        self.tx
            .send(Notification::AssigneeAccepted {
                recipient_emails: recipients.iter().map(|s| s.email.clone()).collect(),
                assignee_name: assignee_name.to_string(),
                unit_label: unit_label.to_string(),
                activity_code: activity_code.to_string(),
            })
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}
