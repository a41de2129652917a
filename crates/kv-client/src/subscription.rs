//! Channel-backed pub/sub subscriptions.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{ClientError, Result};

/// A message delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub channel: String,
    pub payload: String,
    /// Wall-clock time at which the client handed the message over.
    pub received_at: DateTime<Utc>,
}

/// An active subscription to one channel.
///
/// The consumer owns the receiving end, so counters derived from the
/// messages are never shared with the delivery task.
pub struct Subscription {
    channel: String,
    messages: mpsc::UnboundedReceiver<ReceivedMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl Subscription {
    /// A subscription fed directly by the store, without a delivery task.
    pub(crate) fn direct(
        channel: impl Into<String>,
        messages: mpsc::UnboundedReceiver<ReceivedMessage>,
    ) -> Self {
        Self {
            channel: channel.into(),
            messages,
            shutdown: None,
            task: None,
        }
    }

    /// A subscription fed by a background task that stops when signalled.
    pub(crate) fn with_task(
        channel: impl Into<String>,
        messages: mpsc::UnboundedReceiver<ReceivedMessage>,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<()>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            messages,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next message. `None` once the delivery side has ended.
    pub async fn recv(&mut self) -> Option<ReceivedMessage> {
        self.messages.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<ReceivedMessage> {
        self.messages.try_recv().ok()
    }

    /// Stop delivery and unsubscribe from the channel.
    pub async fn unsubscribe(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone if the connection dropped.
            let _ = shutdown.send(());
        }
        self.messages.close();

        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| ClientError::Subscription(format!("{}: {e}", self.channel)))?,
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
