//! Queues and the handle that feeds them.
//!
//! The loop owns two unbounded queues. Notifications land on one, user
//! commands on the other; pushing never blocks and never fails (pushes onto
//! a stopped loop are dropped). Control requests travel on a third channel
//! that the loop only services at safe points, so `stop()` and `reset()`
//! always observe a consistent dialogue state.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::command::UserInput;
use crate::executor::RawResult;

/// An asynchronous result pushed by a background app.
#[derive(Debug, Clone)]
pub struct Notification {
    pub app_id: String,
    pub icon: Option<String>,
    pub result: RawResult,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(app_id: impl Into<String>, result: RawResult) -> Self {
        Self {
            app_id: app_id.into(),
            icon: None,
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// An asynchronous failure pushed by a background app.
#[derive(Debug, Clone)]
pub struct ErrorNotification {
    pub app_id: String,
    pub icon: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorNotification {
    pub fn new(app_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            icon: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// One item on a dialogue queue.
#[derive(Debug, Clone)]
pub enum QueueItem {
    UserInput(UserInput),
    Notification(Notification),
    Error(ErrorNotification),
}

/// A request the loop services only at a turn boundary.
#[derive(Debug)]
pub(crate) enum ControlRequest {
    Reset { done: oneshot::Sender<()> },
}

/// Clonable handle for feeding and controlling a running dialogue loop.
#[derive(Clone)]
pub struct DialogueHandle {
    pub(crate) user_tx: mpsc::UnboundedSender<QueueItem>,
    pub(crate) notify_tx: mpsc::UnboundedSender<QueueItem>,
    pub(crate) control_tx: mpsc::UnboundedSender<ControlRequest>,
    pub(crate) shutdown: CancellationToken,
}

impl DialogueHandle {
    /// Queue a user command. Never blocks.
    pub fn push_command(&self, input: UserInput) {
        let _ = self.user_tx.send(QueueItem::UserInput(input));
    }

    /// Queue an app notification. Never blocks.
    pub fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(QueueItem::Notification(notification));
    }

    /// Queue an app error notification. Never blocks.
    pub fn notify_error(&self, error: ErrorNotification) {
        let _ = self.notify_tx.send(QueueItem::Error(error));
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// An in-flight turn unwinds at its next wait point; the signal is never
    /// visible to the user. The loop must be running (or already stopped)
    /// for this to resolve.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.user_tx.closed().await;
    }

    /// Whether the loop has exited. Pushes to a closed loop are dropped.
    pub fn is_closed(&self) -> bool {
        self.user_tx.is_closed()
    }

    /// Clear the dialogue state without stopping the loop.
    ///
    /// Resolves once the loop has reached a safe point and dropped the
    /// state; a reset mid-turn cancels the turn first.
    pub async fn reset(&self) {
        let (done, wait) = oneshot::channel();
        if self
            .control_tx
            .send(ControlRequest::Reset { done })
            .is_ok()
        {
            let _ = wait.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushes_never_block_or_fail() {
        let (user_tx, mut user_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (control_tx, _control_rx) = mpsc::unbounded_channel();
        let handle = DialogueHandle {
            user_tx,
            notify_tx,
            control_tx,
            shutdown: CancellationToken::new(),
        };

        for i in 0..100 {
            handle.push_command(UserInput::text(format!("command {i}")));
        }
        let mut received = 0;
        while user_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 100);

        // Receiver gone: pushes are silently dropped.
        drop(notify_rx);
        handle.notify(Notification::new(
            "app-1",
            RawResult::new("org.test:source", Default::default()),
        ));
    }
}
