//! Notification events emitted on sync milestones.
//!
//! Formatting and display belong to whoever subscribes.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Info,
  Success,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub title:   String,
  pub message: String,
  pub kind:    NotificationKind,
}

/// Fan-out of [`Notification`]s. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
  fn default() -> Self { Self::new(64) }
}

impl Notifier {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Notification> { self.tx.subscribe() }

  /// Emit an event. Having no subscribers is not an error.
  pub fn emit(&self, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) {
    let _ = self.tx.send(Notification {
      title: title.into(),
      message: message.into(),
      kind,
    });
  }
}
