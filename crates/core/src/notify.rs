//! Operator notification channel.
//!
//! Voting ties, files missing everywhere and conflicting ingestion input are
//! reported here instead of failing the operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Severity of an operator notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Warning,
    Error,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Sink for operator notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotificationType);
}

/// Notifier that forwards to the tracing subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: NotificationType) {
        match kind {
            NotificationType::Warning => tracing::warn!(notification = true, "{message}"),
            NotificationType::Error => tracing::error!(notification = true, "{message}"),
        }
    }
}

/// Notifier that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(NotificationType, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications sent so far, oldest first.
    pub fn sent(&self) -> Vec<(NotificationType, String)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.sent().len()
    }

    pub fn clear(&self) {
        match self.sent.lock() {
            Ok(mut sent) => sent.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str, kind: NotificationType) {
        let entry = (kind, message.to_string());
        match self.sent.lock() {
            Ok(mut sent) => sent.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify("first", NotificationType::Warning);
        notifier.notify("second", NotificationType::Error);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], (NotificationType::Warning, "first".to_string()));
        assert_eq!(sent[1].0, NotificationType::Error);
        notifier.clear();
        assert_eq!(notifier.count(), 0);
    }
}
