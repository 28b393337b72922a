//! User-visible notices.
//!
//! Operations never surface errors as faults to the presentation layer.
//! Instead they push a [`Notice`] through a [`Notifier`]; whatever renders
//! the UI drains the paired [`NoticeReceiver`].

use tokio::sync::mpsc;

use crate::error::StorefrontError;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Sending half. Cheap to clone; every service holds one.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

/// Receiving half, owned by the presentation layer.
#[derive(Debug)]
pub struct NoticeReceiver {
    rx: mpsc::UnboundedReceiver<Notice>,
}

/// Create a connected notifier and receiver.
#[must_use]
pub fn channel() -> (Notifier, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, NoticeReceiver { rx })
}

impl Notifier {
    pub fn success(&self, message: impl Into<String>) {
        self.send(Notice::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(Notice::error(message));
    }

    /// Surface an error at an operation boundary.
    ///
    /// Suppressed duplicate requests produce no notice. Remote failures are
    /// captured to Sentry.
    pub fn report(&self, err: &StorefrontError) {
        if let StorefrontError::InFlight(operation) = err {
            tracing::debug!(%operation, "Suppressed overlapping request");
            return;
        }

        if err.is_server_side() {
            let event_id = sentry::capture_error(err);
            tracing::error!(error = %err, sentry_event_id = %event_id, "Storefront operation failed");
        } else {
            tracing::warn!(error = %err, "Storefront operation rejected");
        }

        for message in err.user_messages() {
            self.error(message);
        }
    }

    fn send(&self, notice: Notice) {
        // The receiver going away only means nobody is listening any more.
        if self.tx.send(notice).is_err() {
            tracing::debug!("Notice dropped, receiver closed");
        }
    }
}

impl NoticeReceiver {
    /// Take every notice queued so far without waiting.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// Wait for the next notice. `None` once every notifier is dropped.
    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }
}
