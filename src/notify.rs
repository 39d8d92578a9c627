use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Outcomes the front end should show outside of any modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    OperationFailed { op: &'static str, message: String },
    FetchFailed { path: String, message: String },
    DownloadFinished { filename: String },
    DownloadFailed { message: String },
    ShareFailed { message: String },
}

/// Sending half of the notification channel. Dropped receivers are ignored.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("notification dropped: receiver closed");
        }
    }
}
