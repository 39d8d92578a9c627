//! The contract the controller requires from the remote file tree, and the
//! progress/cancel plumbing shared with a running transfer.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceResult;
use crate::types::{DirectoryEntry, DirectoryListing, DownloadDescriptor, UploadEntry};

/// Primitives of the remote file tree.
///
/// Implementations are cheap to clone: the controller clones the service into
/// detached futures so a mutation can run after its modal has closed.
pub trait FileService: Clone + Send + Sync + 'static {
    fn fetch_directory(&self, path: &str) -> impl Future<Output = ServiceResult<DirectoryListing>> + Send;

    /// Writes `entries` (already resolved to full paths) under `base_path`,
    /// reporting the percentage of bytes sent to `sink`.
    fn write(
        &self,
        base_path: &str,
        entries: Vec<UploadEntry>,
        sink: ProgressSink,
    ) -> impl Future<Output = ServiceResult<()>> + Send;

    /// Links existing content addressed by `source` into `base_path`.
    fn add_by_path(&self, base_path: &str, source: &str) -> impl Future<Output = ServiceResult<()>> + Send;

    fn make_directory(&self, path: &str) -> impl Future<Output = ServiceResult<()>> + Send;

    fn move_entry(&self, from: &str, to: &str) -> impl Future<Output = ServiceResult<()>> + Send;

    /// Deletes every path as one batch request.
    fn delete(&self, paths: &[String]) -> impl Future<Output = ServiceResult<()>> + Send;

    /// Describes a single artifact combining every entry of `selection`.
    fn request_download_link(
        &self,
        selection: &[DirectoryEntry],
    ) -> impl Future<Output = ServiceResult<DownloadDescriptor>> + Send;

    fn request_share_link(&self, selection: &[DirectoryEntry]) -> impl Future<Output = ServiceResult<String>> + Send;

    /// Starts fetching `descriptor.url` and returns once the transfer is running.
    /// Progress goes to `sink`; the returned handle must be `sink.handle()`.
    fn begin_transfer(
        &self,
        descriptor: &DownloadDescriptor,
        sink: ProgressSink,
    ) -> impl Future<Output = ServiceResult<TransferHandle>> + Send;
}

// --- TRANSFER PLUMBING ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Default)]
struct TransferShared {
    progress: AtomicU64,
    cancel: CancellationToken,
    outcome: OnceLock<TransferOutcome>,
    notify: Notify,
}

/// Receives progress reports from a running transfer.
///
/// Reports arriving after the transfer was aborted or finished are dropped,
/// so the stored value never changes once the controller stops tracking it.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    inner: Arc<TransferShared>,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` as the latest progress. The value is opaque to the
    /// controller: a percentage or a byte count, whatever the service reports.
    pub fn report(&self, value: u64) {
        if self.inner.cancel.is_cancelled() || self.inner.outcome.get().is_some() {
            return;
        }
        self.inner.progress.store(value, Ordering::Relaxed);
    }

    pub fn progress(&self) -> u64 {
        self.inner.progress.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves when the transfer is aborted.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }

    /// Records how the transfer ended. Only the first call has an effect.
    pub fn finish(&self, outcome: TransferOutcome) {
        if self.inner.outcome.set(outcome).is_ok() {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether both sinks feed the same transfer.
    pub fn same_transfer(&self, other: &ProgressSink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn handle(&self) -> TransferHandle {
        TransferHandle {
            inner: self.inner.clone(),
        }
    }
}

/// The abort capability of a running transfer.
#[derive(Debug)]
pub struct TransferHandle {
    inner: Arc<TransferShared>,
}

impl TransferHandle {
    /// Stops the transfer. Consumes the handle, so it can only be called once.
    pub fn abort(self) {
        self.inner.cancel.cancel();
        let _ = self.inner.outcome.set(TransferOutcome::Cancelled);
        self.inner.notify.notify_waiters();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    pub fn outcome(&self) -> Option<&TransferOutcome> {
        self.inner.outcome.get()
    }

    /// Waits for the transfer to end on its own.
    pub async fn finished(&self) -> TransferOutcome {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.inner.outcome.get() {
                return outcome.clone();
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_after_abort_are_dropped() {
        let sink = ProgressSink::new();
        let handle = sink.handle();
        sink.report(40);
        handle.abort();
        sink.report(90);
        assert_eq!(sink.progress(), 40);
        assert!(sink.is_cancelled());
    }

    #[test]
    fn first_outcome_wins() {
        let sink = ProgressSink::new();
        let handle = sink.handle();
        sink.finish(TransferOutcome::Completed);
        sink.finish(TransferOutcome::Failed("late".into()));
        assert_eq!(handle.outcome(), Some(&TransferOutcome::Completed));
    }

    #[tokio::test]
    async fn finished_wakes_on_completion() {
        let sink = ProgressSink::new();
        let handle = sink.handle();
        let waiter = tokio::spawn(async move { handle.finished().await });
        tokio::task::yield_now().await;
        sink.finish(TransferOutcome::Completed);
        assert_eq!(waiter.await.unwrap(), TransferOutcome::Completed);
    }
}
