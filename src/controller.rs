use futures::future::BoxFuture;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::delete::{DeleteFlow, DeletePayload};
use crate::download::{DownloadCoordinator, DownloadState, DownloadToggle};
use crate::error::{FilesError, Result};
use crate::fetch::FetchScheduler;
use crate::modal::ModalState;
use crate::notify::{Notification, Notifier};
use crate::path;
use crate::rename::{RenameFlow, RenamePayload};
use crate::service::{FileService, ProgressSink, TransferOutcome};
use crate::share::{ShareFlow, ShareLink, ShareResolution};
use crate::types::{DirectoryEntry, DirectoryListing, SortBy, Sorting, UploadEntry};

/// A mutation that runs after its modal has already closed.
pub type PendingOperation = BoxFuture<'static, Result<()>>;

/// Owns the transient state of one files page: the current listing, the
/// running download, and the share/rename/delete prompts.
///
/// Every mutation of page state goes through `&mut self`. Progress of the
/// running download and of the running write are the only cells shared with
/// in-flight work.
pub struct FilesController<S: FileService> {
    service: S,
    notifier: Notifier,
    resolved_path: String,
    listing: Option<DirectoryListing>,
    fetch_error: Option<String>,
    scheduler: FetchScheduler,
    download: DownloadCoordinator,
    share: ShareFlow,
    rename: RenameFlow,
    delete: DeleteFlow,
    sorting: Sorting,
    write: Mutex<Option<ProgressSink>>,
}

impl<S: FileService> FilesController<S> {
    pub fn new(service: S) -> (Self, UnboundedReceiver<Notification>) {
        let (notifier, rx) = Notifier::channel();
        (Self::with_notifier(service, notifier), rx)
    }

    pub fn with_notifier(service: S, notifier: Notifier) -> Self {
        Self {
            service,
            notifier,
            resolved_path: "/".to_string(),
            listing: None,
            fetch_error: None,
            scheduler: FetchScheduler::new(),
            download: DownloadCoordinator::new(),
            share: ShareFlow::default(),
            rename: RenameFlow::default(),
            delete: DeleteFlow::default(),
            sorting: Sorting::default(),
            write: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    // --- Listing ---

    /// Path of the loaded listing, or the targeted path before anything loaded.
    pub fn current_path(&self) -> &str {
        self.listing
            .as_ref()
            .map_or(self.resolved_path.as_str(), |l| l.path.as_str())
    }

    pub fn listing(&self) -> Option<&DirectoryListing> {
        self.listing.as_ref()
    }

    /// Entries of the current listing in the preferred order.
    pub fn sorted_entries(&self) -> Vec<DirectoryEntry> {
        let mut entries = self
            .listing
            .as_ref()
            .map(|l| l.entries.clone())
            .unwrap_or_default();
        self.sorting.apply(&mut entries);
        entries
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn sorting(&self) -> Sorting {
        self.sorting
    }

    pub fn update_sorting(&mut self, by: SortBy) {
        self.sorting.select(by);
    }

    /// Initial load: always fetches `path`.
    pub async fn mount(&mut self, path: &str) -> Result<()> {
        self.resolved_path = path.to_string();
        self.scheduler.mount(path);
        self.fetch(path).await
    }

    /// Re-synchronizes with the navigation target. Returns whether a fetch ran.
    pub async fn refresh(&mut self, resolved_path: &str) -> Result<bool> {
        self.resolved_path = resolved_path.to_string();
        if !self.scheduler.should_fetch(resolved_path) {
            return Ok(false);
        }
        self.fetch(resolved_path).await?;
        Ok(true)
    }

    pub async fn navigate_to(&mut self, path: &str) -> Result<bool> {
        self.refresh(path).await
    }

    /// Fetches the targeted path regardless of what is loaded.
    pub async fn reload(&mut self) -> Result<()> {
        let path = self.resolved_path.clone();
        self.fetch(&path).await
    }

    async fn fetch(&mut self, path: &str) -> Result<()> {
        debug!("Fetching listing for {path}");
        match self.service.fetch_directory(path).await {
            Ok(listing) => {
                self.listing = Some(listing);
                self.fetch_error = None;
                self.scheduler.record(path, true);
                Ok(())
            }
            Err(source) => {
                let err = FilesError::Fetch {
                    path: path.to_string(),
                    source,
                };
                self.fetch_error = Some(err.to_string());
                self.scheduler.record(path, false);
                report(&self.notifier, &err);
                Err(err)
            }
        }
    }

    // --- Download ---

    pub fn download_state(&self) -> DownloadState {
        self.download.state()
    }

    /// Starts a download of `selection`, or cancels the running one.
    pub async fn toggle_download(&mut self, selection: &[DirectoryEntry]) -> Result<DownloadToggle> {
        self.reap_download();
        let result = self.download.toggle(&self.service, selection).await;
        if let Err(e) = &result {
            report(&self.notifier, e);
        }
        result
    }

    /// Aborts the running download without ever starting one. Returns whether
    /// a download was running. A transfer that already ended is left for
    /// [`reap_download`](Self::reap_download).
    pub fn cancel_download(&mut self) -> bool {
        self.download.cancel()
    }

    /// Clears a download that ended on its own and notifies about it.
    pub fn reap_download(&mut self) -> Option<TransferOutcome> {
        let (filename, outcome) = self.download.reap()?;
        self.announce_download(filename, &outcome);
        Some(outcome)
    }

    /// Waits for the running download to end, then clears it.
    pub async fn wait_download(&mut self) -> Option<TransferOutcome> {
        let (filename, outcome) = self.download.wait().await?;
        self.announce_download(filename, &outcome);
        Some(outcome)
    }

    fn announce_download(&self, filename: String, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Completed => {
                info!("Downloaded {filename}");
                self.notifier.send(Notification::DownloadFinished { filename });
            }
            TransferOutcome::Failed(message) => {
                warn!("Download of {filename} failed: {message}");
                self.notifier.send(Notification::DownloadFailed {
                    message: message.clone(),
                });
            }
            TransferOutcome::Cancelled => debug!("Download of {filename} cancelled"),
        }
    }

    // --- Share ---

    pub fn share_modal(&self) -> &ModalState<ShareLink> {
        self.share.modal()
    }

    /// Opens the share modal as pending and returns the link request. Feed its
    /// output to [`resolve_share`](Self::resolve_share).
    pub fn show_share(&mut self, selection: &[DirectoryEntry]) -> Result<BoxFuture<'static, ShareResolution>> {
        if selection.is_empty() {
            return Err(FilesError::EmptySelection);
        }
        Ok(self.share.show(&self.service, selection.to_vec()))
    }

    /// Applies a finished link request. Stale links are dropped (`Ok(false)`).
    /// Failures are always reported, and mark the modal as failed only when
    /// it still shows that request.
    pub fn resolve_share(&mut self, resolution: ShareResolution) -> Result<bool> {
        let result = self.share.resolve(resolution);
        if let Err(e) = &result {
            report(&self.notifier, e);
        }
        result
    }

    /// Opens the share modal and waits for the link in one step.
    pub async fn share(&mut self, selection: &[DirectoryEntry]) -> Result<ShareLink> {
        let request = self.show_share(selection)?;
        let resolution = request.await;
        self.resolve_share(resolution)?;
        Ok(self.share.modal().payload().clone())
    }

    pub fn close_share(&mut self) {
        self.share.close();
    }

    // --- Rename ---

    pub fn rename_modal(&self) -> &ModalState<RenamePayload> {
        self.rename.modal()
    }

    pub fn show_rename(&mut self, selection: &[DirectoryEntry]) -> Result<()> {
        self.rename.show(selection)
    }

    /// Closes the rename prompt and returns the move to run, if one is needed.
    pub fn submit_rename(&mut self, new_name: &str) -> Option<PendingOperation> {
        let op = self.rename.submit(&self.service, new_name)?;
        Some(reported(self.notifier.clone(), op))
    }

    pub fn cancel_rename(&mut self) {
        self.rename.cancel();
    }

    // --- Delete ---

    pub fn delete_modal(&self) -> &ModalState<DeletePayload> {
        self.delete.modal()
    }

    pub fn show_delete(&mut self, selection: &[DirectoryEntry]) -> Result<()> {
        self.delete.show(selection)
    }

    /// Closes the delete prompt and returns the batch delete to run.
    pub fn confirm_delete(&mut self) -> Option<PendingOperation> {
        let op = self.delete.confirm(&self.service)?;
        Some(reported(self.notifier.clone(), op))
    }

    pub fn cancel_delete(&mut self) {
        self.delete.cancel();
    }

    // --- Direct operations ---

    pub async fn make_dir(&self, name: &str) -> Result<()> {
        let target = path::resolve(self.current_path(), name);
        let result = self
            .service
            .make_directory(&target)
            .await
            .map_err(FilesError::operation("mkdir"));
        self.settle(result)
    }

    /// Writes `entries` under `root`, or under the current path when `root` is empty.
    pub async fn add(&self, entries: Vec<UploadEntry>, root: &str) -> Result<()> {
        let root = if root.is_empty() { self.current_path() } else { root };
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.path = path::resolve(root, &entry.path);
                entry
            })
            .collect::<Vec<_>>();
        debug!("Writing {} entries under {root}", entries.len());

        let sink = ProgressSink::new();
        *self.write_slot() = Some(sink.clone());
        let result = self
            .service
            .write(root, entries, sink.clone())
            .await
            .map_err(FilesError::operation("write"));

        sink.finish(match &result {
            Ok(()) => TransferOutcome::Completed,
            Err(e) => TransferOutcome::Failed(e.to_string()),
        });
        let mut slot = self.write_slot();
        if slot.as_ref().is_some_and(|current| current.same_transfer(&sink)) {
            *slot = None;
        }
        drop(slot);
        self.settle(result)
    }

    /// Percentage of bytes sent by the running [`add`](Self::add), if any.
    pub fn write_progress(&self) -> Option<u64> {
        self.write_slot().as_ref().map(ProgressSink::progress)
    }

    fn write_slot(&self) -> MutexGuard<'_, Option<ProgressSink>> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn add_by_path(&self, source: &str) -> Result<()> {
        let result = self
            .service
            .add_by_path(self.current_path(), source)
            .await
            .map_err(FilesError::operation("add"));
        self.settle(result)
    }

    pub async fn move_entries(&self, from: &str, to: &str) -> Result<()> {
        let result = self
            .service
            .move_entry(from, to)
            .await
            .map_err(FilesError::operation("move"));
        self.settle(result)
    }

    /// Explorer route for the content behind the first hashed entry.
    pub fn inspect(&self, selection: &[DirectoryEntry]) -> Option<String> {
        let hash = selection.iter().find_map(|e| e.hash.as_deref())?;
        Some(format!("/explore/ipfs/{hash}"))
    }

    fn settle(&self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            report(&self.notifier, e);
        }
        result
    }
}

fn reported(notifier: Notifier, op: PendingOperation) -> PendingOperation {
    Box::pin(async move {
        let result = op.await;
        if let Err(e) = &result {
            report(&notifier, e);
        }
        result
    })
}

fn report(notifier: &Notifier, err: &FilesError) {
    warn!("{err}");
    let notification = match err {
        FilesError::Fetch { path, source } => Notification::FetchFailed {
            path: path.clone(),
            message: source.to_string(),
        },
        FilesError::Operation { op, source } => Notification::OperationFailed {
            op: *op,
            message: source.to_string(),
        },
        FilesError::DownloadSetup(source) => Notification::DownloadFailed {
            message: source.to_string(),
        },
        FilesError::ShareLink(source) => Notification::ShareFailed {
            message: source.to_string(),
        },
        FilesError::EmptySelection => return,
    };
    notifier.send(notification);
}
