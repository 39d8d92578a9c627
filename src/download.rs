use tracing::{debug, info};

use crate::error::{FilesError, Result};
use crate::service::{FileService, ProgressSink, TransferHandle, TransferOutcome};
use crate::types::DirectoryEntry;

/// Snapshot of the download for display.
///
/// `progress` is `Some` exactly when `in_flight` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadState {
    pub in_flight: bool,
    pub progress: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadToggle {
    Started { filename: String },
    Cancelled,
}

#[derive(Debug)]
struct ActiveDownload {
    filename: String,
    sink: ProgressSink,
    handle: TransferHandle,
}

/// Owns the single download a page may run at a time.
///
/// There is no queue: asking for a download while one is running cancels the
/// running one instead of starting another.
#[derive(Debug, Default)]
pub(crate) struct DownloadCoordinator {
    active: Option<ActiveDownload>,
}

impl DownloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DownloadState {
        match self.running() {
            Some(active) => DownloadState {
                in_flight: true,
                progress: Some(active.sink.progress()),
            },
            None => DownloadState::default(),
        }
    }

    fn running(&self) -> Option<&ActiveDownload> {
        self.active.as_ref().filter(|a| !a.handle.is_finished())
    }

    /// Cancels a running download, or starts one for `selection`.
    ///
    /// Callers must [`reap`](Self::reap) first: a finished transfer still
    /// parked here is replaced. On a setup failure the error is returned and
    /// nothing is left in flight.
    pub async fn toggle<S: FileService>(
        &mut self,
        service: &S,
        selection: &[DirectoryEntry],
    ) -> Result<DownloadToggle> {
        if self.cancel() {
            return Ok(DownloadToggle::Cancelled);
        }
        if let Some(stale) = self.active.take() {
            debug!("Replacing unreaped download of {}", stale.filename);
        }

        if selection.is_empty() {
            return Err(FilesError::EmptySelection);
        }

        let descriptor = service
            .request_download_link(selection)
            .await
            .map_err(FilesError::DownloadSetup)?;
        debug!("Starting download of {} from {}", descriptor.filename, descriptor.url);

        let sink = ProgressSink::new();
        let handle = service
            .begin_transfer(&descriptor, sink.clone())
            .await
            .map_err(FilesError::DownloadSetup)?;

        self.active = Some(ActiveDownload {
            filename: descriptor.filename.clone(),
            sink,
            handle,
        });
        Ok(DownloadToggle::Started {
            filename: descriptor.filename,
        })
    }

    /// Aborts the running download. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(active) if !active.handle.is_finished() => {
                info!("Cancelling download of {}", active.filename);
                active.handle.abort();
                true
            }
            Some(finished) => {
                self.active = Some(finished);
                false
            }
            None => false,
        }
    }

    /// Clears a download that ended on its own and reports how it ended.
    pub fn reap(&mut self) -> Option<(String, TransferOutcome)> {
        let finished = self.active.as_ref()?.handle.outcome()?.clone();
        let active = self.active.take()?;
        Some((active.filename, finished))
    }

    /// Waits for the running download to end and clears it.
    pub async fn wait(&mut self) -> Option<(String, TransferOutcome)> {
        let outcome = self.active.as_ref()?.handle.finished().await;
        let active = self.active.take()?;
        Some((active.filename, outcome))
    }
}
