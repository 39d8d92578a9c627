use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{FilesError, Result, ServiceResult};
use crate::modal::ModalState;
use crate::service::FileService;
use crate::types::DirectoryEntry;

/// What the share modal shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShareLink {
    #[default]
    Pending,
    Ready(String),
    Failed(String),
}

/// Result of a share-link request, tagged with the opening it belongs to.
#[derive(Debug)]
pub struct ShareResolution {
    ticket: u64,
    result: ServiceResult<String>,
}

#[derive(Debug, Default)]
pub struct ShareFlow {
    modal: ModalState<ShareLink>,
    ticket: u64,
}

impl ShareFlow {
    pub fn modal(&self) -> &ModalState<ShareLink> {
        &self.modal
    }

    /// Opens the modal as `Pending` and returns the link request to drive.
    pub fn show<S: FileService>(
        &mut self,
        service: &S,
        selection: Vec<DirectoryEntry>,
    ) -> BoxFuture<'static, ShareResolution> {
        self.ticket += 1;
        self.modal.show(ShareLink::Pending);

        let ticket = self.ticket;
        let service = service.clone();
        Box::pin(async move {
            let result = service.request_share_link(&selection).await;
            ShareResolution { ticket, result }
        })
    }

    /// Applies a resolution if it belongs to the opening still on screen.
    ///
    /// When the modal was closed or reopened since the request started, the
    /// modal is left untouched: a link is dropped (`Ok(false)`) and a failure
    /// is still returned so it can be reported.
    pub fn resolve(&mut self, resolution: ShareResolution) -> Result<bool> {
        if resolution.ticket != self.ticket || !self.modal.is_open() {
            return match resolution.result {
                Ok(_) => {
                    debug!("Discarding share link for closed request {}", resolution.ticket);
                    Ok(false)
                }
                Err(e) => {
                    warn!("Share link for closed request {} failed: {e}", resolution.ticket);
                    Err(FilesError::ShareLink(e))
                }
            };
        }
        let Some(payload) = self.modal.payload_mut() else {
            return Ok(false);
        };

        match resolution.result {
            Ok(link) => {
                *payload = ShareLink::Ready(link);
                Ok(true)
            }
            Err(e) => {
                warn!("Share link generation failed: {e}");
                *payload = ShareLink::Failed(e.to_string());
                Err(FilesError::ShareLink(e))
            }
        }
    }

    pub fn close(&mut self) {
        self.modal.reset();
    }
}
