use futures::future::BoxFuture;
use tracing::info;

use crate::error::{FilesError, Result};
use crate::modal::ModalState;
use crate::service::FileService;
use crate::types::DirectoryEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePayload {
    pub files: usize,
    pub folders: usize,
    pub paths: Vec<String>,
}

impl DeletePayload {
    pub fn for_selection(selection: &[DirectoryEntry]) -> Self {
        let folders = selection.iter().filter(|e| e.is_dir()).count();
        Self {
            files: selection.len() - folders,
            folders,
            paths: selection.iter().map(|e| e.path.clone()).collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DeleteFlow {
    modal: ModalState<DeletePayload>,
}

impl DeleteFlow {
    pub fn modal(&self) -> &ModalState<DeletePayload> {
        &self.modal
    }

    /// Prepares the confirmation prompt. Nothing is sent to the service yet.
    pub fn show(&mut self, selection: &[DirectoryEntry]) -> Result<()> {
        if selection.is_empty() {
            return Err(FilesError::EmptySelection);
        }
        self.modal.show(DeletePayload::for_selection(selection));
        Ok(())
    }

    /// Closes the prompt and returns the batch delete. A second confirm finds
    /// the prompt closed and returns `None`.
    pub fn confirm<S: FileService>(&mut self, service: &S) -> Option<BoxFuture<'static, Result<()>>> {
        let DeletePayload { paths, .. } = self.modal.take()?;
        let service = service.clone();
        Some(Box::pin(async move {
            service
                .delete(&paths)
                .await
                .map_err(FilesError::operation("delete"))?;
            info!("Deleted {} entries", paths.len());
            Ok(())
        }))
    }

    pub fn cancel(&mut self) {
        self.modal.reset();
    }
}
