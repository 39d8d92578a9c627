use futures::future::BoxFuture;
use tracing::info;

use crate::error::{FilesError, Result};
use crate::modal::ModalState;
use crate::path;
use crate::service::FileService;
use crate::types::DirectoryEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePayload {
    pub folder: bool,
    pub path: String,
    pub filename: String,
}

impl RenamePayload {
    pub fn for_entry(entry: &DirectoryEntry) -> Self {
        Self {
            folder: entry.is_dir(),
            path: entry.path.clone(),
            filename: path::basename(&entry.path).to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RenameFlow {
    modal: ModalState<RenamePayload>,
}

impl RenameFlow {
    pub fn modal(&self) -> &ModalState<RenamePayload> {
        &self.modal
    }

    /// Opens the prompt for the first entry of `selection`; the rest are ignored.
    pub fn show(&mut self, selection: &[DirectoryEntry]) -> Result<()> {
        let entry = selection.first().ok_or(FilesError::EmptySelection)?;
        self.modal.show(RenamePayload::for_entry(entry));
        Ok(())
    }

    /// Closes the prompt, then returns the move to run, if any.
    ///
    /// Nothing is moved when the prompt was closed, the name is empty, or the
    /// name is unchanged.
    pub fn submit<S: FileService>(
        &mut self,
        service: &S,
        new_name: &str,
    ) -> Option<BoxFuture<'static, Result<()>>> {
        let RenamePayload { path: from, filename, .. } = self.modal.take()?;
        if new_name.is_empty() || new_name == filename {
            return None;
        }

        let to = path::replace_basename(&from, new_name);
        let service = service.clone();
        Some(Box::pin(async move {
            service
                .move_entry(&from, &to)
                .await
                .map_err(FilesError::operation("move"))?;
            info!("Renamed {from} -> {to}");
            Ok(())
        }))
    }

    pub fn cancel(&mut self) {
        self.modal.reset();
    }
}
