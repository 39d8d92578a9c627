//! Operation controller for a remote, content-addressed file tree.
//!
//! [`FilesController`] owns the transient state of a files page: the current
//! listing, one cancelable download, and the share/rename/delete prompts. It
//! talks to the tree through the [`FileService`] trait; [`NodeClient`] is the
//! HTTP implementation used by the `files-cli` binary.

pub mod client;
pub mod config;
pub mod controller;
pub mod delete;
pub mod download;
pub mod error;
pub mod fetch;
pub mod modal;
pub mod notify;
pub mod path;
pub mod rename;
pub mod service;
pub mod share;
pub mod types;

pub use client::NodeClient;
pub use config::NodeConfig;
pub use controller::{FilesController, PendingOperation};
pub use delete::DeletePayload;
pub use download::{DownloadState, DownloadToggle};
pub use error::{FilesError, Result, ServiceError, ServiceResult};
pub use modal::ModalState;
pub use notify::{Notification, Notifier};
pub use rename::RenamePayload;
pub use service::{FileService, ProgressSink, TransferHandle, TransferOutcome};
pub use share::{ShareLink, ShareResolution};
pub use types::{
    DirectoryEntry, DirectoryListing, DownloadDescriptor, EntryKind, SortBy, SortOrder, Sorting,
    UploadEntry, UploadSource,
};
