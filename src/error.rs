// --- ERROR HANDLING ---

/// Errors returned by a [`FileService`](crate::FileService) implementation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Transfer cancelled")]
    Cancelled,
}

/// Errors surfaced by the controller, classified by the operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Listing the current directory failed. The previous listing is kept.
    #[error("Failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: ServiceError,
    },

    /// A mutation (write, move, delete, mkdir) failed after its modal closed.
    #[error("{op} failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: ServiceError,
    },

    /// The download descriptor or the transfer could not be set up.
    #[error("Download could not start: {0}")]
    DownloadSetup(#[source] ServiceError),

    #[error("Share link generation failed: {0}")]
    ShareLink(#[source] ServiceError),

    #[error("No entries selected")]
    EmptySelection,
}

impl FilesError {
    pub(crate) fn operation(op: &'static str) -> impl FnOnce(ServiceError) -> Self {
        move |source| FilesError::Operation { op, source }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
pub type Result<T> = std::result::Result<T, FilesError>;
