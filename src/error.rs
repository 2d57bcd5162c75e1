//! Error taxonomy shared by the store, resolver, cache and operation layers
use std::path::PathBuf;
use thiserror::Error;

/// Why an opaque reference could not be turned into a live directory handle
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The reference is malformed or was minted by a different resolver
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The referenced directory no longer exists (or is not a directory)
    #[error("directory gone: {}", .0.display())]
    DirectoryGone(PathBuf),

    /// The directory was located but could not be activated
    #[error("activation failed for {}: {source}", .path.display())]
    ActivationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("directory not found or not accessible: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("bookmark not found: {0}")]
    BookmarkNotFound(String),

    #[error("bookmark already exists: {0}")]
    BookmarkAlreadyExists(String),

    #[error("no write permission for bookmarked directory: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("could not resolve bookmark '{identifier}': {source}")]
    ResolutionFailed {
        identifier: String,
        #[source]
        source: ResolveError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BookmarkError {
    /// Stable machine-readable code, as reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            BookmarkError::DirectoryNotFound(_) => "DIRECTORY_NOT_FOUND",
            BookmarkError::BookmarkNotFound(_) => "BOOKMARK_NOT_FOUND",
            BookmarkError::BookmarkAlreadyExists(_) => "BOOKMARK_ALREADY_EXISTS",
            BookmarkError::PermissionDenied(_) => "PERMISSION_DENIED",
            BookmarkError::ResolutionFailed { .. } => "RESOLUTION_FAILED",
            BookmarkError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BookmarkError::Store(_) => "STORE_ERROR",
            BookmarkError::Io(_) => "IO_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BookmarkError::BookmarkNotFound(_))
    }

    pub(crate) fn resolution(identifier: &str, source: ResolveError) -> Self {
        BookmarkError::ResolutionFailed {
            identifier: identifier.to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for BookmarkError {
    fn from(e: serde_json::Error) -> Self {
        BookmarkError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookmarkError>;
