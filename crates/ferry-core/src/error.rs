//! Error types for the ferry-core crate

use thiserror::Error;

/// Result type alias using `ProviderError`
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by providers and by the operations built on top of them.
///
/// Every variant maps to an HTTP-like status through [`ProviderError::code`],
/// which is what callers (and the retry policy of the request gateway) key on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Generic provider failure
    #[error("provider error ({code}): {message}")]
    Provider { code: u16, message: String },

    /// The requested node does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Metadata lookup failed
    #[error("metadata error ({code}): {message}")]
    Metadata { code: u16, message: String },

    /// Download failed
    #[error("download error ({code}): {message}")]
    Download { code: u16, message: String },

    /// Upload failed
    #[error("upload error ({code}): {message}")]
    Upload { code: u16, message: String },

    /// Delete failed
    #[error("delete error ({code}): {message}")]
    Delete { code: u16, message: String },

    /// Folder creation failed
    #[error("folder creation error ({code}): {message}")]
    FolderCreation { code: u16, message: String },

    /// Destination already exists and the conflict policy forbids touching it
    #[error("cannot complete action: file or folder \"{path}\" already exists in this location")]
    NamingConflict { path: String },

    /// A path was malformed or used where its kind is not allowed
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The provider does not implement the operation
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Transport level HTTP failure (no response received)
    #[error("http error: {0}")]
    Http(String),

    /// A spawned child operation panicked or was aborted
    #[error("task failed: {0}")]
    Task(String),
}

/// The refinement of [`ProviderError`] a failed status check is reported as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[default]
    Provider,
    NotFound,
    Metadata,
    Download,
    Upload,
    Delete,
    FolderCreation,
}

impl ProviderError {
    /// Build an error of the given kind
    pub fn from_kind(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Provider => Self::Provider { code, message },
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Metadata => Self::Metadata { code, message },
            ErrorKind::Download => Self::Download { code, message },
            ErrorKind::Upload => Self::Upload { code, message },
            ErrorKind::Delete => Self::Delete { code, message },
            ErrorKind::FolderCreation => Self::FolderCreation { code, message },
        }
    }

    /// Shorthand for a generic provider error
    pub fn provider(code: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
        }
    }

    /// HTTP-like status code of this error
    pub fn code(&self) -> u16 {
        match self {
            Self::Provider { code, .. }
            | Self::Metadata { code, .. }
            | Self::Download { code, .. }
            | Self::Upload { code, .. }
            | Self::Delete { code, .. }
            | Self::FolderCreation { code, .. } => *code,
            Self::NotFound(_) => 404,
            Self::NamingConflict { .. } => 409,
            Self::InvalidPath(_) => 400,
            Self::NotSupported(_) => 405,
            Self::Http(_) => 502,
            Self::Task(_) => 500,
        }
    }

    /// The kind this error was raised as
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Download { .. } => ErrorKind::Download,
            Self::Upload { .. } => ErrorKind::Upload,
            Self::Delete { .. } => ErrorKind::Delete,
            Self::FolderCreation { .. } => ErrorKind::FolderCreation,
            _ => ErrorKind::Provider,
        }
    }

    /// Any error carrying a 404 status
    pub fn is_not_found(&self) -> bool {
        self.code() == 404
    }

    /// The subset of 404s that mean "this path does not exist" to an
    /// existence check: a plain not-found, or a metadata lookup that 404'd.
    pub fn is_missing_node(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Metadata { code: 404, .. })
    }
}

impl From<tokio::task::JoinError> for ProviderError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProviderError::Task(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(err.to_string()),
            _ => ProviderError::provider(500, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ProviderError::NotFound("/a".into()).code(), 404);
        assert_eq!(ProviderError::NamingConflict { path: "/a".into() }.code(), 409);
        assert_eq!(ProviderError::NotSupported("x".into()).code(), 405);
        assert_eq!(ProviderError::provider(503, "busy").code(), 503);
    }

    #[test]
    fn test_from_kind_roundtrips_kind() {
        let err = ProviderError::from_kind(ErrorKind::Delete, 403, "forbidden");
        assert_eq!(err.kind(), ErrorKind::Delete);
        assert_eq!(err.code(), 403);
    }

    #[test]
    fn test_missing_node_is_narrower_than_not_found() {
        let delete_404 = ProviderError::Delete { code: 404, message: "gone".into() };
        assert!(delete_404.is_not_found());
        assert!(!delete_404.is_missing_node());

        let metadata_404 = ProviderError::Metadata { code: 404, message: "gone".into() };
        assert!(metadata_404.is_missing_node());

        let metadata_500 = ProviderError::Metadata { code: 500, message: "boom".into() };
        assert!(!metadata_500.is_missing_node());
    }
}
