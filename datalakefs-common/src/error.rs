/// Errors surfaced by a `FileSystem` implementation.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// A required identifier (path, URI) was absent or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store reported that the operation could not complete.
    #[error("Store I/O failure during {op} on {path}: {reason}")]
    StoreIo {
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A store client failure passed through unchanged.
    #[error(transparent)]
    Client(#[from] anyhow::Error),
}

impl FsError {
    pub fn store_io(op: &'static str, path: impl Into<String>, reason: impl Into<String>) -> Self {
        FsError::StoreIo {
            op,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_store_io(&self) -> bool {
        matches!(self, FsError::StoreIo { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, FsError::InvalidArgument(_))
    }
}
