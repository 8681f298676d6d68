use thiserror::Error;

/// Error taxonomy for the core operation surface.
///
/// Every variant carries enough structure for the HTTP layer to pick a status
/// code from `kind()` and render `self` as the human-readable reason, without
/// parsing message strings.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("already a member of this group")]
    AlreadyMember,

    #[error("unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("file content does not match declared type {declared}")]
    ContentMismatch { declared: String },

    #[error("batch has {count} files, limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }

    /// Stable machine-readable name for each variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::AlreadyMember => "already_member",
            Error::UnsupportedType(_) => "unsupported_type",
            Error::TooLarge { .. } => "too_large",
            Error::ContentMismatch { .. } => "content_mismatch",
            Error::TooManyFiles { .. } => "too_many_files",
            Error::StorageWrite(_) => "storage_write_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
