//! Error taxonomy shared by every engine layer.

use std::fmt;

use thiserror::Error;

/// Allocatable resource tracked by a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Blocks,
    Inodes,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks => f.write_str("data blocks"),
            Self::Inodes => f.write_str("inodes"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no free {0} left")]
    CapacityExhausted(Resource),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid name {0:?}: {1}")]
    InvalidName(String, &'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("{0} is open and cannot be modified")]
    ResourceBusy(String),
    #[error("corrupt disk image: {0}")]
    Corrupt(String),
    #[error("medium failure: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let err = FsError::CapacityExhausted(Resource::Inodes);
        assert_eq!(err.to_string(), "no free inodes left");

        let err = FsError::InvalidName(String::new(), "name is empty");
        assert_eq!(err.to_string(), "invalid name \"\": name is empty");

        let err = FsError::ResourceBusy("/a/b".to_string());
        assert!(err.to_string().starts_with("/a/b"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::other("boom");
        let err: FsError = io.into();
        assert!(matches!(err, FsError::Io(_)));
    }
}
