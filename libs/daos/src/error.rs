//! Client error type.
//!
//! Errors originating in the object-store layer surface the library's
//! negative code verbatim; nothing is retried at this level.

use crate::raw::ObjectId;

/// Errors reported by the object-store client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool connect failed for '{label}' (code {code})")]
    PoolConnect { label: String, code: i32 },

    #[error("container open failed for '{label}' (code {code})")]
    ContainerOpen { label: String, code: i32 },

    #[error("object open failed for ({oid:?}) (code {code})")]
    ObjectOpen { oid: ObjectId, code: i32 },

    /// The library refused to create or serve the completion queue.
    #[error("event queue unavailable (code {code})")]
    StorageUnavailable { code: i32 },

    #[error("object store I/O failed (code {code})")]
    Io { code: i32 },
}

impl Error {
    /// The raw library code carried by this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::PoolConnect { code, .. }
            | Error::ContainerOpen { code, .. }
            | Error::ObjectOpen { code, .. }
            | Error::StorageUnavailable { code }
            | Error::Io { code } => *code,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
