//! Store error type.
//!
//! Decode errors abort an attach; write errors abort the enclosing commit.
//! Object-store failures pass through from the client crate with their
//! library code intact.

use crate::sink::SinkState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid storage URI '{0}', expected daos://<pool>/<container>")]
    InvalidUri(String),

    #[error("unknown object class '{0}'")]
    UnknownObjectClass(String),

    /// The anchor record is shorter than its fixed envelope.
    #[error("tuple anchor too short: {0} bytes")]
    TruncatedAnchor(usize),

    #[error("malformed length-prefixed string: {0}")]
    StringDecode(String),

    /// The parent event of a vectored read completed with failed children.
    #[error("vectored read left {residual} requests incomplete")]
    VectoredReadIncomplete { residual: usize },

    /// Sink operation issued outside the lifecycle order.
    #[error("'{operation}' is not allowed in state {state:?}")]
    IllegalState {
        operation: &'static str,
        state: SinkState,
    },

    #[error("page source is not attached")]
    NotAttached,

    #[error("no cluster known for id {0}")]
    ClusterNotFound(u64),

    #[error("no column with id {0}")]
    ColumnNotFound(u64),

    #[error("page {page_no} of column {column_id} missing from cluster {cluster_id}")]
    PageNotFound {
        column_id: u64,
        cluster_id: u64,
        page_no: u64,
    },

    #[error("no page covers entry {entry} of column {column_id}")]
    EntryOutOfRange { column_id: u64, entry: u64 },

    #[error("compression failed: {0}")]
    Compress(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("descriptor encode failed: {0}")]
    DescriptorEncode(String),

    #[error("descriptor decode failed: {0}")]
    DescriptorDecode(String),

    #[error("page buffer of {len} bytes is not a whole number of {element_size}-byte elements")]
    MisalignedPage { len: usize, element_size: usize },

    #[error(transparent)]
    Client(#[from] tessera_daos::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
