//! Error types returned by client operations.
use std::io;

use thiserror::Error;

/// Result type alias using the client [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by the server as a bare status line.
///
/// Each of these is an expected outcome the caller may choose to handle, e.g.
/// `NotFound` after operating on a stale job ID, or `TimedOut` after an empty
/// `reserve-with-timeout` window.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum ServerError {
    /// On the wire: `OUT_OF_MEMORY`.
    #[error("out of memory")]
    OutOfMemory,
    /// On the wire: `INTERNAL_ERROR`.
    #[error("internal error")]
    InternalError,
    /// On the wire: `BAD_FORMAT`.
    #[error("bad format")]
    BadFormat,
    /// On the wire: `UNKNOWN_COMMAND`.
    #[error("unknown command")]
    UnknownCommand,
    /// On the wire: `BURIED`.
    #[error("buried")]
    Buried,
    /// On the wire: `EXPECTED_CRLF`.
    #[error("expected CRLF")]
    ExpectedCrlf,
    /// On the wire: `JOB_TOO_BIG`.
    #[error("job too big")]
    JobTooBig,
    /// On the wire: `DRAINING`.
    #[error("draining")]
    Draining,
    /// A job reserved by this connection is about to exceed its TTR.
    ///
    /// On the wire: `DEADLINE_SOON`.
    #[error("deadline soon")]
    DeadlineSoon,
    /// No job became available within a `reserve-with-timeout` window.
    ///
    /// On the wire: `TIMED_OUT`.
    #[error("timed out")]
    TimedOut,
    /// On the wire: `NOT_FOUND`.
    #[error("not found")]
    NotFound,
}

/// Maps each error status token to its [`ServerError`].
const STATUS_TABLE: [(&[u8], ServerError); 11] = [
    (b"OUT_OF_MEMORY", ServerError::OutOfMemory),
    (b"INTERNAL_ERROR", ServerError::InternalError),
    (b"BAD_FORMAT", ServerError::BadFormat),
    (b"UNKNOWN_COMMAND", ServerError::UnknownCommand),
    (b"BURIED", ServerError::Buried),
    (b"EXPECTED_CRLF", ServerError::ExpectedCrlf),
    (b"JOB_TOO_BIG", ServerError::JobTooBig),
    (b"DRAINING", ServerError::Draining),
    (b"DEADLINE_SOON", ServerError::DeadlineSoon),
    (b"TIMED_OUT", ServerError::TimedOut),
    (b"NOT_FOUND", ServerError::NotFound),
];

impl ServerError {
    /// Looks up a status token in the error table.
    pub fn from_status(token: &[u8]) -> Option<Self> {
        STATUS_TABLE
            .iter()
            .find(|(status, _)| *status == token)
            .map(|(_, err)| *err)
    }

    /// The status token the server sends for this error.
    pub fn status(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::InternalError => "INTERNAL_ERROR",
            Self::BadFormat => "BAD_FORMAT",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::Buried => "BURIED",
            Self::ExpectedCrlf => "EXPECTED_CRLF",
            Self::JobTooBig => "JOB_TOO_BIG",
            Self::Draining => "DRAINING",
            Self::DeadlineSoon => "DEADLINE_SOON",
            Self::TimedOut => "TIMED_OUT",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

/// Unified error type for client operations.
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Transport errors: the connection should be considered dead.
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("write failed after {sent} bytes: {source}")]
    Write {
        sent: usize,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Server-reported errors
    // -------------------------------------------------------------------------
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// A `put` created the job but the server buried it immediately, typically
    /// under memory pressure. The job exists but is not ready.
    #[error("job {id} was buried on insertion")]
    JobBuried { id: u64 },

    /// An `ignore` would have left the watch list empty.
    #[error("not ignored: cannot ignore the only watched tube")]
    NotIgnored,

    /// The server acknowledged `use` with a different tube name.
    #[error("asked to use tube {expected:?} but server is using {actual:?}")]
    UsingMismatch { expected: String, actual: String },

    // -------------------------------------------------------------------------
    // Client-side validation errors, raised before any I/O.
    // -------------------------------------------------------------------------
    #[error("tube name is {len} bytes, longer than the 200 byte limit")]
    TubeNameTooLong { len: usize },

    #[error("invalid tube name: {0:?}")]
    InvalidTubeName(String),

    // -------------------------------------------------------------------------
    // Framing errors: the stream can no longer be trusted.
    // -------------------------------------------------------------------------
    #[error("malformed response: {0:?}")]
    Malformed(String),

    #[error("unrecognised response: {0:?}")]
    Unrecognised(String),

    #[error("job body of {declared} bytes was not terminated by CRLF")]
    BodyFraming { declared: usize },

    // -------------------------------------------------------------------------
    // Payload decoding
    // -------------------------------------------------------------------------
    #[error("YAML decoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// True for the `TIMED_OUT` reply to `reserve-with-timeout`.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::Server(ServerError::TimedOut))
    }

    /// True for a `NOT_FOUND` reply, usually meaning a stale job ID.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server(ServerError::NotFound))
    }

    /// True if the connection can't be used after this error, as the stream
    /// failed or lost its framing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Write { .. }
                | Self::Malformed(_)
                | Self::Unrecognised(_)
                | Self::BodyFraming { .. }
        )
    }
}
