//! Error taxonomy for the poll cycle and its collaborators.
//!
//! Collaborator errors (`FetchError`, `CheckpointError`, `AuthError`) stay
//! close to the boundary that produced them; `PollError` is what a cycle
//! reports to its caller.

use thiserror::Error;

use crate::checkpoint::Watermark;

/// Missing or invalid settings. Raised before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("reading config from {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config from {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Bearer-token acquisition failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(String),

    #[error("token endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("received wrong type of token: {0:?}")]
    WrongTokenType(String),

    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Outcome of a single gateway call that did not yield a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network blip, timeout, 5xx or rate limit. Safe to retry.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Malformed query, unexpected 4xx, undecodable body.
    #[error("fetch rejected: {0}")]
    Fatal(String),

    /// Token could not be obtained or was refused.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint backend error: {0}")]
    Backend(String),

    /// Compare-and-set rejected: someone else moved the watermark since it was read.
    #[error("watermark changed since read (expected {expected}, found {found})")]
    Conflict {
        expected: Watermark,
        found: Watermark,
    },
}

/// Fatal error for one poll cycle. No variant stops the scheduler.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("auth: {0}")]
    Auth(String),

    #[error("search request rejected")]
    FetchRejected(#[source] FetchError),

    #[error("search fetch failed after {attempts} attempt(s)")]
    FetchExhausted {
        attempts: u32,
        #[source]
        last: FetchError,
    },

    #[error("reading checkpoint {key:?}")]
    CheckpointRead {
        key: String,
        #[source]
        source: CheckpointError,
    },

    #[error("writing checkpoint {key:?} = {next}")]
    CheckpointWrite {
        key: String,
        next: i64,
        #[source]
        source: CheckpointError,
    },

    #[error("checkpoint {key:?} moved concurrently (expected {expected}, found {found})")]
    CheckpointConflict {
        key: String,
        expected: Watermark,
        found: Watermark,
    },

    #[error("poll cycle cancelled")]
    Cancelled,
}

impl PollError {
    /// Short stable label, used for metrics and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Auth(_) => "auth",
            PollError::FetchRejected(_) => "fetch_rejected",
            PollError::FetchExhausted { .. } => "fetch_exhausted",
            PollError::CheckpointRead { .. } => "checkpoint_read",
            PollError::CheckpointWrite { .. } => "checkpoint_write",
            PollError::CheckpointConflict { .. } => "checkpoint_conflict",
            PollError::Cancelled => "cancelled",
        }
    }
}
