//! Error taxonomy.
//!
//! Three layers, matching where an error can originate:
//!
//! - [`StorageError`]: conditions raised by a backend (or by the registry
//!   lookup). Serializable, because the coordinator returns them verbatim
//!   and the client re-raises the identical condition, so calling code can
//!   branch on "doesn't exist" vs "exists but can't be changed" across the
//!   remote boundary.
//! - [`DecodeError`]: a wire value did not match the expected shape. A
//!   local bug, never retried.
//! - [`Error`]: everything a proxy call can fail with.

use serde::{Deserialize, Serialize};

use crate::storage::types::{StudyDirection, StudyId, TrialId, TrialState};

/// Condition raised by a storage backend or the registry.
///
/// Crosses the wire as a tagged JSON object so the client can reconstruct
/// the exact variant, offending ids included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageError {
    /// Returned when no backend was registered under the given name.
    #[error("no storage registered under name {name:?}")]
    StorageNotRegistered {
        /// The unknown storage name.
        name: String,
    },

    /// Returned when no study with the given name exists.
    #[error("no study named {study_name:?}")]
    StudyNameNotFound {
        /// The unknown study name.
        study_name: String,
    },

    /// Returned when no study with the given id exists.
    #[error("no study with id {study_id}")]
    StudyNotFound {
        /// The unknown study id.
        study_id: StudyId,
    },

    /// Returned when no trial with the given id exists.
    #[error("no trial with id {trial_id}")]
    TrialNotFound {
        /// The unknown trial id.
        trial_id: TrialId,
    },

    /// Returned when a trial has no parameter with the given name.
    #[error("trial {trial_id} has no parameter {param_name:?}")]
    ParamNotFound {
        /// The trial that was queried.
        trial_id: TrialId,
        /// The missing parameter name.
        param_name: String,
    },

    /// Returned when creating a study under a name that is already taken.
    #[error("a study named {study_name:?} already exists")]
    DuplicateStudyName {
        /// The conflicting study name.
        study_name: String,
    },

    /// Returned when mutating a trial that already reached a finished state.
    #[error("trial {trial_id} is already finished ({state})")]
    TrialAlreadyFinished {
        /// The trial that was mutated.
        trial_id: TrialId,
        /// Its terminal state.
        state: TrialState,
    },

    /// Returned when setting a direction that conflicts with one already set.
    #[error("study {study_id} direction is already {current}, cannot set {requested}")]
    DirectionConflict {
        /// The study whose direction was set.
        study_id: StudyId,
        /// The direction already recorded.
        current: StudyDirection,
        /// The rejected direction.
        requested: StudyDirection,
    },

    /// Returned when a backend descriptor is not understood.
    #[error("unsupported backend descriptor {descriptor:?}")]
    UnsupportedBackend {
        /// The descriptor as received.
        descriptor: String,
    },
}

/// A wire value did not match the shape expected for its declared type.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The value had the wrong JSON shape.
    #[error("expected {expected}, got {got}")]
    Mismatch {
        /// What the decoder was looking for.
        expected: &'static str,
        /// Short rendering of what it found.
        got: String,
    },

    /// A required field was absent from an encoded record.
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    /// A tagged timestamp did not parse with the fixed format.
    #[error("invalid timestamp {text:?}: {source}")]
    Timestamp {
        /// The formatted string as received.
        text: String,
        /// The underlying parse failure.
        source: chrono::format::ParseError,
    },

    /// An unknown trial state name.
    #[error("unknown trial state {0:?}")]
    UnknownState(String),

    /// An unknown study direction name.
    #[error("unknown study direction {0:?}")]
    UnknownDirection(String),

    /// An unknown distribution tag.
    #[error("unknown distribution kind {0:?}")]
    UnknownDistribution(String),
}

/// Everything a proxy call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend condition, re-raised with its identity intact.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A result payload did not decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The coordinator could not decode one of our arguments.
    #[error("coordinator rejected request: {0}")]
    Rejected(String),

    /// The coordinator answered outside the RPC protocol.
    #[error("coordinator returned status {status}: {body}")]
    Rpc {
        /// HTTP status of the response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The blocking wrapper could not start its runtime.
    #[error("failed to start client runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Convenience alias for proxy-facing results.
pub type Result<T> = std::result::Result<T, Error>;
