//! Coordinator RPC protocol.
//!
//! Defines the endpoints and Data Transfer Objects exchanged between the
//! client proxy and the coordinator. These structures are serialized as
//! JSON and sent over HTTP.
//!
//! The operation set is a closed, internally tagged enum: the variant tags
//! are the stable wire names of the operations, and the exhaustive `match`
//! in the registry's dispatch guarantees every operation has a handler at
//! compile time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::storage::types::{StudyId, TrialId};

// --- API Endpoints ---

/// Endpoint for registering a named backend (idempotent).
pub const ENDPOINT_REGISTER: &str = "/storage/register";
/// Endpoint for all storage operations.
pub const ENDPOINT_RPC: &str = "/storage/rpc";

// --- Data Transfer Objects ---

/// Payload for the registration protocol.
///
/// Safe to send from many workers racing to create the same named store:
/// the first registrant's backend wins and later descriptors are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Name the backend lives under on the coordinator.
    pub name: String,
    /// Backend descriptor, e.g. `memory`. Absent means "default backend",
    /// always safe when the name is already registered.
    pub descriptor: Option<String>,
}

/// Outcome of a registration request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// `Ok(true)` if a backend was created, `Ok(false)` if the name was
    /// already registered and the existing backend is reused.
    pub result: Result<bool, StorageError>,
}

/// One storage operation addressed to a named backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Which registered backend the operation targets.
    pub storage_name: String,
    /// The operation itself.
    #[serde(flatten)]
    pub op: StorageOp,
}

/// The full remote-callable operation set, one variant per backend
/// operation.
///
/// Rich arguments (trials, distributions, states, directions) travel
/// pre-encoded by the wire codec as [`Value`] trees; primitives travel
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StorageOp {
    CreateNewStudy {
        study_name: Option<String>,
    },
    DeleteStudy {
        study_id: StudyId,
    },
    SetStudyUserAttr {
        study_id: StudyId,
        key: String,
        value: Value,
    },
    SetStudySystemAttr {
        study_id: StudyId,
        key: String,
        value: Value,
    },
    SetStudyDirection {
        study_id: StudyId,
        /// Codec-encoded direction name.
        direction: Value,
    },
    GetStudyIdFromName {
        study_name: String,
    },
    GetStudyIdFromTrialId {
        trial_id: TrialId,
    },
    GetStudyNameFromId {
        study_id: StudyId,
    },
    GetStudyDirection {
        study_id: StudyId,
    },
    GetStudyUserAttrs {
        study_id: StudyId,
    },
    GetStudySystemAttrs {
        study_id: StudyId,
    },
    GetAllStudySummaries,
    CreateNewTrial {
        study_id: StudyId,
        /// Codec-encoded template trial, or `null`.
        template_trial: Value,
    },
    SetTrialState {
        trial_id: TrialId,
        /// Codec-encoded state name.
        state: Value,
    },
    SetTrialParam {
        trial_id: TrialId,
        param_name: String,
        param_value_internal: f64,
        /// Codec-encoded distribution.
        distribution: Value,
    },
    GetTrialNumberFromId {
        trial_id: TrialId,
    },
    GetTrialParam {
        trial_id: TrialId,
        param_name: String,
    },
    SetTrialValue {
        trial_id: TrialId,
        value: f64,
    },
    SetTrialIntermediateValue {
        trial_id: TrialId,
        step: u64,
        intermediate_value: f64,
    },
    SetTrialUserAttr {
        trial_id: TrialId,
        key: String,
        value: Value,
    },
    SetTrialSystemAttr {
        trial_id: TrialId,
        key: String,
        value: Value,
    },
    GetTrial {
        trial_id: TrialId,
    },
    GetAllTrials {
        study_id: StudyId,
    },
    GetNTrials {
        study_id: StudyId,
        /// Codec-encoded state filter, or `null` for all states.
        state: Value,
    },
    ReadTrialsFromRemoteStorage {
        study_id: StudyId,
    },
}

/// Why an RPC did not produce a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum RpcFailure {
    /// The backend (or the registry lookup) raised a condition. Returned
    /// verbatim so the client re-raises the identical error.
    Storage {
        /// The original condition.
        error: StorageError,
    },
    /// An argument did not decode on the coordinator side. A caller bug,
    /// not a storage condition.
    BadArgument {
        /// Human-readable decode failure.
        message: String,
    },
}

/// Result of one storage operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Codec-encoded result value on success.
    pub result: Result<Value, RpcFailure>,
}
