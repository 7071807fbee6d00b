//! Named backend registry.
//!
//! The single authoritative place where backends live. One instance is
//! created when the coordinator starts and lives for its lifetime; entries
//! are only ever added, never removed, so every worker addressing a name
//! observes the same backend.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::protocol::{RpcFailure, RpcRequest, StorageOp};
use crate::error::{DecodeError, StorageError};
use crate::storage::{open_backend, StorageBackend};
use crate::wire;

/// Registry mapping a storage name to its backend instance.
pub struct StorageRegistry {
    backends: DashMap<String, Arc<dyn StorageBackend>>,
}

impl StorageRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            backends: DashMap::new(),
        })
    }

    /// Register a backend under `name`, idempotently.
    ///
    /// The first registration instantiates a backend from `descriptor`;
    /// later registrations (racing workers included) are silent no-ops
    /// that keep the existing backend and ignore the descriptor. Returns
    /// whether a backend was created.
    pub fn register(&self, name: &str, descriptor: Option<&str>) -> Result<bool, StorageError> {
        match self.backends.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(open_backend(descriptor)?);
                tracing::info!("Registered storage {:?} ({})", name, descriptor.unwrap_or("memory"));
                Ok(true)
            }
        }
    }

    /// Read-only accessor for the concrete backend living under `name`.
    ///
    /// Meant for diagnostics and tests on the coordinator side. Mutating
    /// through it from anywhere else bypasses the single-authority
    /// guarantee.
    pub fn backend(&self, name: &str) -> Result<Arc<dyn StorageBackend>, StorageError> {
        self.backends
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::StorageNotRegistered {
                name: name.to_string(),
            })
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Execute one operation against the named backend.
    ///
    /// The shape is the same for every operation: resolve the backend,
    /// decode any codec-encoded arguments, invoke the local operation,
    /// encode the result. Backend conditions pass through verbatim.
    pub fn dispatch(&self, request: &RpcRequest) -> Result<Value, RpcFailure> {
        let backend = self.backend(&request.storage_name).map_err(storage)?;
        match &request.op {
            StorageOp::CreateNewStudy { study_name } => backend
                .create_new_study(study_name.as_deref())
                .map(Value::from)
                .map_err(storage),
            StorageOp::DeleteStudy { study_id } => backend
                .delete_study(*study_id)
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetStudyUserAttr {
                study_id,
                key,
                value,
            } => backend
                .set_study_user_attr(*study_id, key, value.clone())
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetStudySystemAttr {
                study_id,
                key,
                value,
            } => backend
                .set_study_system_attr(*study_id, key, value.clone())
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetStudyDirection {
                study_id,
                direction,
            } => {
                let direction = wire::decode_direction(direction).map_err(bad_argument)?;
                backend
                    .set_study_direction(*study_id, direction)
                    .map(|()| Value::Null)
                    .map_err(storage)
            }
            StorageOp::GetStudyIdFromName { study_name } => backend
                .get_study_id_from_name(study_name)
                .map(Value::from)
                .map_err(storage),
            StorageOp::GetStudyIdFromTrialId { trial_id } => backend
                .get_study_id_from_trial_id(*trial_id)
                .map(Value::from)
                .map_err(storage),
            StorageOp::GetStudyNameFromId { study_id } => backend
                .get_study_name_from_id(*study_id)
                .map(Value::from)
                .map_err(storage),
            StorageOp::GetStudyDirection { study_id } => backend
                .get_study_direction(*study_id)
                .map(wire::encode_direction)
                .map_err(storage),
            StorageOp::GetStudyUserAttrs { study_id } => backend
                .get_study_user_attrs(*study_id)
                .map(|attrs| wire::encode_attrs(&attrs))
                .map_err(storage),
            StorageOp::GetStudySystemAttrs { study_id } => backend
                .get_study_system_attrs(*study_id)
                .map(|attrs| wire::encode_attrs(&attrs))
                .map_err(storage),
            StorageOp::GetAllStudySummaries => backend
                .get_all_study_summaries()
                .map(|summaries| {
                    Value::Array(summaries.iter().map(wire::encode_summary).collect())
                })
                .map_err(storage),
            StorageOp::CreateNewTrial {
                study_id,
                template_trial,
            } => {
                let template = match template_trial {
                    Value::Null => None,
                    encoded => Some(wire::decode_trial(encoded).map_err(bad_argument)?),
                };
                backend
                    .create_new_trial(*study_id, template)
                    .map(Value::from)
                    .map_err(storage)
            }
            StorageOp::SetTrialState { trial_id, state } => {
                let state = wire::decode_state(state).map_err(bad_argument)?;
                backend
                    .set_trial_state(*trial_id, state)
                    .map(Value::from)
                    .map_err(storage)
            }
            StorageOp::SetTrialParam {
                trial_id,
                param_name,
                param_value_internal,
                distribution,
            } => {
                let distribution = wire::decode_distribution(distribution).map_err(bad_argument)?;
                backend
                    .set_trial_param(*trial_id, param_name, *param_value_internal, distribution)
                    .map(|()| Value::Null)
                    .map_err(storage)
            }
            StorageOp::GetTrialNumberFromId { trial_id } => backend
                .get_trial_number_from_id(*trial_id)
                .map(Value::from)
                .map_err(storage),
            StorageOp::GetTrialParam {
                trial_id,
                param_name,
            } => backend
                .get_trial_param(*trial_id, param_name)
                .map(Value::from)
                .map_err(storage),
            StorageOp::SetTrialValue { trial_id, value } => backend
                .set_trial_value(*trial_id, *value)
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetTrialIntermediateValue {
                trial_id,
                step,
                intermediate_value,
            } => backend
                .set_trial_intermediate_value(*trial_id, *step, *intermediate_value)
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetTrialUserAttr {
                trial_id,
                key,
                value,
            } => backend
                .set_trial_user_attr(*trial_id, key, value.clone())
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::SetTrialSystemAttr {
                trial_id,
                key,
                value,
            } => backend
                .set_trial_system_attr(*trial_id, key, value.clone())
                .map(|()| Value::Null)
                .map_err(storage),
            StorageOp::GetTrial { trial_id } => backend
                .get_trial(*trial_id)
                .map(|trial| wire::encode_trial(&trial))
                .map_err(storage),
            StorageOp::GetAllTrials { study_id } => backend
                .get_all_trials(*study_id)
                .map(|trials| Value::Array(trials.iter().map(wire::encode_trial).collect()))
                .map_err(storage),
            StorageOp::GetNTrials { study_id, state } => {
                let state = match state {
                    Value::Null => None,
                    encoded => Some(wire::decode_state(encoded).map_err(bad_argument)?),
                };
                backend
                    .get_n_trials(*study_id, state)
                    .map(|n| Value::from(n as u64))
                    .map_err(storage)
            }
            StorageOp::ReadTrialsFromRemoteStorage { study_id } => backend
                .read_trials_from_remote_storage(*study_id)
                .map(|()| Value::Null)
                .map_err(storage),
        }
    }
}

fn storage(error: StorageError) -> RpcFailure {
    RpcFailure::Storage { error }
}

fn bad_argument(error: DecodeError) -> RpcFailure {
    RpcFailure::BadArgument {
        message: error.to_string(),
    }
}
