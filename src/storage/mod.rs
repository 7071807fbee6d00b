//! Storage backends.
//!
//! The [`StorageBackend`] trait is the canonical operation set every
//! backend implements. One instance lives per registered name, owned
//! exclusively by the coordinator's registry; workers only ever reach it
//! through the RPC proxy.
//!
//! ## Available backends
//!
//! | Backend | Descriptor | Description |
//! |---------|------------|-------------|
//! | [`MemoryBackend`] | *(absent)*, `memory`, `memory://…` | In-memory store behind a read-write lock (the default) |
//!
//! Any other descriptor fails with
//! [`StorageError::UnsupportedBackend`](crate::error::StorageError::UnsupportedBackend).

pub mod memory;
pub mod types;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

pub use memory::MemoryBackend;
use serde_json::Value;

use crate::error::StorageError;
use types::{Distribution, StudyDirection, StudyId, StudySummary, Trial, TrialId, TrialState};

/// The canonical backend operation set.
///
/// Implementations must be `Send + Sync`: a backend is shared behind an
/// `Arc` and called from the coordinator's handlers. All methods are
/// synchronous; serialization of calls against one name is the
/// coordinator's job, not the backend's.
pub trait StorageBackend: std::fmt::Debug + Send + Sync {
    /// Create a study, generating a unique name when none is given.
    fn create_new_study(&self, study_name: Option<&str>) -> Result<StudyId, StorageError>;

    /// Delete a study and all of its trials.
    fn delete_study(&self, study_id: StudyId) -> Result<(), StorageError>;

    /// Set a caller-defined study attribute, overwriting any existing value.
    fn set_study_user_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError>;

    /// Set an internal study attribute, overwriting any existing value.
    fn set_study_system_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError>;

    /// Set the optimization direction.
    ///
    /// Re-setting the direction already recorded is a no-op; any other
    /// change after the direction was decided is a
    /// [`StorageError::DirectionConflict`].
    fn set_study_direction(
        &self,
        study_id: StudyId,
        direction: StudyDirection,
    ) -> Result<(), StorageError>;

    /// Look up a study id by name.
    fn get_study_id_from_name(&self, study_name: &str) -> Result<StudyId, StorageError>;

    /// Look up the study a trial belongs to.
    fn get_study_id_from_trial_id(&self, trial_id: TrialId) -> Result<StudyId, StorageError>;

    /// Look up a study name by id.
    fn get_study_name_from_id(&self, study_id: StudyId) -> Result<String, StorageError>;

    /// Read the optimization direction.
    fn get_study_direction(&self, study_id: StudyId) -> Result<StudyDirection, StorageError>;

    /// Read all caller-defined study attributes.
    fn get_study_user_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>, StorageError>;

    /// Read all internal study attributes.
    fn get_study_system_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>, StorageError>;

    /// Snapshot every study. Recomputed on each call.
    fn get_all_study_summaries(&self) -> Result<Vec<StudySummary>, StorageError>;

    /// Create a trial, optionally from a template carrying preset state,
    /// parameters and attributes. Ids are unique and monotonic across the
    /// backend; numbers are sequential within the study, starting at 0.
    fn create_new_trial(
        &self,
        study_id: StudyId,
        template: Option<Trial>,
    ) -> Result<TrialId, StorageError>;

    /// Update a trial's state.
    ///
    /// Returns `true` if the state changed and `false` for the tolerated
    /// `Running` -> `Running` repeat. Fails with
    /// [`StorageError::TrialAlreadyFinished`] once the trial is finished.
    fn set_trial_state(&self, trial_id: TrialId, state: TrialState) -> Result<bool, StorageError>;

    /// Record a sampled parameter and its distribution.
    fn set_trial_param(
        &self,
        trial_id: TrialId,
        param_name: &str,
        param_value_internal: f64,
        distribution: Distribution,
    ) -> Result<(), StorageError>;

    /// Read a trial's study-sequential number.
    fn get_trial_number_from_id(&self, trial_id: TrialId) -> Result<u64, StorageError>;

    /// Read the internal representation of one parameter.
    fn get_trial_param(&self, trial_id: TrialId, param_name: &str) -> Result<f64, StorageError>;

    /// Record the objective value, overwriting any existing one.
    fn set_trial_value(&self, trial_id: TrialId, value: f64) -> Result<(), StorageError>;

    /// Record an intermediate value at a step, overwriting any existing one.
    fn set_trial_intermediate_value(
        &self,
        trial_id: TrialId,
        step: u64,
        intermediate_value: f64,
    ) -> Result<(), StorageError>;

    /// Set a caller-defined trial attribute, overwriting any existing value.
    fn set_trial_user_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError>;

    /// Set an internal trial attribute, overwriting any existing value.
    fn set_trial_system_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError>;

    /// Read one trial.
    fn get_trial(&self, trial_id: TrialId) -> Result<Trial, StorageError>;

    /// Read all trials of a study, ordered by number.
    fn get_all_trials(&self, study_id: StudyId) -> Result<Vec<Trial>, StorageError>;

    /// Count a study's trials, optionally filtered by state.
    fn get_n_trials(
        &self,
        study_id: StudyId,
        state: Option<TrialState>,
    ) -> Result<usize, StorageError>;

    /// Bring any internal trial cache up to date.
    ///
    /// Backends without an external data source validate the study and do
    /// nothing else.
    fn read_trials_from_remote_storage(&self, study_id: StudyId) -> Result<(), StorageError>;
}

/// Instantiate a backend from a descriptor.
///
/// An absent descriptor, `memory` or a `memory://` connection string all
/// yield a fresh [`MemoryBackend`].
pub fn open_backend(descriptor: Option<&str>) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match descriptor {
        None => Ok(Arc::new(MemoryBackend::new())),
        Some(d) if d == "memory" || d.starts_with("memory://") => {
            Ok(Arc::new(MemoryBackend::new()))
        }
        Some(other) => Err(StorageError::UnsupportedBackend {
            descriptor: other.to_string(),
        }),
    }
}
