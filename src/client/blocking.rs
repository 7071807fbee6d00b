//! Blocking calling convention.
//!
//! Every operation exists twice: the async core on
//! [`StorageClient`](super::StorageClient) and a blocking wrapper here
//! that drives that same future to completion on the calling thread. The
//! caller picks the convention by type; there is no ambient event-loop
//! detection.

use std::collections::HashMap;

use serde_json::Value;
use tokio::runtime::Runtime;

use super::proxy::{StorageClient, StorageHandle};
use crate::error::Result;
use crate::storage::types::{
    Distribution, StudyDirection, StudyId, StudySummary, Trial, TrialId, TrialState,
};

/// Blocking proxy for callers that are not inside an event loop.
///
/// Owns a private current-thread runtime; every method is a thin
/// `block_on` around the async implementation.
pub struct BlockingStorageClient {
    runtime: Runtime,
    inner: StorageClient,
}

impl BlockingStorageClient {
    /// Connect to the coordinator and register the named backend, blocking
    /// until registration completes.
    pub fn connect(
        coordinator: impl Into<String>,
        descriptor: Option<String>,
        name: Option<String>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = runtime.block_on(StorageClient::connect(coordinator, descriptor, name))?;
        Ok(Self { runtime, inner })
    }

    /// Wrap an existing async proxy (e.g. a rehydrated one).
    pub fn from_client(inner: StorageClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, inner })
    }

    /// The storage name this proxy addresses.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The transport form of this proxy.
    pub fn handle(&self) -> StorageHandle {
        self.inner.handle()
    }

    /// Borrow the async core, e.g. to clone it into a task.
    pub fn client(&self) -> &StorageClient {
        &self.inner
    }

    /// See [`StorageClient::create_new_study`].
    pub fn create_new_study(&self, study_name: Option<&str>) -> Result<StudyId> {
        self.runtime.block_on(self.inner.create_new_study(study_name))
    }

    /// See [`StorageClient::delete_study`].
    pub fn delete_study(&self, study_id: StudyId) -> Result<()> {
        self.runtime.block_on(self.inner.delete_study(study_id))
    }

    /// See [`StorageClient::set_study_user_attr`].
    pub fn set_study_user_attr(&self, study_id: StudyId, key: &str, value: Value) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_study_user_attr(study_id, key, value))
    }

    /// See [`StorageClient::set_study_system_attr`].
    pub fn set_study_system_attr(&self, study_id: StudyId, key: &str, value: Value) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_study_system_attr(study_id, key, value))
    }

    /// See [`StorageClient::set_study_direction`].
    pub fn set_study_direction(
        &self,
        study_id: StudyId,
        direction: StudyDirection,
    ) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_study_direction(study_id, direction))
    }

    /// See [`StorageClient::get_study_id_from_name`].
    pub fn get_study_id_from_name(&self, study_name: &str) -> Result<StudyId> {
        self.runtime
            .block_on(self.inner.get_study_id_from_name(study_name))
    }

    /// See [`StorageClient::get_study_id_from_trial_id`].
    pub fn get_study_id_from_trial_id(&self, trial_id: TrialId) -> Result<StudyId> {
        self.runtime
            .block_on(self.inner.get_study_id_from_trial_id(trial_id))
    }

    /// See [`StorageClient::get_study_name_from_id`].
    pub fn get_study_name_from_id(&self, study_id: StudyId) -> Result<String> {
        self.runtime
            .block_on(self.inner.get_study_name_from_id(study_id))
    }

    /// See [`StorageClient::get_study_direction`].
    pub fn get_study_direction(&self, study_id: StudyId) -> Result<StudyDirection> {
        self.runtime
            .block_on(self.inner.get_study_direction(study_id))
    }

    /// See [`StorageClient::get_study_user_attrs`].
    pub fn get_study_user_attrs(&self, study_id: StudyId) -> Result<HashMap<String, Value>> {
        self.runtime
            .block_on(self.inner.get_study_user_attrs(study_id))
    }

    /// See [`StorageClient::get_study_system_attrs`].
    pub fn get_study_system_attrs(&self, study_id: StudyId) -> Result<HashMap<String, Value>> {
        self.runtime
            .block_on(self.inner.get_study_system_attrs(study_id))
    }

    /// See [`StorageClient::get_all_study_summaries`].
    pub fn get_all_study_summaries(&self) -> Result<Vec<StudySummary>> {
        self.runtime.block_on(self.inner.get_all_study_summaries())
    }

    /// See [`StorageClient::create_new_trial`].
    pub fn create_new_trial(
        &self,
        study_id: StudyId,
        template: Option<&Trial>,
    ) -> Result<TrialId> {
        self.runtime
            .block_on(self.inner.create_new_trial(study_id, template))
    }

    /// See [`StorageClient::set_trial_state`].
    pub fn set_trial_state(&self, trial_id: TrialId, state: TrialState) -> Result<bool> {
        self.runtime
            .block_on(self.inner.set_trial_state(trial_id, state))
    }

    /// See [`StorageClient::set_trial_param`].
    pub fn set_trial_param(
        &self,
        trial_id: TrialId,
        param_name: &str,
        param_value_internal: f64,
        distribution: &Distribution,
    ) -> Result<()> {
        self.runtime.block_on(self.inner.set_trial_param(
            trial_id,
            param_name,
            param_value_internal,
            distribution,
        ))
    }

    /// See [`StorageClient::get_trial_number_from_id`].
    pub fn get_trial_number_from_id(&self, trial_id: TrialId) -> Result<u64> {
        self.runtime
            .block_on(self.inner.get_trial_number_from_id(trial_id))
    }

    /// See [`StorageClient::get_trial_param`].
    pub fn get_trial_param(&self, trial_id: TrialId, param_name: &str) -> Result<f64> {
        self.runtime
            .block_on(self.inner.get_trial_param(trial_id, param_name))
    }

    /// See [`StorageClient::set_trial_value`].
    pub fn set_trial_value(&self, trial_id: TrialId, value: f64) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_trial_value(trial_id, value))
    }

    /// See [`StorageClient::set_trial_intermediate_value`].
    pub fn set_trial_intermediate_value(
        &self,
        trial_id: TrialId,
        step: u64,
        intermediate_value: f64,
    ) -> Result<()> {
        self.runtime.block_on(self.inner.set_trial_intermediate_value(
            trial_id,
            step,
            intermediate_value,
        ))
    }

    /// See [`StorageClient::set_trial_user_attr`].
    pub fn set_trial_user_attr(&self, trial_id: TrialId, key: &str, value: Value) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_trial_user_attr(trial_id, key, value))
    }

    /// See [`StorageClient::set_trial_system_attr`].
    pub fn set_trial_system_attr(&self, trial_id: TrialId, key: &str, value: Value) -> Result<()> {
        self.runtime
            .block_on(self.inner.set_trial_system_attr(trial_id, key, value))
    }

    /// See [`StorageClient::get_trial`].
    pub fn get_trial(&self, trial_id: TrialId) -> Result<Trial> {
        self.runtime.block_on(self.inner.get_trial(trial_id))
    }

    /// See [`StorageClient::get_all_trials`].
    pub fn get_all_trials(&self, study_id: StudyId) -> Result<Vec<Trial>> {
        self.runtime.block_on(self.inner.get_all_trials(study_id))
    }

    /// See [`StorageClient::get_n_trials`].
    pub fn get_n_trials(&self, study_id: StudyId, state: Option<TrialState>) -> Result<usize> {
        self.runtime
            .block_on(self.inner.get_n_trials(study_id, state))
    }

    /// See [`StorageClient::read_trials_from_remote_storage`].
    pub fn read_trials_from_remote_storage(&self, study_id: StudyId) -> Result<()> {
        self.runtime
            .block_on(self.inner.read_trials_from_remote_storage(study_id))
    }
}
