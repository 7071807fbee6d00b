//! Asynchronous storage proxy.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::coordinator::protocol::{
    RegisterRequest, RegisterResponse, RpcFailure, RpcRequest, RpcResponse, StorageOp,
    ENDPOINT_REGISTER, ENDPOINT_RPC,
};
use crate::error::{Error, Result};
use crate::storage::types::{
    Distribution, StudyDirection, StudyId, StudySummary, Trial, TrialId, TrialState,
};
use crate::wire;

/// Minimal transport form of a proxy: the name and where the coordinator
/// lives. This is all that survives serialization, never the live
/// connection, never the descriptor. A rehydrated proxy re-registers with
/// an empty descriptor, which is a safe no-op because the backend already
/// exists under that name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHandle {
    /// Name the backend is registered under.
    pub name: String,
    /// Base URL of the coordinator, e.g. `http://127.0.0.1:6000`.
    pub coordinator: String,
}

/// Client-held proxy that makes a coordinator-resident backend look local.
///
/// Every operation is "encode arguments, call the coordinator, decode the
/// result". Methods are async; callers outside an event loop use
/// [`BlockingStorageClient`](super::BlockingStorageClient), which drives
/// the same implementation to completion on the calling thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StorageHandle", into = "StorageHandle")]
pub struct StorageClient {
    name: String,
    coordinator: String,
    descriptor: Option<String>,
    http: reqwest::Client,
    registered: Arc<OnceCell<()>>,
}

impl From<StorageClient> for StorageHandle {
    fn from(client: StorageClient) -> Self {
        Self {
            name: client.name,
            coordinator: client.coordinator,
        }
    }
}

impl From<StorageHandle> for StorageClient {
    fn from(handle: StorageHandle) -> Self {
        Self {
            name: handle.name,
            coordinator: handle.coordinator,
            descriptor: None,
            http: reqwest::Client::new(),
            registered: Arc::new(OnceCell::new()),
        }
    }
}

impl StorageClient {
    /// Connect to the coordinator and register the named backend.
    ///
    /// A missing `name` gets a generated unique one; a missing
    /// `descriptor` means the default in-memory backend (or whatever
    /// already lives under `name`).
    pub async fn connect(
        coordinator: impl Into<String>,
        descriptor: Option<String>,
        name: Option<String>,
    ) -> Result<Self> {
        let client = Self {
            name: name.unwrap_or_else(generate_name),
            coordinator: coordinator.into().trim_end_matches('/').to_string(),
            descriptor,
            http: reqwest::Client::new(),
            registered: Arc::new(OnceCell::new()),
        };
        client.ensure_registered().await?;
        Ok(client)
    }

    /// The storage name this proxy addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the coordinator.
    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    /// The transport form of this proxy.
    pub fn handle(&self) -> StorageHandle {
        StorageHandle {
            name: self.name.clone(),
            coordinator: self.coordinator.clone(),
        }
    }

    /// Run the registration protocol at most once per proxy instance.
    async fn ensure_registered(&self) -> Result<()> {
        self.registered
            .get_or_try_init(|| async {
                let url = format!("{}{}", self.coordinator, ENDPOINT_REGISTER);
                let response = self
                    .http
                    .post(url)
                    .json(&RegisterRequest {
                        name: self.name.clone(),
                        descriptor: self.descriptor.clone(),
                    })
                    .send()
                    .await?;
                let body: RegisterResponse = read_body(response).await?;
                body.result.map(|_| ()).map_err(Error::from)
            })
            .await
            .map(|_| ())
    }

    /// Issue one operation and return its encoded result.
    async fn call(&self, op: StorageOp) -> Result<Value> {
        self.ensure_registered().await?;
        let url = format!("{}{}", self.coordinator, ENDPOINT_RPC);
        let response = self
            .http
            .post(url)
            .json(&RpcRequest {
                storage_name: self.name.clone(),
                op,
            })
            .send()
            .await?;
        let body: RpcResponse = read_body(response).await?;
        match body.result {
            Ok(value) => Ok(value),
            Err(RpcFailure::Storage { error }) => Err(Error::Storage(error)),
            Err(RpcFailure::BadArgument { message }) => Err(Error::Rejected(message)),
        }
    }

    // --- study operations ---

    /// Create a study, generating a unique name when none is given.
    pub async fn create_new_study(&self, study_name: Option<&str>) -> Result<StudyId> {
        let value = self
            .call(StorageOp::CreateNewStudy {
                study_name: study_name.map(str::to_string),
            })
            .await?;
        Ok(wire::expect_u64(&value)?)
    }

    /// Delete a study and all of its trials.
    pub async fn delete_study(&self, study_id: StudyId) -> Result<()> {
        let value = self.call(StorageOp::DeleteStudy { study_id }).await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Set a caller-defined study attribute.
    pub async fn set_study_user_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetStudyUserAttr {
                study_id,
                key: key.to_string(),
                value,
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Set an internal study attribute.
    pub async fn set_study_system_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetStudySystemAttr {
                study_id,
                key: key.to_string(),
                value,
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Set the optimization direction.
    pub async fn set_study_direction(
        &self,
        study_id: StudyId,
        direction: StudyDirection,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetStudyDirection {
                study_id,
                direction: wire::encode_direction(direction),
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Look up a study id by name.
    pub async fn get_study_id_from_name(&self, study_name: &str) -> Result<StudyId> {
        let value = self
            .call(StorageOp::GetStudyIdFromName {
                study_name: study_name.to_string(),
            })
            .await?;
        Ok(wire::expect_u64(&value)?)
    }

    /// Look up the study a trial belongs to.
    pub async fn get_study_id_from_trial_id(&self, trial_id: TrialId) -> Result<StudyId> {
        let value = self
            .call(StorageOp::GetStudyIdFromTrialId { trial_id })
            .await?;
        Ok(wire::expect_u64(&value)?)
    }

    /// Look up a study name by id.
    pub async fn get_study_name_from_id(&self, study_id: StudyId) -> Result<String> {
        let value = self.call(StorageOp::GetStudyNameFromId { study_id }).await?;
        Ok(wire::expect_str(&value)?.to_string())
    }

    /// Read the optimization direction.
    pub async fn get_study_direction(&self, study_id: StudyId) -> Result<StudyDirection> {
        let value = self.call(StorageOp::GetStudyDirection { study_id }).await?;
        Ok(wire::decode_direction(&value)?)
    }

    /// Read all caller-defined study attributes.
    pub async fn get_study_user_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>> {
        let value = self.call(StorageOp::GetStudyUserAttrs { study_id }).await?;
        Ok(wire::decode_attrs(&value)?)
    }

    /// Read all internal study attributes.
    pub async fn get_study_system_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>> {
        let value = self
            .call(StorageOp::GetStudySystemAttrs { study_id })
            .await?;
        Ok(wire::decode_attrs(&value)?)
    }

    /// Snapshot every study living under this storage name.
    pub async fn get_all_study_summaries(&self) -> Result<Vec<StudySummary>> {
        let value = self.call(StorageOp::GetAllStudySummaries).await?;
        let mut summaries = Vec::new();
        for encoded in wire::expect_array(&value)? {
            summaries.push(wire::decode_summary(encoded)?);
        }
        Ok(summaries)
    }

    // --- trial operations ---

    /// Create a trial, optionally from a template.
    pub async fn create_new_trial(
        &self,
        study_id: StudyId,
        template: Option<&Trial>,
    ) -> Result<TrialId> {
        let value = self
            .call(StorageOp::CreateNewTrial {
                study_id,
                template_trial: template.map(wire::encode_trial).unwrap_or(Value::Null),
            })
            .await?;
        Ok(wire::expect_u64(&value)?)
    }

    /// Update a trial's state. Returns whether the state actually changed.
    pub async fn set_trial_state(&self, trial_id: TrialId, state: TrialState) -> Result<bool> {
        let value = self
            .call(StorageOp::SetTrialState {
                trial_id,
                state: wire::encode_state(state),
            })
            .await?;
        Ok(wire::expect_bool(&value)?)
    }

    /// Record a sampled parameter and its distribution.
    pub async fn set_trial_param(
        &self,
        trial_id: TrialId,
        param_name: &str,
        param_value_internal: f64,
        distribution: &Distribution,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetTrialParam {
                trial_id,
                param_name: param_name.to_string(),
                param_value_internal,
                distribution: wire::encode_distribution(distribution),
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Read a trial's study-sequential number.
    pub async fn get_trial_number_from_id(&self, trial_id: TrialId) -> Result<u64> {
        let value = self
            .call(StorageOp::GetTrialNumberFromId { trial_id })
            .await?;
        Ok(wire::expect_u64(&value)?)
    }

    /// Read the internal representation of one parameter.
    pub async fn get_trial_param(&self, trial_id: TrialId, param_name: &str) -> Result<f64> {
        let value = self
            .call(StorageOp::GetTrialParam {
                trial_id,
                param_name: param_name.to_string(),
            })
            .await?;
        Ok(wire::expect_f64(&value)?)
    }

    /// Record the objective value.
    pub async fn set_trial_value(&self, trial_id: TrialId, value: f64) -> Result<()> {
        let value = self.call(StorageOp::SetTrialValue { trial_id, value }).await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Record an intermediate value at a step.
    pub async fn set_trial_intermediate_value(
        &self,
        trial_id: TrialId,
        step: u64,
        intermediate_value: f64,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetTrialIntermediateValue {
                trial_id,
                step,
                intermediate_value,
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Set a caller-defined trial attribute.
    pub async fn set_trial_user_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetTrialUserAttr {
                trial_id,
                key: key.to_string(),
                value,
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Set an internal trial attribute.
    pub async fn set_trial_system_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let value = self
            .call(StorageOp::SetTrialSystemAttr {
                trial_id,
                key: key.to_string(),
                value,
            })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }

    /// Read one trial.
    pub async fn get_trial(&self, trial_id: TrialId) -> Result<Trial> {
        let value = self.call(StorageOp::GetTrial { trial_id }).await?;
        Ok(wire::decode_trial(&value)?)
    }

    /// Read all trials of a study, ordered by number.
    pub async fn get_all_trials(&self, study_id: StudyId) -> Result<Vec<Trial>> {
        let value = self.call(StorageOp::GetAllTrials { study_id }).await?;
        let mut trials = Vec::new();
        for encoded in wire::expect_array(&value)? {
            trials.push(wire::decode_trial(encoded)?);
        }
        Ok(trials)
    }

    /// Count a study's trials, optionally filtered by state.
    pub async fn get_n_trials(
        &self,
        study_id: StudyId,
        state: Option<TrialState>,
    ) -> Result<usize> {
        let value = self
            .call(StorageOp::GetNTrials {
                study_id,
                state: state.map(wire::encode_state).unwrap_or(Value::Null),
            })
            .await?;
        Ok(wire::expect_u64(&value)? as usize)
    }

    /// Ask the backend to bring any internal trial cache up to date.
    pub async fn read_trials_from_remote_storage(&self, study_id: StudyId) -> Result<()> {
        let value = self
            .call(StorageOp::ReadTrialsFromRemoteStorage { study_id })
            .await?;
        Ok(wire::expect_unit(&value)?)
    }
}

fn generate_name() -> String {
    format!("storage-{}", Uuid::new_v4().simple())
}

/// Parse a typed response body, keeping the raw text around for the error
/// path when the coordinator answered outside the protocol.
async fn read_body<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|_| Error::Rpc {
        status: status.as_u16(),
        body: text,
    })
}
