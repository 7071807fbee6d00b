//! In-memory backend (the default).

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use super::types::{
    timestamp_now, Distribution, StudyDirection, StudyId, StudySummary, Trial, TrialId, TrialState,
};
use super::StorageBackend;
use crate::error::StorageError;

#[derive(Debug)]
struct StudyRecord {
    study_id: StudyId,
    study_name: String,
    direction: StudyDirection,
    user_attrs: HashMap<String, Value>,
    system_attrs: HashMap<String, Value>,
    /// Trial ids in creation order; a trial's index here is its number.
    trials: Vec<TrialId>,
}

#[derive(Debug, Default)]
struct Inner {
    studies: HashMap<StudyId, StudyRecord>,
    study_ids_by_name: HashMap<String, StudyId>,
    trials: HashMap<TrialId, Trial>,
    trial_owner: HashMap<TrialId, StudyId>,
    next_study_id: StudyId,
    next_trial_id: TrialId,
}

impl Inner {
    fn study(&self, study_id: StudyId) -> Result<&StudyRecord, StorageError> {
        self.studies
            .get(&study_id)
            .ok_or(StorageError::StudyNotFound { study_id })
    }

    fn study_mut(&mut self, study_id: StudyId) -> Result<&mut StudyRecord, StorageError> {
        self.studies
            .get_mut(&study_id)
            .ok_or(StorageError::StudyNotFound { study_id })
    }

    fn trial(&self, trial_id: TrialId) -> Result<&Trial, StorageError> {
        self.trials
            .get(&trial_id)
            .ok_or(StorageError::TrialNotFound { trial_id })
    }

    /// Mutable access gated on the trial still being unfinished.
    fn unfinished_trial_mut(&mut self, trial_id: TrialId) -> Result<&mut Trial, StorageError> {
        let trial = self
            .trials
            .get_mut(&trial_id)
            .ok_or(StorageError::TrialNotFound { trial_id })?;
        if trial.state.is_finished() {
            return Err(StorageError::TrialAlreadyFinished {
                trial_id,
                state: trial.state,
            });
        }
        Ok(trial)
    }
}

/// In-memory study/trial store.
///
/// A single read-write lock guards all internal maps so that cross-map
/// invariants (name index, trial ownership, per-study numbering) always
/// hold under concurrent handler access.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn create_new_study(&self, study_name: Option<&str>) -> Result<StudyId, StorageError> {
        let mut inner = self.inner.write();
        let name = match study_name {
            Some(name) => {
                if inner.study_ids_by_name.contains_key(name) {
                    return Err(StorageError::DuplicateStudyName {
                        study_name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => format!("no-name-{}", Uuid::new_v4()),
        };

        let study_id = inner.next_study_id;
        inner.next_study_id += 1;
        inner.study_ids_by_name.insert(name.clone(), study_id);
        inner.studies.insert(
            study_id,
            StudyRecord {
                study_id,
                study_name: name.clone(),
                direction: StudyDirection::NotSet,
                user_attrs: HashMap::new(),
                system_attrs: HashMap::new(),
                trials: Vec::new(),
            },
        );
        tracing::info!("Created study {:?} with id {}", name, study_id);
        Ok(study_id)
    }

    fn delete_study(&self, study_id: StudyId) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let record = inner
            .studies
            .remove(&study_id)
            .ok_or(StorageError::StudyNotFound { study_id })?;
        inner.study_ids_by_name.remove(&record.study_name);
        for trial_id in record.trials {
            inner.trials.remove(&trial_id);
            inner.trial_owner.remove(&trial_id);
        }
        Ok(())
    }

    fn set_study_user_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .study_mut(study_id)?
            .user_attrs
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_study_system_attr(
        &self,
        study_id: StudyId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .study_mut(study_id)?
            .system_attrs
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_study_direction(
        &self,
        study_id: StudyId,
        direction: StudyDirection,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let record = inner.study_mut(study_id)?;
        if record.direction != StudyDirection::NotSet && record.direction != direction {
            return Err(StorageError::DirectionConflict {
                study_id,
                current: record.direction,
                requested: direction,
            });
        }
        record.direction = direction;
        Ok(())
    }

    fn get_study_id_from_name(&self, study_name: &str) -> Result<StudyId, StorageError> {
        let inner = self.inner.read();
        inner
            .study_ids_by_name
            .get(study_name)
            .copied()
            .ok_or_else(|| StorageError::StudyNameNotFound {
                study_name: study_name.to_string(),
            })
    }

    fn get_study_id_from_trial_id(&self, trial_id: TrialId) -> Result<StudyId, StorageError> {
        let inner = self.inner.read();
        inner
            .trial_owner
            .get(&trial_id)
            .copied()
            .ok_or(StorageError::TrialNotFound { trial_id })
    }

    fn get_study_name_from_id(&self, study_id: StudyId) -> Result<String, StorageError> {
        let inner = self.inner.read();
        Ok(inner.study(study_id)?.study_name.clone())
    }

    fn get_study_direction(&self, study_id: StudyId) -> Result<StudyDirection, StorageError> {
        let inner = self.inner.read();
        Ok(inner.study(study_id)?.direction)
    }

    fn get_study_user_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>, StorageError> {
        let inner = self.inner.read();
        Ok(inner.study(study_id)?.user_attrs.clone())
    }

    fn get_study_system_attrs(
        &self,
        study_id: StudyId,
    ) -> Result<HashMap<String, Value>, StorageError> {
        let inner = self.inner.read();
        Ok(inner.study(study_id)?.system_attrs.clone())
    }

    fn get_all_study_summaries(&self) -> Result<Vec<StudySummary>, StorageError> {
        let inner = self.inner.read();
        let mut studies: Vec<&StudyRecord> = inner.studies.values().collect();
        studies.sort_by_key(|record| record.study_id);

        let mut summaries = Vec::with_capacity(studies.len());
        for record in studies {
            let trials: Vec<&Trial> = record
                .trials
                .iter()
                .filter_map(|id| inner.trials.get(id))
                .collect();

            let mut best: Option<(f64, &Trial)> = None;
            for trial in &trials {
                if trial.state != TrialState::Complete {
                    continue;
                }
                let Some(value) = trial.value else { continue };
                let better = match best {
                    None => true,
                    Some((best_value, _)) => match record.direction {
                        StudyDirection::Maximize => value > best_value,
                        _ => value < best_value,
                    },
                };
                if better {
                    best = Some((value, trial));
                }
            }

            summaries.push(StudySummary {
                study_id: record.study_id,
                study_name: record.study_name.clone(),
                direction: record.direction,
                best_trial: best.map(|(_, trial)| trial.clone()),
                user_attrs: record.user_attrs.clone(),
                system_attrs: record.system_attrs.clone(),
                n_trials: trials.len(),
                datetime_start: trials.iter().filter_map(|t| t.datetime_start).min(),
            });
        }
        Ok(summaries)
    }

    fn create_new_trial(
        &self,
        study_id: StudyId,
        template: Option<Trial>,
    ) -> Result<TrialId, StorageError> {
        let mut inner = self.inner.write();
        if !inner.studies.contains_key(&study_id) {
            return Err(StorageError::StudyNotFound { study_id });
        }

        let trial_id = inner.next_trial_id;
        inner.next_trial_id += 1;

        let record = inner
            .studies
            .get_mut(&study_id)
            .ok_or(StorageError::StudyNotFound { study_id })?;
        let number = record.trials.len() as u64;
        record.trials.push(trial_id);

        let trial = match template {
            Some(mut trial) => {
                trial.trial_id = trial_id;
                trial.number = number;
                trial
            }
            None => Trial::new(trial_id, number),
        };
        inner.trials.insert(trial_id, trial);
        inner.trial_owner.insert(trial_id, study_id);
        tracing::debug!("Created trial {} (number {}) in study {}", trial_id, number, study_id);
        Ok(trial_id)
    }

    fn set_trial_state(&self, trial_id: TrialId, state: TrialState) -> Result<bool, StorageError> {
        let mut inner = self.inner.write();
        let trial = inner.unfinished_trial_mut(trial_id)?;
        if trial.state == TrialState::Running && state == TrialState::Running {
            return Ok(false);
        }
        trial.state = state;
        if state == TrialState::Running && trial.datetime_start.is_none() {
            trial.datetime_start = Some(timestamp_now());
        }
        if state.is_finished() {
            trial.datetime_complete = Some(timestamp_now());
        }
        Ok(true)
    }

    fn set_trial_param(
        &self,
        trial_id: TrialId,
        param_name: &str,
        param_value_internal: f64,
        distribution: Distribution,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let trial = inner.unfinished_trial_mut(trial_id)?;
        trial
            .params
            .insert(param_name.to_string(), param_value_internal);
        trial
            .distributions
            .insert(param_name.to_string(), distribution);
        Ok(())
    }

    fn get_trial_number_from_id(&self, trial_id: TrialId) -> Result<u64, StorageError> {
        let inner = self.inner.read();
        Ok(inner.trial(trial_id)?.number)
    }

    fn get_trial_param(&self, trial_id: TrialId, param_name: &str) -> Result<f64, StorageError> {
        let inner = self.inner.read();
        inner
            .trial(trial_id)?
            .params
            .get(param_name)
            .copied()
            .ok_or_else(|| StorageError::ParamNotFound {
                trial_id,
                param_name: param_name.to_string(),
            })
    }

    fn set_trial_value(&self, trial_id: TrialId, value: f64) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner.unfinished_trial_mut(trial_id)?.value = Some(value);
        Ok(())
    }

    fn set_trial_intermediate_value(
        &self,
        trial_id: TrialId,
        step: u64,
        intermediate_value: f64,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .unfinished_trial_mut(trial_id)?
            .intermediate_values
            .insert(step, intermediate_value);
        Ok(())
    }

    fn set_trial_user_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .unfinished_trial_mut(trial_id)?
            .user_attrs
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_trial_system_attr(
        &self,
        trial_id: TrialId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .unfinished_trial_mut(trial_id)?
            .system_attrs
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get_trial(&self, trial_id: TrialId) -> Result<Trial, StorageError> {
        let inner = self.inner.read();
        Ok(inner.trial(trial_id)?.clone())
    }

    fn get_all_trials(&self, study_id: StudyId) -> Result<Vec<Trial>, StorageError> {
        let inner = self.inner.read();
        let record = inner.study(study_id)?;
        Ok(record
            .trials
            .iter()
            .filter_map(|id| inner.trials.get(id))
            .cloned()
            .collect())
    }

    fn get_n_trials(
        &self,
        study_id: StudyId,
        state: Option<TrialState>,
    ) -> Result<usize, StorageError> {
        let inner = self.inner.read();
        let record = inner.study(study_id)?;
        let count = record
            .trials
            .iter()
            .filter_map(|id| inner.trials.get(id))
            .filter(|trial| state.map_or(true, |s| trial.state == s))
            .count();
        Ok(count)
    }

    fn read_trials_from_remote_storage(&self, study_id: StudyId) -> Result<(), StorageError> {
        // Nothing to refresh: this backend is the authoritative copy.
        let inner = self.inner.read();
        inner.study(study_id).map(|_| ())
    }
}
