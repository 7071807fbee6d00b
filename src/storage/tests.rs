//! Storage Module Tests
//!
//! Validates the backend contract against the in-memory implementation.
//!
//! ## Test Scopes
//! - **Studies**: Naming, directions, deletion and summary computation.
//! - **Trials**: Per-study numbering, state transitions and the
//!   finished-trial write guard.
//!
//! *Note: Remote access to these backends is tested in the coordinator and
//! client modules.*

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::StorageError;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::types::{Distribution, StudyDirection, Trial, TrialState};
    use crate::storage::{open_backend, StorageBackend};

    // ============================================================
    // STUDY LIFECYCLE TESTS
    // ============================================================

    #[test]
    fn study_ids_are_sequential() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.create_new_study(Some("a")).unwrap(), 0);
        assert_eq!(backend.create_new_study(Some("b")).unwrap(), 1);
        assert_eq!(backend.create_new_study(Some("c")).unwrap(), 2);
    }

    #[test]
    fn duplicate_study_name_is_rejected() {
        let backend = MemoryBackend::new();
        backend.create_new_study(Some("taken")).unwrap();
        let err = backend.create_new_study(Some("taken")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateStudyName { study_name } if study_name == "taken"));
    }

    #[test]
    fn unnamed_studies_get_distinct_names() {
        let backend = MemoryBackend::new();
        let a = backend.create_new_study(None).unwrap();
        let b = backend.create_new_study(None).unwrap();
        let name_a = backend.get_study_name_from_id(a).unwrap();
        let name_b = backend.get_study_name_from_id(b).unwrap();
        assert!(name_a.starts_with("no-name-"));
        assert_ne!(name_a, name_b);
        assert_eq!(backend.get_study_id_from_name(&name_a).unwrap(), a);
    }

    #[test]
    fn study_name_lookup_roundtrip() {
        let backend = MemoryBackend::new();
        let id = backend.create_new_study(Some("lookup")).unwrap();
        assert_eq!(backend.get_study_id_from_name("lookup").unwrap(), id);
        assert_eq!(backend.get_study_name_from_id(id).unwrap(), "lookup");
    }

    #[test]
    fn missing_study_errors_carry_the_key() {
        let backend = MemoryBackend::new();
        let err = backend.get_study_id_from_name("ghost").unwrap_err();
        assert!(matches!(err, StorageError::StudyNameNotFound { study_name } if study_name == "ghost"));
        let err = backend.get_study_name_from_id(99).unwrap_err();
        assert!(matches!(err, StorageError::StudyNotFound { study_id: 99 }));
    }

    #[test]
    fn delete_study_removes_its_trials() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("doomed")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();

        backend.delete_study(study_id).unwrap();

        assert!(matches!(
            backend.get_study_name_from_id(study_id).unwrap_err(),
            StorageError::StudyNotFound { .. }
        ));
        assert!(matches!(
            backend.get_trial(trial_id).unwrap_err(),
            StorageError::TrialNotFound { .. }
        ));
        // The name is free again.
        backend.create_new_study(Some("doomed")).unwrap();
    }

    #[test]
    fn direction_can_be_set_once() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("dir")).unwrap();
        assert_eq!(
            backend.get_study_direction(study_id).unwrap(),
            StudyDirection::NotSet
        );

        backend
            .set_study_direction(study_id, StudyDirection::Minimize)
            .unwrap();
        // Re-asserting the same direction is a no-op.
        backend
            .set_study_direction(study_id, StudyDirection::Minimize)
            .unwrap();

        let err = backend
            .set_study_direction(study_id, StudyDirection::Maximize)
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::DirectionConflict {
                current: StudyDirection::Minimize,
                requested: StudyDirection::Maximize,
                ..
            }
        ));
        assert_eq!(
            backend.get_study_direction(study_id).unwrap(),
            StudyDirection::Minimize
        );
    }

    #[test]
    fn study_attrs_accumulate() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("attrs")).unwrap();
        backend
            .set_study_user_attr(study_id, "owner", json!("team-a"))
            .unwrap();
        backend
            .set_study_user_attr(study_id, "owner", json!("team-b"))
            .unwrap();
        backend
            .set_study_system_attr(study_id, "schema", json!(2))
            .unwrap();

        let user = backend.get_study_user_attrs(study_id).unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user["owner"], json!("team-b"));
        let system = backend.get_study_system_attrs(study_id).unwrap();
        assert_eq!(system["schema"], json!(2));
    }

    // ============================================================
    // TRIAL LIFECYCLE TESTS
    // ============================================================

    #[test]
    fn trial_numbers_are_per_study() {
        let backend = MemoryBackend::new();
        let a = backend.create_new_study(Some("a")).unwrap();
        let b = backend.create_new_study(Some("b")).unwrap();

        let t0 = backend.create_new_trial(a, None).unwrap();
        let t1 = backend.create_new_trial(b, None).unwrap();
        let t2 = backend.create_new_trial(a, None).unwrap();

        // Ids are global, numbers restart per study.
        assert_eq!((t0, t1, t2), (0, 1, 2));
        assert_eq!(backend.get_trial_number_from_id(t0).unwrap(), 0);
        assert_eq!(backend.get_trial_number_from_id(t1).unwrap(), 0);
        assert_eq!(backend.get_trial_number_from_id(t2).unwrap(), 1);

        assert_eq!(backend.get_study_id_from_trial_id(t1).unwrap(), b);
    }

    #[test]
    fn fresh_trials_start_running() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("fresh")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();

        let trial = backend.get_trial(trial_id).unwrap();
        assert_eq!(trial.state, TrialState::Running);
        assert!(trial.datetime_start.is_some());
        assert!(trial.datetime_complete.is_none());
        assert!(trial.params.is_empty());
    }

    #[test]
    fn template_trial_keeps_payload_but_not_identity() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("tpl")).unwrap();
        backend.create_new_trial(study_id, None).unwrap();

        let mut template = Trial::new(999, 999);
        template.state = TrialState::Pending;
        template.params.insert("x".to_string(), 3.0);
        template
            .user_attrs
            .insert("seed".to_string(), json!(1234));

        let trial_id = backend.create_new_trial(study_id, Some(template)).unwrap();
        let trial = backend.get_trial(trial_id).unwrap();

        // Identity is assigned by the backend, never taken from the template.
        assert_eq!(trial.trial_id, trial_id);
        assert_eq!(trial.number, 1);
        assert_eq!(trial.state, TrialState::Pending);
        assert_eq!(trial.params["x"], 3.0);
        assert_eq!(trial.user_attrs["seed"], json!(1234));
    }

    #[test]
    fn state_transitions_report_change() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("states")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();

        // Running -> Running is a no-op, reported as unchanged.
        assert!(!backend.set_trial_state(trial_id, TrialState::Running).unwrap());
        assert!(backend.set_trial_state(trial_id, TrialState::Complete).unwrap());

        let trial = backend.get_trial(trial_id).unwrap();
        assert_eq!(trial.state, TrialState::Complete);
        assert!(trial.datetime_complete.is_some());
    }

    #[test]
    fn finished_trials_are_frozen() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("frozen")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();
        backend.set_trial_value(trial_id, 1.0).unwrap();
        backend.set_trial_state(trial_id, TrialState::Pruned).unwrap();

        let err = backend.set_trial_state(trial_id, TrialState::Complete).unwrap_err();
        assert!(matches!(
            err,
            StorageError::TrialAlreadyFinished {
                trial_id: 0,
                state: TrialState::Pruned,
            }
        ));
        assert!(backend.set_trial_value(trial_id, 2.0).is_err());
        assert!(backend
            .set_trial_param(trial_id, "x", 0.5, Distribution::uniform(0.0, 1.0))
            .is_err());
        assert!(backend
            .set_trial_intermediate_value(trial_id, 3, 0.1)
            .is_err());
        assert!(backend
            .set_trial_user_attr(trial_id, "note", json!("late"))
            .is_err());

        // Reads still work.
        assert_eq!(backend.get_trial(trial_id).unwrap().value, Some(1.0));
    }

    #[test]
    fn params_store_internal_representation() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("params")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();

        backend
            .set_trial_param(trial_id, "x", -4.5, Distribution::uniform(-10.0, 10.0))
            .unwrap();
        assert_eq!(backend.get_trial_param(trial_id, "x").unwrap(), -4.5);

        let err = backend.get_trial_param(trial_id, "y").unwrap_err();
        assert!(matches!(err, StorageError::ParamNotFound { param_name, .. } if param_name == "y"));

        let trial = backend.get_trial(trial_id).unwrap();
        assert_eq!(
            trial.distributions["x"],
            Distribution::uniform(-10.0, 10.0)
        );
    }

    #[test]
    fn intermediate_values_are_ordered_by_step() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("steps")).unwrap();
        let trial_id = backend.create_new_trial(study_id, None).unwrap();

        backend.set_trial_intermediate_value(trial_id, 10, 0.5).unwrap();
        backend.set_trial_intermediate_value(trial_id, 2, 0.9).unwrap();
        backend.set_trial_intermediate_value(trial_id, 2, 0.8).unwrap();

        let trial = backend.get_trial(trial_id).unwrap();
        let steps: Vec<u64> = trial.intermediate_values.keys().copied().collect();
        assert_eq!(steps, vec![2, 10]);
        assert_eq!(trial.intermediate_values[&2], 0.8);
    }

    #[test]
    fn missing_trial_errors_carry_the_id() {
        let backend = MemoryBackend::new();
        let err = backend.get_trial(42).unwrap_err();
        assert!(matches!(err, StorageError::TrialNotFound { trial_id: 42 }));
        let err = backend.set_trial_value(42, 1.0).unwrap_err();
        assert!(matches!(err, StorageError::TrialNotFound { trial_id: 42 }));
    }

    // ============================================================
    // QUERY TESTS
    // ============================================================

    #[test]
    fn all_trials_come_back_in_number_order() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("ordered")).unwrap();
        for _ in 0..5 {
            backend.create_new_trial(study_id, None).unwrap();
        }
        let numbers: Vec<u64> = backend
            .get_all_trials(study_id)
            .unwrap()
            .iter()
            .map(|t| t.number)
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn n_trials_filters_by_state() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("counts")).unwrap();
        for i in 0..4 {
            let trial_id = backend.create_new_trial(study_id, None).unwrap();
            if i % 2 == 0 {
                backend.set_trial_state(trial_id, TrialState::Complete).unwrap();
            }
        }
        assert_eq!(backend.get_n_trials(study_id, None).unwrap(), 4);
        assert_eq!(
            backend.get_n_trials(study_id, Some(TrialState::Complete)).unwrap(),
            2
        );
        assert_eq!(
            backend.get_n_trials(study_id, Some(TrialState::Failed)).unwrap(),
            0
        );
    }

    #[test]
    fn summaries_pick_the_best_finished_trial() {
        let backend = MemoryBackend::new();
        let min_study = backend.create_new_study(Some("min")).unwrap();
        backend
            .set_study_direction(min_study, StudyDirection::Minimize)
            .unwrap();
        let max_study = backend.create_new_study(Some("max")).unwrap();
        backend
            .set_study_direction(max_study, StudyDirection::Maximize)
            .unwrap();

        for study_id in [min_study, max_study] {
            for value in [3.0, -1.0, 7.0] {
                let trial_id = backend.create_new_trial(study_id, None).unwrap();
                backend.set_trial_value(trial_id, value).unwrap();
                backend.set_trial_state(trial_id, TrialState::Complete).unwrap();
            }
            // A better value that never finished must not win.
            let running = backend.create_new_trial(study_id, None).unwrap();
            backend.set_trial_value(running, -100.0).unwrap();
        }

        let summaries = backend.get_all_study_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        // Ordered by study id.
        assert_eq!(summaries[0].study_name, "min");
        assert_eq!(summaries[1].study_name, "max");

        assert_eq!(summaries[0].n_trials, 4);
        assert_eq!(summaries[0].best_trial.as_ref().unwrap().value, Some(-1.0));
        assert_eq!(summaries[1].best_trial.as_ref().unwrap().value, Some(7.0));
        assert!(summaries[0].datetime_start.is_some());
    }

    #[test]
    fn summary_of_empty_study_has_no_best_trial() {
        let backend = MemoryBackend::new();
        backend.create_new_study(Some("empty")).unwrap();
        let summaries = backend.get_all_study_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].best_trial.is_none());
        assert_eq!(summaries[0].n_trials, 0);
        assert!(summaries[0].datetime_start.is_none());
    }

    #[test]
    fn remote_refresh_is_a_no_op_for_memory() {
        let backend = MemoryBackend::new();
        let study_id = backend.create_new_study(Some("refresh")).unwrap();
        backend.read_trials_from_remote_storage(study_id).unwrap();
        assert!(matches!(
            backend.read_trials_from_remote_storage(99).unwrap_err(),
            StorageError::StudyNotFound { study_id: 99 }
        ));
    }

    // ============================================================
    // BACKEND DESCRIPTOR TESTS
    // ============================================================

    #[test]
    fn descriptors_select_the_backend() {
        assert!(open_backend(None).is_ok());
        assert!(open_backend(Some("memory")).is_ok());
        assert!(open_backend(Some("memory://")).is_ok());

        let err = open_backend(Some("sqlite:///tmp/studies.db")).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedBackend { descriptor } if descriptor.starts_with("sqlite")
        ));
    }
}
