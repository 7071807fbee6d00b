//! Client Module Tests
//!
//! End-to-end coverage: a real coordinator is served on a loopback port
//! and every assertion goes through the HTTP proxy, exactly as workers do.
//!
//! ## Test Scopes
//! - **Registration**: Named convergence, generated names, descriptors.
//! - **Operations**: The full trial lifecycle over the wire, including
//!   typed error propagation.
//! - **Rehydration**: Proxies serialized, shipped and reconstructed.
//! - **Blocking convention**: The wrapper driven off the event loop.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::client::{BlockingStorageClient, StorageClient};
    use crate::coordinator::handlers::router;
    use crate::coordinator::registry::StorageRegistry;
    use crate::error::{Error, StorageError};
    use crate::storage::types::{Distribution, StudyDirection, TrialState};

    /// Serve a coordinator on an ephemeral loopback port.
    async fn spawn_coordinator() -> (String, Arc<StorageRegistry>) {
        let registry = StorageRegistry::new();
        let app = router(registry.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), registry)
    }

    async fn connect(url: &str, name: &str) -> StorageClient {
        StorageClient::connect(url, None, Some(name.to_string()))
            .await
            .unwrap()
    }

    // ============================================================
    // REGISTRATION TESTS
    // ============================================================

    #[tokio::test]
    async fn proxies_with_the_same_name_share_one_backend() {
        let (url, registry) = spawn_coordinator().await;

        let first = connect(&url, "shared").await;
        let backend_before = registry.backend("shared").unwrap();

        // A second worker registers the same name with a different
        // descriptor; the existing backend wins.
        let second = StorageClient::connect(&url, Some("memory://fresh".to_string()), Some("shared".to_string()))
            .await
            .unwrap();
        let backend_after = registry.backend("shared").unwrap();

        assert!(Arc::ptr_eq(&backend_before, &backend_after));
        assert_eq!(registry.len(), 1);

        // Writes through one proxy are visible through the other.
        let study_id = first.create_new_study(Some("visible")).await.unwrap();
        assert_eq!(second.get_study_id_from_name("visible").await.unwrap(), study_id);
    }

    #[tokio::test]
    async fn omitted_names_are_generated_unique() {
        let (url, registry) = spawn_coordinator().await;

        let a = StorageClient::connect(&url, None, None).await.unwrap();
        let b = StorageClient::connect(&url, None, None).await.unwrap();

        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("storage-"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn unsupported_descriptors_are_rejected_at_connect() {
        let (url, _registry) = spawn_coordinator().await;

        let err = StorageClient::connect(
            &url,
            Some("sqlite:///tmp/studies.db".to_string()),
            Some("bad".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::UnsupportedBackend { .. })
        ));
    }

    // ============================================================
    // OPERATION TESTS
    // ============================================================

    #[tokio::test]
    async fn trial_lifecycle_over_the_wire() {
        let (url, _registry) = spawn_coordinator().await;
        let client = connect(&url, "lifecycle").await;

        let study_id = client.create_new_study(Some("quadratic")).await.unwrap();
        client
            .set_study_direction(study_id, StudyDirection::Minimize)
            .await
            .unwrap();
        assert_eq!(
            client.get_study_direction(study_id).await.unwrap(),
            StudyDirection::Minimize
        );

        let trial_id = client.create_new_trial(study_id, None).await.unwrap();
        assert_eq!(client.get_study_id_from_trial_id(trial_id).await.unwrap(), study_id);

        client
            .set_trial_param(trial_id, "x", 3.0, &Distribution::uniform(-10.0, 10.0))
            .await
            .unwrap();
        assert_eq!(client.get_trial_param(trial_id, "x").await.unwrap(), 3.0);

        client.set_trial_intermediate_value(trial_id, 0, 2.0).await.unwrap();
        client.set_trial_value(trial_id, 1.0).await.unwrap();
        client
            .set_trial_user_attr(trial_id, "machine", json!("worker-7"))
            .await
            .unwrap();
        assert!(client.set_trial_state(trial_id, TrialState::Complete).await.unwrap());

        let trial = client.get_trial(trial_id).await.unwrap();
        assert_eq!(trial.state, TrialState::Complete);
        assert_eq!(trial.value, Some(1.0));
        assert_eq!(trial.params["x"], 3.0);
        assert_eq!(trial.intermediate_values[&0], 2.0);
        assert_eq!(trial.user_attrs["machine"], json!("worker-7"));
        assert_eq!(
            trial.distributions["x"],
            Distribution::uniform(-10.0, 10.0)
        );
        assert!(trial.datetime_complete.is_some());
    }

    #[tokio::test]
    async fn study_attrs_roundtrip_arbitrary_json() {
        let (url, _registry) = spawn_coordinator().await;
        let client = connect(&url, "attrs").await;

        let study_id = client.create_new_study(None).await.unwrap();
        let config = json!({"lr": 0.1, "layers": [64, 64], "nested": {"dropout": null}});
        client
            .set_study_user_attr(study_id, "config", config.clone())
            .await
            .unwrap();
        client
            .set_study_system_attr(study_id, "schema", json!(2))
            .await
            .unwrap();

        let user = client.get_study_user_attrs(study_id).await.unwrap();
        assert_eq!(user["config"], config);
        let system = client.get_study_system_attrs(study_id).await.unwrap();
        assert_eq!(system["schema"], json!(2));
    }

    #[tokio::test]
    async fn backend_errors_reraise_with_their_payload() {
        let (url, _registry) = spawn_coordinator().await;
        let client = connect(&url, "errors").await;

        let err = client.get_trial(9999).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::TrialNotFound { trial_id: 9999 })
        ));

        client.create_new_study(Some("taken")).await.unwrap();
        let err = client.create_new_study(Some("taken")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::DuplicateStudyName { study_name }) if study_name == "taken"
        ));
    }

    #[tokio::test]
    async fn finished_trials_stay_frozen_through_the_proxy() {
        let (url, _registry) = spawn_coordinator().await;
        let client = connect(&url, "frozen").await;

        let study_id = client.create_new_study(None).await.unwrap();
        let trial_id = client.create_new_trial(study_id, None).await.unwrap();

        assert!(!client.set_trial_state(trial_id, TrialState::Running).await.unwrap());
        assert!(client.set_trial_state(trial_id, TrialState::Failed).await.unwrap());

        let err = client.set_trial_value(trial_id, 0.0).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::TrialAlreadyFinished {
                state: TrialState::Failed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn trial_numbers_stay_sequential_across_proxies() {
        let (url, _registry) = spawn_coordinator().await;
        let first = connect(&url, "numbering").await;
        let study_id = first.create_new_study(Some("seq")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let proxy = connect(&url, "numbering").await;
            handles.push(tokio::spawn(async move {
                let mut numbers = Vec::new();
                for _ in 0..4 {
                    let trial_id = proxy.create_new_trial(study_id, None).await.unwrap();
                    numbers.push(proxy.get_trial_number_from_id(trial_id).await.unwrap());
                }
                numbers
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn many_workers_fill_one_study() {
        let (url, _registry) = spawn_coordinator().await;
        let first = connect(&url, "scenario").await;
        let study_id = first.create_new_study(Some("quadratic")).await.unwrap();
        first
            .set_study_direction(study_id, StudyDirection::Minimize)
            .await
            .unwrap();

        let xs = [-9.5, -4.0, -1.0, 0.5, 1.0, 2.0, 3.5, 6.0, 8.25, 10.0];
        let mut next = xs.iter();
        for _ in 0..5 {
            let proxy = connect(&url, "scenario").await;
            for _ in 0..2 {
                let x = *next.next().unwrap();
                let trial_id = proxy.create_new_trial(study_id, None).await.unwrap();
                proxy
                    .set_trial_param(trial_id, "x", x, &Distribution::uniform(-10.0, 10.0))
                    .await
                    .unwrap();
                proxy.set_trial_value(trial_id, (x - 2.0) * (x - 2.0)).await.unwrap();
                assert!(proxy.set_trial_state(trial_id, TrialState::Complete).await.unwrap());
            }
        }

        let reader = connect(&url, "scenario").await;
        let summaries = reader.get_all_study_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.study_name, "quadratic");
        assert_eq!(summary.direction, StudyDirection::Minimize);
        assert_eq!(summary.n_trials, 10);
        let best = summary.best_trial.as_ref().unwrap();
        assert_eq!(best.value, Some(0.0));
        assert_eq!(best.params["x"], 2.0);

        assert_eq!(
            reader.get_n_trials(study_id, Some(TrialState::Complete)).await.unwrap(),
            10
        );
        assert_eq!(reader.get_all_trials(study_id).await.unwrap().len(), 10);
    }

    // ============================================================
    // REHYDRATION TESTS
    // ============================================================

    #[tokio::test]
    async fn serialized_proxies_carry_only_the_handle() {
        let (url, _registry) = spawn_coordinator().await;
        let original = StorageClient::connect(
            &url,
            Some("memory".to_string()),
            Some("rehydrate".to_string()),
        )
        .await
        .unwrap();
        let study_id = original.create_new_study(Some("carried")).await.unwrap();

        let encoded = serde_json::to_value(&original).unwrap();
        let map = encoded.as_object().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["name"], json!("rehydrate"));
        assert_eq!(map["coordinator"], json!(url));

        // The reconstructed proxy re-registers (a no-op) and sees the same
        // backend.
        let copy: StorageClient = serde_json::from_value(encoded).unwrap();
        assert_eq!(copy.get_study_id_from_name("carried").await.unwrap(), study_id);
        assert_eq!(copy.name(), original.name());
    }

    #[tokio::test]
    async fn handles_survive_a_text_roundtrip() {
        let (url, _registry) = spawn_coordinator().await;
        let original = connect(&url, "text-trip").await;
        let study_id = original.create_new_study(Some("payload")).await.unwrap();

        let text = serde_json::to_string(&original.handle()).unwrap();
        let copy: StorageClient = serde_json::from_str(&text).unwrap();
        assert_eq!(copy.get_study_name_from_id(study_id).await.unwrap(), "payload");
    }

    // ============================================================
    // BLOCKING CONVENTION TESTS
    // ============================================================

    #[tokio::test]
    async fn blocking_client_reaches_the_same_backend() {
        let (url, _registry) = spawn_coordinator().await;
        let async_client = connect(&url, "blocking").await;
        let study_id = async_client.create_new_study(Some("mixed")).await.unwrap();

        let observed = tokio::task::spawn_blocking(move || {
            let client =
                BlockingStorageClient::connect(url, None, Some("blocking".to_string())).unwrap();
            let trial_id = client.create_new_trial(study_id, None).unwrap();
            client.set_trial_value(trial_id, 1.5).unwrap();
            client.set_trial_state(trial_id, TrialState::Complete).unwrap();
            client.get_n_trials(study_id, Some(TrialState::Complete)).unwrap()
        })
        .await
        .unwrap();
        assert_eq!(observed, 1);

        // The write is visible from the async side.
        let trials = async_client.get_all_trials(study_id).await.unwrap();
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].value, Some(1.5));
    }
}
