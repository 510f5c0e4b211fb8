//! Runner tests: worker-pool backpressure, recovery, job views and shutdown.

#[cfg(test)]
mod tests {
    use crate::config::RunnerConfig;
    use crate::context::{keys, FlightId, FlightMap};
    use crate::core::{Direction, FlightStatus};
    use crate::errors::FlightError;
    use crate::flight::FlightBuilder;
    use crate::flows::{FlightRegistry, FlowServices, DATASET_CREATE};
    use crate::locks::{FlightStatusLookup, LockResourceStep, ResourceId, UnlockResourceStep};
    use crate::retry::{should_retry, RetryDecision, RetryPolicy, RetryState};
    use crate::runner::{FlightRunner, FlightState, FlightStateStore, InMemoryFlightRunner, JobStatus};
    use crate::store::{InMemoryResourceStore, InMemoryStorageDriver, NewResource};
    use crate::testing::{call_log, ConcurrencyProbe, MockStep};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryResourceStore>,
        states: Arc<FlightStateStore>,
        runner: InMemoryFlightRunner,
    }

    impl Harness {
        fn new(registry: FlightRegistry, pool: u32) -> Self {
            Self::over(registry, pool, Arc::new(FlightStateStore::new()))
        }

        fn over(registry: FlightRegistry, pool: u32, states: Arc<FlightStateStore>) -> Self {
            let store = Arc::new(InMemoryResourceStore::new());
            let fast = RetryPolicy::fixed(Duration::from_millis(1), 3);
            let services = FlowServices::in_memory(
                store.clone(),
                Arc::new(InMemoryStorageDriver::new()),
                states.clone(),
            )
            .with_lock_retry(fast.clone())
            .with_step_retry(fast);
            let runner = InMemoryFlightRunner::new(
                &RunnerConfig::default().with_max_concurrent_flights(pool),
                Arc::new(registry),
                services,
                states.clone(),
            );
            Self {
                store,
                states,
                runner,
            }
        }
    }

    fn probe_registry(probe: &ConcurrencyProbe) -> FlightRegistry {
        let registry = FlightRegistry::new();
        let probe = probe.share();
        registry.register("probe", move |_inputs: &FlightMap, _services: &FlowServices| {
            FlightBuilder::new("probe").step(probe.share()).build()
        });
        registry
    }

    #[tokio::test]
    async fn test_submissions_above_pool_size_queue_and_complete() {
        let probe = ConcurrencyProbe::new("work", Duration::from_millis(20));
        let harness = Harness::new(probe_registry(&probe), 2);

        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(harness.runner.submit("probe", FlightMap::new()).await.unwrap());
        }
        for id in &ids {
            let state = harness.runner.wait(id).await.unwrap();
            assert_eq!(state.status, FlightStatus::Success);
            assert!(state.completed_at.is_some());
        }

        assert!(probe.peak() <= 2, "peak was {}", probe.peak());
        assert_eq!(harness.runner.pool().available(), 2);
        assert_eq!(harness.runner.jobs().len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exclusive_lock_serializes_flights_on_one_resource() {
        let probe = ConcurrencyProbe::new("critical", Duration::from_millis(20));
        let resource = ResourceId::dataset(Uuid::new_v4());
        let registry = FlightRegistry::new();
        let shared = probe.share();
        registry.register("locked", move |_inputs: &FlightMap, services: &FlowServices| {
            let wait_for_holder = RetryPolicy::fixed(Duration::from_millis(5), 400);
            FlightBuilder::new("locked")
                .step_with_retry(
                    LockResourceStep::exclusive(resource, services.locks.clone())
                        .retry_on_conflict(),
                    wait_for_holder,
                )
                .step(shared.share())
                .step(UnlockResourceStep::exclusive(resource, services.locks.clone()))
                .build()
        });

        let harness = Harness::new(registry, 4);
        harness
            .store
            .insert(
                &NewResource {
                    id: resource,
                    name: "sales".to_string(),
                    description: None,
                    parent: None,
                },
                &FlightId::new("creator"),
            )
            .unwrap();

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(harness.runner.submit("locked", FlightMap::new()).await.unwrap());
        }
        for id in &ids {
            let state = harness.runner.wait(id).await.unwrap();
            assert_eq!(state.status, FlightStatus::Success, "{:?}", state.error);
        }

        assert_eq!(probe.peak(), 1);
    }

    #[tokio::test]
    async fn test_recover_resumes_forward_from_recorded_step() {
        let log = call_log();
        let registry = FlightRegistry::new();
        let steps_log = log.clone();
        registry.register("three", move |_inputs: &FlightMap, _services: &FlowServices| {
            FlightBuilder::new("three")
                .step(MockStep::new("a").with_log(&steps_log))
                .step(MockStep::new("b").with_log(&steps_log))
                .step(MockStep::new("c").with_log(&steps_log))
                .build()
        });

        let states = Arc::new(FlightStateStore::new());
        let id = FlightId::new("interrupted");
        let mut persisted = FlightState::new(id.clone(), "three", FlightMap::new())
            .with_progress(1, Direction::Do)
            .with_working_map(FlightMap::new().with("from_a", true));
        persisted.status = FlightStatus::Running;
        states.insert(persisted);

        let harness = Harness::over(registry, 2, states);
        assert_eq!(harness.runner.recover().await.unwrap(), 1);

        let state = harness.runner.wait(&id).await.unwrap();
        assert_eq!(state.status, FlightStatus::Success);
        assert_eq!(log.lock().as_slice(), ["b.do", "c.do"]);
        assert_eq!(state.working_map.get::<bool>("from_a").unwrap(), Some(true));

        // Nothing left to resume.
        assert_eq!(harness.runner.recover().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recover_continues_undo_with_original_cause() {
        let log = call_log();
        let registry = FlightRegistry::new();
        let steps_log = log.clone();
        registry.register("three", move |_inputs: &FlightMap, _services: &FlowServices| {
            FlightBuilder::new("three")
                .step(MockStep::new("a").with_log(&steps_log))
                .step(MockStep::new("b").with_log(&steps_log))
                .step(MockStep::new("c").with_log(&steps_log))
                .build()
        });

        let states = Arc::new(FlightStateStore::new());
        let id = FlightId::new("unwinding");
        let mut persisted =
            FlightState::new(id.clone(), "three", FlightMap::new()).with_progress(1, Direction::Undo);
        persisted.status = FlightStatus::Running;
        persisted.cause = Some(FlightError::Internal("c blew up".into()));
        states.insert(persisted);

        let harness = Harness::over(registry, 2, states);
        harness.runner.recover().await.unwrap();

        let state = harness.runner.wait(&id).await.unwrap();
        assert_eq!(state.status, FlightStatus::Fatal);
        assert_eq!(state.error, Some(FlightError::Internal("c blew up".into())));
        assert_eq!(log.lock().as_slice(), ["b.undo", "a.undo"]);
    }

    #[tokio::test]
    async fn test_recover_marks_unbuildable_flight_fatal() {
        let states = Arc::new(FlightStateStore::new());
        let id = FlightId::new("orphan");
        states.insert(FlightState::new(id.clone(), "retired.flow", FlightMap::new()));

        let harness = Harness::over(FlightRegistry::new(), 1, states);
        assert_eq!(harness.runner.recover().await.unwrap(), 0);

        let state = harness.states.get(&id).unwrap();
        assert_eq!(state.status, FlightStatus::Fatal);
        assert!(matches!(state.error, Some(FlightError::UnknownFlightType(_))));
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_type_without_storing() {
        let harness = Harness::new(FlightRegistry::with_default_flows(), 1);
        let err = harness
            .runner
            .submit("dataset.rename", FlightMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlightError::UnknownFlightType(_)));

        let err = harness
            .runner
            .submit(DATASET_CREATE, FlightMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlightError::MissingValue(_)));
        assert!(harness.states.is_empty());
    }

    #[tokio::test]
    async fn test_job_view_and_result_through_completion() {
        let probe = ConcurrencyProbe::new("slow", Duration::from_millis(50));
        let harness = Harness::new(probe_registry(&probe), 1);

        let id = harness
            .runner
            .submit_with_description("probe", FlightMap::new(), Some("slow job".into()))
            .await
            .unwrap();

        let pending = harness.runner.job_result(&id).unwrap();
        assert_eq!(pending.status_code, 202);
        assert_eq!(pending.response["description"], json!("slow job"));
        assert_eq!(harness.runner.job(&id).unwrap().job_status, JobStatus::Running);
        assert!(matches!(
            harness.runner.result(&id).await,
            Err(FlightError::JobNotComplete(_))
        ));
        assert!(harness
            .states
            .flight_status(&id)
            .await
            .unwrap()
            .is_some_and(|status| status.is_active()));

        harness.runner.wait(&id).await.unwrap();
        let view = harness.runner.job(&id).unwrap();
        assert_eq!(view.job_status, JobStatus::Succeeded);
        assert_eq!(view.description.as_deref(), Some("slow job"));
        assert_eq!(harness.runner.job_result(&id).unwrap().status_code, 200);
        assert_eq!(
            harness.states.flight_status(&id).await.unwrap(),
            Some(FlightStatus::Success)
        );
    }

    #[tokio::test]
    async fn test_dataset_create_through_runner() -> anyhow::Result<()> {
        let harness = Harness::new(FlightRegistry::with_default_flows(), 2);
        let id = harness
            .runner
            .submit(DATASET_CREATE, FlightMap::new().with(keys::NAME, "sales"))
            .await?;

        let state = harness.runner.wait(&id).await?;
        assert_eq!(state.status, FlightStatus::Success, "{:?}", state.error);

        let result = harness.runner.job_result(&id)?;
        assert_eq!(result.status_code, 201);
        assert_eq!(result.response["name"], json!("sales"));

        let map = harness.runner.result(&id).await?;
        assert!(map.contains_key(keys::DATASET_ID));
        assert_eq!(harness.store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_flight_reports_error() {
        let registry = FlightRegistry::new();
        registry.register("doomed", |_inputs: &FlightMap, _services: &FlowServices| {
            FlightBuilder::new("doomed")
                .step(MockStep::new("ok"))
                .step(MockStep::new("bad").failing("no capacity"))
                .build()
        });
        let harness = Harness::new(registry, 1);

        let id = harness.runner.submit("doomed", FlightMap::new()).await.unwrap();
        let state = harness.runner.wait(&id).await.unwrap();
        assert_eq!(state.status, FlightStatus::Fatal);
        assert_eq!(state.journal.undo_order(), vec!["bad", "ok"]);

        let expected = FlightError::Internal("no capacity".into());
        assert_eq!(harness.runner.result(&id).await.unwrap_err(), expected);
        assert_eq!(harness.runner.job_result(&id).unwrap_err(), expected);
        assert_eq!(harness.runner.job(&id).unwrap().job_status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_rejects() {
        let probe = ConcurrencyProbe::new("work", Duration::from_millis(10));
        let harness = Harness::new(probe_registry(&probe), 1);
        let id = harness.runner.submit("probe", FlightMap::new()).await.unwrap();

        harness.runner.shutdown().await;
        assert_eq!(
            harness.runner.status(&id).await.unwrap(),
            FlightStatus::Success
        );
        assert_eq!(
            harness.runner.submit("probe", FlightMap::new()).await.unwrap_err(),
            FlightError::Shutdown
        );
        assert_eq!(harness.runner.recover().await.unwrap_err(), FlightError::Shutdown);
    }

    #[test]
    fn test_lock_backoff_scales_with_pool_size() {
        let states = Arc::new(FlightStateStore::new());
        let store = Arc::new(InMemoryResourceStore::new());
        let services =
            FlowServices::in_memory(store, Arc::new(InMemoryStorageDriver::new()), states.clone());
        let runner = InMemoryFlightRunner::new(
            &RunnerConfig::default().with_max_concurrent_flights(4),
            Arc::new(FlightRegistry::new()),
            services,
            states,
        );

        let policy = &runner.services().lock_retry;
        let mut delays = BTreeSet::new();
        for _ in 0..200 {
            let mut state = RetryState::new();
            state.record_attempt();
            match should_retry(&mut state, policy) {
                RetryDecision::Retry(delay) => {
                    delays.insert(delay.as_millis());
                }
                other => panic!("expected a retry, got {other:?}"),
            }
        }

        assert!(delays.is_subset(&BTreeSet::from([500, 1000, 1500, 2000])));
        assert!(delays.len() > 1, "delays never varied: {delays:?}");
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped() {
        let registry = FlightRegistry::new();
        registry.register("noop", |_inputs: &FlightMap, _services: &FlowServices| {
            FlightBuilder::new("noop").step(MockStep::new("a")).build()
        });
        let harness = Harness::new(registry, 2);

        for _ in 0..50 {
            let id = harness.runner.submit("noop", FlightMap::new()).await.unwrap();
            harness.runner.wait(&id).await.unwrap();
        }

        assert!(harness.runner.pending_tasks() <= 2);
        assert_eq!(harness.runner.jobs().len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_awaits_every_accepted_submission() {
        let probe = ConcurrencyProbe::new("work", Duration::from_millis(5));
        let harness = Harness::new(probe_registry(&probe), 2);

        let submits = async {
            let mut accepted = Vec::new();
            for _ in 0..20 {
                if let Ok(id) = harness.runner.submit("probe", FlightMap::new()).await {
                    accepted.push(id);
                }
                tokio::task::yield_now().await;
            }
            accepted
        };
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            harness.runner.shutdown().await;
        };
        let (accepted, ()) = tokio::join!(submits, shutdown);

        assert!(!accepted.is_empty());
        assert_eq!(harness.runner.jobs().len(), accepted.len());
        assert_eq!(harness.runner.pending_tasks(), 0);
        for id in &accepted {
            assert_eq!(
                harness.runner.status(id).await.unwrap(),
                FlightStatus::Success
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_flight_id() {
        let harness = Harness::new(FlightRegistry::new(), 1);
        let missing = FlightId::new("nope");
        assert!(matches!(
            harness.runner.status(&missing).await,
            Err(FlightError::FlightNotFound(_))
        ));
        assert!(matches!(
            harness.runner.wait(&missing).await,
            Err(FlightError::FlightNotFound(_))
        ));
    }
}
