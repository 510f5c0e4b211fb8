//! In-process flight runner.

use super::{
    retrieve_job_result, FlightRunner, FlightState, FlightStateStore, JobResult, JobView,
    WorkerPool,
};
use crate::config::RunnerConfig;
use crate::context::{FlightId, FlightMap};
use crate::core::FlightStatus;
use crate::errors::FlightError;
use crate::events::EventSink;
use crate::flight::{Flight, FlightExecutor};
use crate::flows::{FlightRegistry, FlowServices};
use crate::observability::runner_span;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

type Watchers = Arc<Mutex<HashMap<FlightId, watch::Sender<FlightStatus>>>>;

/// Runs flights as tokio tasks on a bounded worker pool.
///
/// Flight state is written to a [`FlightStateStore`] after every completed
/// step. If the process stops, a new runner over the same store can pick up
/// unfinished flights with [`InMemoryFlightRunner::recover`].
///
/// Flights are spawned with [`tokio::spawn`], so submission and recovery must
/// be called from within a tokio runtime.
pub struct InMemoryFlightRunner {
    registry: Arc<FlightRegistry>,
    services: FlowServices,
    states: Arc<FlightStateStore>,
    pool: WorkerPool,
    executor: FlightExecutor,
    watchers: Watchers,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
}

impl std::fmt::Debug for InMemoryFlightRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFlightRunner")
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .field("flights", &self.states.len())
            .field("accepting", &self.accepting.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InMemoryFlightRunner {
    /// Creates a runner.
    ///
    /// `states` is both the progress record and, usually, the status lookup
    /// inside `services`.
    #[must_use]
    pub fn new(
        config: &RunnerConfig,
        registry: Arc<FlightRegistry>,
        mut services: FlowServices,
        states: Arc<FlightStateStore>,
    ) -> Self {
        services.lock_retry = services
            .lock_retry
            .scaled_to_pool(config.max_concurrent_flights);
        let pool_size = usize::try_from(config.max_concurrent_flights).unwrap_or(usize::MAX);
        let executor = FlightExecutor::new().with_progress(states.clone());
        Self {
            registry,
            services,
            states,
            pool: WorkerPool::new(pool_size),
            executor,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Sets the event sink used for every flight.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.executor = self.executor.with_sink(sink);
        self
    }

    /// Returns the flight state store.
    #[must_use]
    pub fn states(&self) -> &Arc<FlightStateStore> {
        &self.states
    }

    /// Returns the worker pool.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Returns the services flights are built with.
    #[must_use]
    pub fn services(&self) -> &FlowServices {
        &self.services
    }

    /// Number of launched flight tasks not yet reaped.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Submits a flight with a description shown in its job view.
    ///
    /// The flight is built before anything is stored, so unknown types and
    /// bad inputs are rejected without leaving a row behind.
    pub async fn submit_with_description(
        &self,
        flight_type: &str,
        inputs: FlightMap,
        description: Option<String>,
    ) -> Result<FlightId, FlightError> {
        self.submit_now(flight_type, inputs, description)
    }

    fn submit_now(
        &self,
        flight_type: &str,
        inputs: FlightMap,
        description: Option<String>,
    ) -> Result<FlightId, FlightError> {
        let _span = runner_span("submit").entered();
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(FlightError::Shutdown);
        }

        let flight = self.registry.build(flight_type, &inputs, &self.services)?;
        let flight_id = FlightId::generate();
        let state = FlightState::new(flight_id.clone(), flight_type, inputs)
            .with_description(description);

        self.launch(flight, state)?;
        info!(flight_id = %flight_id, flight_type, "Flight submitted");
        Ok(flight_id)
    }

    /// Resumes every unfinished flight in the state store that this runner is
    /// not already executing.
    ///
    /// Each flight is rebuilt through the registry and continues from its
    /// recorded step index and direction. A flight that can no longer be built
    /// is marked fatal. Returns the number of flights resumed.
    pub async fn recover(&self) -> Result<usize, FlightError> {
        self.recover_now()
    }

    fn recover_now(&self) -> Result<usize, FlightError> {
        let _span = runner_span("recover").entered();
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(FlightError::Shutdown);
        }

        let mut resumed = 0;
        for mut state in self.states.non_terminal() {
            if self.watchers.lock().contains_key(&state.flight_id) {
                continue;
            }
            match self
                .registry
                .build(&state.flight_type, &state.input_parameters, &self.services)
            {
                Ok(flight) => {
                    info!(
                        flight_id = %state.flight_id,
                        flight_type = %state.flight_type,
                        step_index = state.step_index,
                        direction = %state.direction,
                        "Resuming flight"
                    );
                    state.status = FlightStatus::ReadyToRestart;
                    self.launch(flight, state)?;
                    resumed += 1;
                }
                Err(e) => {
                    warn!(
                        flight_id = %state.flight_id,
                        flight_type = %state.flight_type,
                        error = %e,
                        "Cannot rebuild flight; marking it fatal"
                    );
                    state.status = FlightStatus::Fatal;
                    state.error = Some(e);
                    state.completed_at = Some(Utc::now());
                    self.states.insert(state);
                }
            }
        }
        Ok(resumed)
    }

    /// Stops accepting submissions and waits for every launched flight.
    pub async fn shutdown(&self) {
        let handles = {
            let mut tasks = self.tasks.lock();
            self.accepting.store(false, Ordering::SeqCst);
            std::mem::take(&mut *tasks)
        };
        info!(flights = handles.len(), "Runner shutting down");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Flight task ended abnormally");
            }
        }
        self.pool.close();
    }

    /// Returns the job view of a flight.
    pub fn job(&self, flight_id: &FlightId) -> Result<JobView, FlightError> {
        self.state(flight_id).map(|state| JobView::from_state(&state))
    }

    /// Lists every flight as a job, oldest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<JobView> {
        self.states.list().iter().map(JobView::from_state).collect()
    }

    /// Returns the job result of a flight; 202 while it is still active.
    pub fn job_result(&self, flight_id: &FlightId) -> Result<JobResult, FlightError> {
        retrieve_job_result(&self.state(flight_id)?)
    }

    fn state(&self, flight_id: &FlightId) -> Result<FlightState, FlightError> {
        self.states
            .get(flight_id)
            .ok_or_else(|| FlightError::FlightNotFound(flight_id.to_string()))
    }

    /// Stores the state and spawns the flight's task.
    ///
    /// The watcher goes in before the state, so anyone who sees an active
    /// state can also wait on it. The task list lock is held from the
    /// shutdown check until the handle is pushed, so `shutdown` awaits every
    /// flight that got past it. Finished handles are reaped here.
    fn launch(&self, flight: Flight, state: FlightState) -> Result<(), FlightError> {
        let mut tasks = self.tasks.lock();
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(FlightError::Shutdown);
        }
        tasks.retain(|handle| !handle.is_finished());

        let flight_id = state.flight_id.clone();
        let mut ctx = state.to_context();
        let (tx, _) = watch::channel(state.status);
        self.watchers.lock().insert(flight_id.clone(), tx);
        self.states.insert(state);

        let pool = self.pool.clone();
        let executor = self.executor.clone();
        let states = Arc::clone(&self.states);
        let watchers = Arc::clone(&self.watchers);
        let span = runner_span("execute");

        let handle = tokio::spawn(
            async move {
                let _permit = match pool.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!(flight_id = %flight_id, error = %e, "Flight never started");
                        watchers.lock().remove(&flight_id);
                        return;
                    }
                };

                states.set_status(&flight_id, FlightStatus::Running);
                if let Some(tx) = watchers.lock().get(&flight_id) {
                    tx.send_replace(FlightStatus::Running);
                }

                let outcome = executor.run(&flight, &mut ctx).await;
                states.complete(&outcome);
                if let Some(tx) = watchers.lock().remove(&flight_id) {
                    tx.send_replace(outcome.status);
                }
            }
            .instrument(span),
        );
        tasks.push(handle);
        Ok(())
    }
}

#[async_trait]
impl FlightRunner for InMemoryFlightRunner {
    async fn submit(&self, flight_type: &str, inputs: FlightMap) -> Result<FlightId, FlightError> {
        self.submit_with_description(flight_type, inputs, None).await
    }

    async fn status(&self, flight_id: &FlightId) -> Result<FlightStatus, FlightError> {
        self.state(flight_id).map(|state| state.status)
    }

    async fn wait(&self, flight_id: &FlightId) -> Result<FlightState, FlightError> {
        let receiver = self
            .watchers
            .lock()
            .get(flight_id)
            .map(watch::Sender::subscribe);
        if let Some(mut receiver) = receiver {
            // A dropped sender means the task is gone; the stored state is final.
            let _ = receiver.wait_for(FlightStatus::is_terminal).await;
        }
        self.state(flight_id)
    }

    async fn result(&self, flight_id: &FlightId) -> Result<FlightMap, FlightError> {
        let state = self.state(flight_id)?;
        match state.status {
            status if status.is_active() => Err(FlightError::JobNotComplete(flight_id.to_string())),
            FlightStatus::Success => Ok(state.working_map),
            status => Err(state.error.unwrap_or_else(|| {
                FlightError::Internal(format!("flight {flight_id} ended {status} without error"))
            })),
        }
    }
}
