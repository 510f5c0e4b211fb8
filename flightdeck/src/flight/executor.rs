//! The do/undo state machine.

use super::{Flight, FlightOutcome, StepJournal, StepRecord};
use crate::context::FlightContext;
use crate::core::{Direction, FlightStatus, StepResult};
use crate::errors::FlightError;
use crate::events::{
    EventSink, NoOpEventSink, FLIGHT_COMPLETED, FLIGHT_DIRECTION_SWITCHED, FLIGHT_STARTED,
    STEP_COMPLETED, STEP_RETRYING, STEP_STARTED,
};
use crate::observability::flight_span;
use crate::retry::{should_retry, RetryDecision, RetryState};
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Receives the resume point of a flight after every completed step.
///
/// The runner implements this to keep a durable progress record; after a
/// crash the flight resumes from the last recorded index and direction.
pub trait ProgressRecorder: Send + Sync {
    /// Records the context's current step index, direction and working map.
    fn record_progress(&self, ctx: &FlightContext);
}

/// Runs flights: every `do` in order, then on failure every `undo` in reverse.
#[derive(Clone)]
pub struct FlightExecutor {
    sink: Arc<dyn EventSink>,
    progress: Option<Arc<dyn ProgressRecorder>>,
}

impl std::fmt::Debug for FlightExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightExecutor")
            .field("records_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FlightExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightExecutor {
    /// Creates an executor that emits no events and records no progress.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: Arc::new(NoOpEventSink),
            progress: None,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the progress recorder.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressRecorder>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs a flight to a terminal status.
    ///
    /// Execution starts from the context's step index and direction, so a
    /// context restored from a progress record resumes where it stopped. The
    /// step at that index is re-run from scratch.
    pub async fn run(&self, flight: &Flight, ctx: &mut FlightContext) -> FlightOutcome {
        let span = flight_span(ctx.flight_id(), ctx.flight_type());
        self.run_inner(flight, ctx).instrument(span).await
    }

    async fn run_inner(&self, flight: &Flight, ctx: &mut FlightContext) -> FlightOutcome {
        let mut journal = StepJournal::new();
        let step_count = flight.len();

        info!(
            step_index = ctx.step_index(),
            direction = %ctx.direction(),
            steps = step_count,
            "Flight started"
        );
        self.sink.try_emit(
            FLIGHT_STARTED,
            Some(json!({
                "flight_id": ctx.flight_id(),
                "flight_type": ctx.flight_type(),
                "step_index": ctx.step_index(),
                "direction": ctx.direction(),
                "steps": step_count,
            })),
        );

        if ctx.direction() == Direction::Do {
            if let Some(failure) = self.run_forward(flight, ctx, &mut journal).await {
                self.switch_to_undo(flight, ctx, failure);
            }
        }

        let (status, error) = if ctx.direction() == Direction::Do {
            ctx.set_result(StepResult::success());
            (FlightStatus::Success, None)
        } else {
            self.run_backward(flight, ctx, &mut journal).await
        };

        match status {
            FlightStatus::Success => info!("Flight succeeded"),
            FlightStatus::DismalFailure => error!(
                error = ?error.as_ref().map(ToString::to_string),
                "Flight failed dismally; resource state may be inconsistent"
            ),
            _ => warn!(
                error = ?error.as_ref().map(ToString::to_string),
                "Flight failed; completed steps were undone"
            ),
        }
        self.sink.try_emit(
            FLIGHT_COMPLETED,
            Some(json!({
                "flight_id": ctx.flight_id(),
                "status": status,
                "error": error.as_ref().map(FlightError::details),
            })),
        );

        FlightOutcome {
            flight_id: ctx.flight_id().clone(),
            status,
            error,
            working_map: ctx.working_map().snapshot(),
            journal,
        }
    }

    /// Runs `do` actions from the current index; returns the first failure.
    async fn run_forward(
        &self,
        flight: &Flight,
        ctx: &mut FlightContext,
        journal: &mut StepJournal,
    ) -> Option<StepResult> {
        let mut index = ctx.step_index();
        while index < flight.len() {
            ctx.set_step_index(index);
            let result = self.invoke(flight, index, Direction::Do, ctx, journal).await;
            if !result.is_success() {
                return Some(result);
            }
            index += 1;
            ctx.set_step_index(index);
            self.record_progress(ctx);
        }
        None
    }

    fn switch_to_undo(&self, flight: &Flight, ctx: &mut FlightContext, failure: StepResult) {
        let step = flight.steps()[ctx.step_index()].name().to_string();
        warn!(
            step = %step,
            error = ?failure.error.as_ref().map(ToString::to_string),
            "Step failed; switching to undo"
        );
        self.sink.try_emit(
            FLIGHT_DIRECTION_SWITCHED,
            Some(json!({
                "flight_id": ctx.flight_id(),
                "step": step,
                "step_index": ctx.step_index(),
                "error": failure.error.as_ref().map(FlightError::details),
            })),
        );
        ctx.set_direction(Direction::Undo);
        ctx.set_result(failure);
        self.record_progress(ctx);
    }

    /// Runs `undo` actions from the current index down to zero.
    async fn run_backward(
        &self,
        flight: &Flight,
        ctx: &mut FlightContext,
        journal: &mut StepJournal,
    ) -> (FlightStatus, Option<FlightError>) {
        let mut index = ctx.step_index().min(flight.len().saturating_sub(1));
        loop {
            ctx.set_step_index(index);
            let result = self.invoke(flight, index, Direction::Undo, ctx, journal).await;
            if !result.is_success() {
                let dismal = FlightError::Dismal {
                    step: flight.steps()[index].name().to_string(),
                    message: result
                        .error
                        .as_ref()
                        .map_or_else(|| "undo failed".to_string(), ToString::to_string),
                };
                ctx.set_result(StepResult::fatal(dismal.clone()));
                return (FlightStatus::DismalFailure, Some(dismal));
            }
            if index == 0 {
                break;
            }
            index -= 1;
            ctx.set_step_index(index);
            self.record_progress(ctx);
        }

        let error = ctx
            .result()
            .and_then(|r| r.error.clone())
            .or_else(|| Some(FlightError::Internal("flight unwound without a cause".into())));
        (FlightStatus::Fatal, error)
    }

    /// Invokes one step action under its retry policy and journals the outcome.
    async fn invoke(
        &self,
        flight: &Flight,
        index: usize,
        direction: Direction,
        ctx: &FlightContext,
        journal: &mut StepJournal,
    ) -> StepResult {
        let entry = &flight.steps()[index];
        let name = entry.name();
        let mut state = RetryState::new();
        let started_at = Utc::now();

        let result = loop {
            state.record_attempt();
            debug!(step = %name, index, direction = %direction, attempt = state.attempt, "Step started");
            self.sink.try_emit(
                STEP_STARTED,
                Some(json!({
                    "flight_id": ctx.flight_id(),
                    "step": name,
                    "index": index,
                    "direction": direction,
                    "attempt": state.attempt,
                })),
            );

            let action = match direction {
                Direction::Do => entry.step().do_step(ctx),
                Direction::Undo => entry.step().undo_step(ctx),
            };
            let result = match AssertUnwindSafe(action).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    error!(step = %name, direction = %direction, "Step panicked");
                    StepResult::fatal(FlightError::Internal(format!(
                        "step {name} panicked: {}",
                        panic_message(&*panic)
                    )))
                }
            };

            if !result.is_retryable() {
                break result;
            }

            match should_retry(&mut state, entry.retry()) {
                RetryDecision::Retry(delay) => {
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    debug!(
                        step = %name,
                        attempt = state.attempt,
                        delay_ms,
                        error = ?result.error.as_ref().map(ToString::to_string),
                        "Retrying after error"
                    );
                    self.sink.try_emit(
                        STEP_RETRYING,
                        Some(json!({
                            "flight_id": ctx.flight_id(),
                            "step": name,
                            "direction": direction,
                            "attempt": state.attempt,
                            "delay_ms": delay_ms,
                        })),
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    debug!(step = %name, attempts = state.attempt, "Retry budget exhausted");
                    break result.escalate();
                }
            }
        };

        if let Some(note) = &result.irreversible {
            info!(step = %name, note = %note, "Undo could not reverse the step");
        }
        self.sink.try_emit(
            STEP_COMPLETED,
            Some(json!({
                "flight_id": ctx.flight_id(),
                "step": name,
                "index": index,
                "direction": direction,
                "status": result.status,
                "attempts": state.attempt,
            })),
        );
        journal.push(StepRecord {
            name: name.to_string(),
            index,
            direction,
            attempts: state.attempt,
            status: result.status,
            irreversible: result.irreversible.clone(),
            error: result.error.as_ref().map(ToString::to_string),
            started_at,
            completed_at: Utc::now(),
        });

        result
    }

    fn record_progress(&self, ctx: &FlightContext) {
        if let Some(progress) = &self.progress {
            progress.record_progress(ctx);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
