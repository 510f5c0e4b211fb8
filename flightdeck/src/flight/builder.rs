//! Flight definition and builder.

use crate::errors::FlightError;
use crate::retry::RetryPolicy;
use crate::steps::Step;
use std::sync::Arc;

/// One entry of a flight: a step paired with its retry policy.
#[derive(Debug, Clone)]
pub struct FlightStep {
    step: Arc<dyn Step>,
    retry: RetryPolicy,
}

impl FlightStep {
    /// Returns the step.
    #[must_use]
    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// Returns the step's retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the step's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.step.name()
    }
}

/// An ordered, immutable pipeline of steps representing one logical operation.
#[derive(Debug, Clone)]
pub struct Flight {
    flight_type: String,
    steps: Vec<FlightStep>,
}

impl Flight {
    /// Returns the flight type.
    #[must_use]
    pub fn flight_type(&self) -> &str {
        &self.flight_type
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[FlightStep] {
        &self.steps
    }

    /// Returns the step names in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(FlightStep::name).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a built flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for [`Flight`]s.
///
/// Step order is fixed at construction; steps added with [`FlightBuilder::step`]
/// use the builder's default retry policy.
#[derive(Debug)]
pub struct FlightBuilder {
    flight_type: String,
    steps: Vec<FlightStep>,
    default_retry: RetryPolicy,
}

impl FlightBuilder {
    /// Creates a builder for a flight type.
    #[must_use]
    pub fn new(flight_type: impl Into<String>) -> Self {
        Self {
            flight_type: flight_type.into(),
            steps: Vec::new(),
            default_retry: RetryPolicy::None,
        }
    }

    /// Sets the policy used by steps added without an explicit one.
    #[must_use]
    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Appends a step with the default retry policy.
    #[must_use]
    pub fn step(self, step: impl Step + 'static) -> Self {
        let policy = self.default_retry.clone();
        self.step_with_retry(step, policy)
    }

    /// Appends a step with its own retry policy.
    #[must_use]
    pub fn step_with_retry(self, step: impl Step + 'static, retry: RetryPolicy) -> Self {
        self.shared_step(Arc::new(step), retry)
    }

    /// Appends an already shared step.
    #[must_use]
    pub fn shared_step(mut self, step: Arc<dyn Step>, retry: RetryPolicy) -> Self {
        self.steps.push(FlightStep { step, retry });
        self
    }

    /// Returns the number of steps added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Builds the flight.
    ///
    /// # Errors
    ///
    /// Returns [`FlightError::Config`] if the flight has no steps.
    pub fn build(self) -> Result<Flight, FlightError> {
        if self.steps.is_empty() {
            return Err(FlightError::Config(format!(
                "flight {} has no steps",
                self.flight_type
            )));
        }
        Ok(Flight {
            flight_type: self.flight_type,
            steps: self.steps,
        })
    }
}
