//! Mock steps for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::context::FlightContext;
use crate::core::StepResult;
use crate::errors::FlightError;
use crate::steps::Step;

/// Shared, ordered log of step invocations such as `"lock.do"` or `"lock.undo"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A mock step with scripted results that records every invocation.
///
/// Scripted results are returned first, in order; once the script is empty the
/// step returns its default result. Both default to success.
#[derive(Debug)]
pub struct MockStep {
    name: String,
    log: Option<CallLog>,
    do_script: Mutex<VecDeque<StepResult>>,
    do_default: StepResult,
    undo_script: Mutex<VecDeque<StepResult>>,
    undo_default: StepResult,
    do_calls: Mutex<u32>,
    undo_calls: Mutex<u32>,
    panic_on_do: bool,
    delay: Option<Duration>,
}

impl MockStep {
    /// Creates a mock step that always succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: None,
            do_script: Mutex::new(VecDeque::new()),
            do_default: StepResult::success(),
            undo_script: Mutex::new(VecDeque::new()),
            undo_default: StepResult::success(),
            do_calls: Mutex::new(0),
            undo_calls: Mutex::new(0),
            panic_on_do: false,
            delay: None,
        }
    }

    /// Records invocations into a shared log.
    #[must_use]
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    /// Makes every `do` fail fatally.
    #[must_use]
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.with_do_result(StepResult::fatal(FlightError::Internal(message.into())))
    }

    /// Makes every `do` fail retryably.
    #[must_use]
    pub fn retrying(self, message: impl Into<String>) -> Self {
        self.with_do_result(StepResult::retry(FlightError::Transient(message.into())))
    }

    /// Makes the first `failures` invocations of `do` fail retryably.
    #[must_use]
    pub fn flaky(self, failures: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        {
            let mut script = self.do_script.lock();
            for _ in 0..failures {
                script.push_back(StepResult::retry(FlightError::Transient(message.clone())));
            }
        }
        self
    }

    /// Sets the default `do` result.
    #[must_use]
    pub fn with_do_result(mut self, result: StepResult) -> Self {
        self.do_default = result;
        self
    }

    /// Sets the default `undo` result.
    #[must_use]
    pub fn with_undo_result(mut self, result: StepResult) -> Self {
        self.undo_default = result;
        self
    }

    /// Makes every `undo` fail fatally.
    #[must_use]
    pub fn failing_undo(self, message: impl Into<String>) -> Self {
        self.with_undo_result(StepResult::fatal(FlightError::Internal(message.into())))
    }

    /// Makes `do` panic.
    #[must_use]
    pub fn panicking(mut self) -> Self {
        self.panic_on_do = true;
        self
    }

    /// Sleeps before every `do`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of `do` invocations.
    #[must_use]
    pub fn do_calls(&self) -> u32 {
        *self.do_calls.lock()
    }

    /// Returns the number of `undo` invocations.
    #[must_use]
    pub fn undo_calls(&self) -> u32 {
        *self.undo_calls.lock()
    }

    fn log(&self, action: &str) {
        if let Some(log) = &self.log {
            log.lock().push(format!("{}.{action}", self.name));
        }
    }
}

#[async_trait]
impl Step for MockStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, _ctx: &FlightContext) -> StepResult {
        *self.do_calls.lock() += 1;
        self.log("do");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        assert!(!self.panic_on_do, "{} exploded", self.name);
        let scripted = self.do_script.lock().pop_front();
        scripted.unwrap_or_else(|| self.do_default.clone())
    }

    async fn undo_step(&self, _ctx: &FlightContext) -> StepResult {
        *self.undo_calls.lock() += 1;
        self.log("undo");
        let scripted = self.undo_script.lock().pop_front();
        scripted.unwrap_or_else(|| self.undo_default.clone())
    }
}

/// A step that tracks how many instances of it run at the same time.
#[derive(Debug)]
pub struct ConcurrencyProbe {
    name: String,
    hold: Duration,
    active: Arc<Mutex<usize>>,
    peak: Arc<Mutex<usize>>,
}

impl ConcurrencyProbe {
    /// Creates a probe that holds its slot for `hold` on every `do`.
    #[must_use]
    pub fn new(name: impl Into<String>, hold: Duration) -> Self {
        Self {
            name: name.into(),
            hold,
            active: Arc::new(Mutex::new(0)),
            peak: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates another probe sharing this one's counters.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            name: self.name.clone(),
            hold: self.hold,
            active: Arc::clone(&self.active),
            peak: Arc::clone(&self.peak),
        }
    }

    /// Returns the highest number of simultaneous `do` invocations observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        *self.peak.lock()
    }
}

#[async_trait]
impl Step for ConcurrencyProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, _ctx: &FlightContext) -> StepResult {
        {
            let mut active = self.active.lock();
            *active += 1;
            let mut peak = self.peak.lock();
            *peak = (*peak).max(*active);
        }
        tokio::time::sleep(self.hold).await;
        *self.active.lock() -= 1;
        StepResult::success()
    }
}
