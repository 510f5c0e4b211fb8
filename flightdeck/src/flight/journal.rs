//! Journal of step invocations within one flight run.

use crate::core::{Direction, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one step's `do` or `undo`, including all of its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// Position of the step in the flight.
    pub index: usize,
    /// Which action ran.
    pub direction: Direction,
    /// Number of invocations, including the first.
    pub attempts: u32,
    /// Final status after retries.
    pub status: StepStatus,
    /// Set when an undo could not reverse anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irreversible: Option<String>,
    /// Message of the final error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the first invocation started.
    pub started_at: DateTime<Utc>,
    /// When the last invocation finished.
    pub completed_at: DateTime<Utc>,
}

/// Ordered journal of every step invocation made while running a flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepJournal {
    records: Vec<StepRecord>,
}

impl StepJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    /// Returns every record in execution order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Returns the names of steps whose `do` ran, in order.
    #[must_use]
    pub fn do_order(&self) -> Vec<&str> {
        self.names_in(Direction::Do)
    }

    /// Returns the names of steps whose `undo` ran, in order.
    #[must_use]
    pub fn undo_order(&self) -> Vec<&str> {
        self.names_in(Direction::Undo)
    }

    /// Returns the undo records flagged as irreversible.
    #[must_use]
    pub fn irreversible(&self) -> Vec<&StepRecord> {
        self.records
            .iter()
            .filter(|r| r.irreversible.is_some())
            .collect()
    }

    /// Returns the total number of invocations across all records.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.records.iter().map(|r| r.attempts).sum()
    }

    /// Returns a one-line-per-record summary for display.
    #[must_use]
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|r| {
                let mark = match (r.direction, r.status) {
                    (Direction::Do, StepStatus::Success) => "+",
                    (Direction::Undo, StepStatus::Success) if r.irreversible.is_some() => "~",
                    (Direction::Undo, StepStatus::Success) => "-",
                    _ => "!",
                };
                format!("{mark} {} {} (attempts: {})", r.direction, r.name, r.attempts)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn names_in(&self, direction: Direction) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.direction == direction)
            .map(|r| r.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, direction: Direction, status: StepStatus) -> StepRecord {
        let now = Utc::now();
        StepRecord {
            name: name.to_string(),
            index: 0,
            direction,
            attempts: 1,
            status,
            irreversible: None,
            error: None,
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn test_new_journal_is_empty() {
        let journal = StepJournal::new();
        assert!(journal.records().is_empty());
        assert_eq!(journal.total_attempts(), 0);
    }

    #[test]
    fn test_orders_split_by_direction() {
        let mut journal = StepJournal::new();
        journal.push(record("a", Direction::Do, StepStatus::Success));
        journal.push(record("b", Direction::Do, StepStatus::FailureFatal));
        journal.push(record("b", Direction::Undo, StepStatus::Success));
        journal.push(record("a", Direction::Undo, StepStatus::Success));

        assert_eq!(journal.do_order(), vec!["a", "b"]);
        assert_eq!(journal.undo_order(), vec!["b", "a"]);
    }

    #[test]
    fn test_summary_marks() {
        let mut journal = StepJournal::new();
        journal.push(record("a", Direction::Do, StepStatus::Success));
        let mut undo = record("a", Direction::Undo, StepStatus::Success);
        undo.irreversible = Some("gone".into());
        journal.push(undo);

        assert_eq!(
            journal.summary(),
            "+ do a (attempts: 1)\n~ undo a (attempts: 1)"
        );
        assert_eq!(journal.irreversible().len(), 1);
    }
}
