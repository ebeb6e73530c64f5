//! The result of a tester run.

use crate::conditions::ConditionReport;
use crate::core::ConditionState;
use crate::pipeline::JobStatus;
use serde::Serialize;
use std::time::Duration;

/// Why the tester stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// Every end condition settled.
    ConditionsSettled,
    /// The job ran to the end of its sources.
    JobCompleted,
    /// The deadline elapsed first.
    TimedOut,
}

/// Final snapshot of a run.
///
/// A timeout is reported here rather than as a condition verdict, so "did
/// not converge" stays distinct from "assertion failed".
#[derive(Debug, Clone)]
pub struct Completion {
    /// Why waiting ended.
    pub outcome: CompletionOutcome,
    /// Time from submission to the end of the stop sequence.
    pub elapsed: Duration,
    /// The job's final status.
    pub job_status: JobStatus,
    /// Every registered condition, in registration order.
    pub reports: Vec<ConditionReport>,
}

impl Completion {
    /// True unless the run timed out.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outcome != CompletionOutcome::TimedOut
    }

    /// True if the run timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.outcome == CompletionOutcome::TimedOut
    }

    /// True if every registered condition is valid.
    #[must_use]
    pub fn all_valid(&self) -> bool {
        self.reports.iter().all(|r| r.state == ConditionState::Valid)
    }

    /// Returns the report for the named condition.
    #[must_use]
    pub fn report(&self, name: &str) -> Option<&ConditionReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    /// Returns the reports that are not valid.
    #[must_use]
    pub fn failures(&self) -> Vec<&ConditionReport> {
        self.reports
            .iter()
            .filter(|r| r.state != ConditionState::Valid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, state: ConditionState) -> ConditionReport {
        ConditionReport {
            name: name.to_string(),
            state,
            settled: state.is_decided(),
            observed: 3,
            description: String::new(),
        }
    }

    #[test]
    fn test_timeout_is_not_settled() {
        let completion = Completion {
            outcome: CompletionOutcome::TimedOut,
            elapsed: Duration::from_millis(20),
            job_status: JobStatus::Stopped { produced: 3 },
            reports: vec![report("a", ConditionState::Pending)],
        };
        assert!(completion.is_timed_out());
        assert!(!completion.is_settled());
        assert!(!completion.all_valid());
        assert_eq!(completion.failures().len(), 1);
    }

    #[test]
    fn test_report_lookup() {
        let completion = Completion {
            outcome: CompletionOutcome::JobCompleted,
            elapsed: Duration::ZERO,
            job_status: JobStatus::Completed { produced: 3 },
            reports: vec![report("a", ConditionState::Valid), report("b", ConditionState::Valid)],
        };
        assert!(completion.is_settled());
        assert!(completion.all_valid());
        assert_eq!(completion.report("b").map(|r| r.observed), Some(3));
        assert!(completion.report("c").is_none());
    }

    #[test]
    fn test_outcome_serialize() {
        assert_eq!(
            serde_json::to_string(&CompletionOutcome::ConditionsSettled).unwrap(),
            r#""conditions_settled""#
        );
    }
}
