//! Test assertions for conditions and completions.

use crate::conditions::Condition;
use crate::core::ConditionState;
use crate::tester::Completion;

/// Asserts that the condition is valid.
pub fn assert_valid(condition: &Condition) {
    assert!(
        condition.is_valid(),
        "Expected condition '{}' to be valid, got {}: {}",
        condition.name(),
        condition.state(),
        condition.describe()
    );
}

/// Asserts that the condition is invalid.
pub fn assert_invalid(condition: &Condition) {
    assert_eq!(
        condition.state(),
        ConditionState::Invalid,
        "Expected condition '{}' to be invalid: {}",
        condition.name(),
        condition.describe()
    );
}

/// Asserts that the condition has not reached a verdict.
pub fn assert_pending(condition: &Condition) {
    assert_eq!(
        condition.state(),
        ConditionState::Pending,
        "Expected condition '{}' to be pending: {}",
        condition.name(),
        condition.describe()
    );
}

/// Asserts that the run ended without timing out.
pub fn assert_settled(completion: &Completion) {
    assert!(
        completion.is_settled(),
        "Expected a settled run, got {:?} after {:?}",
        completion.outcome,
        completion.elapsed
    );
}

/// Asserts that the run hit its deadline.
pub fn assert_timed_out(completion: &Completion) {
    assert!(
        completion.is_timed_out(),
        "Expected a timeout, got {:?} after {:?}",
        completion.outcome,
        completion.elapsed
    );
}
