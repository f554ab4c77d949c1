//! Per-run call budget.

use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Raised when a run attempts more calls than its quota.
///
/// The counter is left unchanged, so `total_calls` never exceeds the
/// limit.
#[derive(Debug, Error)]
#[error("Call budget exceeded: limit of {limit} calls reached")]
pub struct BudgetExceeded {
    pub limit: u32,
}

/// What a consumed call was for. Counts are combined across kinds;
/// the kind exists for logs and observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Generation,
    Validation,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Generation => "generation",
            CallKind::Validation => "validation",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counter enforcing the per-run external call quota.
///
/// Created fresh for each stage run, optionally seeded with the call
/// count carried over from a prior partial run.
#[derive(Debug)]
pub struct CallBudget {
    calls: u32,
    limit: u32,
}

impl CallBudget {
    /// Fresh budget with nothing consumed.
    pub fn new(limit: u32) -> Self {
        Self { calls: 0, limit }
    }

    /// Budget seeded from a prior partial run's call count.
    pub fn seeded(limit: u32, carried: u32) -> Self {
        Self {
            calls: carried,
            limit,
        }
    }

    /// Consume one call of the given kind.
    pub fn consume(&mut self, kind: CallKind) -> Result<(), BudgetExceeded> {
        if self.calls >= self.limit {
            return Err(BudgetExceeded { limit: self.limit });
        }
        self.calls += 1;
        debug!(kind = %kind, used = self.calls, limit = self.limit, "consumed call budget");
        Ok(())
    }

    /// Calls consumed so far (read-only, for observability/testing).
    pub fn total_calls(&self) -> u32 {
        self.calls
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_up_to_limit() {
        let mut budget = CallBudget::new(2);
        budget.consume(CallKind::Generation).unwrap();
        budget.consume(CallKind::Validation).unwrap();
        assert_eq!(budget.total_calls(), 2);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_exceeding_limit_leaves_counter_unchanged() {
        let mut budget = CallBudget::new(1);
        budget.consume(CallKind::Generation).unwrap();
        let err = budget.consume(CallKind::Generation).unwrap_err();
        assert_eq!(err.limit, 1);
        assert_eq!(budget.total_calls(), 1);
    }

    #[test]
    fn test_kinds_share_one_quota() {
        let mut budget = CallBudget::new(1);
        budget.consume(CallKind::Validation).unwrap();
        assert!(budget.consume(CallKind::Generation).is_err());
    }

    #[test]
    fn test_seeded_budget_carries_prior_calls() {
        let mut budget = CallBudget::seeded(3, 2);
        assert_eq!(budget.total_calls(), 2);
        budget.consume(CallKind::Generation).unwrap();
        assert!(budget.consume(CallKind::Generation).is_err());
    }

    #[test]
    fn test_zero_limit_rejects_first_call() {
        let mut budget = CallBudget::new(0);
        assert!(budget.consume(CallKind::Generation).is_err());
        assert_eq!(budget.total_calls(), 0);
    }
}
