//! Retry policy: decide what follows a verification result.

use crate::finding::VerificationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of applying the retry policy to one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetryDecision {
    /// The finding is verified; stop and keep it.
    Accept,
    /// Unverified with budget left; ask the critic again.
    Retry,
    /// Unverified and the budget is spent; stop and flag for review.
    Escalate,
}

impl RetryDecision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retry)
    }
}

impl fmt::Display for RetryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Retry => write!(f, "RETRY"),
            Self::Escalate => write!(f, "ESCALATE"),
        }
    }
}

/// Pure decision rule.
///
/// `attempts_used` counts critic evaluations completed so far, including the
/// one that produced `verification`.
pub fn decide(verification: &VerificationResult, attempts_used: u32, max_attempts: u32) -> RetryDecision {
    if verification.verified {
        RetryDecision::Accept
    } else if attempts_used < max_attempts {
        RetryDecision::Retry
    } else {
        RetryDecision::Escalate
    }
}

/// Retry budget for one clause. Only built through [`RetryPolicy::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Budget of `max_attempts` critic evaluations; values below 1 become 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn decide(&self, verification: &VerificationResult, attempts_used: u32) -> RetryDecision {
        decide(verification, attempts_used, self.max_attempts)
    }
}
