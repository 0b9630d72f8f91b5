//! Records produced by a clause audit.

use crate::finding::{Finding, VerificationResult};
use crate::policy::RetryDecision;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a clause audit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalReason {
    /// The finding's evidence was verified against the document.
    Accepted,
    /// The retry budget ran out without a verified finding.
    EscalatedMaxRetries,
    /// The verifier was disabled for the run; the finding was never checked.
    VerificationDisabled,
    /// The run was cancelled or the clause deadline passed.
    Cancelled,
}

impl TerminalReason {
    /// Outcomes whose finding must be surfaced as unverified.
    pub fn is_unverified(&self) -> bool {
        match self {
            Self::EscalatedMaxRetries | Self::Cancelled => true,
            Self::Accepted | Self::VerificationDisabled => false,
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "ACCEPTED",
            Self::EscalatedMaxRetries => "ESCALATED_MAX_RETRIES",
            Self::VerificationDisabled => "VERIFICATION_DISABLED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// One critic + reflector iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditAttempt {
    /// 1-based.
    pub attempt_number: u32,
    pub finding: Finding,
    pub verification: VerificationResult,
    pub decision: RetryDecision,
}

/// Terminal result for one clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub clause_id: String,
    pub final_finding: Finding,
    /// Completed critic evaluations; never exceeds the retry budget.
    pub attempts_used: u32,
    pub terminal_reason: TerminalReason,
    /// Verification of the final finding, when one was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_verification: Option<VerificationResult>,
    #[serde(default)]
    pub attempts: Vec<AuditAttempt>,
}

impl AuditOutcome {
    /// Outcome for a clause whose audit failed outside the loop.
    pub fn failed(clause_id: &str, detail: impl Into<String>) -> Self {
        Self {
            clause_id: clause_id.to_string(),
            final_finding: Finding::error(clause_id, detail),
            attempts_used: 0,
            terminal_reason: TerminalReason::EscalatedMaxRetries,
            final_verification: None,
            attempts: Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.terminal_reason == TerminalReason::Accepted
    }

    pub fn is_unverified(&self) -> bool {
        self.terminal_reason.is_unverified()
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} after {} attempt(s): {}",
            self.clause_id, self.terminal_reason, self.attempts_used, self.final_finding.status
        )
    }
}
