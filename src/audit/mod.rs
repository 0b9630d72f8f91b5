//! Persistent record of audit runs.

pub mod logger;

pub use logger::AuditLogger;

use crate::orchestrator::{AuditOutcome, TerminalReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One invocation of `clause-audit audit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub config: RunConfig,
    pub outcomes: Vec<AuditOutcome>,
}

impl AuditRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            config,
            outcomes: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_outcomes(&self.outcomes)
    }
}

/// Effective settings a run was executed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    pub namespace: String,
    pub max_attempts: u32,
    pub similarity_threshold: f64,
    pub concurrency: usize,
    pub backend: String,
    /// `None` when verification was active; otherwise why it was disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_disabled: Option<String>,
}

/// Outcome counts by terminal reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub accepted: usize,
    pub escalated: usize,
    pub verification_disabled: usize,
    pub cancelled: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[AuditOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.terminal_reason {
                TerminalReason::Accepted => summary.accepted += 1,
                TerminalReason::EscalatedMaxRetries => summary.escalated += 1,
                TerminalReason::VerificationDisabled => summary.verification_disabled += 1,
                TerminalReason::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Outcomes that must be flagged for human review.
    pub fn unverified(&self) -> usize {
        self.escalated + self.cancelled
    }
}
