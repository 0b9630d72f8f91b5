//! Contract risk scoring over terminal findings.
//!
//! Each VIOLATION is bucketed by keywords found in its reasoning and clause
//! id, the bucket points are summed and capped at 100, and the total is
//! banded into a level.

use crate::finding::{Finding, FindingStatus};
use crate::orchestrator::AuditOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score ceiling.
pub const MAX_RISK_SCORE: u32 = 100;

const CRITICAL_KEYWORDS: &[&str] = &["termination", "liability", "indemnity", "penalty"];
const HIGH_KEYWORDS: &[&str] = &["payment", "confidentiality", "intellectual property"];
const MEDIUM_KEYWORDS: &[&str] = &["notice", "jurisdiction"];

/// Severity bucket for a violation, and the level band for a whole contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn points(&self) -> u32 {
        match self {
            Self::Critical => 25,
            Self::High => 15,
            Self::Medium => 10,
            Self::Low => 2,
        }
    }

    /// Level band for a capped score.
    pub fn for_score(score: u32) -> Self {
        match score {
            80.. => Self::Critical,
            50..=79 => Self::High,
            20..=49 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::High => "🟠",
            Self::Medium => "🟡",
            Self::Low => "🟢",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

/// Violation counts per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityBreakdown {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Risk assessment for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// 0 to 100, higher is riskier.
    pub risk_score: u32,
    pub risk_level: Severity,
    pub breakdown: SeverityBreakdown,
    /// Scored violations whose evidence was never verified.
    pub unverified_violations: usize,
}

/// Classify a violation by keyword.
pub fn infer_severity(finding: &Finding) -> Severity {
    let text = format!("{} {}", finding.reasoning, finding.clause_id).to_lowercase();
    let hit = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if hit(CRITICAL_KEYWORDS) {
        Severity::Critical
    } else if hit(HIGH_KEYWORDS) {
        Severity::High
    } else if hit(MEDIUM_KEYWORDS) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Score findings; only VIOLATIONs contribute.
pub fn score_findings<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> RiskProfile {
    score(findings.into_iter().map(|f| (f, false)))
}

/// Score terminal outcomes, tracking violations that were never verified.
pub fn score_outcomes(outcomes: &[AuditOutcome]) -> RiskProfile {
    score(outcomes.iter().map(|o| (&o.final_finding, o.is_unverified())))
}

fn score<'a>(findings: impl Iterator<Item = (&'a Finding, bool)>) -> RiskProfile {
    let mut breakdown = SeverityBreakdown::default();
    let mut points = 0u32;
    let mut unverified_violations = 0;

    for (finding, unverified) in findings {
        match finding.status {
            FindingStatus::Violation => {}
            FindingStatus::Compliant | FindingStatus::Missing | FindingStatus::Error => continue,
        }
        let severity = infer_severity(finding);
        breakdown.record(severity);
        points = points.saturating_add(severity.points());
        if unverified {
            unverified_violations += 1;
        }
    }

    let risk_score = points.min(MAX_RISK_SCORE);
    RiskProfile {
        risk_score,
        risk_level: Severity::for_score(risk_score),
        breakdown,
        unverified_violations,
    }
}
