//! Markdown compliance report.
//!
//! Findings whose evidence was never verified (escalated or cancelled) are
//! listed in their own section and never mixed with verified ones. A run
//! with verification disabled says so at the top.

pub mod redline;
pub mod risk;
pub mod summary;

use crate::finding::FindingStatus;
use crate::orchestrator::{AuditOutcome, TerminalReason};
use risk::{RiskProfile, Severity};
use std::fmt::Write;
use summary::NarrativeSummary;

/// Inputs for one rendered report.
pub struct ComplianceReport<'a> {
    contract_name: String,
    outcomes: &'a [AuditOutcome],
    risk: RiskProfile,
    redlines: Vec<Option<String>>,
    verification_disabled: Option<String>,
    narrative: Option<NarrativeSummary>,
}

impl<'a> ComplianceReport<'a> {
    pub fn new(contract_name: &str, outcomes: &'a [AuditOutcome]) -> Self {
        Self {
            contract_name: contract_name.to_string(),
            outcomes,
            risk: risk::score_outcomes(outcomes),
            redlines: Vec::new(),
            verification_disabled: None,
            narrative: None,
        }
    }

    /// Suggested rewrites aligned with the outcomes by position.
    pub fn with_redlines(mut self, redlines: Vec<Option<String>>) -> Self {
        self.redlines = redlines;
        self
    }

    pub fn with_verification_disabled(mut self, reason: Option<String>) -> Self {
        self.verification_disabled = reason;
        self
    }

    pub fn with_narrative(mut self, narrative: Option<NarrativeSummary>) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn risk(&self) -> &RiskProfile {
        &self.risk
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Compliance Report: {}", self.contract_name)?;
        writeln!(out)?;

        if let Some(reason) = &self.verification_disabled {
            writeln!(
                out,
                "> **Verification disabled** ({}). No quote in this report was checked against the document.",
                reason
            )?;
            writeln!(out)?;
        }

        self.write_summary(out)?;
        if let Some(narrative) = &self.narrative {
            writeln!(out, "## English Audit Summary")?;
            writeln!(out, "{}", narrative.english)?;
            writeln!(out)?;
            writeln!(out, "## Arabic Audit Summary (ملخص التدقيق)")?;
            writeln!(out, "{}", narrative.arabic)?;
            writeln!(out)?;
            writeln!(out, "---")?;
            writeln!(out)?;
        }

        let (unverified, verified): (Vec<usize>, Vec<usize>) =
            (0..self.outcomes.len()).partition(|&i| self.outcomes[i].is_unverified());

        writeln!(out, "## Detailed Findings")?;
        writeln!(out)?;
        let mut compliant = 0;
        let mut wrote_any = false;
        for &i in &verified {
            let outcome = &self.outcomes[i];
            if outcome.final_finding.status == FindingStatus::Compliant {
                compliant += 1;
                continue;
            }
            self.write_finding(out, i)?;
            wrote_any = true;
        }
        if !wrote_any {
            writeln!(out, "No violations or missing clauses found.")?;
            writeln!(out)?;
        }
        if compliant > 0 {
            writeln!(out, "{} clause(s) compliant.", compliant)?;
            writeln!(out)?;
        }

        if !unverified.is_empty() {
            writeln!(out, "## Unverified Findings")?;
            writeln!(out)?;
            writeln!(
                out,
                "The evidence for these findings could not be verified against the document. Review them manually."
            )?;
            writeln!(out)?;
            for &i in &unverified {
                self.write_finding(out, i)?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "## Executive Summary")?;
        writeln!(
            out,
            "**Overall Risk Score**: {}/100 ({})",
            self.risk.risk_score, self.risk.risk_level
        )?;
        writeln!(out)?;
        writeln!(out, "| Severity | Count |")?;
        writeln!(out, "| :--- | :--- |")?;
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
            writeln!(
                out,
                "| {} {} | {} |",
                severity.emoji(),
                severity,
                self.risk.breakdown.count(severity)
            )?;
        }
        writeln!(out)?;

        let unverified = self.outcomes.iter().filter(|o| o.is_unverified()).count();
        writeln!(
            out,
            "Clauses audited: {}. Unverified: {}. Unverified violations scored: {}.",
            self.outcomes.len(),
            unverified,
            self.risk.unverified_violations
        )?;
        writeln!(out)?;
        writeln!(out, "---")?;
        writeln!(out)?;
        Ok(())
    }

    fn write_finding(&self, out: &mut String, position: usize) -> std::fmt::Result {
        let outcome = &self.outcomes[position];
        let finding = &outcome.final_finding;

        writeln!(out, "### {} Clause {}", finding.status.emoji(), outcome.clause_id)?;
        writeln!(out, "**Status**: {}", finding.status)?;
        writeln!(out)?;
        writeln!(out, "**Outcome**: {}", describe_outcome(outcome))?;
        writeln!(out)?;
        if !finding.reasoning.is_empty() {
            writeln!(out, "**Finding**: {}", finding.reasoning)?;
            writeln!(out)?;
        }
        if !finding.law_reference.is_empty() {
            writeln!(out, "**Law**: {}", finding.law_reference)?;
            writeln!(out)?;
        }
        if finding.has_quote() {
            writeln!(out, "**Quoted text**: \"{}\"", finding.source_quote)?;
            writeln!(out)?;
        }
        if let Some(Some(fix)) = self.redlines.get(position) {
            writeln!(out, "> **Suggested Fix**: *{}*", fix)?;
            writeln!(out)?;
        }
        writeln!(out, "---")?;
        Ok(())
    }
}

fn describe_outcome(outcome: &AuditOutcome) -> String {
    let reason = outcome
        .final_verification
        .as_ref()
        .map(|v| v.reason.as_str())
        .unwrap_or("");
    match outcome.terminal_reason {
        TerminalReason::Accepted => format!("verified after {} attempt(s)", outcome.attempts_used),
        TerminalReason::VerificationDisabled => "not verified (verification disabled)".to_string(),
        TerminalReason::EscalatedMaxRetries if reason.is_empty() => {
            format!("UNVERIFIED after {} attempt(s)", outcome.attempts_used)
        }
        TerminalReason::EscalatedMaxRetries => {
            format!("UNVERIFIED after {} attempt(s): {}", outcome.attempts_used, reason)
        }
        TerminalReason::Cancelled => format!("CANCELLED after {} attempt(s)", outcome.attempts_used),
    }
}
