//! Narrative executive summaries, one per report language.

use super::risk::{RiskProfile, Severity};
use crate::critic::backend::{CompletionRequest, ReasoningBackend};
use crate::orchestrator::AuditOutcome;
use std::fmt;
use std::sync::Arc;

/// Returned in place of a summary when the reasoning call fails.
pub const SUMMARY_FAILED: &str = "Summary unavailable: the reasoning service did not respond.";

/// Violations quoted to the model as examples.
const SAMPLE_VIOLATIONS: usize = 3;

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an executive legal assistant.
Write a concise executive summary of a contract compliance audit for C-level readers.

Rules:
1. Highlight the most critical issues in the findings provided.
2. A finding marked UNVERIFIED could not be traced to the contract text. Say so whenever you mention it; never present it as established.
3. Keep it professional: two or three short paragraphs, no headings."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLanguage {
    English,
    Arabic,
}

impl fmt::Display for SummaryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::English => write!(f, "English"),
            Self::Arabic => write!(f, "Arabic"),
        }
    }
}

/// The report's narrative sections.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeSummary {
    pub english: String,
    pub arabic: String,
}

/// Writes narrative summaries through a reasoning backend.
#[derive(Clone)]
pub struct Summarizer {
    backend: Arc<dyn ReasoningBackend>,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Both languages, requested concurrently.
    pub async fn summarize(
        &self,
        contract_name: &str,
        risk: &RiskProfile,
        outcomes: &[AuditOutcome],
    ) -> NarrativeSummary {
        let (english, arabic) = tokio::join!(
            self.summarize_in(contract_name, risk, outcomes, SummaryLanguage::English),
            self.summarize_in(contract_name, risk, outcomes, SummaryLanguage::Arabic),
        );
        NarrativeSummary { english, arabic }
    }

    pub async fn summarize_in(
        &self,
        contract_name: &str,
        risk: &RiskProfile,
        outcomes: &[AuditOutcome],
        language: SummaryLanguage,
    ) -> String {
        let request = build_summary_request(contract_name, risk, outcomes, language);
        match self.backend.complete(&request).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                tracing::warn!(%language, "summary reply was empty");
                SUMMARY_FAILED.to_string()
            }
            Err(e) => {
                tracing::warn!(%language, error = %e, "summary generation failed");
                SUMMARY_FAILED.to_string()
            }
        }
    }
}

pub fn build_summary_request(
    contract_name: &str,
    risk: &RiskProfile,
    outcomes: &[AuditOutcome],
    language: SummaryLanguage,
) -> CompletionRequest {
    let mut samples: Vec<String> = outcomes
        .iter()
        .filter(|o| o.final_finding.is_violation())
        .take(SAMPLE_VIOLATIONS)
        .map(|o| {
            let f = &o.final_finding;
            let marker = if o.is_unverified() { " [UNVERIFIED]" } else { "" };
            format!(
                "- Clause {}{}: {} ({})",
                o.clause_id, marker, f.reasoning, f.law_reference
            )
        })
        .collect();
    if samples.is_empty() {
        samples.push("- No violations found.".to_string());
    }

    let user = format!(
        "Write the summary for the contract \"{name}\" in {language}.\n\n\
         Risk Level: {level} (Score: {score}/100)\n\
         Critical Violations: {critical}\n\
         Unverified Violations: {unverified}\n\n\
         Findings Sample:\n{samples}\n",
        name = contract_name,
        language = language,
        level = risk.risk_level,
        score = risk.risk_score,
        critical = risk.breakdown.count(Severity::Critical),
        unverified = risk.unverified_violations,
        samples = samples.join("\n"),
    );
    CompletionRequest::new(SUMMARY_SYSTEM_PROMPT, user)
}
