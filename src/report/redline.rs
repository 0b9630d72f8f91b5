//! Suggested compliant rewrites for violating clauses.

use crate::critic::backend::{CompletionRequest, ReasoningBackend};
use crate::finding::{Finding, FindingStatus};
use crate::orchestrator::AuditOutcome;
use std::sync::Arc;

/// Returned in place of a suggestion when the reasoning call fails.
pub const SUGGESTION_FAILED: &str = "Error generating suggestion.";

/// Stands in for the clause text when the finding carries no quote.
pub const TEXT_UNAVAILABLE: &str = "Text unavailable";

const REDLINE_TEMPERATURE: f32 = 0.2;

const REDLINE_SYSTEM_PROMPT: &str = r#"You are a legal expert.
Rewrite the contract clause so that it complies with the cited UAE law.

Rules:
1. Keep the original intent of the clause as far as possible.
2. Change only what is needed to remove the violation.
3. Use formal legal language.
4. Output ONLY the rewritten clause text. No markdown, no explanations."#;

/// Requests rewrites through a reasoning backend.
#[derive(Clone)]
pub struct Redliner {
    backend: Arc<dyn ReasoningBackend>,
}

impl Redliner {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Suggest a rewrite. `None` for anything but a VIOLATION.
    pub async fn suggest(&self, finding: &Finding) -> Option<String> {
        match finding.status {
            FindingStatus::Violation => {}
            FindingStatus::Compliant | FindingStatus::Missing | FindingStatus::Error => return None,
        }

        let request = build_redline_request(finding);
        match self.backend.complete(&request).await {
            Ok(reply) => Some(reply.trim().to_string()),
            Err(e) => {
                tracing::warn!(clause_id = %finding.clause_id, error = %e, "redline generation failed");
                Some(SUGGESTION_FAILED.to_string())
            }
        }
    }

    /// One entry per outcome, aligned by position.
    pub async fn suggest_all(&self, outcomes: &[AuditOutcome]) -> Vec<Option<String>> {
        let mut suggestions = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            suggestions.push(self.suggest(&outcome.final_finding).await);
        }
        suggestions
    }
}

pub fn build_redline_request(finding: &Finding) -> CompletionRequest {
    let clause_text = if finding.has_quote() {
        finding.source_quote.as_str()
    } else {
        TEXT_UNAVAILABLE
    };
    let user = format!(
        "Original Clause: \"{}\"\nViolation Reasoning: \"{}\"\nCited Law: \"{}\"\n\nRewritten Clause:\n",
        clause_text, finding.reasoning, finding.law_reference
    );
    CompletionRequest::new(REDLINE_SYSTEM_PROMPT, user).with_temperature(REDLINE_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReasoningError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedBackend {
        reply: Option<String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedBackend {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReasoningBackend for FixedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ReasoningError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .ok_or_else(|| ReasoningError::NonZeroExit { exit_code: 1 })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn violation() -> Finding {
        Finding::new("8.1", FindingStatus::Violation)
            .with_law_reference("Art. 43")
            .with_reasoning("notice below 30 days")
            .with_quote("Notice period shall be 1 week.")
    }

    #[tokio::test]
    async fn test_violation_gets_suggestion() {
        let backend = FixedBackend::new(Some("  Notice period shall be 30 days.\n"));
        let suggestion = Redliner::new(backend.clone()).suggest(&violation()).await;
        assert_eq!(suggestion.as_deref(), Some("Notice period shall be 30 days."));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, REDLINE_TEMPERATURE);
        assert!(!seen[0].json_reply);
        assert!(seen[0].user.contains("\"Notice period shall be 1 week.\""));
    }

    #[tokio::test]
    async fn test_non_violations_are_skipped() {
        let backend = FixedBackend::new(Some("x"));
        let redliner = Redliner::new(backend.clone());
        for finding in [
            Finding::new("1", FindingStatus::Compliant),
            Finding::new("2", FindingStatus::Missing),
            Finding::error("3", "boom"),
        ] {
            assert!(redliner.suggest(&finding).await.is_none());
        }
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_yields_fixed_text() {
        let suggestion = Redliner::new(FixedBackend::new(None)).suggest(&violation()).await;
        assert_eq!(suggestion.as_deref(), Some(SUGGESTION_FAILED));
    }

    #[test]
    fn test_missing_quote_uses_placeholder() {
        let request = build_redline_request(&violation().with_quote(""));
        assert!(request.user.contains(TEXT_UNAVAILABLE));
    }
}
