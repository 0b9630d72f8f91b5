//! Critic: produces a compliance [`Finding`] for one clause.
//!
//! The critic wraps a [`ReasoningBackend`] and guarantees a structurally
//! valid finding for every call. Infrastructure failures (spawn errors,
//! timeouts, HTTP errors, unparseable replies) come back as
//! `Finding { status: ERROR, reasoning: <detail>, source_quote: "" }` and
//! never as an `Err`, so the orchestrator has no error path to special-case.
//!
//! ## Usage
//!
//! ```no_run
//! use clause_audit::clause::ClauseRecord;
//! use clause_audit::critic::{CriticEvaluator, backend::ClaudeCliBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let backend = Arc::new(ClaudeCliBackend::new("claude", Duration::from_secs(120)));
//! let critic = CriticEvaluator::new(backend);
//!
//! let clause = ClauseRecord::new("8.1", "Termination", 3, "Notice period shall be 1 week.");
//! let finding = critic.evaluate(&clause, "UAE Labour Law Art. 43").await;
//! println!("{}", finding);
//! # }
//! ```

pub mod backend;

use crate::clause::ClauseRecord;
use crate::finding::{Finding, FindingStatus};
use crate::util::extract_json;
use backend::{CompletionRequest, ReasoningBackend};
use std::sync::Arc;

/// Fixed instruction sent with every critic call.
pub const CRITIC_SYSTEM_PROMPT: &str = r#"You are an expert legal auditor specialising in UAE law.
Review the contract clause below for regulatory compliance.

Respond with ONLY a JSON object with these fields:
- clause_id: the clause ID you were given
- status: COMPLIANT, VIOLATION, or MISSING (a clause the law requires is absent)
- law_reference: the specific law and article relied on
- reasoning: why the clause is compliant or in violation
- source_verification: the EXACT text from the clause that supports your decision,
  copied character for character. It is checked against the source document;
  paraphrased or invented quotes are rejected. Leave it empty only for MISSING.

Judge violations against the relevant laws provided with the clause."#;

/// Produces findings for clauses through a reasoning backend.
#[derive(Clone)]
pub struct CriticEvaluator {
    backend: Arc<dyn ReasoningBackend>,
    temperature: f32,
}

impl CriticEvaluator {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self {
            backend,
            temperature: 0.0,
        }
    }

    /// Override decoding temperature (default 0.0).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Evaluate one clause against the given legal context.
    ///
    /// Never fails: reasoning errors become an ERROR finding.
    pub async fn evaluate(&self, clause: &ClauseRecord, evidentiary_context: &str) -> Finding {
        let request = build_critic_request(clause, evidentiary_context, self.temperature);

        match self.backend.complete(&request).await {
            Ok(reply) => {
                let finding = parse_critic_reply(&reply, &clause.clause_id);
                if finding.is_error() {
                    tracing::warn!(
                        clause_id = %clause.clause_id,
                        detail = %finding.reasoning,
                        "critic reply could not be used"
                    );
                } else {
                    tracing::debug!(
                        clause_id = %clause.clause_id,
                        status = %finding.status,
                        "critic produced finding"
                    );
                }
                finding
            }
            Err(e) => {
                tracing::warn!(
                    clause_id = %clause.clause_id,
                    backend = self.backend.name(),
                    error = %e,
                    "reasoning service call failed"
                );
                Finding::error(&clause.clause_id, e.to_string())
            }
        }
    }
}

/// Build the reasoning request for one clause.
pub fn build_critic_request(
    clause: &ClauseRecord,
    evidentiary_context: &str,
    temperature: f32,
) -> CompletionRequest {
    let user = format!(
        "Clause ID: {clause_id}\nClause Text: {clause_text}\n\nRelevant Laws (Retrieved):\n{laws}\n",
        clause_id = clause.clause_id,
        clause_text = clause.raw_text,
        laws = evidentiary_context,
    );
    CompletionRequest::new(CRITIC_SYSTEM_PROMPT, user)
        .with_temperature(temperature)
        .with_json_reply(true)
}

/// Parse a critic reply into a finding.
///
/// The finding always carries the audited clause's id. Missing or unknown
/// `status`, or a reply without a JSON object, yields an ERROR finding.
pub fn parse_critic_reply(reply: &str, clause_id: &str) -> Finding {
    let Some(json_str) = extract_json(reply) else {
        return Finding::error(clause_id, "reasoning reply contained no JSON object");
    };

    let value: serde_json::Value = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            return Finding::error(clause_id, format!("reasoning reply was not valid JSON: {}", e));
        }
    };

    let status = match value.get("status").and_then(|v| v.as_str()) {
        Some(s) => match s.parse::<FindingStatus>() {
            Ok(status) => status,
            Err(e) => return Finding::error(clause_id, e),
        },
        None => return Finding::error(clause_id, "reasoning reply had no status field"),
    };

    let text_field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let quote = match value.get("source_verification").and_then(|v| v.as_str()) {
        Some(q) => q.to_string(),
        None => text_field("source_quote"),
    };

    Finding::new(clause_id, status)
        .with_law_reference(text_field("law_reference"))
        .with_reasoning(text_field("reasoning"))
        .with_quote(quote.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReasoningError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Test double returning canned replies and recording requests.
    struct CannedBackend {
        reply: Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedBackend {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningBackend for CannedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ReasoningError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .map_err(ReasoningError::MalformedReply)
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn clause() -> ClauseRecord {
        ClauseRecord::new("8.1", "Termination", 3, "Notice period shall be 1 week.")
    }

    #[test]
    fn test_parse_violation_reply() {
        let reply = r#"{
            "clause_id": "8.1",
            "status": "VIOLATION",
            "law_reference": "UAE Labour Law Art. 43",
            "reasoning": "Minimum notice is 30 days",
            "source_verification": "Notice period shall be 1 week."
        }"#;
        let finding = parse_critic_reply(reply, "8.1");
        assert_eq!(finding.status, FindingStatus::Violation);
        assert_eq!(finding.law_reference, "UAE Labour Law Art. 43");
        assert_eq!(finding.source_quote, "Notice period shall be 1 week.");
    }

    #[test]
    fn test_parse_uses_audited_clause_id() {
        let reply = r#"{"clause_id": "99", "status": "compliant", "source_verification": "x y z"}"#;
        let finding = parse_critic_reply(reply, "1.1");
        assert_eq!(finding.clause_id, "1.1");
        assert_eq!(finding.status, FindingStatus::Compliant);
    }

    #[test]
    fn test_parse_missing_without_quote() {
        let reply = r#"```json
{"status": "MISSING", "law_reference": "Art. 36", "reasoning": "No probation clause"}
```"#;
        let finding = parse_critic_reply(reply, "General");
        assert_eq!(finding.status, FindingStatus::Missing);
        assert!(!finding.has_quote());
    }

    #[test]
    fn test_parse_accepts_source_quote_alias() {
        let reply = r#"{"status": "COMPLIANT", "source_quote": "  30 days of annual leave "}"#;
        let finding = parse_critic_reply(reply, "1.1");
        assert_eq!(finding.source_quote, "30 days of annual leave");
    }

    #[test]
    fn test_parse_unknown_status_is_error() {
        let finding = parse_critic_reply(r#"{"status": "MAYBE"}"#, "1.1");
        assert!(finding.is_error());
        assert!(finding.reasoning.contains("MAYBE"));
        assert!(!finding.has_quote());
    }

    #[test]
    fn test_parse_missing_status_is_error() {
        let finding = parse_critic_reply(r#"{"reasoning": "looks fine"}"#, "1.1");
        assert!(finding.is_error());
    }

    #[test]
    fn test_parse_no_json_is_error() {
        let finding = parse_critic_reply("I cannot help with that.", "1.1");
        assert!(finding.is_error());
        assert!(finding.reasoning.contains("no JSON"));
    }

    #[test]
    fn test_request_carries_clause_and_context() {
        let request = build_critic_request(&clause(), "Labour Law Art. 43", 0.0);
        assert_eq!(request.system, CRITIC_SYSTEM_PROMPT);
        assert!(request.user.contains("Clause ID: 8.1"));
        assert!(request.user.contains("Notice period shall be 1 week."));
        assert!(request.user.contains("Labour Law Art. 43"));
        assert!(request.json_reply);
        assert_eq!(request.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_evaluate_returns_parsed_finding() {
        let backend = Arc::new(CannedBackend::ok(
            r#"{"status": "VIOLATION", "reasoning": "too short", "source_verification": "Notice period shall be 1 week."}"#,
        ));
        let critic = CriticEvaluator::new(backend.clone());
        let finding = critic.evaluate(&clause(), "ctx").await;

        assert_eq!(finding.status, FindingStatus::Violation);
        assert_eq!(backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_contains_backend_failure() {
        let critic = CriticEvaluator::new(Arc::new(CannedBackend::failing("connection reset")));
        let finding = critic.evaluate(&clause(), "ctx").await;

        assert_eq!(finding.status, FindingStatus::Error);
        assert_eq!(finding.clause_id, "8.1");
        assert!(finding.reasoning.contains("connection reset"));
        assert_eq!(finding.source_quote, "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_evaluate_turns_cli_timeout_into_error_finding() {
        use crate::critic::backend::ClaudeCliBackend;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stalled-claude");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend = ClaudeCliBackend::new(script.to_str().unwrap(), Duration::from_millis(200));
        let started = std::time::Instant::now();
        let finding = CriticEvaluator::new(Arc::new(backend)).evaluate(&clause(), "ctx").await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(finding.status, FindingStatus::Error);
        assert!(finding.reasoning.contains("timed out"), "reasoning: {}", finding.reasoning);
        assert!(!finding.has_quote());
    }
}
