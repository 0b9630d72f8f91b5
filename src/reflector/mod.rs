//! Reflector: checks a finding's cited quote against the source document.
//!
//! Decision table, evaluated in order:
//!
//! | Condition                                   | Result                                   |
//! |---------------------------------------------|------------------------------------------|
//! | verifier disabled for the run               | verified, reason names the disabled mode |
//! | status is MISSING                           | verified, "no source expected"           |
//! | quote empty (any other status)              | unverified, "no verification quote provided" |
//! | no match in the namespace / query failed    | unverified, "no matching text found"     |
//! | best score below threshold                  | unverified, reason carries the score     |
//! | otherwise                                   | verified, "source verified"              |
//!
//! The threshold is inclusive: a score exactly equal to it verifies.
//!
//! Whether the verifier is disabled is decided once, when it is built,
//! never per query.

pub mod index;

use crate::config::IndexConfig;
use crate::errors::IndexError;
use crate::finding::{Finding, FindingStatus, VerificationResult};
use index::{IndexMatch, SemanticIndex};
use std::sync::Arc;
use std::time::Duration;

pub const REASON_NO_SOURCE_EXPECTED: &str = "no source expected";
pub const REASON_NO_QUOTE: &str = "no verification quote provided";
pub const REASON_NO_MATCH: &str = "no matching text found";
pub const REASON_SOURCE_VERIFIED: &str = "source verified";
pub const REASON_DISABLED_PREFIX: &str = "verification disabled";

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone)]
enum VerifierMode {
    Enabled(Arc<dyn SemanticIndex>),
    Disabled(String),
}

/// Verifies findings against a semantic index.
#[derive(Clone)]
pub struct ReflectorVerifier {
    mode: VerifierMode,
    threshold: f64,
    top_k: usize,
    query_timeout: Duration,
    query_retries: u32,
    retry_backoff: Duration,
}

impl ReflectorVerifier {
    /// Verifier backed by `index`, with default threshold 0.85.
    pub fn new(index: Arc<dyn SemanticIndex>) -> Self {
        Self {
            mode: VerifierMode::Enabled(index),
            threshold: crate::config::DEFAULT_SIMILARITY_THRESHOLD,
            top_k: 1,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            query_retries: 2,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Verifier that auto-verifies everything, recording why.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            mode: VerifierMode::Disabled(reason.into()),
            threshold: crate::config::DEFAULT_SIMILARITY_THRESHOLD,
            top_k: 1,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            query_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Build from configuration and the outcome of loading the index.
    ///
    /// A disabled config or a failed load yields a disabled verifier.
    pub fn from_config(
        config: &IndexConfig,
        index: Result<Arc<dyn SemanticIndex>, IndexError>,
    ) -> Self {
        let verifier = if !config.enabled {
            Self::disabled("semantic index disabled by configuration")
        } else {
            match index {
                Ok(index) => Self::new(index),
                Err(e) => {
                    tracing::warn!(error = %e, "semantic index unavailable; verification disabled for this run");
                    Self::disabled(format!("semantic index unavailable: {}", e))
                }
            }
        };
        verifier
            .with_threshold(config.similarity_threshold)
            .with_top_k(config.top_k)
            .with_query_timeout(config.query_timeout())
            .with_query_retries(config.query_retries)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_query_retries(mut self, retries: u32) -> Self {
        self.query_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.mode, VerifierMode::Disabled(_))
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.mode {
            VerifierMode::Disabled(reason) => Some(reason),
            VerifierMode::Enabled(_) => None,
        }
    }

    /// Check the finding's quote within `namespace`.
    pub async fn verify(&self, finding: &Finding, namespace: &str) -> VerificationResult {
        let index = match &self.mode {
            VerifierMode::Disabled(reason) => {
                return VerificationResult::verified(format!(
                    "{}: {}",
                    REASON_DISABLED_PREFIX, reason
                ));
            }
            VerifierMode::Enabled(index) => index,
        };

        match finding.status {
            FindingStatus::Missing => return VerificationResult::verified(REASON_NO_SOURCE_EXPECTED),
            FindingStatus::Compliant | FindingStatus::Violation | FindingStatus::Error => {}
        }

        if !finding.has_quote() {
            return VerificationResult::rejected(REASON_NO_QUOTE);
        }

        let matches = match self.query_with_retry(index.as_ref(), finding, namespace).await {
            Ok(matches) => matches,
            Err(e) => {
                return VerificationResult::rejected(format!(
                    "{} (index query failed: {})",
                    REASON_NO_MATCH, e
                ));
            }
        };

        let Some(best) = best_match(&matches) else {
            return VerificationResult::rejected(REASON_NO_MATCH);
        };

        let score = best.score;
        if score < self.threshold {
            tracing::info!(
                clause_id = %finding.clause_id,
                score,
                threshold = self.threshold,
                "quote below similarity threshold"
            );
            return VerificationResult::rejected(format!(
                "quote verification failed: nearest match similarity {:.4} is below threshold {:.2}; possible fabrication",
                score, self.threshold
            ))
            .with_score(score);
        }

        VerificationResult::verified(REASON_SOURCE_VERIFIED).with_score(score)
    }

    async fn query_with_retry(
        &self,
        index: &dyn SemanticIndex,
        finding: &Finding,
        namespace: &str,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let quote = finding.source_quote.trim();
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(
                self.query_timeout,
                index.query(quote, namespace, self.top_k),
            )
            .await
            .unwrap_or(Err(IndexError::Timeout(self.query_timeout)));

            match result {
                Ok(matches) => return Ok(matches),
                Err(e) if attempt < self.query_retries => {
                    attempt += 1;
                    tracing::warn!(
                        clause_id = %finding.clause_id,
                        attempt,
                        error = %e,
                        "similarity query failed; retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Highest-scoring match, tolerating indexes that return unsorted results.
/// Non-finite scores never count as a match.
fn best_match(matches: &[IndexMatch]) -> Option<&IndexMatch> {
    matches
        .iter()
        .filter(|m| m.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
}
